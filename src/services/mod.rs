pub mod bookings;
pub mod items;
