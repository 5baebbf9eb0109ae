// Library exports for the API layer and tests
pub mod db;
pub mod models;
pub mod services;
