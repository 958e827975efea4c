pub mod bridge;
pub mod error;
pub mod models;
pub mod persistence;
pub mod services;
pub mod state;
pub mod utils;
