pub mod experiments;
pub mod health;
pub mod models;
pub mod predict;
