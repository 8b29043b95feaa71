pub mod assigned_numbers;
pub mod models;
pub mod payload;
pub mod session;
pub mod settings;
