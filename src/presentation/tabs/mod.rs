pub mod explorer;
pub mod log;
pub mod settings;
