mod domain;
mod infrastructure;
mod presentation;

use domain::settings::SettingsService;
use eframe::egui;
use std::path::PathBuf;

fn main() -> Result<(), eframe::Error> {
    let settings_service = SettingsService::new().unwrap_or_else(|e| {
        eprintln!("Failed to locate settings, using ./settings.json: {}", e);
        SettingsService::load(PathBuf::from("settings.json"))
    });

    let logging_guard = infrastructure::logging::init_logger(&settings_service.get().log_settings)
        .map_err(|e| eprintln!("Failed to initialize logging: {}", e))
        .ok();

    tracing::info!("Starting BLE Explorer");

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1024.0, 640.0])
            .with_min_inner_size([720.0, 480.0])
            .with_title("BLE Explorer"),
        ..Default::default()
    };

    eframe::run_native(
        "BLE Explorer",
        options,
        Box::new(move |cc| {
            Ok(Box::new(presentation::app::BleExplorerApp::new(
                cc,
                settings_service,
                logging_guard,
            )))
        }),
    )
}
