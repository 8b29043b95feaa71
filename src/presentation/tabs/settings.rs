use crate::domain::settings::LogRotation;
use crate::presentation::app::BleExplorerApp;
use crate::presentation::components::Components;
use eframe::egui;

pub fn render(app: &mut BleExplorerApp, ui: &mut egui::Ui) {
    let mut save = false;

    egui::ScrollArea::vertical().show(ui, |ui| {
        ui.set_max_width(640.0);

        let Ok(mut settings) = app.settings.lock() else {
            ui.colored_label(egui::Color32::RED, "Settings unavailable");
            return;
        };
        let s = settings.get_mut();

        Components::card(ui, "Scanning", |ui| {
            ui.horizontal(|ui| {
                ui.label("Scan timeout (ms):");
                ui.add(egui::DragValue::new(&mut s.scan_timeout_ms).range(500..=60_000).speed(100));
            });
            ui.horizontal(|ui| {
                ui.label("Service filter UUID:");
                ui.text_edit_singleline(&mut s.scan_service_filter);
            });
            ui.checkbox(&mut s.show_unnamed_devices, "Show devices without a name");
            ui.horizontal(|ui| {
                ui.label("Adapter index:");
                ui.add(egui::DragValue::new(&mut s.adapter_index).range(0..=8));
            });
        });

        ui.add_space(8.0);

        Components::card(ui, "Connection", |ui| {
            ui.horizontal(|ui| {
                ui.label("Connect timeout (ms):");
                ui.add(egui::DragValue::new(&mut s.connect_timeout_ms).range(1000..=60_000).speed(100));
            });
            ui.horizontal(|ui| {
                ui.label("Connect attempts:");
                ui.add(egui::DragValue::new(&mut s.connect_max_retries).range(1..=10));
            });
            ui.horizontal(|ui| {
                ui.label("Retry delay (ms):");
                ui.add(egui::DragValue::new(&mut s.connect_retry_delay_ms).range(0..=10_000).speed(50));
            });
            ui.checkbox(&mut s.auto_discover_services, "Discover services after connecting");
        });

        ui.add_space(8.0);

        Components::card(ui, "GATT", |ui| {
            ui.checkbox(&mut s.auto_read_on_open, "Read readable characteristics when opening a service");
            ui.checkbox(&mut s.auto_subscribe, "Subscribe to notifications when opening a service");
            ui.horizontal(|ui| {
                ui.label("Default write length:");
                ui.add(egui::DragValue::new(&mut s.default_write_len).range(1..=512));
            });
            ui.horizontal(|ui| {
                ui.label("Event log capacity:");
                ui.add(egui::DragValue::new(&mut s.event_log_capacity).range(50..=10_000));
            });
        });

        ui.add_space(8.0);

        Components::card(ui, "Logging", |ui| {
            ui.horizontal(|ui| {
                ui.label("Verbosity Level:");
                egui::ComboBox::from_id_salt("log_level")
                    .selected_text(&s.log_settings.level)
                    .show_ui(ui, |ui| {
                        for level in &["trace", "debug", "info", "warn", "error"] {
                            ui.selectable_value(&mut s.log_settings.level, level.to_string(), *level);
                        }
                    });
            });
            ui.checkbox(&mut s.log_settings.console_logging_enabled, "Console logs");
            ui.checkbox(&mut s.log_settings.file_logging_enabled, "File logs");

            if s.log_settings.file_logging_enabled {
                ui.indent("file_logs", |ui| {
                    ui.horizontal(|ui| {
                        ui.label("Directory:");
                        ui.text_edit_singleline(&mut s.log_settings.log_dir);
                    });
                    ui.horizontal(|ui| {
                        ui.label("Rotation:");
                        egui::ComboBox::from_id_salt("log_rotation")
                            .selected_text(s.log_settings.rotation.label())
                            .show_ui(ui, |ui| {
                                for rotation in LogRotation::ALL {
                                    ui.selectable_value(
                                        &mut s.log_settings.rotation,
                                        rotation,
                                        rotation.label(),
                                    );
                                }
                            });
                    });
                });
            }
            ui.label(
                egui::RichText::new("Restart required for log changes.")
                    .italics()
                    .size(12.0),
            );
        });

        if !s.known_devices.is_empty() {
            ui.add_space(8.0);
            Components::card(ui, "Known Devices", |ui| {
                for device in &s.known_devices {
                    let name = device.name.as_deref().unwrap_or("Unknown");
                    let marker = if s.last_connected_id.as_deref() == Some(device.id.as_str()) {
                        " (last)"
                    } else {
                        ""
                    };
                    ui.label(format!("{} ({}){}", name, device.address, marker));
                }
            });
        }

        ui.add_space(8.0);
        ui.horizontal(|ui| {
            if ui.button("Save settings").clicked() {
                save = true;
            }
            ui.weak(settings.path().display().to_string());
        });
    });

    if save {
        app.save_settings();
    }
}
