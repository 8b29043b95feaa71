use crate::domain::assigned_numbers;
use crate::domain::models::{CharacteristicInfo, ConnectionStatus, ValueOrigin, WriteMode};
use crate::domain::payload;
use crate::domain::session::ScanState;
use crate::presentation::app::BleExplorerApp;
use crate::presentation::components::Components;
use eframe::egui;
use egui_extras::{Column, TableBuilder};

const LIST_HEIGHT: f32 = 260.0;

pub fn render(app: &mut BleExplorerApp, ui: &mut egui::Ui) {
    ui.columns(3, |columns| {
        devices_column(app, &mut columns[0]);
        services_column(app, &mut columns[1]);
        characteristics_column(app, &mut columns[2]);
    });
}

fn devices_column(app: &mut BleExplorerApp, ui: &mut egui::Ui) {
    Components::card(ui, "Devices", |ui| {
        ui.horizontal(|ui| {
            ui.label(app.state.scan_label());
            if app.state.scan_state == ScanState::Scanning {
                ui.spinner();
            }
        });

        let mut clicked = None;
        egui::ScrollArea::vertical()
            .id_salt("devices")
            .max_height(LIST_HEIGHT)
            .auto_shrink([false, true])
            .show(ui, |ui| {
                if app.state.devices.is_empty() {
                    ui.weak("No devices");
                }
                for device in &app.state.devices {
                    let selected = app.state.selected_device.as_deref() == Some(device.id.as_str());
                    let text = match device.rssi {
                        Some(rssi) => format!("{}  {} dBm", device.label(), rssi),
                        None => device.label(),
                    };
                    if ui.selectable_label(selected, text).clicked() {
                        clicked = Some(device.id.clone());
                    }
                }
            });
        if let Some(id) = clicked {
            app.state.selected_device = Some(id);
        }

        ui.horizontal(|ui| {
            if app.state.scan_state == ScanState::Scanning {
                if ui.button("Stop Scan").clicked() {
                    app.stop_scan();
                }
            } else if ui.button("Find Device").clicked() {
                app.start_scan();
            }

            let idle = matches!(
                app.state.connection_status,
                ConnectionStatus::Disconnected | ConnectionStatus::Error
            );
            let enabled = !idle || app.state.selected_device.is_some();
            let button = egui::Button::new(app.state.connect_button_label());
            if ui.add_enabled(enabled, button).clicked() {
                app.toggle_connection();
            }
        });
    });
}

fn services_column(app: &mut BleExplorerApp, ui: &mut egui::Ui) {
    Components::card(ui, "Services", |ui| {
        let mut clicked = None;
        let mut opened = None;
        egui::ScrollArea::vertical()
            .id_salt("services")
            .max_height(LIST_HEIGHT)
            .auto_shrink([false, true])
            .show(ui, |ui| {
                if app.state.services.is_empty() {
                    ui.weak(if app.state.is_connected() {
                        "No services discovered"
                    } else {
                        "Not connected"
                    });
                }
                for service in &app.state.services {
                    let mut text = assigned_numbers::describe_service(&service.uuid);
                    if !service.primary {
                        text.push_str(" (secondary)");
                    }
                    if app.state.open_service == Some(service.uuid) {
                        text.insert_str(0, "▶ ");
                    }
                    let response =
                        ui.selectable_label(app.state.selected_service == Some(service.uuid), text);
                    if response.double_clicked() {
                        opened = Some(service.uuid);
                    } else if response.clicked() {
                        clicked = Some(service.uuid);
                    }
                }
            });
        if let Some(uuid) = clicked {
            app.state.selected_service = Some(uuid);
        }
        if let Some(uuid) = opened {
            app.open_service(uuid);
        }

        let connected = app.state.is_connected();
        ui.horizontal(|ui| {
            if ui
                .add_enabled(connected, egui::Button::new("Discover services"))
                .clicked()
            {
                app.discover_services();
            }
            let selected = app.state.selected_service.filter(|_| connected);
            if ui
                .add_enabled(selected.is_some(), egui::Button::new("Open service"))
                .clicked()
            {
                if let Some(uuid) = selected {
                    app.open_service(uuid);
                }
            }
        });
    });
}

fn characteristics_column(app: &mut BleExplorerApp, ui: &mut egui::Ui) {
    Components::card(ui, "Characteristics", |ui| {
        if let Some(service) = app.state.open_service {
            ui.vertical_centered(|ui| {
                ui.weak(assigned_numbers::describe_service(&service));
            });
        }

        let mut clicked = None;
        ui.push_id("characteristics_table", |ui| {
            TableBuilder::new(ui)
                .striped(true)
                .resizable(true)
                .max_scroll_height(LIST_HEIGHT)
                .cell_layout(egui::Layout::left_to_right(egui::Align::Center))
                .column(Column::initial(150.0).at_least(80.0).clip(true))
                .column(Column::auto().at_least(40.0))
                .column(Column::remainder().clip(true))
                .header(20.0, |mut header| {
                    header.col(|ui| {
                        ui.strong("UUID");
                    });
                    header.col(|ui| {
                        ui.strong("Props");
                    });
                    header.col(|ui| {
                        ui.strong("Value");
                    });
                })
                .body(|mut body| {
                    for characteristic in &app.state.characteristics {
                        let key = characteristic.key();
                        let selected = app.state.selected_characteristic == Some(key);
                        body.row(20.0, |mut row| {
                            row.col(|ui| {
                                let text =
                                    assigned_numbers::describe_characteristic(&characteristic.uuid);
                                if ui.selectable_label(selected, text).clicked() {
                                    clicked = Some(key);
                                }
                            });
                            row.col(|ui| {
                                ui.monospace(characteristic.property_summary());
                            });
                            row.col(|ui| {
                                let value = app
                                    .state
                                    .value(&key)
                                    .map(|v| payload::summarize(&v.bytes, 8))
                                    .unwrap_or_default();
                                ui.monospace(value);
                            });
                        });
                    }
                });
        });
        if let Some(key) = clicked {
            app.state.selected_characteristic = Some(key);
        }

        let selected = app
            .state
            .selected_characteristic
            .and_then(|key| app.state.characteristic(&key).cloned());
        if let Some(characteristic) = selected {
            ui.separator();
            characteristic_detail(app, ui, &characteristic);
        }
    });
}

fn characteristic_detail(app: &mut BleExplorerApp, ui: &mut egui::Ui, info: &CharacteristicInfo) {
    let key = info.key();

    ui.label(egui::RichText::new(assigned_numbers::describe_characteristic(&info.uuid)).strong());
    ui.label(egui::RichText::new(info.uuid.to_string()).monospace().small());
    ui.label(format!("Properties: {}", info.property_summary()));
    if !info.descriptors.is_empty() {
        let descriptors: Vec<String> = info
            .descriptors
            .iter()
            .map(assigned_numbers::describe_characteristic)
            .collect();
        ui.label(format!("Descriptors: {}", descriptors.join(", ")));
    }

    match app.state.value(&key) {
        Some(value) => {
            let origin = match value.origin {
                ValueOrigin::Read => "read",
                ValueOrigin::Notification => "notified",
                ValueOrigin::Written => "written",
            };
            ui.label(format!("Value ({} bytes, {}):", value.bytes.len(), origin));
            ui.add(
                egui::Label::new(egui::RichText::new(payload::to_hex(&value.bytes)).monospace())
                    .wrap(),
            );
            if let Some(text) = payload::text_preview(&value.bytes) {
                ui.label(format!("Text: \"{}\"", text));
            }
        }
        None => {
            ui.weak("No value yet");
        }
    }

    ui.horizontal(|ui| {
        if ui
            .add_enabled(info.is_readable(), egui::Button::new("Read"))
            .clicked()
        {
            app.read(key);
        }

        let label = if app.state.is_subscribed(&key) {
            "Unsubscribe"
        } else {
            "Subscribe"
        };
        if ui
            .add_enabled(info.is_notifiable(), egui::Button::new(label))
            .clicked()
        {
            app.toggle_subscription(key);
        }
    });

    if info.is_writable() {
        let default_len = app
            .settings
            .lock()
            .map(|s| s.get().default_write_len)
            .unwrap_or(payload::DEFAULT_WRITE_LEN);

        ui.add(
            egui::TextEdit::singleline(&mut app.write_input)
                .hint_text(format!("hex bytes (empty = {} zero bytes)", default_len))
                .font(egui::TextStyle::Monospace)
                .desired_width(f32::INFINITY),
        );
        ui.horizontal(|ui| {
            egui::ComboBox::from_id_salt("write_mode")
                .selected_text(app.write_mode.label())
                .show_ui(ui, |ui| {
                    for mode in [
                        WriteMode::Auto,
                        WriteMode::WithResponse,
                        WriteMode::WithoutResponse,
                    ] {
                        ui.selectable_value(&mut app.write_mode, mode, mode.label());
                    }
                });
            if ui.button("Write").clicked() {
                app.write(key);
            }
        });
    }
}
