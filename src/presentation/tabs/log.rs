use crate::presentation::app::BleExplorerApp;
use crate::presentation::components::Components;
use eframe::egui;

pub fn render(app: &mut BleExplorerApp, ui: &mut egui::Ui) {
    ui.horizontal(|ui| {
        Components::heading(ui, "Event Log");
        if ui.button("Clear").clicked() {
            app.state.clear_log();
        }
    });
    ui.separator();

    egui::ScrollArea::vertical()
        .id_salt("event_log")
        .auto_shrink([false, false])
        .stick_to_bottom(true)
        .show(ui, |ui| {
            for entry in app.state.event_log() {
                let color = Components::status_color(ui, entry.severity);
                ui.horizontal(|ui| {
                    ui.weak(format!("{:>5}", entry.seq));
                    ui.label(egui::RichText::new(&entry.message).color(color));
                });
            }
        });
}
