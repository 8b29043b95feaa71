use crate::domain::models::{ConnectionStatus, MessageSeverity, StatusMessage};
use crate::presentation::theme::Palette;
use eframe::egui;

pub struct Components;

impl Components {
    pub fn heading(ui: &mut egui::Ui, text: &str) {
        ui.vertical_centered(|ui| {
            ui.label(egui::RichText::new(text).strong().size(18.0));
        });
    }

    /// Framed column with a centered title
    pub fn card<R>(
        ui: &mut egui::Ui,
        title: &str,
        add_contents: impl FnOnce(&mut egui::Ui) -> R,
    ) -> R {
        let stroke = ui.style().visuals.widgets.noninteractive.bg_stroke;
        let bg = ui.style().visuals.widgets.noninteractive.bg_fill;

        egui::Frame::none()
            .inner_margin(egui::Margin::same(10.0))
            .stroke(stroke)
            .fill(bg)
            .show(ui, |ui| {
                ui.vertical(|ui| {
                    Self::heading(ui, title);
                    ui.add_space(6.0);
                    add_contents(ui)
                })
                .inner
            })
            .inner
    }

    pub fn status_color(ui: &egui::Ui, severity: MessageSeverity) -> egui::Color32 {
        let palette = Palette::new(ui.visuals().dark_mode);
        match severity {
            MessageSeverity::Info => palette.fg,
            MessageSeverity::Success => palette.ok,
            MessageSeverity::Warning => palette.warn,
            MessageSeverity::Error => palette.error,
        }
    }

    /// Connection badge followed by the latest status message
    pub fn status_line(
        ui: &mut egui::Ui,
        status: ConnectionStatus,
        message: Option<&StatusMessage>,
    ) {
        let palette = Palette::new(ui.visuals().dark_mode);
        let (text, color) = match status {
            ConnectionStatus::Connected => ("CONNECTED", palette.ok),
            ConnectionStatus::Connecting => ("CONNECTING...", palette.warn),
            ConnectionStatus::Disconnected => ("DISCONNECTED", palette.muted),
            ConnectionStatus::Error => ("ERROR", palette.error),
        };

        ui.horizontal(|ui| {
            ui.label(
                egui::RichText::new(format!(" {} ", text))
                    .strong()
                    .color(egui::Color32::BLACK)
                    .background_color(color),
            );
            if let Some(msg) = message {
                let color = Self::status_color(ui, msg.severity);
                ui.label(egui::RichText::new(&msg.message).color(color));
            }
        });
    }
}
