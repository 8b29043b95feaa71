use eframe::egui;

pub struct Palette {
    pub bg: egui::Color32,
    pub fg: egui::Color32,
    pub stroke: egui::Color32,
    pub accent: egui::Color32,
    pub selection: egui::Color32,
    pub muted: egui::Color32,
    pub ok: egui::Color32,
    pub warn: egui::Color32,
    pub error: egui::Color32,
}

impl Palette {
    pub fn new(is_dark: bool) -> Self {
        if is_dark {
            Self {
                bg: egui::Color32::from_rgb(28, 30, 34),
                fg: egui::Color32::from_gray(230),
                stroke: egui::Color32::from_gray(90),
                accent: egui::Color32::from_rgb(70, 140, 230),
                selection: egui::Color32::from_rgb(40, 90, 160),
                muted: egui::Color32::from_gray(150),
                ok: egui::Color32::from_rgb(80, 210, 120),
                warn: egui::Color32::from_rgb(240, 190, 60),
                error: egui::Color32::from_rgb(240, 90, 90),
            }
        } else {
            Self {
                bg: egui::Color32::from_rgb(246, 247, 249),
                fg: egui::Color32::from_gray(20),
                stroke: egui::Color32::from_gray(170),
                accent: egui::Color32::from_rgb(30, 110, 220),
                selection: egui::Color32::from_rgb(170, 205, 250),
                muted: egui::Color32::from_gray(160),
                ok: egui::Color32::from_rgb(20, 160, 70),
                warn: egui::Color32::from_rgb(210, 150, 0),
                error: egui::Color32::from_rgb(210, 40, 40),
            }
        }
    }
}

pub fn apply(ctx: &egui::Context, is_dark: bool) {
    let palette = Palette::new(is_dark);
    let mut style = (*ctx.style()).clone();
    style.visuals = if is_dark {
        egui::Visuals::dark()
    } else {
        egui::Visuals::light()
    };

    style
        .text_styles
        .iter_mut()
        .for_each(|(text_style, font_id)| {
            font_id.size = match text_style {
                egui::TextStyle::Heading => 22.0,
                egui::TextStyle::Body | egui::TextStyle::Button => 14.0,
                egui::TextStyle::Monospace => 13.0,
                _ => font_id.size,
            };
        });

    style.spacing.item_spacing = egui::vec2(8.0, 6.0);
    style.spacing.button_padding = egui::vec2(10.0, 5.0);

    let rounding = egui::Rounding::same(3.0);
    style.visuals.widgets.noninteractive.bg_stroke = egui::Stroke::new(1.0, palette.stroke);
    style.visuals.widgets.noninteractive.bg_fill = palette.bg;
    style.visuals.widgets.noninteractive.rounding = rounding;
    style.visuals.widgets.inactive.rounding = rounding;
    style.visuals.widgets.hovered.rounding = rounding;
    style.visuals.widgets.hovered.bg_stroke = egui::Stroke::new(1.0, palette.accent);
    style.visuals.widgets.active.rounding = rounding;
    style.visuals.widgets.active.bg_fill = palette.accent;

    style.visuals.selection.bg_fill = palette.selection;
    style.visuals.selection.stroke = egui::Stroke::new(1.0, palette.fg);
    style.visuals.hyperlink_color = palette.accent;
    style.visuals.panel_fill = palette.bg;
    style.visuals.window_fill = palette.bg;

    ctx.set_style(style);
}
