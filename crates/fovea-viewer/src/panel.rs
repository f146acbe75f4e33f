use fovea_engine::present::FilterMode;
use fovea_engine::time::FrameStats;

/// Viewer controls edited by the overlay and applied by the frame loop.
#[derive(Debug, Clone)]
pub struct Settings {
    pub foveated: bool,
    pub render_scale: f32,

    /// Diameter of the full-resolution focus region, normalized.
    pub focus_diameter: f32,

    pub exposure: f32,
    pub filter: FilterMode,
    pub animate: bool,
    pub reset_requested: bool,

    /// GPU adapter the presenter runs on, for display.
    pub adapter: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            foveated: false,
            render_scale: 0.5,
            focus_diameter: 0.3,
            exposure: 0.0,
            filter: FilterMode::Linear,
            animate: false,
            reset_requested: false,
            adapter: String::new(),
        }
    }
}

pub fn show(ctx: &egui::Context, stats: &FrameStats, settings: &mut Settings) {
    egui::Window::new("fovea")
        .default_width(240.0)
        .resizable(false)
        .show(ctx, |ui| {
            if !settings.adapter.is_empty() {
                ui.label(settings.adapter.as_str());
            }
            ui.label(format!("{:.1} fps ({:.2} ms)", stats.fps, stats.dt * 1000.0));
            ui.label(format!("window {}  view {} x{}", stats.window, stats.view, stats.view_count));
            ui.label(format!("samples {}", stats.samples));
            if stats.skipped_frames > 0 || stats.reallocations > 0 {
                ui.label(format!(
                    "skipped {}  reallocations {}",
                    stats.skipped_frames, stats.reallocations
                ));
            }

            ui.separator();

            ui.checkbox(&mut settings.foveated, "foveated");
            ui.add_enabled_ui(settings.foveated, |ui| {
                ui.add(
                    egui::Slider::new(&mut settings.render_scale, 0.2..=1.0).text("render scale"),
                );
                ui.add(egui::Slider::new(&mut settings.focus_diameter, 0.05..=1.0).text("focus"));
            });

            ui.add(egui::Slider::new(&mut settings.exposure, -4.0..=4.0).text("exposure"));

            ui.horizontal(|ui| {
                ui.label("filter");
                ui.radio_value(&mut settings.filter, FilterMode::Linear, "linear");
                ui.radio_value(&mut settings.filter, FilterMode::Nearest, "nearest");
            });

            ui.checkbox(&mut settings.animate, "animate");
            if ui.button("reset accumulation").clicked() {
                settings.reset_requested = true;
            }
        });
}
