mod panel;
mod pattern;

use std::cell::RefCell;
use std::rc::Rc;

use anyhow::{Context, Result};

use fovea_engine::foveation::Foveation;
use fovea_engine::logging::{init_logging, LoggingConfig};
use fovea_engine::overlay::EguiOverlay;
use fovea_engine::{CompositorConfig, WindowCompositor};

use panel::Settings;
use pattern::PatternEngine;

fn main() -> Result<()> {
    init_logging(LoggingConfig::default());

    let settings = Rc::new(RefCell::new(Settings::default()));

    let overlay = EguiOverlay::new({
        let settings = Rc::clone(&settings);
        move |ctx, stats| panel::show(ctx, stats, &mut settings.borrow_mut())
    });

    let mut compositor = WindowCompositor::new(
        CompositorConfig {
            title: "fovea viewer".into(),
            ..Default::default()
        },
        overlay,
    );
    compositor
        .init_window(1280, 720, false)
        .context("failed to open the viewer window")?;

    if let Some(presenter) = compositor.presenter() {
        let info = presenter.adapter_info();
        log::info!("presenting on {} ({:?})", info.name, info.backend);
        settings.borrow_mut().adapter = format!("{} ({:?})", info.name, info.backend);
    }

    let mut engine = PatternEngine::new();
    let mut applied: Option<(bool, f32, f32)> = None;

    loop {
        {
            let mut s = settings.borrow_mut();

            let foveation_key = (s.foveated, s.render_scale, s.focus_diameter);
            if applied != Some(foveation_key) {
                if s.foveated {
                    compositor.follow_window(s.render_scale);
                    engine.set_foveation(Foveation::from_render_scale(
                        s.render_scale,
                        [0.5, 0.5],
                        s.focus_diameter,
                    ));
                } else {
                    compositor.follow_window(1.0);
                    engine.set_foveation(Foveation::IDENTITY);
                }
                compositor.reset_accumulation();
                applied = Some(foveation_key);
            }

            compositor.set_exposure(s.exposure);
            compositor.set_color_filter(s.filter);
            engine.animate = s.animate;

            if std::mem::take(&mut s.reset_requested) || s.animate {
                compositor.reset_accumulation();
            }
        }

        if !compositor.begin_frame()? {
            break;
        }
        compositor.render_with(&mut engine)?;
        let open = compositor.present()?;
        compositor.end_frame()?;

        if !open {
            break;
        }
    }

    log::info!(
        "viewer closed after {} frames",
        compositor.stats().frame_index + 1
    );
    compositor.destroy();
    Ok(())
}
