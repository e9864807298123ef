mod app;
mod color;
mod config;
mod data;
mod state;
mod ui;

use std::process::ExitCode;

use anyhow::{anyhow, Context, Result};
use eframe::egui;

use app::FigureViewerApp;
use color::ColorScale;
use config::AppConfig;
use state::ViewerState;
use ui::figure::{render_figure, FigureSpec};

fn main() -> ExitCode {
    env_logger::init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    // Optional single argument: a JSON config overriding the defaults.
    let config = match std::env::args_os().nth(1) {
        Some(path) => AppConfig::load(&path)
            .with_context(|| format!("loading config {}", path.to_string_lossy()))?,
        None => {
            let config = AppConfig::default();
            config.validate()?;
            config
        }
    };

    let table = config
        .pipeline()
        .run(config.sources.as_slice())
        .context("building stage table")?;

    let spec = FigureSpec {
        table: &table,
        order: &config.display_order,
        scale: ColorScale::new(config.norm()),
    };
    let size = (config.figure.width, config.figure.height);
    let figure = render_figure(&spec, size).context("rendering figure")?;
    log::info!("Rendered {}x{} figure", size.0, size.1);

    if let Some(path) = &config.output {
        figure
            .save_png(path)
            .with_context(|| format!("saving figure to {}", path.display()))?;
    }

    if !config.show_window {
        return Ok(());
    }

    let state = ViewerState::new(figure, &table);
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([size.0 as f32 * 0.75, size.1 as f32 * 0.75 + 30.0])
            .with_min_inner_size([400.0, 400.0]),
        ..Default::default()
    };

    eframe::run_native(
        "Atlantic d13C by Marine Isotope Stage",
        options,
        Box::new(|_cc| Ok(Box::new(FigureViewerApp::new(state)))),
    )
    .map_err(|e| anyhow!("viewer window: {e}"))
}
