use std::path::Path;

use eframe::egui::TextureHandle;

use crate::data::model::StageTable;
use crate::ui::figure::{Figure, RenderError};

// ---------------------------------------------------------------------------
// Viewer state
// ---------------------------------------------------------------------------

/// Everything the viewer window shows, independent of rendering.
pub struct ViewerState {
    /// The rendered figure.
    pub figure: Figure,

    /// GPU copy of `figure`, uploaded on first paint.
    pub texture: Option<TextureHandle>,

    /// One-line description of the plotted table.
    pub summary: String,

    /// Status / error message shown in the UI.
    pub status_message: Option<String>,
}

impl ViewerState {
    pub fn new(figure: Figure, table: &StageTable) -> Self {
        Self {
            figure,
            texture: None,
            summary: summarize(table),
            status_message: None,
        }
    }

    /// Write the figure as PNG and report the outcome in the status line.
    pub fn save_figure(&mut self, path: &Path) {
        match self.figure.save_png(path) {
            Ok(()) => {
                self.status_message = Some(format!("Saved {}", path.display()));
            }
            Err(e) => self.report(e),
        }
    }

    fn report(&mut self, e: RenderError) {
        log::error!("Failed to save figure: {e:#}");
        self.status_message = Some(format!("Error: {e}"));
    }
}

/// e.g. `"14 cores across 6 stages"`.
pub fn summarize(table: &StageTable) -> String {
    format!(
        "{} cores across {} stages",
        table.len(),
        table.stages().len()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::CoreMean;

    #[test]
    fn summary_counts_rows_and_stages() {
        let row = |stage: &str, core: &str| CoreMean {
            stage: stage.into(),
            core: core.into(),
            latitude: 0.0,
            longitude: 0.0,
            depth: 0.0,
            d13c: 0.0,
        };
        let table = StageTable::from_rows(vec![row("MIS1", "A"), row("MIS1", "B"), row("MIS6", "A")]);
        assert_eq!(summarize(&table), "3 cores across 2 stages");
    }

    #[test]
    fn failed_save_sets_status() {
        let figure = Figure {
            width: 2,
            height: 2,
            pixels: vec![0; 5],
        };
        let mut state = ViewerState::new(figure, &StageTable::default());
        state.save_figure(Path::new("unused.png"));
        assert!(state
            .status_message
            .as_deref()
            .is_some_and(|m| m.starts_with("Error")));
    }

    #[test]
    fn saved_png_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("figure.png");
        let figure = Figure {
            width: 2,
            height: 2,
            pixels: vec![255; 12],
        };
        let mut state = ViewerState::new(figure, &StageTable::default());
        state.save_figure(&path);
        assert!(path.exists());
        assert!(state.status_message.unwrap().starts_with("Saved"));
    }
}
