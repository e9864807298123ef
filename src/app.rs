use eframe::egui;

use crate::state::ViewerState;
use crate::ui::{panels, plot};

// ---------------------------------------------------------------------------
// eframe App implementation
// ---------------------------------------------------------------------------

pub struct FigureViewerApp {
    pub state: ViewerState,
}

impl FigureViewerApp {
    pub fn new(state: ViewerState) -> Self {
        Self { state }
    }
}

impl eframe::App for FigureViewerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // ---- Top panel: menu bar ----
        egui::TopBottomPanel::top("top_bar").show(ctx, |ui| {
            panels::top_bar(ui, &mut self.state);
        });

        // ---- Central panel: figure ----
        egui::CentralPanel::default().show(ctx, |ui| {
            plot::figure_view(ui, &mut self.state);
        });
    }
}
