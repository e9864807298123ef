use eframe::egui::{self, Color32, RichText, Ui};

use crate::state::ViewerState;

// ---------------------------------------------------------------------------
// Top bar
// ---------------------------------------------------------------------------

/// Render the top menu / toolbar.
pub fn top_bar(ui: &mut Ui, state: &mut ViewerState) {
    egui::menu::bar(ui, |ui: &mut Ui| {
        ui.menu_button("File", |ui: &mut Ui| {
            if ui.button("Save figure…").clicked() {
                save_file_dialog(state);
                ui.close_menu();
            }
        });

        ui.separator();
        ui.label(state.summary.as_str());

        if let Some(msg) = &state.status_message {
            ui.separator();
            let color = if msg.starts_with("Error") {
                Color32::RED
            } else {
                Color32::GRAY
            };
            ui.label(RichText::new(msg).color(color));
        }
    });
}

// ---------------------------------------------------------------------------
// File dialog
// ---------------------------------------------------------------------------

pub fn save_file_dialog(state: &mut ViewerState) {
    let file = rfd::FileDialog::new()
        .set_title("Save figure")
        .add_filter("PNG image", &["png"])
        .set_file_name("atlantic_d13c.png")
        .save_file();

    if let Some(path) = file {
        state.save_figure(&path);
    }
}
