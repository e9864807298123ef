use eframe::egui::{self, ColorImage, TextureOptions, Ui};

use crate::state::ViewerState;

// ---------------------------------------------------------------------------
// Figure view (central panel)
// ---------------------------------------------------------------------------

/// Show the rendered figure, scaled down to fit the panel.
pub fn figure_view(ui: &mut Ui, state: &mut ViewerState) {
    let figure = &state.figure;
    let texture = state.texture.get_or_insert_with(|| {
        let image = ColorImage::from_rgb(
            [figure.width as usize, figure.height as usize],
            &figure.pixels,
        );
        ui.ctx()
            .load_texture("stage_figure", image, TextureOptions::LINEAR)
    });

    ui.centered_and_justified(|ui: &mut Ui| {
        ui.add(egui::Image::new(&*texture).shrink_to_fit());
    });
}
