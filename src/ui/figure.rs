use std::ops::Range;
use std::path::Path;

use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use plotters::style::FontTransform;
use thiserror::Error;

use crate::color::ColorScale;
use crate::config::PANEL_COUNT;
use crate::data::model::{CoreMean, StageTable};

// ---------------------------------------------------------------------------
// Layout constants (pixels unless noted)
// ---------------------------------------------------------------------------

pub const ROWS: usize = 3;
pub const COLS: usize = 2;

/// Horizontal display limit, degrees latitude.
pub const X_LIMIT: Range<f64> = -60.0..80.0;
/// Labelled x ticks.
pub const X_TICKS: [f64; 6] = [-40.0, -20.0, 0.0, 20.0, 40.0, 60.0];
/// Labelled y ticks, metres.
pub const Y_TICKS: [f64; 6] = [0.0, 1000.0, 2000.0, 3000.0, 4000.0, 5000.0];
/// Smallest depth the y axis reaches.
const MIN_DEPTH_LIMIT: f64 = 5500.0;

const OUTER_LABEL_STRIP: u32 = 40;
const COLORBAR_STRIP: u32 = 120;
const COLORBAR_LABEL_STRIP: u32 = 30;
const X_AXIS_AREA: u32 = 30;
const Y_AXIS_AREA: u32 = 50;
const PANEL_MARGIN: u32 = 4;
/// Stage label offset from the panel's top-left corner.
const INSET: (i32, i32) = (14, 7);
const POINT_RADIUS: i32 = 5;

const COLORBAR_LABEL: &str = "δ¹³C ‰";

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("drawing figure: {0}")]
    Draw(String),

    #[error("figure buffer does not match {width}x{height}")]
    Buffer { width: u32, height: u32 },

    #[error("writing figure")]
    Encode(#[from] image::ImageError),
}

impl<E: std::error::Error + Send + Sync> From<DrawingAreaErrorKind<E>> for RenderError {
    fn from(e: DrawingAreaErrorKind<E>) -> Self {
        RenderError::Draw(e.to_string())
    }
}

// ---------------------------------------------------------------------------
// Figure – a rendered RGB raster
// ---------------------------------------------------------------------------

/// Packed 8-bit RGB pixels, row-major.
#[derive(Clone)]
pub struct Figure {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl std::fmt::Debug for Figure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Figure({}x{})", self.width, self.height)
    }
}

impl Figure {
    pub fn save_png(&self, path: &Path) -> Result<(), RenderError> {
        if self.pixels.len() != buffer_len(self.width, self.height) {
            return Err(RenderError::Buffer {
                width: self.width,
                height: self.height,
            });
        }
        image::save_buffer(
            path,
            &self.pixels,
            self.width,
            self.height,
            image::ColorType::Rgb8,
        )?;
        log::info!("Wrote figure to {}", path.display());
        Ok(())
    }
}

/// Bytes in an RGB buffer of the given size.
pub fn buffer_len(width: u32, height: u32) -> usize {
    width as usize * height as usize * 3
}

/// What to draw in the grid.
#[derive(Debug, Clone, Copy)]
pub struct FigureSpec<'a> {
    pub table: &'a StageTable,
    /// Stage labels in panel order, row-major.
    pub order: &'a [String],
    pub scale: ColorScale,
}

/// Render the stage grid into an in-memory RGB buffer.
pub fn render_figure(spec: &FigureSpec<'_>, size: (u32, u32)) -> Result<Figure, RenderError> {
    let (width, height) = size;
    let mut pixels = vec![0u8; buffer_len(width, height)];
    {
        let root = BitMapBackend::with_buffer(&mut pixels, size).into_drawing_area();
        draw_figure(&root, spec)?;
        root.present()?;
    }
    Ok(Figure {
        width,
        height,
        pixels,
    })
}

// ---------------------------------------------------------------------------
// Panel geometry
// ---------------------------------------------------------------------------

/// Which axes a panel labels. Inner edges stay bare; the outer right and top
/// edges carry mirrored axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PanelAxes {
    pub row: usize,
    pub col: usize,
    pub bottom: bool,
    pub left: bool,
    pub top: bool,
    pub right: bool,
}

impl PanelAxes {
    pub fn for_index(index: usize) -> Self {
        let row = index / COLS;
        let col = index % COLS;
        Self {
            row,
            col,
            bottom: row == ROWS - 1,
            left: col == 0,
            top: row == 0,
            right: col == COLS - 1,
        }
    }

    pub fn mirrored(&self) -> bool {
        self.top || self.right
    }
}

/// Deepest point of the y axis: at least [`MIN_DEPTH_LIMIT`], extended to the
/// next 500 m past the deepest core.
pub fn depth_limit(table: &StageTable) -> f64 {
    let deepest = table
        .rows()
        .iter()
        .map(|r| r.depth)
        .filter(|d| d.is_finite())
        .fold(0.0, f64::max);
    MIN_DEPTH_LIMIT.max(((deepest + 250.0) / 500.0).ceil() * 500.0)
}

/// Label for a candidate tick; blank unless it is one of `ticks`.
pub fn tick_label(value: f64, ticks: &[f64]) -> String {
    match ticks.iter().find(|t| (**t - value).abs() < 1e-6) {
        Some(t) => format!("{t:.0}"),
        None => String::new(),
    }
}

/// Scatter points for one panel: (latitude, -depth, d13C). Depth is negated
/// so the y axis grows downward. Rows with non-finite coordinates are skipped.
pub fn panel_points(rows: &[CoreMean]) -> Vec<(f64, f64, f64)> {
    rows.iter()
        .filter(|r| r.latitude.is_finite() && r.depth.is_finite())
        .map(|r| (r.latitude, -r.depth, r.d13c))
        .collect()
}

// ---------------------------------------------------------------------------
// Drawing
// ---------------------------------------------------------------------------

fn draw_figure<DB>(root: &DrawingArea<DB, Shift>, spec: &FigureSpec<'_>) -> Result<(), RenderError>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    root.fill(&WHITE)?;
    let (width, height) = root.dim_in_pixel();

    let (y_label_strip, rest) = root.split_horizontally(OUTER_LABEL_STRIP);
    let (main, x_label_strip) = rest.split_vertically(height.saturating_sub(OUTER_LABEL_STRIP));
    let main_width = width.saturating_sub(OUTER_LABEL_STRIP);
    let (grid, colorbar) = main.split_horizontally(main_width.saturating_sub(COLORBAR_STRIP));

    let depth_max = depth_limit(spec.table);
    for (index, area) in split_grid(&grid).iter().enumerate() {
        let Some(label) = spec.order.get(index) else {
            continue;
        };
        let rows = spec.table.stage(label);
        if rows.is_empty() {
            log::warn!("{label}: no cores to plot");
        }
        draw_panel(area, PanelAxes::for_index(index), label, rows, spec.scale, depth_max)?;
    }

    draw_colorbar(&colorbar, spec.scale)?;

    // Shared axis labels, centred on the grid.
    let (grid_width, grid_height) = grid.dim_in_pixel();
    let centered = Pos::new(HPos::Center, VPos::Center);
    let label_font = ("sans-serif", 18).into_font();
    x_label_strip.draw_text(
        "Latitude",
        &TextStyle::from(label_font.clone()).pos(centered),
        ((grid_width / 2) as i32, (OUTER_LABEL_STRIP / 2) as i32),
    )?;
    y_label_strip.draw_text(
        "Depth (m)",
        &TextStyle::from(label_font.transform(FontTransform::Rotate270)).pos(centered),
        ((OUTER_LABEL_STRIP / 2) as i32, (grid_height / 2) as i32),
    )?;
    Ok(())
}

/// Split the grid so every plotting area has the same size: only the outer
/// rows and columns reserve room for tick labels.
fn split_grid<DB: DrawingBackend>(grid: &DrawingArea<DB, Shift>) -> Vec<DrawingArea<DB, Shift>> {
    let (width, height) = grid.dim_in_pixel();
    let plot_height = height.saturating_sub(2 * X_AXIS_AREA) / ROWS as u32;
    let (top, rest) = grid.split_vertically(plot_height + X_AXIS_AREA);
    let (middle, bottom) = rest.split_vertically(plot_height);
    let mut areas = Vec::with_capacity(PANEL_COUNT);
    for row in [top, middle, bottom] {
        let (left, right) = row.split_horizontally(width / COLS as u32);
        areas.push(left);
        areas.push(right);
    }
    areas
}

fn draw_panel<DB>(
    area: &DrawingArea<DB, Shift>,
    axes: PanelAxes,
    label: &str,
    rows: &[CoreMean],
    scale: ColorScale,
    depth_max: f64,
) -> Result<(), RenderError>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let size = |on: bool, px: u32| if on { px } else { 0 };
    let y_range = -depth_max..0.0;

    let mut chart = ChartBuilder::on(area)
        .margin(PANEL_MARGIN)
        .x_label_area_size(size(axes.bottom, X_AXIS_AREA))
        .top_x_label_area_size(size(axes.top, X_AXIS_AREA))
        .y_label_area_size(size(axes.left, Y_AXIS_AREA))
        .right_y_label_area_size(size(axes.right, Y_AXIS_AREA))
        .build_cartesian_2d(X_LIMIT, y_range.clone())?;

    let x_fmt = |v: &f64| tick_label(*v, &X_TICKS);
    let y_fmt = |v: &f64| tick_label(-*v, &Y_TICKS);

    chart
        .configure_mesh()
        .disable_mesh()
        .x_labels(8)
        .y_labels(12)
        .x_label_formatter(&x_fmt)
        .y_label_formatter(&y_fmt)
        .label_style(("sans-serif", 12))
        .draw()?;

    chart.plotting_area().draw(&Rectangle::new(
        [(X_LIMIT.start, -depth_max), (X_LIMIT.end, 0.0)],
        BLACK.stroke_width(1),
    ))?;

    chart.draw_series(panel_points(rows).into_iter().map(|(x, y, c)| {
        EmptyElement::at((x, y))
            + Circle::new((0, 0), POINT_RADIUS, scale.color_for(c).filled())
            + Circle::new((0, 0), POINT_RADIUS, BLACK.stroke_width(1))
    }))?;

    chart.plotting_area().strip_coord_spec().draw_text(
        label,
        &TextStyle::from(("serif", 16).into_font()).pos(Pos::new(HPos::Left, VPos::Top)),
        INSET,
    )?;

    if axes.mirrored() {
        let mut dual = chart.set_secondary_coord(X_LIMIT, y_range);
        dual.configure_secondary_axes()
            .x_labels(8)
            .y_labels(12)
            .x_label_formatter(&x_fmt)
            .y_label_formatter(&y_fmt)
            .label_style(("sans-serif", 12))
            .draw()?;
    }
    Ok(())
}

fn draw_colorbar<DB>(area: &DrawingArea<DB, Shift>, scale: ColorScale) -> Result<(), RenderError>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let (width, height) = area.dim_in_pixel();
    let (bar_area, label_strip) = area.split_horizontally(width.saturating_sub(COLORBAR_LABEL_STRIP));
    let norm = scale.norm;
    let value_range = norm.min..norm.max;

    let mut bar = ChartBuilder::on(&bar_area)
        .margin_top(height / 8)
        .margin_bottom(height / 8)
        .margin_left(20)
        .right_y_label_area_size(40)
        .build_cartesian_2d(0.0..1.0, value_range.clone())?;

    let stops = scale.stops(256);
    bar.draw_series(stops.windows(2).map(|w| {
        let (v0, color) = w[0];
        let (v1, _) = w[1];
        Rectangle::new([(0.0, v0), (1.0, v1)], color.filled())
    }))?;
    bar.draw_series(std::iter::once(Rectangle::new(
        [(0.0, norm.min), (1.0, norm.max)],
        BLACK.stroke_width(1),
    )))?;

    let mut dual = bar.set_secondary_coord(0.0..1.0, value_range);
    dual.configure_secondary_axes()
        .y_labels(5)
        .y_label_formatter(&|v: &f64| format!("{v:.1}"))
        .label_style(("sans-serif", 12))
        .draw()?;

    let (_, strip_height) = label_strip.dim_in_pixel();
    label_strip.draw_text(
        COLORBAR_LABEL,
        &TextStyle::from(("sans-serif", 18).into_font().transform(FontTransform::Rotate90))
            .pos(Pos::new(HPos::Center, VPos::Center)),
        ((COLORBAR_LABEL_STRIP / 2) as i32, (strip_height / 2) as i32),
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::TwoSlopeNorm;
    use crate::config::AppConfig;

    fn mean(stage: &str, core: &str, depth: f64) -> CoreMean {
        CoreMean {
            stage: stage.into(),
            core: core.into(),
            latitude: 10.0,
            longitude: -20.0,
            depth,
            d13c: 0.5,
        }
    }

    #[test]
    fn only_outer_edges_carry_axes() {
        let top_left = PanelAxes::for_index(0);
        assert!(top_left.top && top_left.left && !top_left.right && !top_left.bottom);

        let middle_right = PanelAxes::for_index(3);
        assert_eq!((middle_right.row, middle_right.col), (1, 1));
        assert!(middle_right.right && !middle_right.top && middle_right.mirrored());

        let middle_left = PanelAxes::for_index(2);
        assert!(!middle_left.mirrored());

        let bottom_left = PanelAxes::for_index(4);
        assert!(bottom_left.bottom && bottom_left.left && !bottom_left.mirrored());
    }

    #[test]
    fn tick_labels_only_at_listed_ticks() {
        assert_eq!(tick_label(-40.0, &X_TICKS), "-40");
        assert_eq!(tick_label(-60.0, &X_TICKS), "");
        assert_eq!(tick_label(80.0, &X_TICKS), "");
        assert_eq!(tick_label(5000.0, &Y_TICKS), "5000");
        assert_eq!(tick_label(6000.0, &Y_TICKS), "");
    }

    #[test]
    fn depth_limit_covers_deepest_core() {
        assert_eq!(depth_limit(&StageTable::default()), 5500.0);
        let deep = StageTable::from_rows(vec![mean("MIS1", "A", 5600.0)]);
        assert_eq!(depth_limit(&deep), 6000.0);
    }

    #[test]
    fn empty_stage_yields_no_points() {
        let table = StageTable::from_rows(vec![mean("MIS1", "A", 3000.0)]);
        assert!(panel_points(table.stage("MIS6")).is_empty());
        assert_eq!(panel_points(table.stage("MIS1")), vec![(10.0, -3000.0, 0.5)]);
    }

    #[test]
    fn non_finite_rows_are_not_plotted() {
        let rows = vec![mean("MIS1", "A", f64::NAN), mean("MIS1", "B", 100.0)];
        assert_eq!(panel_points(&rows).len(), 1);
    }

    fn default_scale() -> ColorScale {
        ColorScale::new(TwoSlopeNorm::new(0.3, -0.5, 1.5))
    }

    #[test]
    fn empty_table_renders_full_buffer() {
        let table = StageTable::default();
        let order = AppConfig::default().display_order;
        let spec = FigureSpec {
            table: &table,
            order: &order,
            scale: default_scale(),
        };
        let figure = render_figure(&spec, (1000, 1200)).unwrap();
        assert_eq!((figure.width, figure.height), (1000, 1200));
        assert_eq!(figure.pixels.len(), buffer_len(1000, 1200));
    }

    #[test]
    fn populated_table_renders_and_saves() {
        let table = StageTable::from_rows(vec![
            mean("MIS1", "A", 3000.0),
            mean("MIS1", "B", 4200.0),
            mean("MIS5e", "C", 5800.0),
        ]);
        let order = AppConfig::default().display_order;
        let spec = FigureSpec {
            table: &table,
            order: &order,
            scale: default_scale(),
        };
        let figure = render_figure(&spec, (600, 720)).unwrap();
        assert_eq!(figure.pixels.len(), 600 * 720 * 3);
        assert!(figure.pixels.iter().any(|&p| p != 255));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("figure.png");
        figure.save_png(&path).unwrap();
        assert!(path.metadata().unwrap().len() > 0);
    }

    #[test]
    fn buffer_len_does_not_wrap() {
        assert_eq!(buffer_len(70_000, 70_000), 70_000usize * 70_000 * 3);
    }
}
