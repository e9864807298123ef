use palette::{Mix, Srgb};
use plotters::style::RGBColor;

// ---------------------------------------------------------------------------
// Two-slope normalisation
// ---------------------------------------------------------------------------

/// Maps data values onto `[0, 1]` with `center` landing on 0.5; each side of
/// the center is scaled linearly on its own. Values outside `[min, max]` clip.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TwoSlopeNorm {
    pub center: f64,
    pub min: f64,
    pub max: f64,
}

impl TwoSlopeNorm {
    pub fn new(center: f64, min: f64, max: f64) -> Self {
        Self { center, min, max }
    }

    pub fn normalize(&self, value: f64) -> f64 {
        let t = if value < self.center {
            0.5 * (value - self.min) / (self.center - self.min)
        } else {
            0.5 + 0.5 * (value - self.center) / (self.max - self.center)
        };
        t.clamp(0.0, 1.0)
    }

    /// Inverse of [`normalize`](Self::normalize) on `[0, 1]`.
    pub fn value_at(&self, t: f64) -> f64 {
        if t < 0.5 {
            self.min + (self.center - self.min) * t * 2.0
        } else {
            self.center + (self.max - self.center) * (t - 0.5) * 2.0
        }
    }
}

// ---------------------------------------------------------------------------
// Diverging palette
// ---------------------------------------------------------------------------

/// Anchor colours of the red/blue "seismic" ramp, evenly spaced on `[0, 1]`.
const SEISMIC: [(f32, f32, f32); 5] = [
    (0.0, 0.0, 0.3),
    (0.0, 0.0, 1.0),
    (1.0, 1.0, 1.0),
    (1.0, 0.0, 0.0),
    (0.5, 0.0, 0.0),
];

/// Colour at position `t` of the diverging ramp: blue below the middle,
/// white at 0.5, red above.
pub fn seismic(t: f64) -> Srgb {
    let t = t.clamp(0.0, 1.0) as f32;
    let segments = (SEISMIC.len() - 1) as f32;
    let pos = t * segments;
    let idx = (pos.floor() as usize).min(SEISMIC.len() - 2);
    let (r0, g0, b0) = SEISMIC[idx];
    let (r1, g1, b1) = SEISMIC[idx + 1];
    Srgb::new(r0, g0, b0).mix(Srgb::new(r1, g1, b1), pos - idx as f32)
}

/// Convert to a plotters colour.
/// Channels round to nearest, so 0.3 maps to 77.
pub fn to_rgb(color: Srgb) -> RGBColor {
    let channel = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
    RGBColor(channel(color.red), channel(color.green), channel(color.blue))
}

// ---------------------------------------------------------------------------
// ColorScale: d13C value → colour
// ---------------------------------------------------------------------------

/// Diverging colour scale shared by every panel and the colorbar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorScale {
    pub norm: TwoSlopeNorm,
}

impl ColorScale {
    pub fn new(norm: TwoSlopeNorm) -> Self {
        Self { norm }
    }

    /// Look up the colour for a d13C value.
    pub fn color_for(&self, value: f64) -> RGBColor {
        to_rgb(seismic(self.norm.normalize(value)))
    }

    /// `n` evenly spaced (value, colour) stops from min to max, for the colorbar.
    pub fn stops(&self, n: usize) -> Vec<(f64, RGBColor)> {
        if n < 2 {
            return vec![(self.norm.center, self.color_for(self.norm.center))];
        }
        (0..n)
            .map(|i| {
                let t = i as f64 / (n - 1) as f64;
                let v = self.norm.value_at(t);
                (v, to_rgb(seismic(t)))
            })
            .collect()
    }
}
