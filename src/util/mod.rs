mod stats;

pub use stats::Stats;

/// Linear color, channels nominally in 0-1.
pub type Rgba = rgb::RGBA<f32>;
