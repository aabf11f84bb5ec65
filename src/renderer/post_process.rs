use itertools::iproduct;

use crate::{
    geometry::{EPSILON, ScreenPoint},
    render_target::{FrameBuffer, RenderTarget as _},
    util::Rgba,
};

/// Color variance over a 3x3 neighbourhood above which a pixel counts as an edge.
pub const EDGE_THRESHOLD: f32 = 5.0;

const GAMMA: f32 = 2.2;

/// Spatial and color standard deviations of the edge preserving blur.
const BLUR_SIGMA_SPACE: f32 = 15.0;
const BLUR_SIGMA_COLOR: f32 = 15.0 / 255.0;

/// 1-2-1 kernel, normalized
const KERNEL: [[f32; 3]; 3] = [
    [1.0 / 16.0, 2.0 / 16.0, 1.0 / 16.0],
    [2.0 / 16.0, 4.0 / 16.0, 2.0 / 16.0],
    [1.0 / 16.0, 2.0 / 16.0, 1.0 / 16.0],
];

/// Image filter run on a finished frame.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PostProcess {
    /// Smooths only pixels on color edges
    Antialias,
    GammaCorrection,
    /// Bilateral filter, smooths flat regions and keeps hard edges
    Blur,
}

impl PostProcess {
    #[tracing::instrument(skip(buffer))]
    pub fn apply(&self, buffer: &mut FrameBuffer) {
        match self {
            PostProcess::Antialias => antialias(buffer),
            PostProcess::GammaCorrection => gamma_correction(buffer),
            PostProcess::Blur => bilateral_blur(buffer),
        }
    }
}

fn antialias(buffer: &mut FrameBuffer) {
    smooth_edges(buffer, |source, point| {
        let center = source.at(point.x, point.y);
        let variance: f32 = neighbourhood(point)
            .map(|(x, y)| {
                let c = source.at(x, y);
                (c.r - center.r).powi(2) + (c.g - center.g).powi(2) + (c.b - center.b).powi(2)
            })
            .sum();
        variance > EDGE_THRESHOLD
    });
}

fn gamma_correction(buffer: &mut FrameBuffer) {
    let size = buffer.size();
    let correct = |x: f32| {
        let x = if x < EPSILON as f32 {
            EPSILON as f32
        } else if x > 1.0 {
            1.0 - EPSILON as f32
        } else {
            x
        };
        x.powf(1.0 / GAMMA)
    };
    for (y, x) in iproduct!(0..size.y, 0..size.x) {
        let pixel = buffer.get_mut(ScreenPoint::new(x, y));
        *pixel = Rgba::new(correct(pixel.r), correct(pixel.g), correct(pixel.b), pixel.a);
    }
}

/// Replaces every interior pixel selected by `filter` with the kernel average
/// of its neighbourhood in the unmodified image.
fn smooth_edges(buffer: &mut FrameBuffer, filter: impl Fn(&Snapshot, ScreenPoint) -> bool) {
    let size = buffer.size();
    if size.x < 3 || size.y < 3 {
        return;
    }

    let source = Snapshot {
        width: size.x,
        pixels: buffer.to_pixels(),
    };

    let mut changed = 0usize;
    for (y, x) in iproduct!(1..size.y - 1, 1..size.x - 1) {
        let point = ScreenPoint::new(x, y);
        if !filter(&source, point) {
            continue;
        }

        let mut sum = Rgba::new(0.0, 0.0, 0.0, 0.0);
        for (nx, ny) in neighbourhood(point) {
            let weight = KERNEL[(ny + 1 - y) as usize][(nx + 1 - x) as usize];
            sum += source.at(nx, ny) * weight;
        }
        *buffer.get_mut(point) = sum;
        changed += 1;
    }

    tracing::debug!(changed, "filtered pixels");
}

/// Replaces every pixel with the average of a circular window around it, each neighbour
/// weighted by both its distance and its color difference to the center pixel.
/// Neighbours outside the image are left out. Alpha is kept.
fn bilateral_blur(buffer: &mut FrameBuffer) {
    let size = buffer.size();
    let source = Snapshot {
        width: size.x,
        pixels: buffer.to_pixels(),
    };

    // Same radius as OpenCV derives from the spatial sigma
    let radius = (BLUR_SIGMA_SPACE * 1.5).round_ties_even().max(1.0) as i64;
    let space_coefficient = -0.5 / (BLUR_SIGMA_SPACE * BLUR_SIGMA_SPACE);
    let color_coefficient = -0.5 / (BLUR_SIGMA_COLOR * BLUR_SIGMA_COLOR);

    let window: Vec<(i64, i64, f32)> = iproduct!(-radius..=radius, -radius..=radius)
        .filter(|(dy, dx)| dx * dx + dy * dy <= radius * radius)
        .map(|(dy, dx)| (dx, dy, ((dx * dx + dy * dy) as f32 * space_coefficient).exp()))
        .collect();

    for (y, x) in iproduct!(0..size.y, 0..size.x) {
        let center = source.at(x, y);
        let mut sum = [0.0f32; 3];
        let mut total_weight = 0.0f32;

        for &(dx, dy, space_weight) in &window {
            let (nx, ny) = (i64::from(x) + dx, i64::from(y) + dy);
            if nx < 0 || ny < 0 || nx >= i64::from(size.x) || ny >= i64::from(size.y) {
                continue;
            }

            let c = source.at(nx as u32, ny as u32);
            let distance = (c.r - center.r).abs() + (c.g - center.g).abs() + (c.b - center.b).abs();
            let weight = space_weight * (distance * distance * color_coefficient).exp();

            sum[0] += c.r * weight;
            sum[1] += c.g * weight;
            sum[2] += c.b * weight;
            total_weight += weight;
        }

        // The center pixel alone contributes weight 1
        let [r, g, b] = sum.map(|channel| channel / total_weight);
        *buffer.get_mut(ScreenPoint::new(x, y)) = Rgba::new(r, g, b, center.a);
    }

    tracing::debug!(radius, "bilateral blur done");
}

/// Coordinates of the 3x3 neighbourhood of an interior pixel.
fn neighbourhood(point: ScreenPoint) -> impl Iterator<Item = (u32, u32)> {
    iproduct!(point.y - 1..=point.y + 1, point.x - 1..=point.x + 1).map(|(y, x)| (x, y))
}

struct Snapshot {
    width: u32,
    pixels: Vec<Rgba>,
}

impl Snapshot {
    fn at(&self, x: u32, y: u32) -> Rgba {
        self.pixels[(y * self.width + x) as usize]
    }
}
