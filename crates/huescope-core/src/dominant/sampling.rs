//! Pixel sampling for palette extraction.

use std::collections::HashMap;

use glam::Vec3;

use crate::color_management::lab::rgb_to_lab_vec;
use crate::image::SourceImage;

/// A color sample with its LAB coordinates precomputed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub rgb: [f32; 3],
    pub lab: Vec3,
}

impl Sample {
    pub fn new(rgb: [f32; 3]) -> Self {
        Self {
            rgb,
            lab: rgb_to_lab_vec(rgb),
        }
    }
}

/// A downsampled RGBA plane.
#[derive(Debug, Clone)]
pub struct Plane {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<[f32; 4]>,
}

/// Box-average `image` by `factor` per axis.
///
/// Images that already have no more than `skip_below` pixels are returned
/// as-is; shrinking them would only blur the few colors they have.
pub fn downsample(image: &SourceImage, factor: u32, skip_below: usize) -> Plane {
    let (w, h) = (image.width(), image.height());
    if factor <= 1 || image.pixel_count() <= skip_below {
        return Plane {
            width: w,
            height: h,
            pixels: image.pixels().to_vec(),
        };
    }

    let out_w = w.div_ceil(factor);
    let out_h = h.div_ceil(factor);
    let mut pixels = Vec::with_capacity(out_w as usize * out_h as usize);
    for oy in 0..out_h {
        for ox in 0..out_w {
            let x0 = ox * factor;
            let y0 = oy * factor;
            let x1 = (x0 + factor).min(w);
            let y1 = (y0 + factor).min(h);

            let mut sum = [0.0f64; 4];
            let mut n = 0u32;
            for y in y0..y1 {
                for x in x0..x1 {
                    if let Some(px) = image.pixel(x, y) {
                        for c in 0..4 {
                            sum[c] += px[c] as f64;
                        }
                        n += 1;
                    }
                }
            }
            let n = n.max(1) as f64;
            pixels.push(sum.map(|s| (s / n) as f32));
        }
    }

    Plane {
        width: out_w,
        height: out_h,
        pixels,
    }
}

/// Take every `ceil(len / max_samples)`-th visible pixel of `plane`.
///
/// Fully transparent pixels carry no color and are skipped.
pub fn stride_sample(plane: &Plane, max_samples: usize) -> Vec<Sample> {
    let step = plane.pixels.len().div_ceil(max_samples.max(1)).max(1);
    plane
        .pixels
        .iter()
        .step_by(step)
        .filter(|px| px[3] > 0.0)
        .map(|px| Sample::new([px[0], px[1], px[2]]))
        .collect()
}

/// Sample a fixed 3×3 grid of cell centers from the full-resolution image,
/// row-major.
pub fn grid_sample(image: &SourceImage) -> Vec<Sample> {
    let (w, h) = (image.width() as u64, image.height() as u64);
    let mut out = Vec::with_capacity(9);
    for j in 0..3u64 {
        for i in 0..3u64 {
            let x = ((2 * i + 1) * w / 6) as u32;
            let y = ((2 * j + 1) * h / 6) as u32;
            if let Some(px) = image.pixel(x, y) {
                out.push(Sample::new([px[0], px[1], px[2]]));
            }
        }
    }
    out
}

/// Collapse identical samples, keeping first-seen order and a count each.
pub fn distinct(samples: &[Sample]) -> Vec<(Sample, u32)> {
    let mut index: HashMap<[u32; 3], usize> = HashMap::new();
    let mut out: Vec<(Sample, u32)> = Vec::new();
    for s in samples {
        let key = s.rgb.map(f32::to_bits);
        match index.get(&key) {
            Some(&i) => out[i].1 += 1,
            None => {
                index.insert(key, out.len());
                out.push((*s, 1));
            }
        }
    }
    out
}
