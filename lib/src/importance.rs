use anyhow::{ensure, Result};
use image::{imageops, GrayImage, Rgb, RgbImage};
use log::debug;
use serde::{Deserialize, Serialize};

/// Per-pixel sampling weight. Higher values attract more samples.
#[derive(Clone, Debug)]
pub struct ImportanceSurface {
    width: u32,
    height: u32,
    values: Vec<f32>,
}

/// Parameters for deriving an importance surface from an image.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportanceOptions {
    /// Standard deviation of the denoising blur, zero disables it.
    pub blur_sigma: f32,

    /// Half-width of the square window used for local entropy.
    pub entropy_radius: u32,

    pub entropy_weight: f32,

    pub edge_weight: f32,
}

impl Default for ImportanceOptions {
    fn default() -> Self {
        ImportanceOptions {
            blur_sigma: 2.0,
            entropy_radius: 20,
            entropy_weight: 0.3,
            edge_weight: 0.7,
        }
    }
}

impl ImportanceSurface {
    pub fn new(width: u32, height: u32, values: Vec<f32>) -> Result<Self> {
        ensure!(
            width > 0 && height > 0,
            "Invalid importance surface dimensions {}x{}",
            width,
            height
        );
        ensure!(
            values.len() == width as usize * height as usize,
            "Importance surface has {} values, expected {}x{}",
            values.len(),
            width,
            height
        );
        ensure!(
            values.iter().all(|v| v.is_finite() && *v >= 0.0),
            "Importance values must be finite and non-negative"
        );

        Ok(ImportanceSurface {
            width,
            height,
            values,
        })
    }

    pub fn from_fn<F>(width: u32, height: u32, f: F) -> Result<Self>
    where
        F: Fn(u32, u32) -> f32,
    {
        let values = (0..height)
            .flat_map(|y| (0..width).map(move |x| (x, y)))
            .map(|(x, y)| f(x, y))
            .collect();

        Self::new(width, height, values)
    }

    /// Builds a surface from local entropy and edge strength of `img`.
    ///
    /// The result is scaled to a mean of one. An image without any structure and weights of zero
    /// produce an all-zero surface.
    pub fn from_image(img: &RgbImage, options: &ImportanceOptions) -> Result<Self> {
        let (width, height) = img.dimensions();

        ensure!(
            options.blur_sigma.is_finite() && options.blur_sigma >= 0.0,
            "Blur sigma must be non-negative"
        );
        ensure!(
            options.entropy_weight >= 0.0 && options.edge_weight >= 0.0,
            "Importance weights must be non-negative"
        );

        let denoised = if options.blur_sigma > 0.0 {
            imageops::blur(img, options.blur_sigma)
        } else {
            img.clone()
        };
        let gray = imageops::grayscale(&denoised);

        let entropy = normalize_max(
            local_entropy(&gray, options.entropy_radius)
                .into_iter()
                .map(f32::exp2)
                .collect(),
        );
        let edges = normalize_max(chroma_edges(&denoised));

        let mut values = entropy
            .iter()
            .zip(edges.iter())
            .map(|(e, s)| options.entropy_weight * e + options.edge_weight * s)
            .collect::<Vec<_>>();

        let mean = values.iter().map(|v| *v as f64).sum::<f64>() / values.len() as f64;

        if mean > 0.0 {
            values.iter_mut().for_each(|v| *v = (*v as f64 / mean) as f32);
        }

        debug!("Computed importance surface {}x{}, mean {:.4}", width, height, mean);

        Self::new(width, height, values)
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn at(&self, x: u32, y: u32) -> f32 {
        self.values[(y * self.width + x) as usize]
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn max(&self) -> f32 {
        self.values.iter().copied().fold(0.0, f32::max)
    }

    /// True if no location is weighted above any other.
    pub fn is_flat(&self) -> bool {
        self.max() <= 0.0
    }
}

fn normalize_max(mut values: Vec<f32>) -> Vec<f32> {
    let max = values.iter().copied().fold(0.0, f32::max);

    if max > 0.0 {
        values.iter_mut().for_each(|v| *v /= max);
    }

    values
}

struct Histogram<'a> {
    counts: [u32; 256],
    total: u32,
    weighted: f64,
    c_log_c: &'a [f64],
}

impl<'a> Histogram<'a> {
    fn new(c_log_c: &'a [f64]) -> Self {
        Histogram {
            counts: [0; 256],
            total: 0,
            weighted: 0.0,
            c_log_c,
        }
    }

    fn add(&mut self, value: u8) {
        let count = &mut self.counts[value as usize];
        self.weighted += self.c_log_c[*count as usize + 1] - self.c_log_c[*count as usize];
        *count += 1;
        self.total += 1;
    }

    fn remove(&mut self, value: u8) {
        let count = &mut self.counts[value as usize];
        self.weighted -= self.c_log_c[*count as usize] - self.c_log_c[*count as usize - 1];
        *count -= 1;
        self.total -= 1;
    }

    /// Shannon entropy in bits.
    fn entropy(&self) -> f32 {
        if self.total == 0 {
            return 0.0;
        }

        let total = self.total as f64;
        (total.log2() - self.weighted / total).max(0.0) as f32
    }
}

/// Shannon entropy of the gray levels in a square window around each pixel.
///
/// The window is clipped at the image borders.
pub fn local_entropy(gray: &GrayImage, radius: u32) -> Vec<f32> {
    let (width, height) = gray.dimensions();
    let (w, h, r) = (width as i64, height as i64, radius as i64);
    let mut result = vec![0.0; width as usize * height as usize];

    let side = 2 * radius as usize + 1;
    let c_log_c = (0..=side * side)
        .map(|c| if c == 0 { 0.0 } else { c as f64 * (c as f64).log2() })
        .collect::<Vec<_>>();

    for y in 0..h {
        let rows = (y - r).max(0)..=(y + r).min(h - 1);
        let mut window = Histogram::new(&c_log_c);

        for x in 0..=r.min(w - 1) {
            for row in rows.clone() {
                window.add(gray.get_pixel(x as u32, row as u32)[0]);
            }
        }

        for x in 0..w {
            result[(y * w + x) as usize] = window.entropy();

            let leaving = x - r;
            if leaving >= 0 {
                for row in rows.clone() {
                    window.remove(gray.get_pixel(leaving as u32, row as u32)[0]);
                }
            }

            let entering = x + r + 1;
            if entering < w {
                for row in rows.clone() {
                    window.add(gray.get_pixel(entering as u32, row as u32)[0]);
                }
            }
        }
    }

    result
}

/// CIE L*a*b* coordinates of an sRGB color under the D65 white point.
pub fn srgb_to_lab(rgb: Rgb<u8>) -> [f32; 3] {
    let linear = |c: u8| {
        let c = c as f32 / 255.0;
        if c <= 0.04045 {
            c / 12.92
        } else {
            ((c + 0.055) / 1.055).powf(2.4)
        }
    };
    let [r, g, b] = rgb.0.map(linear);

    let x = (0.412_453 * r + 0.357_580 * g + 0.180_423 * b) / 0.950_456;
    let y = 0.212_671 * r + 0.715_160 * g + 0.072_169 * b;
    let z = (0.019_334 * r + 0.119_193 * g + 0.950_227 * b) / 1.088_754;

    let f = |t: f32| {
        if t > 0.008_856 {
            t.cbrt()
        } else {
            7.787 * t + 16.0 / 116.0
        }
    };
    let (fx, fy, fz) = (f(x), f(y), f(z));

    [116.0 * fy - 16.0, 500.0 * (fx - fy), 200.0 * (fy - fz)]
}

/// Edge strength of the color content, ignoring lightness.
///
/// Combines the Sobel magnitudes of the a* and b* channels.
pub fn chroma_edges(img: &RgbImage) -> Vec<f32> {
    let (width, height) = img.dimensions();
    let lab = img.pixels().map(|p| srgb_to_lab(*p)).collect::<Vec<_>>();
    let a = sobel_magnitude(width, height, &lab.iter().map(|c| c[1]).collect::<Vec<_>>());
    let b = sobel_magnitude(width, height, &lab.iter().map(|c| c[2]).collect::<Vec<_>>());

    a.iter().zip(b.iter()).map(|(a, b)| a.hypot(*b)).collect()
}

/// Gradient magnitude of the Sobel operator over a row-major channel, with clamped borders.
pub fn sobel_magnitude(width: u32, height: u32, channel: &[f32]) -> Vec<f32> {
    let (w, h) = (width as i64, height as i64);

    let at = |x: i64, y: i64| -> f32 {
        channel[(y.clamp(0, h - 1) * w + x.clamp(0, w - 1)) as usize]
    };

    (0..h)
        .flat_map(|y| (0..w).map(move |x| (x, y)))
        .map(|(x, y)| {
            let gx = at(x + 1, y - 1) + 2.0 * at(x + 1, y) + at(x + 1, y + 1)
                - at(x - 1, y - 1)
                - 2.0 * at(x - 1, y)
                - at(x - 1, y + 1);
            let gy = at(x - 1, y + 1) + 2.0 * at(x, y + 1) + at(x + 1, y + 1)
                - at(x - 1, y - 1)
                - 2.0 * at(x, y - 1)
                - at(x + 1, y - 1);

            (gx * gx + gy * gy).sqrt()
        })
        .collect()
}
