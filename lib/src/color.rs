use image::{Rgb, RgbImage};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

/// Color of triangles that do not cover any pixel.
pub const EMPTY_FILL: Rgb<u8> = Rgb([0, 0, 0]);

/// Per-channel statistic used to flatten the pixels of a triangle into one color.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregate {
    Mean,
    #[default]
    Median,
}

impl Aggregate {
    /// Reduces `values` to a single channel value. `values` may be reordered.
    pub fn reduce(&self, values: &mut [u8]) -> u8 {
        if values.is_empty() {
            return 0;
        }

        match self {
            Aggregate::Mean => {
                let sum = values.iter().map(|v| *v as u64).sum::<u64>();
                (sum as f64 / values.len() as f64).round() as u8
            }
            Aggregate::Median => {
                let mid = values.len() / 2;
                let odd = values.len() % 2 == 1;
                let (lower, upper, _) = values.select_nth_unstable(mid);
                let upper = *upper;

                if odd {
                    upper
                } else {
                    let lower = lower.iter().copied().max().unwrap_or(upper);
                    ((lower as u16 + upper as u16 + 1) / 2) as u8
                }
            }
        }
    }
}

/// Flat color for each of `triangle_count` triangles.
///
/// `locate` maps a pixel to the triangle containing it. Pixels it places outside the mesh, or
/// at an index beyond `triangle_count`, do not contribute to any triangle. Triangles without
/// pixels are filled with [`EMPTY_FILL`].
pub fn aggregate_triangle_colors<F>(
    img: &RgbImage,
    triangle_count: usize,
    locate: F,
    aggregate: Aggregate,
) -> Vec<Rgb<u8>>
where
    F: Fn(u32, u32) -> Option<usize>,
{
    let mut groups: Vec<Vec<Rgb<u8>>> = vec![Vec::new(); triangle_count];
    let mut outside = 0usize;

    for (x, y, pixel) in img.enumerate_pixels() {
        match locate(x, y) {
            Some(triangle) if triangle < triangle_count => groups[triangle].push(*pixel),
            Some(triangle) => {
                warn!("Pixel ({}, {}) located in unknown triangle {}", x, y, triangle);
                outside += 1;
            }
            None => outside += 1,
        }
    }

    debug!(
        "Aggregating {} triangles, {} pixels outside the mesh",
        triangle_count, outside
    );

    let mut channel = Vec::new();

    groups
        .iter()
        .map(|pixels| {
            if pixels.is_empty() {
                return EMPTY_FILL;
            }

            let mut color = [0u8; 3];

            for (c, value) in color.iter_mut().enumerate() {
                channel.clear();
                channel.extend(pixels.iter().map(|p| p[c]));
                *value = aggregate.reduce(&mut channel);
            }

            Rgb(color)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient() -> RgbImage {
        RgbImage::from_fn(6, 5, |x, y| Rgb([(x * 10) as u8, (y * 20) as u8, ((x * y) % 7) as u8]))
    }

    #[test]
    fn mean_and_median_of_values() {
        assert_eq!(Aggregate::Mean.reduce(&mut [1, 2, 3, 10]), 4);
        assert_eq!(Aggregate::Median.reduce(&mut [9, 1, 5]), 5);
        assert_eq!(Aggregate::Median.reduce(&mut [10, 1, 3, 4]), 4);
        assert_eq!(Aggregate::Median.reduce(&mut [200, 100]), 150);
        assert_eq!(Aggregate::Mean.reduce(&mut []), 0);
    }

    #[test]
    fn single_triangle_mean_is_image_mean() {
        let img = gradient();
        let colors = aggregate_triangle_colors(&img, 1, |_, _| Some(0), Aggregate::Mean);

        let n = (img.width() * img.height()) as f64;
        let expected = (0..3)
            .map(|c| {
                let sum = img.pixels().map(|p| p[c] as f64).sum::<f64>();
                (sum / n).round() as u8
            })
            .collect::<Vec<_>>();

        assert_eq!(colors.len(), 1);
        assert_eq!(colors[0].0.to_vec(), expected);
    }

    #[test]
    fn single_triangle_median_is_channel_median() {
        let img = RgbImage::from_fn(3, 3, |x, y| {
            let v = (y * 3 + x) as u8;
            Rgb([v * 10, 80 - v * 10, if v < 7 { 5 } else { 250 }])
        });
        let colors = aggregate_triangle_colors(&img, 1, |_, _| Some(0), Aggregate::Median);

        assert_eq!(colors, vec![Rgb([40, 40, 5])]);
    }

    #[test]
    fn every_triangle_gets_a_color() {
        let img = gradient();
        let colors =
            aggregate_triangle_colors(&img, 5, |x, _| Some(if x < 3 { 0 } else { 2 }), Aggregate::Mean);

        assert_eq!(colors.len(), 5);
        assert_eq!(colors[1], EMPTY_FILL);
        assert_eq!(colors[3], EMPTY_FILL);
        assert_eq!(colors[4], EMPTY_FILL);
        assert_ne!(colors[0], colors[2]);
    }

    #[test]
    fn outside_pixels_are_excluded() {
        let img = RgbImage::from_fn(4, 4, |x, _| {
            if x < 2 {
                Rgb([100, 100, 100])
            } else {
                Rgb([250, 0, 0])
            }
        });

        let colors = aggregate_triangle_colors(
            &img,
            2,
            |x, _| if x < 2 { Some(1) } else { None },
            Aggregate::Mean,
        );

        assert_eq!(colors, vec![EMPTY_FILL, Rgb([100, 100, 100])]);
    }

    #[test]
    fn unknown_triangles_are_ignored() {
        let img = RgbImage::from_pixel(2, 2, Rgb([7, 7, 7]));
        let colors = aggregate_triangle_colors(&img, 1, |_, _| Some(3), Aggregate::Median);

        assert_eq!(colors, vec![EMPTY_FILL]);
    }
}
