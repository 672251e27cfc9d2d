pub mod boundary;
pub mod color;
pub mod grid;
pub mod importance;
pub mod point;
pub mod render;
pub mod sampler;
pub mod triangulation;

pub use color::Aggregate;
pub use grid::SpatialGrid;
pub use importance::{ImportanceOptions, ImportanceSurface};
pub use point::Point;
pub use sampler::{SamplerConfig, Strategy};
pub use triangulation::Triangulation;

use anyhow::{bail, Context, Result};
use image::{Rgb, RgbImage, RgbaImage};
use log::info;
use rand::Rng;
use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SamplingMode {
    Uniform,
    #[default]
    Weighted,
}

/// Parameters of a full stylization run, loadable from JSON.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Minimum distance between sampled points in pixels.
    pub min_dist: f64,

    /// Number of points to sample, defaults to one per grid cell.
    pub points: Option<usize>,

    pub mode: SamplingMode,

    pub aggregate: Aggregate,

    /// Add points along the image border so the mesh covers the whole image.
    pub boundary: bool,

    pub candidates_per_step: usize,

    pub edge_margin: Option<f64>,

    pub queue_capacity: usize,

    pub max_rounds: Option<usize>,

    pub importance: ImportanceOptions,
}

impl Default for Settings {
    fn default() -> Self {
        let sampler = SamplerConfig::default();

        Settings {
            min_dist: 18.0,
            points: None,
            mode: SamplingMode::default(),
            aggregate: Aggregate::default(),
            boundary: true,
            candidates_per_step: sampler.candidates_per_step,
            edge_margin: sampler.edge_margin,
            queue_capacity: sampler.queue_capacity,
            max_rounds: sampler.max_rounds,
            importance: ImportanceOptions::default(),
        }
    }
}

impl Settings {
    pub fn sampler_config(&self, grid: &SpatialGrid) -> SamplerConfig {
        SamplerConfig {
            target: self.points.unwrap_or_else(|| grid.cell_count()),
            candidates_per_step: self.candidates_per_step,
            edge_margin: self.edge_margin,
            queue_capacity: self.queue_capacity,
            max_rounds: self.max_rounds,
        }
    }
}

/// Triangulated, flat-shaded rendition of an image.
pub struct Mosaic {
    pub width: u32,
    pub height: u32,
    /// Number of points produced by the sampler, boundary points excluded.
    pub sample_count: usize,
    /// Sampled points followed by boundary points.
    pub points: Vec<Point>,
    pub triangulation: Triangulation,
    /// Color per triangle, indexed like the triangulation.
    pub colors: Vec<Rgb<u8>>,
}

impl Mosaic {
    pub fn paint(&self) -> RgbaImage {
        render::paint(self.width, self.height, &self.triangulation, &self.colors)
    }
}

/// Samples `img`, triangulates the points and colors each triangle.
///
/// The weighted mode needs an importance surface matching the image.
pub fn stylize<R: Rng>(
    img: &RgbImage,
    surface: Option<&ImportanceSurface>,
    settings: &Settings,
    rng: &mut R,
) -> Result<Mosaic> {
    let (width, height) = img.dimensions();
    let mut grid = SpatialGrid::new(settings.min_dist, width, height)?;
    let config = settings.sampler_config(&grid);

    let strategy = match (settings.mode, surface) {
        (SamplingMode::Uniform, _) => Strategy::Uniform,
        (SamplingMode::Weighted, Some(surface)) => Strategy::Weighted(surface),
        (SamplingMode::Weighted, None) => bail!("Weighted sampling requires an importance surface"),
    };

    let mut points = sampler::sample(&mut grid, &config, strategy, rng)?;
    let sample_count = points.len();

    if settings.boundary {
        points.extend(boundary::seed_boundary(
            settings.min_dist,
            width,
            height,
            rng,
        )?);
    }

    info!(
        "Sampled {} points and {} boundary points",
        sample_count,
        points.len() - sample_count
    );

    let triangulation = Triangulation::new(&points, width, height)
        .with_context(|| format!("Failed to triangulate {} sampled points", points.len()))?;

    let colors = color::aggregate_triangle_colors(
        img,
        triangulation.len(),
        |x, y| triangulation.locate(x, y),
        settings.aggregate,
    );

    Ok(Mosaic {
        width,
        height,
        sample_count,
        points,
        triangulation,
        colors,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_pcg::Pcg64Mcg;

    fn quadrants() -> RgbImage {
        RgbImage::from_fn(90, 60, |x, y| match (x < 45, y < 30) {
            (true, true) => Rgb([200, 30, 30]),
            (false, true) => Rgb([30, 200, 30]),
            (true, false) => Rgb([30, 30, 200]),
            (false, false) => Rgb([220, 220, 220]),
        })
    }

    #[test]
    fn settings_default_from_empty_json() {
        let settings: Settings = serde_json::from_str("{}").unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn settings_override_from_json() {
        let settings: Settings = serde_json::from_str(
            r#"{"min_dist": 9.5, "mode": "uniform", "aggregate": "mean", "points": 100,
                "importance": {"entropy_radius": 4}}"#,
        )
        .unwrap();

        assert_eq!(settings.min_dist, 9.5);
        assert_eq!(settings.mode, SamplingMode::Uniform);
        assert_eq!(settings.aggregate, Aggregate::Mean);
        assert_eq!(settings.points, Some(100));
        assert_eq!(settings.importance.entropy_radius, 4);
        assert_eq!(settings.importance.blur_sigma, 2.0);
        assert!(settings.boundary);
    }

    #[test]
    fn default_target_is_one_point_per_cell() {
        let grid = SpatialGrid::new(18.0, 100, 100).unwrap();
        let config = Settings::default().sampler_config(&grid);

        assert_eq!(config.target, grid.cell_count());
    }

    #[test]
    fn uniform_mosaic_covers_image() {
        let img = quadrants();
        let settings = Settings {
            min_dist: 6.0,
            mode: SamplingMode::Uniform,
            ..Default::default()
        };
        let mut rng = Pcg64Mcg::seed_from_u64(1);
        let mosaic = stylize(&img, None, &settings, &mut rng).unwrap();

        assert!(mosaic.sample_count > 10);
        assert!(mosaic.points.len() > mosaic.sample_count);
        assert_eq!(mosaic.colors.len(), mosaic.triangulation.len());

        let painted = mosaic.paint();
        assert!(painted.pixels().all(|p| p[3] == 255));
        assert_eq!(painted.get_pixel(20, 12), &image::Rgba([200, 30, 30, 255]));
    }

    #[test]
    fn weighted_mosaic_uses_surface() {
        let img = quadrants();
        let surface = ImportanceSurface::from_image(&img, &ImportanceOptions::default()).unwrap();
        let settings = Settings {
            min_dist: 6.0,
            ..Default::default()
        };
        let mut rng = Pcg64Mcg::seed_from_u64(2);
        let mosaic = stylize(&img, Some(&surface), &settings, &mut rng).unwrap();

        assert!(mosaic.sample_count > 10);
        assert_eq!(mosaic.colors.len(), mosaic.triangulation.len());
    }

    #[test]
    fn weighted_mode_requires_surface() {
        let mut rng = Pcg64Mcg::seed_from_u64(3);

        assert!(stylize(&quadrants(), None, &Settings::default(), &mut rng).is_err());
    }

    #[test]
    fn invalid_distance_fails_early() {
        let settings = Settings {
            min_dist: -1.0,
            mode: SamplingMode::Uniform,
            ..Default::default()
        };
        let mut rng = Pcg64Mcg::seed_from_u64(4);

        assert!(stylize(&quadrants(), None, &settings, &mut rng).is_err());
    }
}
