use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use log::info;
use rand::SeedableRng;
use rand_pcg::Pcg64Mcg;
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tessera::{Aggregate, ImportanceSurface, Mosaic, SamplingMode, Settings};

#[derive(Copy, Clone, ValueEnum)]
enum Mode {
    Uniform,
    Weighted,
}

impl From<Mode> for SamplingMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Uniform => SamplingMode::Uniform,
            Mode::Weighted => SamplingMode::Weighted,
        }
    }
}

#[derive(Copy, Clone, ValueEnum)]
enum Statistic {
    Mean,
    Median,
}

impl From<Statistic> for Aggregate {
    fn from(statistic: Statistic) -> Self {
        match statistic {
            Statistic::Mean => Aggregate::Mean,
            Statistic::Median => Aggregate::Median,
        }
    }
}

/// Render an image as a mosaic of flat-shaded triangles over blue-noise samples.
#[derive(Parser)]
#[command(version)]
pub struct Options {
    #[arg(long, short)]
    input: PathBuf,

    /// Directory receiving output-<variant>.png and friends
    #[arg(long, short)]
    output: PathBuf,

    /// JSON file with settings, command line flags take precedence
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Number of independently sampled renditions
    #[arg(long, default_value = "1")]
    variants: usize,

    #[arg(long, default_value = "0")]
    seed: u64,

    #[arg(long)]
    min_dist: Option<f64>,

    /// Number of points to sample
    #[arg(long, short = 'n')]
    points: Option<usize>,

    #[arg(long)]
    candidates: Option<usize>,

    #[arg(long, value_enum)]
    strategy: Option<Mode>,

    #[arg(long, value_enum)]
    aggregate: Option<Statistic>,

    #[arg(long)]
    no_boundary: bool,

    #[arg(long)]
    svg: bool,

    /// Also write the sampled points as JSON
    #[arg(long)]
    dump_points: bool,
}

impl Options {
    fn settings(&self) -> Result<Settings> {
        let mut settings: Settings = match &self.config {
            Some(path) => {
                let fh = std::fs::File::open(path)
                    .with_context(|| format!("Cannot open {}", path.display()))?;
                serde_json::from_reader(fh)?
            }
            None => Settings::default(),
        };

        if let Some(min_dist) = self.min_dist {
            settings.min_dist = min_dist;
        }

        if let Some(points) = self.points {
            settings.points = Some(points);
        }

        if let Some(candidates) = self.candidates {
            settings.candidates_per_step = candidates;
        }

        if let Some(mode) = self.strategy {
            settings.mode = mode.into();
        }

        if let Some(aggregate) = self.aggregate {
            settings.aggregate = aggregate.into();
        }

        if self.no_boundary {
            settings.boundary = false;
        }

        Ok(settings)
    }
}

fn save(opt: &Options, variant: usize, mosaic: &Mosaic) -> Result<()> {
    let stem = opt.output.join(format!("output-{}", variant));

    mosaic.paint().save(stem.with_extension("png"))?;

    if opt.svg {
        tessera::render::write_svg(
            &stem.with_extension("svg"),
            &mosaic.triangulation,
            &mosaic.colors,
            mosaic.width,
            mosaic.height,
        )?;
    }

    if opt.dump_points {
        let fh = std::fs::File::create(stem.with_extension("json"))?;
        serde_json::to_writer(fh, &mosaic.points)?;
    }

    Ok(())
}

fn load(path: &Path) -> Result<image::RgbImage> {
    Ok(image::open(path)
        .with_context(|| format!("Cannot read image {}", path.display()))?
        .to_rgb8())
}

fn main() -> Result<()> {
    env_logger::init();

    let opt = Options::parse();
    let settings = opt.settings()?;

    info!("Reading image");
    let img = load(&opt.input)?;
    std::fs::create_dir_all(&opt.output)?;

    let surface = match settings.mode {
        SamplingMode::Weighted => {
            info!("Compute importance surface");
            Some(ImportanceSurface::from_image(&img, &settings.importance)?)
        }
        SamplingMode::Uniform => None,
    };

    (0..opt.variants)
        .into_par_iter()
        .map(|variant| {
            let mut rng = Pcg64Mcg::seed_from_u64(opt.seed.wrapping_add(variant as u64));
            let start = Instant::now();
            let mosaic = tessera::stylize(&img, surface.as_ref(), &settings, &mut rng)?;

            info!(
                "Variant {}: {} triangles from {} points in {:.3}s",
                variant,
                mosaic.triangulation.len(),
                mosaic.points.len(),
                start.elapsed().as_secs_f64()
            );

            save(&opt, variant, &mosaic)
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(())
}
