use crate::point::Point;
use anyhow::{ensure, Result};
use log::trace;
use rand::Rng;

/// Random walk along the four image edges so the mesh reaches the border.
///
/// Each round emits one point per edge and advances every cursor by a random step in
/// `[min_dist, 2 * min_dist)`, but never by less than one pixel, so positions along an edge keep
/// increasing. Steps along the longer image dimension are stretched by the aspect ratio. The walk
/// ends as soon as one cursor leaves its edge, after which the two right-hand
/// corners are appended.
///
/// The returned points ignore the minimum distance and are not meant for the spatial grid.
pub fn seed_boundary<R: Rng>(
    min_dist: f64,
    width: u32,
    height: u32,
    rng: &mut R,
) -> Result<Vec<Point>> {
    ensure!(
        min_dist.is_finite() && min_dist > 0.0,
        "Minimum distance must be a positive number, got {}",
        min_dist
    );
    ensure!(
        width > 0 && height > 0,
        "Invalid image dimensions {}x{}",
        width,
        height
    );

    let (w, h) = (width as f64, height as f64);
    let aspect = w.max(h) / w.min(h);
    let horizontal_scale = if width > height { aspect } else { 1.0 };
    let vertical_scale = if height > width { aspect } else { 1.0 };

    // An overflowing step is infinite and ends the walk after the current round.
    let mut step = |scale: f64| (min_dist * scale * (1.0 + rng.gen::<f64>())).max(1.0);

    let mut top = 0.0;
    let mut bottom = 0.0;
    let mut left = 0.0;
    let mut right = 0.0;
    let mut points = Vec::new();

    while top < w && bottom < w && left < h && right < h {
        points.push(Point::new(top as i32, 0));
        points.push(Point::new(bottom as i32, height as i32 - 1));
        points.push(Point::new(0, left as i32));
        points.push(Point::new(width as i32 - 1, right as i32));

        top += step(horizontal_scale);
        bottom += step(horizontal_scale);
        left += step(vertical_scale);
        right += step(vertical_scale);
    }

    points.push(Point::new(width as i32 - 1, 0));
    points.push(Point::new(width as i32 - 1, height as i32 - 1));

    trace!("Seeded {} boundary points", points.len());

    Ok(points)
}
