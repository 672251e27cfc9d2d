use crate::point::Point;
use anyhow::{anyhow, ensure, Result};
use std::mem::size_of;

/// Largest number of cells a grid may allocate.
pub const MAX_CELLS: usize = 1 << 28;

/// Uniform acceleration grid for minimum-distance queries.
///
/// The cell size is `min_dist / sqrt(2)`, so a cell's diagonal equals `min_dist` and every cell
/// holds at most one accepted point.
#[derive(Clone, Debug)]
pub struct SpatialGrid {
    min_dist: f64,
    cell_size: f64,
    width: usize,
    height: usize,
    image_width: u32,
    image_height: u32,
    reach: i64,
    cells: Vec<Option<Point>>,
}

impl SpatialGrid {
    pub fn new(min_dist: f64, image_width: u32, image_height: u32) -> Result<Self> {
        ensure!(
            min_dist.is_finite() && min_dist > 0.0,
            "Minimum distance must be a positive number, got {}",
            min_dist
        );
        ensure!(
            image_width > 0 && image_height > 0,
            "Invalid grid dimensions {}x{}",
            image_width,
            image_height
        );

        let cell_size = min_dist / std::f64::consts::SQRT_2;
        let width = (image_width as f64 / cell_size).ceil();
        let height = (image_height as f64 / cell_size).ceil();
        let too_large = || {
            anyhow!(
                "Minimum distance {} is too small for a {}x{} image",
                min_dist,
                image_width,
                image_height
            )
        };

        if width >= usize::MAX as f64 || height >= usize::MAX as f64 {
            return Err(too_large());
        }

        let (width, height) = (width as usize, height as usize);
        let cells = width
            .checked_mul(height)
            .filter(|cells| *cells <= MAX_CELLS)
            .ok_or_else(too_large)?;

        cells
            .checked_mul(size_of::<Option<Point>>())
            .filter(|bytes| *bytes <= isize::MAX as usize)
            .ok_or_else(too_large)?;

        let reach = (min_dist / cell_size).ceil() as i64;

        Ok(SpatialGrid {
            min_dist,
            cell_size,
            width,
            height,
            image_width,
            image_height,
            reach,
            cells: vec![None; cells],
        })
    }

    pub fn min_dist(&self) -> f64 {
        self.min_dist
    }

    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    /// Grid dimensions in cells.
    pub fn dimensions(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    /// Dimensions of the image the grid covers.
    pub fn image_dimensions(&self) -> (u32, u32) {
        (self.image_width, self.image_height)
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// Number of occupied cells.
    pub fn len(&self) -> usize {
        self.cells.iter().filter(|c| c.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.iter().all(Option::is_none)
    }

    fn cell_of(&self, point: &Point) -> (i64, i64) {
        (
            (point.x as f64 / self.cell_size).floor() as i64,
            (point.y as f64 / self.cell_size).floor() as i64,
        )
    }

    fn index(&self, cx: i64, cy: i64) -> Option<usize> {
        if cx < 0 || cy < 0 || cx >= self.width as i64 || cy >= self.height as i64 {
            return None;
        }

        Some(cy as usize * self.width + cx as usize)
    }

    /// Stores `point` in its cell and returns the previous occupant, if any.
    ///
    /// Points outside the image are not stored.
    pub fn insert(&mut self, point: Point) -> Option<Point> {
        let (cx, cy) = self.cell_of(&point);

        match self.index(cx, cy) {
            Some(index) => self.cells[index].replace(point),
            None => None,
        }
    }

    /// True if any stored point is closer than the minimum distance to `point`.
    pub fn has_neighbor_within(&self, point: &Point) -> bool {
        let (cx, cy) = self.cell_of(point);

        for y in cy - self.reach..=cy + self.reach {
            for x in cx - self.reach..=cx + self.reach {
                let neighbor = self.index(x, y).and_then(|index| self.cells[index]);

                if let Some(neighbor) = neighbor {
                    if point.distance(&neighbor) < self.min_dist {
                        return true;
                    }
                }
            }
        }

        false
    }

    pub fn reset(&mut self) {
        self.cells.iter_mut().for_each(|cell| *cell = None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};
    use rand_pcg::Pcg64Mcg;

    #[test]
    fn dimensions_follow_cell_size() {
        let grid = SpatialGrid::new(18.0, 640, 480).unwrap();
        let cell = 18.0 / 2f64.sqrt();

        assert!((grid.cell_size() - cell).abs() < 1e-12);
        assert_eq!(
            grid.dimensions(),
            (
                (640.0 / cell).ceil() as usize,
                (480.0 / cell).ceil() as usize
            )
        );
        assert_eq!(grid.cell_count(), grid.dimensions().0 * grid.dimensions().1);
    }

    #[test]
    fn rejects_invalid_parameters() {
        assert!(SpatialGrid::new(0.0, 10, 10).is_err());
        assert!(SpatialGrid::new(-3.0, 10, 10).is_err());
        assert!(SpatialGrid::new(f64::NAN, 10, 10).is_err());
        assert!(SpatialGrid::new(3.0, 0, 10).is_err());
        assert!(SpatialGrid::new(3.0, 10, 0).is_err());
    }

    #[test]
    fn rejects_grids_too_large_to_allocate() {
        assert!(SpatialGrid::new(1e-7, 4000, 4000).is_err());
        assert!(SpatialGrid::new(f64::MIN_POSITIVE, 1, 1).is_err());
        assert!(SpatialGrid::new(0.01, 4000, 4000).is_err());
        assert!(SpatialGrid::new(1.0, 1000, 1000).is_ok());
    }

    #[test]
    fn window_is_symmetric() {
        // Neighbors two cells away on the positive side were missed by a -2..+1 window.
        let mut grid = SpatialGrid::new(10.0, 100, 100).unwrap();
        grid.insert(Point::new(50, 50));

        for probe in [
            Point::new(59, 50),
            Point::new(41, 50),
            Point::new(50, 59),
            Point::new(50, 41),
            Point::new(56, 56),
            Point::new(44, 44),
        ] {
            assert!(grid.has_neighbor_within(&probe), "{:?}", probe);
        }

        assert!(!grid.has_neighbor_within(&Point::new(60, 50)));
        assert!(!grid.has_neighbor_within(&Point::new(57, 58)));
    }

    #[test]
    fn queries_match_brute_force() {
        let mut rng = Pcg64Mcg::seed_from_u64(7);
        let mut grid = SpatialGrid::new(6.0, 80, 60).unwrap();
        let mut stored = Vec::new();

        for _ in 0..200 {
            let p = Point::new(rng.gen_range(0..80), rng.gen_range(0..60));

            if !grid.has_neighbor_within(&p) {
                assert!(grid.insert(p).is_none());
                stored.push(p);
            }
        }

        for _ in 0..2000 {
            let q = Point::new(rng.gen_range(-5..85), rng.gen_range(-5..65));
            let expected = stored.iter().any(|p| p.distance(&q) < 6.0);
            assert_eq!(grid.has_neighbor_within(&q), expected, "{:?}", q);
        }
    }

    #[test]
    fn insert_overwrites_occupant() {
        let mut grid = SpatialGrid::new(10.0, 50, 50).unwrap();

        assert_eq!(grid.insert(Point::new(1, 1)), None);
        assert_eq!(grid.insert(Point::new(2, 2)), Some(Point::new(1, 1)));
        assert_eq!(grid.len(), 1);
    }

    #[test]
    fn out_of_range_points_are_ignored() {
        let mut grid = SpatialGrid::new(10.0, 50, 50).unwrap();

        assert_eq!(grid.insert(Point::new(-20, 5)), None);
        assert_eq!(grid.insert(Point::new(5, 500)), None);
        assert!(grid.is_empty());
    }

    #[test]
    fn probes_near_the_border_see_border_points() {
        let mut grid = SpatialGrid::new(10.0, 100, 100).unwrap();
        grid.insert(Point::new(0, 0));
        grid.insert(Point::new(99, 99));

        assert!(grid.has_neighbor_within(&Point::new(-3, 2)));
        assert!(grid.has_neighbor_within(&Point::new(104, 99)));
        assert!(!grid.has_neighbor_within(&Point::new(50, 0)));
    }

    #[test]
    fn reset_forgets_points() {
        let mut grid = SpatialGrid::new(5.0, 40, 40).unwrap();
        let points = [Point::new(3, 3), Point::new(20, 20), Point::new(35, 10)];

        for p in points {
            grid.insert(p);
        }

        grid.reset();

        for p in points {
            assert!(!grid.has_neighbor_within(&p));
        }
        assert!(grid.is_empty());
        assert_eq!(grid.cell_count(), grid.dimensions().0 * grid.dimensions().1);
    }
}
