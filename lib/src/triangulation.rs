use crate::point::Point;
use anyhow::{anyhow, ensure, Result};
use log::debug;
use std::collections::HashSet;
use voronator::delaunator;

/// Delaunay triangulation of integer points with pixel-to-triangle lookup.
pub struct Triangulation {
    points: Vec<Point>,
    triangles: Vec<[usize; 3]>,
    index: BucketIndex,
}

/// Uniform buckets over the image listing the triangles whose bounding box touches them.
struct BucketIndex {
    size: u32,
    columns: u32,
    rows: u32,
    buckets: Vec<Vec<usize>>,
}

/// Twice the signed area of `a`, `b`, `c`.
fn orientation(a: &Point, b: &Point, c: &Point) -> i64 {
    (b.x as i64 - a.x as i64) * (c.y as i64 - a.y as i64)
        - (b.y as i64 - a.y as i64) * (c.x as i64 - a.x as i64)
}

/// True if `p` is inside the triangle or on its boundary. Degenerate triangles contain nothing.
fn contains(vertices: &[Point; 3], p: &Point) -> bool {
    let [a, b, c] = vertices;

    if orientation(a, b, c) == 0 {
        return false;
    }

    let d1 = orientation(a, b, p);
    let d2 = orientation(b, c, p);
    let d3 = orientation(c, a, p);

    let has_negative = d1 < 0 || d2 < 0 || d3 < 0;
    let has_positive = d1 > 0 || d2 > 0 || d3 > 0;

    !(has_negative && has_positive)
}

impl BucketIndex {
    fn new(points: &[Point], triangles: &[[usize; 3]], width: u32, height: u32) -> Self {
        let area = width as f64 * height as f64;
        let size = ((area / triangles.len() as f64).sqrt().ceil() as u32).max(1);
        let columns = (width + size - 1) / size;
        let rows = (height + size - 1) / size;
        let mut buckets = vec![Vec::new(); (columns * rows) as usize];

        let clamp = |v: i32, bound: u32| v.clamp(0, bound as i32 - 1) as u32;

        for (index, triangle) in triangles.iter().enumerate() {
            let vertices = triangle.map(|i| points[i]);
            let min_x = vertices.iter().map(|p| p.x).min().unwrap_or(0);
            let max_x = vertices.iter().map(|p| p.x).max().unwrap_or(0);
            let min_y = vertices.iter().map(|p| p.y).min().unwrap_or(0);
            let max_y = vertices.iter().map(|p| p.y).max().unwrap_or(0);

            if max_x < 0 || max_y < 0 || min_x >= width as i32 || min_y >= height as i32 {
                continue;
            }

            let (x0, x1) = (clamp(min_x, width) / size, clamp(max_x, width) / size);
            let (y0, y1) = (clamp(min_y, height) / size, clamp(max_y, height) / size);

            for by in y0..=y1 {
                for bx in x0..=x1 {
                    buckets[(by * columns + bx) as usize].push(index);
                }
            }
        }

        BucketIndex {
            size,
            columns,
            rows,
            buckets,
        }
    }

    fn bucket(&self, x: u32, y: u32) -> Option<&[usize]> {
        let (bx, by) = (x / self.size, y / self.size);

        if bx >= self.columns || by >= self.rows {
            return None;
        }

        Some(&self.buckets[(by * self.columns + bx) as usize])
    }
}

impl Triangulation {
    /// Triangulates `points` covering a `width` x `height` image.
    ///
    /// Coincident points are merged. Fails if fewer than three distinct points remain or all of
    /// them are collinear.
    pub fn new(points: &[Point], width: u32, height: u32) -> Result<Self> {
        ensure!(
            width > 0 && height > 0,
            "Invalid image dimensions {}x{}",
            width,
            height
        );

        let mut seen = HashSet::with_capacity(points.len());
        let points = points
            .iter()
            .copied()
            .filter(|p| seen.insert(*p))
            .collect::<Vec<_>>();

        ensure!(
            points.len() >= 3,
            "Need at least three distinct points to triangulate, got {}",
            points.len()
        );

        let coords = points
            .iter()
            .map(delaunator::Point::from)
            .collect::<Vec<_>>();

        let raw = delaunator::triangulate(&coords)
            .ok_or_else(|| anyhow!("Failed to triangulate {} points", points.len()))?;

        let triangles = raw
            .triangles
            .chunks_exact(3)
            .map(|t| [t[0], t[1], t[2]])
            .collect::<Vec<_>>();

        ensure!(
            !triangles.is_empty(),
            "Triangulation of {} points is empty",
            points.len()
        );

        debug!(
            "Triangulated {} points into {} triangles",
            points.len(),
            triangles.len()
        );

        let index = BucketIndex::new(&points, &triangles, width, height);

        Ok(Triangulation {
            points,
            triangles,
            index,
        })
    }

    /// Distinct input points in the order they were first seen.
    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn triangles(&self) -> &[[usize; 3]] {
        &self.triangles
    }

    pub fn len(&self) -> usize {
        self.triangles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    pub fn vertices(&self, triangle: usize) -> [Point; 3] {
        self.triangles[triangle].map(|i| self.points[i])
    }

    /// Index of a triangle containing pixel `(x, y)` or `None` outside the convex hull.
    pub fn locate(&self, x: u32, y: u32) -> Option<usize> {
        let p = Point::new(x as i32, y as i32);

        self.index
            .bucket(x, y)?
            .iter()
            .copied()
            .find(|t| contains(&self.vertices(*t), &p))
    }
}
