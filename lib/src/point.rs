use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use voronator::delaunator;

/// Integer pixel position of a sample.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Point { x, y }
    }

    pub fn distance(&self, other: &Self) -> f64 {
        let xs = (self.x - other.x) as f64;
        let ys = (self.y - other.y) as f64;
        ((xs * xs) + (ys * ys)).sqrt()
    }

    /// Point at `radius` and `angle` (radians) from `self`, truncated toward zero on each axis.
    pub fn offset_polar(&self, radius: f64, angle: f64) -> Self {
        Point::new(
            self.x + (radius * angle.cos()) as i32,
            self.y + (radius * angle.sin()) as i32,
        )
    }

    /// True if the point lies strictly inside `width` x `height` shrunk by `margin` on every side.
    pub fn is_inside(&self, width: u32, height: u32, margin: f64) -> bool {
        let x = self.x as f64;
        let y = self.y as f64;

        x > margin && x < width as f64 - margin && y > margin && y < height as f64 - margin
    }
}

impl fmt::Debug for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.x, self.y)
    }
}

impl From<Point> for delaunator::Point {
    fn from(p: Point) -> Self {
        delaunator::Point {
            x: p.x as f64,
            y: p.y as f64,
        }
    }
}

impl From<&Point> for delaunator::Point {
    fn from(p: &Point) -> Self {
        delaunator::Point::from(*p)
    }
}

/// A point waiting in the candidate queue.
///
/// `priority` is the negated importance at the point, so the smallest priority is the most
/// important candidate. The ordering is reversed so that a max-heap pops the smallest priority
/// first.
#[derive(Copy, Clone, Debug)]
pub struct Candidate {
    pub point: Point,
    pub priority: f64,
}

impl Candidate {
    pub fn new(point: Point, priority: f64) -> Self {
        Candidate { point, priority }
    }

    pub fn importance(&self) -> f64 {
        -self.priority
    }
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        other.priority.total_cmp(&self.priority)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BinaryHeap;

    #[test]
    fn distance_is_euclidean() {
        assert_eq!(Point::new(0, 0).distance(&Point::new(3, 4)), 5.0);
        assert_eq!(Point::new(-2, 1).distance(&Point::new(-2, 1)), 0.0);
    }

    #[test]
    fn polar_offset_truncates_toward_zero() {
        let p = Point::new(10, 10).offset_polar(2.9, std::f64::consts::PI);
        assert_eq!(p, Point::new(8, 10));
    }

    #[test]
    fn inside_check_is_strict() {
        assert!(Point::new(4, 4).is_inside(10, 10, 3.0));
        assert!(!Point::new(3, 4).is_inside(10, 10, 3.0));
        assert!(!Point::new(7, 4).is_inside(10, 10, 3.0));
        assert!(Point::new(0, 9).is_inside(10, 10, -1.0));
    }

    #[test]
    fn heap_pops_most_important_first() {
        let mut heap = BinaryHeap::new();
        heap.push(Candidate::new(Point::new(0, 0), -1.0));
        heap.push(Candidate::new(Point::new(1, 0), -7.5));
        heap.push(Candidate::new(Point::new(2, 0), 0.0));

        let order = std::iter::from_fn(|| heap.pop())
            .map(|c| c.point.x)
            .collect::<Vec<_>>();

        assert_eq!(order, vec![1, 0, 2]);
    }
}
