//! Dart-throwing sampler producing blue-noise points.
//!
//! Accepted points are spawned from an active set: a random active point is retired and `K`
//! candidates are thrown into the annulus `[min_dist, 2 * min_dist)` around it. How candidates
//! are accepted depends on the [`Strategy`]:
//!
//! * [`Strategy::Uniform`] accepts every candidate of a batch that keeps the minimum distance.
//! * [`Strategy::Weighted`] queues candidates by importance and accepts only the most important
//!   valid one per round. The queue survives between rounds and is trimmed to a fixed capacity.

use crate::grid::SpatialGrid;
use crate::importance::ImportanceSurface;
use crate::point::{Candidate, Point};
use anyhow::{bail, ensure, Result};
use log::{debug, trace, warn};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BinaryHeap;
use std::f64::consts::TAU;

pub const DEFAULT_CANDIDATES: usize = 50;
pub const DEFAULT_QUEUE_CAPACITY: usize = 1 << 16;

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    /// Number of points after which sampling stops.
    pub target: usize,

    /// Candidates thrown around each retired active point.
    pub candidates_per_step: usize,

    /// Distance from the image border candidates of the weighted strategy must keep. Defaults to
    /// the minimum distance. The uniform strategy always uses the minimum distance.
    pub edge_margin: Option<f64>,

    /// Number of queued candidates kept after trimming.
    pub queue_capacity: usize,

    /// Optional hard limit on growth rounds.
    pub max_rounds: Option<usize>,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        SamplerConfig {
            target: usize::MAX,
            candidates_per_step: DEFAULT_CANDIDATES,
            edge_margin: None,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            max_rounds: None,
        }
    }
}

impl SamplerConfig {
    pub fn new(target: usize) -> Self {
        SamplerConfig {
            target,
            ..Default::default()
        }
    }
}

/// Acceptance policy of a sampling run.
#[derive(Copy, Clone, Debug)]
pub enum Strategy<'a> {
    Uniform,
    Weighted(&'a ImportanceSurface),
}

impl Strategy<'_> {
    pub fn name(&self) -> &'static str {
        match self {
            Strategy::Uniform => "uniform",
            Strategy::Weighted(_) => "weighted",
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Phase {
    Empty,
    Seeded,
    Growing,
    Exhausted,
}

/// Candidates ordered by importance, most important first.
#[derive(Debug)]
pub struct CandidateQueue {
    heap: BinaryHeap<Candidate>,
    capacity: usize,
}

impl CandidateQueue {
    pub fn new(capacity: usize) -> Self {
        CandidateQueue {
            heap: BinaryHeap::new(),
            capacity,
        }
    }

    pub fn push(&mut self, candidate: Candidate) {
        self.heap.push(candidate);
    }

    pub fn pop(&mut self) -> Option<Candidate> {
        self.heap.pop()
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Drops the least important candidates once the queue holds more than twice its capacity.
    pub fn trim(&mut self) {
        if self.heap.len() <= 2 * self.capacity {
            return;
        }

        let mut candidates = std::mem::take(&mut self.heap).into_vec();
        let before = candidates.len();

        candidates.select_nth_unstable_by(self.capacity, |a, b| b.cmp(a));
        candidates.truncate(self.capacity);

        trace!("Trimmed candidate queue from {} to {}", before, candidates.len());
        self.heap = BinaryHeap::from(candidates);
    }
}

pub struct Sampler<'a> {
    grid: &'a mut SpatialGrid,
    strategy: Strategy<'a>,
    config: SamplerConfig,
    width: u32,
    height: u32,
    phase: Phase,
    rounds: usize,
    active: Vec<Point>,
    sampled: Vec<Point>,
    queue: CandidateQueue,
}

impl<'a> Sampler<'a> {
    /// Prepares a run over `grid`, which is cleared first.
    pub fn new(
        grid: &'a mut SpatialGrid,
        config: &SamplerConfig,
        strategy: Strategy<'a>,
    ) -> Result<Self> {
        ensure!(
            config.candidates_per_step > 0,
            "At least one candidate per step is required"
        );
        ensure!(
            config.queue_capacity > 0,
            "Candidate queue capacity must be positive"
        );

        if let Some(margin) = config.edge_margin {
            ensure!(
                margin.is_finite() && margin >= 0.0,
                "Edge margin must be non-negative, got {}",
                margin
            );
        }

        let (width, height) = grid.image_dimensions();

        let strategy = match strategy {
            Strategy::Weighted(surface) if surface.dimensions() != (width, height) => {
                let (sw, sh) = surface.dimensions();
                bail!(
                    "Importance surface is {}x{} but the image is {}x{}",
                    sw,
                    sh,
                    width,
                    height
                );
            }
            Strategy::Weighted(surface) if surface.is_flat() => {
                warn!("Importance surface is flat, falling back to uniform sampling");
                Strategy::Uniform
            }
            strategy => strategy,
        };

        grid.reset();

        Ok(Sampler {
            grid,
            strategy,
            config: *config,
            width,
            height,
            phase: Phase::Empty,
            rounds: 0,
            active: Vec::new(),
            sampled: Vec::new(),
            queue: CandidateQueue::new(config.queue_capacity),
        })
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn strategy(&self) -> Strategy<'a> {
        self.strategy
    }

    pub fn sampled(&self) -> &[Point] {
        &self.sampled
    }

    /// Number of candidates waiting in the queue.
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    fn is_saturated(&self) -> bool {
        self.sampled.len() >= self.config.target
    }

    fn accept(&mut self, point: Point) {
        self.grid.insert(point);
        self.active.push(point);
        self.sampled.push(point);
    }

    fn seed<R: Rng>(&mut self, rng: &mut R) {
        let point = Point::new(
            rng.gen_range(0..self.width) as i32,
            rng.gen_range(0..self.height) as i32,
        );

        trace!("Seeding with {:?}", point);
        self.accept(point);
    }

    fn throw<R: Rng>(&self, parent: &Point, rng: &mut R) -> Point {
        let min_dist = self.grid.min_dist();
        let radius = min_dist * (1.0 + rng.gen::<f64>());
        let angle = TAU * rng.gen::<f64>();

        parent.offset_polar(radius, angle)
    }

    /// Accepts every candidate that keeps its distance to all accepted points.
    fn grow_all<R: Rng>(&mut self, parent: Point, rng: &mut R) {
        let margin = self.grid.min_dist();

        for _ in 0..self.config.candidates_per_step {
            let candidate = self.throw(&parent, rng);

            if candidate.is_inside(self.width, self.height, margin)
                && !self.grid.has_neighbor_within(&candidate)
            {
                self.accept(candidate);

                if self.is_saturated() {
                    break;
                }
            }
        }
    }

    /// Queues all candidates and accepts the most important valid one.
    fn grow_best<R: Rng>(&mut self, parent: Point, surface: &ImportanceSurface, rng: &mut R) {
        let margin = self.config.edge_margin.unwrap_or_else(|| self.grid.min_dist());

        for _ in 0..self.config.candidates_per_step {
            let candidate = self.throw(&parent, rng);

            if candidate.is_inside(self.width, self.height, margin) {
                let importance = surface.at(candidate.x as u32, candidate.y as u32);
                self.queue
                    .push(Candidate::new(candidate, -(importance as f64)));
            }
        }

        while let Some(candidate) = self.queue.pop() {
            if !self.grid.has_neighbor_within(&candidate.point) {
                self.accept(candidate.point);
                break;
            }
        }

        self.queue.trim();
    }

    /// Advances the state machine by one seeding or growth round.
    pub fn step<R: Rng>(&mut self, rng: &mut R) -> Phase {
        self.phase = match self.phase {
            Phase::Empty if self.config.target == 0 => Phase::Exhausted,
            Phase::Empty => {
                self.seed(rng);
                Phase::Seeded
            }
            Phase::Seeded | Phase::Growing => {
                let out_of_rounds = self
                    .config
                    .max_rounds
                    .map_or(false, |max| self.rounds >= max);

                if self.active.is_empty() || self.is_saturated() || out_of_rounds {
                    Phase::Exhausted
                } else {
                    let index = rng.gen_range(0..self.active.len());
                    let parent = self.active.swap_remove(index);
                    let before = self.sampled.len();

                    match self.strategy {
                        Strategy::Uniform => self.grow_all(parent, rng),
                        Strategy::Weighted(surface) => self.grow_best(parent, surface, rng),
                    }

                    self.rounds += 1;
                    trace!(
                        "Round {} accepted {} points, {} active",
                        self.rounds,
                        self.sampled.len() - before,
                        self.active.len()
                    );

                    Phase::Growing
                }
            }
            Phase::Exhausted => Phase::Exhausted,
        };

        self.phase
    }

    /// Runs until the active set is exhausted or the target is reached.
    pub fn run<R: Rng>(mut self, rng: &mut R) -> Vec<Point> {
        while self.step(rng) != Phase::Exhausted {}

        debug!(
            "Sampled {} points in {} rounds ({}), {} candidates left in queue",
            self.sampled.len(),
            self.rounds,
            self.strategy.name(),
            self.queue.len()
        );

        self.sampled
    }
}

pub fn sample<R: Rng>(
    grid: &mut SpatialGrid,
    config: &SamplerConfig,
    strategy: Strategy<'_>,
    rng: &mut R,
) -> Result<Vec<Point>> {
    Ok(Sampler::new(grid, config, strategy)?.run(rng))
}

pub fn sample_uniform<R: Rng>(
    grid: &mut SpatialGrid,
    config: &SamplerConfig,
    rng: &mut R,
) -> Result<Vec<Point>> {
    sample(grid, config, Strategy::Uniform, rng)
}

pub fn sample_weighted<R: Rng>(
    grid: &mut SpatialGrid,
    config: &SamplerConfig,
    surface: &ImportanceSurface,
    rng: &mut R,
) -> Result<Vec<Point>> {
    sample(grid, config, Strategy::Weighted(surface), rng)
}
