//! Procedural obstacle waves.
//!
//! Each spawn picks one template from a fixed catalog, never repeating either
//! of the two most recently selected templates, and drops the whole wave if
//! any of its obstacles would crowd an existing one in the same lane.

use rand::Rng;
use tracing::{debug, trace};

use crate::config::SpawnConfig;

pub const LANES: u8 = 3;

/// An obstacle on the field. `y` grows as the player advances.
#[derive(Clone, Debug, PartialEq)]
pub struct Obstacle {
    pub id: u64,
    pub lane: u8,
    pub y: f64,
    /// Position of this obstacle within its template.
    pub spawn_offset: u8,
}

/// One slot of a template: which lane, and its offset tag within the wave.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Slot {
    pub lane: u8,
    pub offset: u8,
}

const fn slot(lane: u8, offset: u8) -> Slot {
    Slot { lane, offset }
}

pub type Pattern = &'static [Slot];

pub const CATALOG: [Pattern; 5] = [
    &[slot(0, 0), slot(2, 1)],
    &[slot(1, 0), slot(0, 1), slot(2, 2)],
    &[slot(0, 0), slot(1, 1)],
    &[slot(1, 0), slot(2, 1)],
    &[slot(1, 0), slot(0, 0), slot(2, 0)],
];

/// The two most recently selected pattern ids.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PatternMemory {
    pub previous: Option<usize>,
    pub current: Option<usize>,
}

impl PatternMemory {
    fn remembers(&self, id: usize) -> bool {
        self.previous == Some(id) || self.current == Some(id)
    }

    fn record(&mut self, id: usize) {
        self.previous = self.current;
        self.current = Some(id);
    }
}

/// Outcome of one spawn decision, for logging and tests.
#[derive(Clone, Debug, PartialEq)]
pub enum Spawn {
    /// The probability draw said no.
    Skipped,
    /// No fresh pattern turned up within the retry budget.
    Exhausted,
    /// A pattern was selected but crowded an active obstacle in some lane.
    Rejected { pattern: usize },
    Accepted { pattern: usize, obstacles: Vec<Obstacle> },
}

pub struct PatternGenerator {
    catalog: Vec<Pattern>,
    memory: PatternMemory,
    next_id: u64,
    cfg: SpawnConfig,
}

impl PatternGenerator {
    pub fn new(cfg: SpawnConfig) -> Self {
        Self::with_catalog(CATALOG.to_vec(), cfg)
    }

    pub fn with_catalog(catalog: Vec<Pattern>, cfg: SpawnConfig) -> Self {
        Self {
            catalog,
            memory: PatternMemory::default(),
            next_id: 1,
            cfg,
        }
    }

    pub fn memory(&self) -> PatternMemory {
        self.memory
    }

    /// Forget recent selections. Obstacle ids keep counting up.
    pub fn reset(&mut self) {
        self.memory = PatternMemory::default();
    }

    /// Spawn chance per tick, rising with session time and capped.
    pub fn probability(&self, elapsed_secs: f64) -> f64 {
        (self.cfg.base_probability + elapsed_secs * self.cfg.probability_per_sec)
            .clamp(0.0, self.cfg.max_probability)
    }

    /// Decide this tick's spawn against the obstacles already on the field.
    pub fn generate<R: Rng + ?Sized>(
        &mut self,
        active: &[Obstacle],
        elapsed_secs: f64,
        rng: &mut R,
    ) -> Spawn {
        if !rng.random_bool(self.probability(elapsed_secs)) {
            return Spawn::Skipped;
        }

        let Some(pattern) = self.select(rng) else {
            debug!(memory = ?self.memory, "no fresh pattern within retry budget");
            return Spawn::Exhausted;
        };
        // Memory moves on even if the wave is dropped below.
        self.memory.record(pattern);

        let wave: Vec<Obstacle> = self.catalog[pattern]
            .iter()
            .enumerate()
            .map(|(i, s)| Obstacle {
                id: self.next_id + i as u64,
                lane: s.lane,
                y: self.cfg.spawn_y,
                spawn_offset: s.offset,
            })
            .collect();

        let crowded = wave.iter().any(|new| {
            active
                .iter()
                .any(|old| old.lane == new.lane && (old.y - new.y).abs() < self.cfg.min_spacing)
        });
        if crowded {
            trace!(pattern, "wave rejected for spacing");
            return Spawn::Rejected { pattern };
        }

        self.next_id += wave.len() as u64;
        trace!(pattern, count = wave.len(), "wave spawned");
        Spawn::Accepted {
            pattern,
            obstacles: wave,
        }
    }

    /// Draw template ids until one differs from both remembered ids.
    fn select<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<usize> {
        if self.catalog.is_empty() {
            return None;
        }
        (0..self.cfg.max_attempts)
            .map(|_| rng.random_range(0..self.catalog.len()))
            .find(|id| !self.memory.remembers(*id))
    }
}
