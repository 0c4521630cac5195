//! The game loop. One owned [`World`] and a set of periodic timers that all
//! feed one serialized update path.
//!
//! `advance` moves the session clock forward and fires every due tick in
//! chronological order, so an obstacle tick always sees positions from the
//! ticks before it and the snapshot taken afterwards is never half-updated.

use std::time::Duration;

use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Serialize;
use tracing::{debug, info};

use crate::config::{Config, TimingConfig};
use crate::control::Controls;
use crate::error::Result;
use crate::geometry::Vec2;
use crate::pattern::Spawn;
use crate::pose::ActionCode;
use crate::world::{Collision, Direction, World};

// ── Timers ──────────────────────────────────────────────────────────────────

/// Ticks in the order they fire when due at the same instant.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Tick {
    Jump,
    Obstacles,
    Enemy,
    Score,
}

const TICKS: [Tick; 4] = [Tick::Jump, Tick::Obstacles, Tick::Enemy, Tick::Score];

#[derive(Clone, Copy, Debug)]
struct Timer {
    period_ms: u64,
    next_due: Option<u64>,
}

impl Timer {
    fn armed(period_ms: u64, now_ms: u64) -> Self {
        Self {
            period_ms,
            next_due: Some(now_ms + period_ms),
        }
    }

    fn idle(period_ms: u64) -> Self {
        Self {
            period_ms,
            next_due: None,
        }
    }

    fn arm(&mut self, now_ms: u64) {
        self.next_due = Some(now_ms + self.period_ms);
    }

    /// Next period, but never later than `limit`.
    fn arm_until(&mut self, now_ms: u64, limit: u64) {
        self.next_due = Some((now_ms + self.period_ms).min(limit));
    }

    fn cancel(&mut self) {
        self.next_due = None;
    }

    fn reschedule(&mut self) {
        if let Some(due) = self.next_due.as_mut() {
            *due += self.period_ms;
        }
    }
}

struct Timers {
    jump: Timer,
    obstacles: Timer,
    enemy: Timer,
    score: Timer,
}

impl Timers {
    fn new(t: &TimingConfig, now_ms: u64) -> Self {
        Self {
            jump: Timer::idle(t.jump_tick_ms),
            obstacles: Timer::armed(t.obstacle_tick_ms, now_ms),
            enemy: Timer::armed(t.enemy_tick_ms, now_ms),
            score: Timer::armed(t.score_tick_ms, now_ms),
        }
    }

    fn get(&mut self, tick: Tick) -> &mut Timer {
        match tick {
            Tick::Jump => &mut self.jump,
            Tick::Obstacles => &mut self.obstacles,
            Tick::Enemy => &mut self.enemy,
            Tick::Score => &mut self.score,
        }
    }

    /// Earliest tick due at or before `limit`.
    fn next(&mut self, limit: u64) -> Option<(u64, Tick)> {
        let mut best: Option<(u64, Tick)> = None;
        for tick in TICKS {
            if let Some(due) = self.get(tick).next_due {
                if due <= limit && best.is_none_or(|(b, _)| due < b) {
                    best = Some((due, tick));
                }
            }
        }
        best
    }

    fn cancel_all(&mut self) {
        for tick in TICKS {
            self.get(tick).cancel();
        }
    }
}

// ── Events & snapshot ───────────────────────────────────────────────────────

/// Things the front end may want to react to (sound, logs).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionEvent {
    Jumped,
    Reset(Collision),
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ObstacleView {
    pub id: u64,
    pub lane: u8,
    pub y: f64,
}

/// Read-only view of the session for renderers.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Snapshot {
    pub player_lane: u8,
    pub player_top: f64,
    pub player_left: f64,
    pub grounded: bool,
    pub obstacles: Vec<ObstacleView>,
    pub enemy: Vec2,
    pub score: u64,
    pub elapsed_ms: u64,
    pub time_remaining_secs: u64,
    pub stable_action: Option<ActionCode>,
}

/// Countdown text such as `4:05`.
pub fn format_countdown(secs: u64) -> String {
    format!("{}:{:02}", secs / 60, secs % 60)
}

// ── Session ─────────────────────────────────────────────────────────────────

pub struct Session {
    world: World,
    timers: Timers,
    clock_ms: u64,
    advancing: bool,
    stable_action: Option<ActionCode>,
    session_length_secs: u64,
    rng: StdRng,
    events: Vec<SessionEvent>,
    resets: u64,
    running: bool,
}

impl Session {
    /// Fails if `cfg` does not pass [`Config::validate`].
    pub fn new(cfg: &Config) -> Result<Self> {
        cfg.validate()?;
        let rng = match cfg.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Ok(Self {
            world: World::new(cfg, 0),
            timers: Timers::new(&cfg.timing, 0),
            clock_ms: 0,
            advancing: false,
            stable_action: None,
            session_length_secs: cfg.timing.session_length_secs,
            rng,
            events: Vec::new(),
            resets: 0,
            running: true,
        })
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    #[cfg(test)]
    pub(crate) fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    pub fn clock_ms(&self) -> u64 {
        self.clock_ms
    }

    pub fn resets(&self) -> u64 {
        self.resets
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn set_stable_action(&mut self, action: Option<ActionCode>) {
        self.stable_action = action;
    }

    /// Drain events raised since the last call.
    pub fn take_events(&mut self) -> Vec<SessionEvent> {
        std::mem::take(&mut self.events)
    }

    /// Apply `controls` now, then run the clock forward by `dt`.
    pub fn advance(&mut self, dt: Duration, controls: Controls) {
        if !self.running {
            return;
        }
        self.apply(controls);

        let target = self.clock_ms + dt.as_millis() as u64;
        while let Some((due, tick)) = self.timers.next(target) {
            self.clock_ms = due;
            self.fire(tick);
        }
        self.clock_ms = target;
    }

    fn apply(&mut self, controls: Controls) {
        if controls.move_left {
            self.world.move_lane(Direction::Left);
        }
        if controls.move_right {
            self.world.move_lane(Direction::Right);
        }
        if controls.jump && self.world.start_jump(self.clock_ms) {
            self.schedule_jump();
            self.events.push(SessionEvent::Jumped);
        }
        if controls.advance != self.advancing {
            debug!(advancing = controls.advance, "advance");
        }
        self.advancing = controls.advance;
    }

    fn fire(&mut self, tick: Tick) {
        let now = self.clock_ms;
        match tick {
            Tick::Jump => {
                self.world.update_jump(now);
                self.schedule_jump();
                return;
            }
            Tick::Obstacles => {
                self.world.advance_obstacles(self.advancing);
                if let Some(hit) = self.world.collision() {
                    self.reset(hit);
                } else if let Spawn::Rejected { pattern } = self.world.spawn(now, &mut self.rng) {
                    debug!(pattern, "wave dropped, lane too crowded");
                }
            }
            Tick::Enemy => self.world.pursue_enemy(self.advancing),
            Tick::Score => self.world.update_score(now),
        }
        self.timers.get(tick).reschedule();
    }

    /// The jump tick runs only while airborne and always lands on time.
    fn schedule_jump(&mut self) {
        match self.world.landing_ms() {
            Some(landing) => self.timers.jump.arm_until(self.clock_ms, landing),
            None => self.timers.jump.cancel(),
        }
    }

    fn reset(&mut self, cause: Collision) {
        let now = self.clock_ms;
        info!(?cause, score = self.world.score(), "collision");
        self.world.reset(now);
        self.timers.jump.cancel();
        self.timers.score.arm(now);
        self.resets += 1;
        self.events.push(SessionEvent::Reset(cause));
    }

    /// Cancel every timer. Later `advance` calls do nothing.
    pub fn shutdown(&mut self) {
        self.timers.cancel_all();
        self.running = false;
        info!(clock_ms = self.clock_ms, resets = self.resets, "session shut down");
    }

    pub fn snapshot(&self) -> Snapshot {
        let w = &self.world;
        let elapsed_ms = w.elapsed_ms(self.clock_ms);
        Snapshot {
            player_lane: w.lane(),
            player_top: w.player_top(),
            player_left: w.player_left(),
            grounded: w.is_grounded(),
            obstacles: w
                .obstacles()
                .iter()
                .map(|o| ObstacleView {
                    id: o.id,
                    lane: o.lane,
                    y: o.y,
                })
                .collect(),
            enemy: w.enemy().pos,
            score: w.score(),
            elapsed_ms,
            time_remaining_secs: self.session_length_secs.saturating_sub(elapsed_ms / 1000),
            stable_action: self.stable_action,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::pattern::Obstacle;

    fn seeded() -> Config {
        Config {
            seed: Some(17),
            ..Config::default()
        }
    }

    /// No obstacles ever spawn.
    fn quiet() -> Config {
        let mut cfg = seeded();
        cfg.spawn.max_probability = 0.0;
        cfg
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn hold() -> Controls {
        Controls {
            advance: true,
            ..Controls::default()
        }
    }

    #[test]
    fn test_timer_order_on_ties() {
        let mut timers = Timers::new(&TimingConfig::default(), 0);
        timers.jump.arm(84);
        assert_eq!(timers.next(1000), Some((50, Tick::Enemy)));
        timers.enemy.next_due = Some(100);
        assert_eq!(timers.next(1000), Some((100, Tick::Jump)));
        timers.jump.cancel();
        assert_eq!(timers.next(1000), Some((100, Tick::Obstacles)));
        assert_eq!(timers.next(99), None);
    }

    #[test]
    fn test_score_ticks_each_second() {
        let mut s = Session::new(&seeded()).unwrap();
        s.advance(ms(999), hold());
        assert_eq!(s.snapshot().score, 0);
        s.advance(ms(1), hold());
        assert_eq!(s.snapshot().score, 1);
        assert_eq!(s.snapshot().time_remaining_secs, 299);
    }

    #[test]
    fn test_airborne_jump_is_noop() {
        let mut s = Session::new(&seeded()).unwrap();
        let jump = Controls {
            jump: true,
            ..hold()
        };
        s.advance(ms(200), jump);
        let top = s.snapshot().player_top;
        s.advance(ms(0), jump);
        assert_eq!(s.snapshot().player_top, top);
        assert_eq!(s.take_events(), vec![SessionEvent::Jumped]);
    }

    #[test]
    fn test_idle_player_is_caught() {
        let mut s = Session::new(&seeded()).unwrap();
        for _ in 0..40 {
            s.advance(ms(50), Controls::default());
        }
        assert!(s.resets() >= 1);
        assert!(
            s.take_events()
                .contains(&SessionEvent::Reset(Collision::Enemy))
        );
    }

    #[test]
    fn test_reset_rearms_score() {
        let mut s = Session::new(&quiet()).unwrap();
        s.advance(ms(3000), hold());
        assert!(s.snapshot().score >= 3);
        s.reset(Collision::Enemy);
        let snap = s.snapshot();
        assert_eq!(snap.score, 0);
        assert!(snap.obstacles.is_empty());
        assert_eq!(snap.elapsed_ms, 0);
        s.advance(ms(999), hold());
        assert_eq!(s.snapshot().score, 0);
        s.advance(ms(1), hold());
        assert_eq!(s.snapshot().score, 1);
    }

    #[test]
    fn test_shutdown_stops_everything() {
        let mut s = Session::new(&seeded()).unwrap();
        s.advance(ms(500), hold());
        s.shutdown();
        let before = s.snapshot();
        s.advance(ms(5000), hold());
        assert_eq!(s.snapshot(), before);
        assert!(!s.is_running());
    }

    /// Put a crate right on top of the player, in the player's lane.
    fn drop_crate_on_player(s: &mut Session) {
        let w = s.world_mut();
        let crate_on_player = Obstacle {
            id: 99,
            lane: w.lane(),
            y: w.player_top(),
            spawn_offset: 0,
        };
        w.insert_obstacle(crate_on_player);
    }

    #[test]
    fn test_grounded_crate_resets_run() {
        let mut s = Session::new(&quiet()).unwrap();
        s.advance(ms(2000), hold());
        assert!(s.snapshot().score >= 2);
        s.take_events();

        drop_crate_on_player(&mut s);
        s.advance(ms(100), hold());
        assert_eq!(
            s.take_events(),
            vec![SessionEvent::Reset(Collision::Obstacle(99))]
        );
        let snap = s.snapshot();
        assert_eq!(snap.score, 0);
        assert!(snap.obstacles.is_empty());
        assert_eq!(s.resets(), 1);
    }

    #[test]
    fn test_airborne_player_clears_crate() {
        let mut s = Session::new(&quiet()).unwrap();
        s.advance(ms(2000), hold());
        let jump = Controls {
            jump: true,
            ..hold()
        };
        s.advance(ms(0), jump);
        s.take_events();

        drop_crate_on_player(&mut s);
        s.advance(ms(100), hold());
        assert!(s.take_events().is_empty());
        assert_eq!(s.resets(), 0);
        assert_eq!(s.snapshot().obstacles.len(), 1);
        assert!(s.snapshot().score >= 2);
    }

    #[test]
    fn test_invalid_config_is_refused() {
        let mut zero_tick = seeded();
        zero_tick.timing.enemy_tick_ms = 0;
        let mut zero_jump_tick = seeded();
        zero_jump_tick.timing.jump_tick_ms = 0;
        let mut bad_cap = seeded();
        bad_cap.spawn.max_probability = 1.5;
        for cfg in [zero_tick, zero_jump_tick, bad_cap] {
            assert!(matches!(Session::new(&cfg), Err(Error::ConfigValue(_))));
        }
    }

    #[test]
    fn test_countdown_format() {
        assert_eq!(format_countdown(300), "5:00");
        assert_eq!(format_countdown(65), "1:05");
        assert_eq!(format_countdown(0), "0:00");
    }
}
