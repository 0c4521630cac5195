//! Game world state: the player, the obstacle field, the enemy and the score.
//!
//! Every mutation goes through a method here; the session's timers decide
//! when each one runs. Collision is pure geometry on this state, rendering
//! only ever reads it.

use std::f64::consts::PI;

use rand::Rng;
use tracing::{debug, info};

use crate::config::{Config, DifficultyConfig, EnemyConfig, FieldConfig, JumpConfig};
use crate::enemy::Enemy;
use crate::geometry::{Rect, Vec2};
use crate::pattern::{LANES, Obstacle, PatternGenerator, Spawn};

/// Player sprite sits this far below the vertical centre when grounded.
const PLAYER_DROP: f64 = 100.0;

pub const START_LANE: u8 = 1;

// ── Field geometry ──────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq)]
pub struct Field {
    pub width: f64,
    pub height: f64,
    pub sprite_w: f64,
    pub sprite_h: f64,
}

impl Field {
    pub fn new(cfg: &FieldConfig) -> Self {
        Self {
            width: cfg.width,
            height: cfg.height,
            sprite_w: cfg.sprite_width,
            sprite_h: cfg.sprite_height,
        }
    }

    pub fn lane_width(&self) -> f64 {
        self.width / LANES as f64
    }

    /// Left edge of a sprite centred in `lane`.
    pub fn lane_left(&self, lane: u8) -> f64 {
        let lw = self.lane_width();
        lane as f64 * lw + (lw - self.sprite_w) / 2.0
    }

    /// Lane containing horizontal coordinate `x`, clamped to the field.
    pub fn lane_at(&self, x: f64) -> u8 {
        let lane = (x / self.lane_width()).floor();
        lane.clamp(0.0, (LANES - 1) as f64) as u8
    }

    pub fn baseline_top(&self) -> f64 {
        self.height / 2.0 + PLAYER_DROP
    }

    pub fn sprite_at(&self, pos: Vec2) -> Rect {
        Rect::new(pos.x, pos.y, self.sprite_w, self.sprite_h)
    }
}

// ── Player input ────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Left,
    Right,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Collision {
    Obstacle(u64),
    Enemy,
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct Jump {
    started_ms: u64,
}

// ── World ───────────────────────────────────────────────────────────────────

pub struct World {
    field: Field,
    jump_cfg: JumpConfig,
    difficulty: DifficultyConfig,
    enemy_cfg: EnemyConfig,

    lane: u8,
    jump: Option<Jump>,
    jump_offset: f64,
    obstacles: Vec<Obstacle>,
    spawner: PatternGenerator,
    enemy: Enemy,
    score: u64,
    started_ms: u64,
}

impl World {
    pub fn new(cfg: &Config, now_ms: u64) -> Self {
        let field = Field::new(&cfg.field);
        let enemy = Enemy::at_station(&field, &cfg.enemy);
        Self {
            field,
            jump_cfg: cfg.jump.clone(),
            difficulty: cfg.difficulty.clone(),
            enemy_cfg: cfg.enemy.clone(),
            lane: START_LANE,
            jump: None,
            jump_offset: 0.0,
            obstacles: Vec::new(),
            spawner: PatternGenerator::new(cfg.spawn.clone()),
            enemy,
            score: 0,
            started_ms: now_ms,
        }
    }

    pub fn field(&self) -> &Field {
        &self.field
    }

    pub fn lane(&self) -> u8 {
        self.lane
    }

    pub fn obstacles(&self) -> &[Obstacle] {
        &self.obstacles
    }

    pub fn enemy(&self) -> &Enemy {
        &self.enemy
    }

    pub fn score(&self) -> u64 {
        self.score
    }

    #[cfg(test)]
    pub(crate) fn spawner(&self) -> &PatternGenerator {
        &self.spawner
    }

    pub fn is_grounded(&self) -> bool {
        self.jump.is_none()
    }

    pub fn is_jumping(&self) -> bool {
        self.jump.is_some()
    }

    /// When the current jump touches down, if airborne.
    pub fn landing_ms(&self) -> Option<u64> {
        self.jump
            .map(|j| j.started_ms + self.jump_cfg.duration_ms)
    }

    pub fn jump_offset(&self) -> f64 {
        self.jump_offset
    }

    pub fn elapsed_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.started_ms)
    }

    pub fn player_left(&self) -> f64 {
        self.field.lane_left(self.lane)
    }

    pub fn player_top(&self) -> f64 {
        self.field.baseline_top() - self.jump_offset
    }

    pub fn player_pos(&self) -> Vec2 {
        Vec2::new(self.player_left(), self.player_top())
    }

    pub fn player_rect(&self) -> Rect {
        self.field.sprite_at(self.player_pos())
    }

    /// `None` for an obstacle whose lane lies off the field.
    pub fn obstacle_rect(&self, obstacle: &Obstacle) -> Option<Rect> {
        (obstacle.lane < LANES)
            .then(|| self.field.sprite_at(Vec2::new(self.field.lane_left(obstacle.lane), obstacle.y)))
    }

    pub fn enemy_rect(&self) -> Rect {
        self.field.sprite_at(self.enemy.pos)
    }

    /// Difficulty scalar applied to obstacle speed.
    pub fn speed_multiplier(&self) -> f64 {
        1.0 + self.score as f64 * self.difficulty.speed_per_point
    }

    // ── Mutations ──

    /// Shift one lane; a no-op against the field edge.
    pub fn move_lane(&mut self, dir: Direction) {
        self.lane = match dir {
            Direction::Left => self.lane.saturating_sub(1),
            Direction::Right => (self.lane + 1).min(LANES - 1),
        };
    }

    /// Leave the ground. Ignored while airborne; returns whether a jump began.
    pub fn start_jump(&mut self, now_ms: u64) -> bool {
        if self.jump.is_some() {
            return false;
        }
        self.jump = Some(Jump { started_ms: now_ms });
        self.jump_offset = 0.0;
        true
    }

    /// Place the player on the jump arc `height * sin(pi * t)` for `now_ms`,
    /// landing once the full duration has elapsed.
    pub fn update_jump(&mut self, now_ms: u64) {
        let Some(jump) = self.jump else {
            return;
        };
        let elapsed = now_ms.saturating_sub(jump.started_ms);
        if elapsed >= self.jump_cfg.duration_ms {
            self.jump = None;
            self.jump_offset = 0.0;
            return;
        }
        let t = elapsed as f64 / self.jump_cfg.duration_ms as f64;
        self.jump_offset = self.jump_cfg.height * (PI * t).sin();
    }

    /// Scroll obstacles toward the player if advancing, then drop the ones
    /// that have left the bottom of the field.
    pub fn advance_obstacles(&mut self, advancing: bool) {
        if advancing {
            let step = self.difficulty.obstacle_step * self.speed_multiplier();
            for o in &mut self.obstacles {
                o.y += step;
            }
        }
        let limit = self.field.height * self.difficulty.despawn_factor;
        self.obstacles.retain(|o| o.y < limit);
    }

    /// Roll for a new wave and add it if accepted.
    pub fn spawn<R: Rng + ?Sized>(&mut self, now_ms: u64, rng: &mut R) -> Spawn {
        let elapsed = self.elapsed_ms(now_ms) as f64 / 1000.0;
        let spawn = self.spawner.generate(&self.obstacles, elapsed, rng);
        if let Spawn::Accepted { obstacles, .. } = &spawn {
            self.obstacles.extend(obstacles.iter().cloned());
        }
        spawn
    }

    /// Obstacles only hit a grounded player; the enemy hits regardless.
    pub fn collision(&self) -> Option<Collision> {
        let player = self.player_rect();
        if !self.is_jumping() {
            let hit = self.obstacles.iter().find(|o| {
                self.obstacle_rect(o)
                    .is_some_and(|rect| player.overlaps(&rect))
            });
            if let Some(o) = hit {
                return Some(Collision::Obstacle(o.id));
            }
        }
        player
            .overlaps(&self.enemy_rect())
            .then_some(Collision::Enemy)
    }

    pub fn pursue_enemy(&mut self, advancing: bool) {
        let player = self.player_pos();
        self.enemy
            .pursue(player, advancing, &self.field, &self.enemy_cfg);
    }

    /// Score as a superlinear function of session time.
    pub fn score_at(&self, now_ms: u64) -> u64 {
        let secs = self.elapsed_ms(now_ms) as f64 / 1000.0;
        let raw = secs + self.difficulty.score_growth.powf(secs) - 1.0;
        raw.floor().max(0.0) as u64
    }

    pub fn update_score(&mut self, now_ms: u64) {
        let score = self.score_at(now_ms);
        if score != self.score {
            debug!(score, "score");
        }
        self.score = score;
    }

    /// Back to a fresh session, atomically.
    pub fn reset(&mut self, now_ms: u64) {
        info!(score = self.score, obstacles = self.obstacles.len(), "world reset");
        self.obstacles.clear();
        self.score = 0;
        self.lane = START_LANE;
        self.jump = None;
        self.jump_offset = 0.0;
        self.spawner.reset();
        self.started_ms = now_ms;
        self.enemy = Enemy::at_station(&self.field, &self.enemy_cfg);
    }

    #[cfg(test)]
    pub(crate) fn insert_obstacle(&mut self, obstacle: Obstacle) {
        self.obstacles.push(obstacle);
    }

    #[cfg(test)]
    pub(crate) fn set_score(&mut self, score: u64) {
        self.score = score;
    }

    #[cfg(test)]
    pub(crate) fn enemy_mut(&mut self) -> &mut Enemy {
        &mut self.enemy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::PatternMemory;

    fn world() -> World {
        World::new(&Config::default(), 0)
    }

    fn obstacle_on_player(w: &World) -> Obstacle {
        Obstacle {
            id: 99,
            lane: w.lane(),
            y: w.player_top(),
            spawn_offset: 0,
        }
    }

    #[test]
    fn test_field_lanes() {
        let f = Field::new(&FieldConfig::default());
        assert_eq!(f.lane_left(0), 100.0);
        assert_eq!(f.lane_left(1), 400.0);
        assert_eq!(f.lane_left(2), 700.0);
        assert_eq!(f.lane_at(f.lane_left(2)), 2);
        assert_eq!(f.lane_at(-10.0), 0);
        assert_eq!(f.lane_at(5000.0), 2);
    }

    #[test]
    fn test_lane_moves_clamp() {
        let mut w = world();
        w.move_lane(Direction::Left);
        w.move_lane(Direction::Left);
        assert_eq!(w.lane(), 0);
        w.move_lane(Direction::Right);
        w.move_lane(Direction::Right);
        w.move_lane(Direction::Right);
        assert_eq!(w.lane(), 2);
    }

    #[test]
    fn test_jump_arc() {
        let mut w = world();
        assert!(w.start_jump(1000));
        assert!(!w.start_jump(1100), "airborne jump must be ignored");
        assert_eq!(w.landing_ms(), Some(1900));

        w.update_jump(1450);
        assert!((w.jump_offset() - 220.0).abs() < 1e-9);
        assert!((w.player_top() - (w.field().baseline_top() - 220.0)).abs() < 1e-9);

        w.update_jump(1225);
        assert!((w.jump_offset() - 220.0 * (PI / 4.0).sin()).abs() < 1e-9);

        w.update_jump(1900);
        assert!(w.is_grounded());
        assert_eq!(w.jump_offset(), 0.0);
        assert_eq!(w.player_top(), w.field().baseline_top());
    }

    #[test]
    fn test_obstacles_scroll_with_score() {
        let mut w = world();
        w.insert_obstacle(Obstacle {
            id: 1,
            lane: 0,
            y: 0.0,
            spawn_offset: 0,
        });
        w.advance_obstacles(false);
        assert_eq!(w.obstacles()[0].y, 0.0);
        w.advance_obstacles(true);
        assert_eq!(w.obstacles()[0].y, 30.0);
        w.set_score(20);
        w.advance_obstacles(true);
        assert!((w.obstacles()[0].y - 90.0).abs() < 1e-9);
    }

    #[test]
    fn test_obstacles_despawn_past_bottom() {
        let mut w = world();
        w.insert_obstacle(Obstacle {
            id: 1,
            lane: 0,
            y: 860.0,
            spawn_offset: 0,
        });
        w.advance_obstacles(true);
        assert!(w.obstacles().is_empty());
    }

    #[test]
    fn test_grounded_overlap_collides() {
        let mut w = world();
        let o = obstacle_on_player(&w);
        w.insert_obstacle(o);
        assert_eq!(w.collision(), Some(Collision::Obstacle(99)));
    }

    #[test]
    fn test_jump_grants_obstacle_immunity() {
        let mut w = world();
        let o = obstacle_on_player(&w);
        w.insert_obstacle(o);
        w.start_jump(0);
        assert_eq!(w.collision(), None);
    }

    #[test]
    fn test_enemy_hits_even_midair() {
        let mut w = world();
        w.start_jump(0);
        let pos = w.player_pos();
        w.enemy_mut().pos = pos;
        assert_eq!(w.collision(), Some(Collision::Enemy));
    }

    #[test]
    fn test_off_field_obstacle_is_ignored() {
        let mut w = world();
        let mut o = obstacle_on_player(&w);
        o.lane = 7;
        w.insert_obstacle(o);
        assert_eq!(w.collision(), None);
    }

    #[test]
    fn test_score_curve() {
        let w = world();
        assert_eq!(w.score_at(0), 0);
        assert_eq!(w.score_at(1000), 1);
        // 10 + 1.05^10 - 1 = 10.63
        assert_eq!(w.score_at(10_000), 10);
        // 60 + 1.05^60 - 1 = 77.68
        assert_eq!(w.score_at(60_000), 77);
    }

    #[test]
    fn test_score_monotonic() {
        let w = world();
        let mut last = 0;
        for t in (0..600_000).step_by(250) {
            let s = w.score_at(t);
            assert!(s >= last);
            last = s;
        }
    }

    #[test]
    fn test_reset_restores_fresh_state() {
        let mut w = world();
        w.move_lane(Direction::Right);
        w.start_jump(0);
        w.update_jump(300);
        w.update_score(5000);
        let o = obstacle_on_player(&w);
        w.insert_obstacle(o);
        w.enemy_mut().pos = Vec2::new(0.0, 0.0);

        w.reset(5000);
        assert_eq!(w.score(), 0);
        assert!(w.obstacles().is_empty());
        assert_eq!(w.lane(), START_LANE);
        assert!(w.is_grounded());
        assert_eq!(w.elapsed_ms(5000), 0);
        assert_eq!(w.enemy().pos, Vec2::new(450.0, 700.0));
        assert_eq!(w.spawner().memory(), PatternMemory::default());
    }
}
