//! The pursuer. Chases the player's exact position while they idle, and holds
//! a blocking station under the player's lane while they advance.

use crate::config::EnemyConfig;
use crate::geometry::Vec2;
use crate::world::Field;

#[derive(Clone, Debug, PartialEq)]
pub struct Enemy {
    /// Top-left of the enemy sprite.
    pub pos: Vec2,
}

impl Enemy {
    pub fn at_station(field: &Field, cfg: &EnemyConfig) -> Self {
        Self {
            pos: station(field, cfg),
        }
    }

    /// One controller step. `player` is the player's rendered top-left.
    pub fn pursue(&mut self, player: Vec2, advancing: bool, field: &Field, cfg: &EnemyConfig) {
        if advancing {
            let lane = field.lane_at(player.x);
            let target_x = field.lane_left(lane);
            self.pos = Vec2 {
                x: self.pos.x + (target_x - self.pos.x) * cfg.block_smoothing,
                y: station(field, cfg).y,
            };
        } else {
            self.pos = self.pos.approach(player, cfg.chase_smoothing);
        }
    }
}

/// Default position: horizontally centred, near the bottom edge.
pub fn station(field: &Field, cfg: &EnemyConfig) -> Vec2 {
    Vec2::new(field.width / 2.0, field.height - cfg.station_offset)
}
