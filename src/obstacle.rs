//! Walls and the registry that owns them.
//!
//! Positions are wall centres in playfield pixels. Speeds are expressed per
//! 60 Hz frame (the unit the tuning constants were authored in) and scaled by
//! the real tick length in `advance`.

#[cfg(feature = "serde")]
use serde::Serialize;

use crate::config::PlayfieldRules;
use crate::schedule::WallSpawn;

/// Length of the reference frame wall speeds are tuned against.
pub const FRAME_MS: f64 = 1000.0 / 60.0;

/// Where a judged wall is moved so nothing can touch it again.
const OFF_FIELD_X: f64 = -1000.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub enum WallState {
    Active,
    Destroyed,
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct Wall {
    pub id: u64,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    /// Pixels per reference frame.
    pub speed: f64,
    pub state: WallState,
    /// Set by the first judgment and never cleared.
    pub judged: bool,
    /// Index into the renderer's sprite rotation.
    pub variant: usize,
    destroyed_for_ms: f64,
}

impl Wall {
    fn left(&self) -> f64 {
        self.x - self.width / 2.0
    }

    fn right(&self) -> f64 {
        self.x + self.width / 2.0
    }

    /// Open-interval overlap with a horizontal span centred on `center`.
    fn overlaps(&self, center: f64, span: f64) -> bool {
        self.state == WallState::Active
            && self.right() > center - span / 2.0
            && self.left() < center + span / 2.0
    }

    fn destroy(&mut self) {
        if self.state == WallState::Active {
            self.state = WallState::Destroyed;
            self.destroyed_for_ms = 0.0;
        }
    }
}

/// Accuracy tier of one attack against one wall.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub enum Judgment {
    Wow,
    Great,
    Good,
    Miss,
}

impl Judgment {
    /// Classify by distance from the hit-zone centre, with thresholds at
    /// 12.5 %, 25 % and 40 % of the zone width (inclusive).
    pub fn classify(distance: f64, hit_zone_width: f64) -> Judgment {
        let distance = distance.abs();
        if distance <= hit_zone_width * 0.125 {
            Judgment::Wow
        } else if distance <= hit_zone_width * 0.25 {
            Judgment::Great
        } else if distance <= hit_zone_width * 0.40 {
            Judgment::Good
        } else {
            Judgment::Miss
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Judgment::Wow => "WOW",
            Judgment::Great => "GREAT",
            Judgment::Good => "GOOD",
            Judgment::Miss => "MISS",
        }
    }

    pub fn is_hit(self) -> bool {
        self != Judgment::Miss
    }
}

/// Result of a judgment pass, positioned where the wall was when it was hit.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct JudgmentOutcome {
    pub wall_id: u64,
    pub tier: Judgment,
    pub destroyed: bool,
    pub x: f64,
    pub y: f64,
}

pub struct ObstacleRegistry {
    rules: PlayfieldRules,
    walls: Vec<Wall>,
    next_id: u64,
    next_variant: usize,
    speed_multiplier: f64,
    destroyed_count: u32,
}

impl ObstacleRegistry {
    pub fn new(rules: PlayfieldRules) -> Self {
        Self {
            rules,
            walls: Vec::new(),
            next_id: 0,
            next_variant: 0,
            speed_multiplier: 1.0,
            destroyed_count: 0,
        }
    }

    pub fn walls(&self) -> &[Wall] {
        &self.walls
    }

    pub fn active_count(&self) -> usize {
        self.walls
            .iter()
            .filter(|w| w.state == WallState::Active)
            .count()
    }

    /// Walls destroyed by a successful judgment since the last reset.
    pub fn destroyed_count(&self) -> u32 {
        self.destroyed_count
    }

    pub fn speed_multiplier(&self) -> f64 {
        self.speed_multiplier
    }

    pub fn hit_zone_center(&self, actor_x: f64) -> f64 {
        actor_x + self.rules.hit_zone_offset
    }

    /// Minimum horizontal gap to the newest active wall. Shrinks as walls speed up.
    pub fn min_spawn_spacing(&self) -> f64 {
        self.rules
            .min_spawn_spacing_floor
            .max(self.rules.min_spawn_spacing / self.speed_multiplier)
    }

    /// Create a wall at the far edge. A wall released late is moved on by the
    /// distance it would already have covered, so walls keep their musical
    /// spacing whatever the frame rate. Returns `None` when the newest active
    /// wall is too close.
    pub fn spawn(&mut self, spawn: &WallSpawn) -> Option<u64> {
        let speed = self.rules.wall_base_speed * self.speed_multiplier;
        let x = self.rules.width + self.rules.spawn_margin
            - speed * spawn.lateness_ms.max(0.0) / FRAME_MS;

        let newest = self
            .walls
            .iter()
            .rev()
            .find(|w| w.state == WallState::Active);
        if let Some(newest) = newest {
            if (newest.x - x).abs() < self.min_spawn_spacing() {
                log::warn!(
                    "wall for beat {} #{} skipped: {:.0} px from wall {}",
                    spawn.beat_index,
                    spawn.ordinal,
                    (newest.x - x).abs(),
                    newest.id
                );
                return None;
            }
        }

        let id = self.next_id;
        self.next_id += 1;
        let variant = self.next_variant;
        self.next_variant = (self.next_variant + 1) % self.rules.wall_variants.max(1);
        self.walls.push(Wall {
            id,
            x,
            y: self.rules.wall_y(),
            width: self.rules.wall_width,
            height: self.rules.wall_height,
            speed,
            state: WallState::Active,
            judged: false,
            variant,
            destroyed_for_ms: 0.0,
        });
        log::debug!("wall {} spawned at x={:.1} (variant {})", id, x, variant);
        Some(id)
    }

    /// Move active walls left and retire finished ones.
    pub fn advance(&mut self, dt_ms: f64) {
        let dt_ms = dt_ms.max(0.0);
        for wall in &mut self.walls {
            match wall.state {
                WallState::Active => wall.x -= wall.speed * dt_ms / FRAME_MS,
                WallState::Destroyed => wall.destroyed_for_ms += dt_ms,
            }
        }
        let effect_ms = self.rules.destroy_effect_ms;
        self.walls.retain(|w| match w.state {
            WallState::Active => w.x >= -w.width,
            WallState::Destroyed => w.destroyed_for_ms <= effect_ms,
        });
    }

    /// Judge the first unjudged active wall overlapping the hit zone.
    pub fn judge(&mut self, actor_x: f64) -> Option<JudgmentOutcome> {
        let center = self.hit_zone_center(actor_x);
        let zone_width = self.rules.hit_zone_width;
        let wall = self
            .walls
            .iter_mut()
            .find(|w| !w.judged && w.overlaps(center, zone_width))?;

        let tier = Judgment::classify(wall.x - center, zone_width);
        wall.judged = true;
        let outcome = JudgmentOutcome {
            wall_id: wall.id,
            tier,
            destroyed: tier.is_hit(),
            x: wall.x,
            y: wall.y,
        };
        if tier.is_hit() {
            wall.destroy();
            wall.x = OFF_FIELD_X;
            self.destroyed_count += 1;
        }
        log::debug!(
            "wall {} judged {} at distance {:.1}",
            outcome.wall_id,
            tier.label(),
            (outcome.x - center).abs()
        );
        Some(outcome)
    }

    /// Body overlap with any active wall. MISS-judged walls still count.
    pub fn check_collision(&self, actor_x: f64) -> bool {
        self.walls
            .iter()
            .any(|w| w.overlaps(actor_x, self.rules.body_width))
    }

    /// Destroy every active wall touching the body. Returns how many went.
    pub fn destroy_colliding(&mut self, actor_x: f64) -> usize {
        let body = self.rules.body_width;
        let mut count = 0;
        for wall in self.walls.iter_mut().filter(|w| w.overlaps(actor_x, body)) {
            wall.judged = true;
            wall.destroy();
            count += 1;
        }
        count
    }

    /// Clamp to `(0, max]` and apply to every live wall as well as future ones.
    pub fn set_speed_multiplier(&mut self, multiplier: f64) -> f64 {
        let clamped = if multiplier > 0.0 {
            multiplier.min(self.rules.max_speed_multiplier)
        } else {
            1.0
        };
        self.speed_multiplier = clamped;
        let speed = self.rules.wall_base_speed * clamped;
        for wall in &mut self.walls {
            wall.speed = speed;
        }
        clamped
    }

    pub fn reset(&mut self) {
        self.walls.clear();
        self.next_variant = 0;
        self.speed_multiplier = 1.0;
        self.destroyed_count = 0;
    }
}
