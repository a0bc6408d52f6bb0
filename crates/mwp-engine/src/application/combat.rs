//! Baseline cadence planning: where to move next and which attack to use.
//!
//! Both planners work in window-relative coordinates and are owned by a
//! single control loop, so they need no synchronisation.
//!
//! # Movement
//!
//! Each movement tick picks a pseudo-random point on a ring around the
//! window center (between 40 % and 100 % of `movement_radius`), then clamps
//! it into the fractional combat area.  Because the combat area always
//! contains the center (checked when the configuration is loaded), clamping
//! only ever pulls the point closer to the center, so the result stays
//! within the radius.  After `max_random_moves` random moves the next move
//! goes back to the center exactly and the count starts over.

use std::f64::consts::TAU;

use mwp_core::{FractionalRect, HidKeyCode, MouseButton, Point};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Inner edge of the movement ring as a fraction of the radius.
const MIN_RADIUS_FRACTION: f64 = 0.4;

/// What a planned movement means.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MovePlan {
    Random(Point),
    ReturnToCenter(Point),
}

impl MovePlan {
    pub fn point(self) -> Point {
        match self {
            MovePlan::Random(p) | MovePlan::ReturnToCenter(p) => p,
        }
    }
}

/// Generates movement targets for one window.
#[derive(Debug)]
pub struct MovementPlanner {
    rng: StdRng,
    radius: u32,
    combat_area: FractionalRect,
    max_random_moves: u32,
    random_moves: u32,
}

impl MovementPlanner {
    pub fn new(radius: u32, combat_area: FractionalRect, max_random_moves: u32, rng: StdRng) -> Self {
        Self {
            rng,
            radius,
            combat_area,
            max_random_moves,
            random_moves: 0,
        }
    }

    /// Deterministic planner for tests and benchmarks.
    pub fn seeded(radius: u32, combat_area: FractionalRect, max_random_moves: u32, seed: u64) -> Self {
        Self::new(radius, combat_area, max_random_moves, StdRng::seed_from_u64(seed))
    }

    /// Random moves issued since the last return to center.
    pub fn random_moves(&self) -> u32 {
        self.random_moves
    }

    /// Plans the next move for a client area of `width` x `height`.
    pub fn next(&mut self, width: u32, height: u32) -> MovePlan {
        let center = Point::new((width / 2) as i32, (height / 2) as i32);
        if self.random_moves >= self.max_random_moves {
            self.random_moves = 0;
            return MovePlan::ReturnToCenter(center);
        }
        self.random_moves += 1;

        let area = self.combat_area.resolve(width, height);
        if area.is_empty() || self.radius == 0 {
            return MovePlan::Random(area.clamp(center));
        }

        let radius = f64::from(self.radius);
        let angle = self.rng.random_range(0.0..TAU);
        let distance = self.rng.random_range(radius * MIN_RADIUS_FRACTION..=radius);
        // Truncation toward zero keeps the offset inside the circle.
        let candidate = center.offset(
            (distance * angle.cos()) as i32,
            (distance * angle.sin()) as i32,
        );
        let clamped = area.clamp(candidate);

        let limit = i64::from(self.radius) * i64::from(self.radius);
        if clamped.distance_squared(center) <= limit {
            MovePlan::Random(clamped)
        } else {
            MovePlan::Random(area.clamp(center))
        }
    }

    /// A random point inside the combat area, used to aim mouse attacks.
    pub fn random_combat_point(&mut self, width: u32, height: u32) -> Point {
        let area = self.combat_area.resolve(width, height);
        if area.is_empty() {
            return Point::new((width / 2) as i32, (height / 2) as i32);
        }
        Point::new(
            self.rng.random_range(area.x..=area.right() - 1),
            self.rng.random_range(area.y..=area.bottom() - 1),
        )
    }
}

/// One entry of the attack rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttackBinding {
    /// Press a key.
    Key(HidKeyCode),
    /// Click a mouse button at a random point of the combat area.
    Mouse(MouseButton),
}

impl AttackBinding {
    /// Parses a configured attack name: `MouseLeft`/`MouseRight`/`MouseMiddle`
    /// or any key name accepted by [`HidKeyCode::from_name`].
    pub fn parse(name: &str) -> Result<Self, mwp_core::keymap::UnknownKeyName> {
        match name.trim().to_ascii_lowercase().as_str() {
            "mouseleft" | "lbutton" => Ok(AttackBinding::Mouse(MouseButton::Left)),
            "mouseright" | "rbutton" => Ok(AttackBinding::Mouse(MouseButton::Right)),
            "mousemiddle" | "mbutton" => Ok(AttackBinding::Mouse(MouseButton::Middle)),
            _ => HidKeyCode::from_name(name).map(AttackBinding::Key),
        }
    }
}

/// Cycles through the configured attack bindings in order.
#[derive(Debug, Clone)]
pub struct AttackRotation {
    bindings: Vec<AttackBinding>,
    next: usize,
}

impl AttackRotation {
    pub fn new(bindings: Vec<AttackBinding>) -> Self {
        Self { bindings, next: 0 }
    }

    /// The next binding, wrapping around.  `None` if the list is empty.
    pub fn next_binding(&mut self) -> Option<AttackBinding> {
        let binding = *self.bindings.get(self.next)?;
        self.next = (self.next + 1) % self.bindings.len();
        Some(binding)
    }
}
