//! Client-side predicted movement.
//!
//! Between snapshots the client walks units toward their targets itself so
//! motion looks continuous.  Predictions are corrected by
//! [`MovementSimulator::reconcile`] whenever a new snapshot lands; the
//! server position always wins.

use crate::mirror::GameState;
use crate::pathfinding::Navigator;
use crate::types::{BuildingType, EntityId, Vec2};
use log::debug;
use std::collections::BTreeMap;

/// What to do once a unit gets within range of its target.  Resolved by
/// the task orchestrator, which turns it into a server command.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ArrivalAction {
    MoveOnly,
    Attack(EntityId),
    Gather(EntityId),
    Hunt(EntityId),
    Deposit(EntityId),
    Build {
        building_type: BuildingType,
        x: f32,
        y: f32,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MovementState {
    Active,
    Arrived,
    Cancelled,
}

/// Outcome of one [`Movement::update`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Step {
    /// Movement is no longer active; nothing happened.
    Idle,
    Moving,
    /// Reached range this update.  Reported exactly once.
    Arrived(ArrivalAction),
}

// ---------------------------------------------------------------------------
// Movement
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Movement {
    unit_id: EntityId,
    current: Vec2,
    target: Vec2,
    required_distance: f32,
    speed: f32,
    action: ArrivalAction,
    state: MovementState,
}

impl Movement {
    pub fn new(
        unit_id: EntityId,
        start: Vec2,
        target: Vec2,
        required_distance: f32,
        speed: f32,
        action: ArrivalAction,
    ) -> Self {
        Self {
            unit_id,
            current: start,
            target,
            required_distance: required_distance.max(0.0),
            speed: speed.max(0.0),
            action,
            state: MovementState::Active,
        }
    }

    pub fn unit_id(&self) -> EntityId {
        self.unit_id
    }

    pub fn current(&self) -> Vec2 {
        self.current
    }

    pub fn target(&self) -> Vec2 {
        self.target
    }

    pub fn required_distance(&self) -> f32 {
        self.required_distance
    }

    pub fn speed(&self) -> f32 {
        self.speed
    }

    pub fn action(&self) -> ArrivalAction {
        self.action
    }

    pub fn state(&self) -> MovementState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == MovementState::Active
    }

    /// Overwrite the predicted position with an authoritative one.
    pub fn correct(&mut self, position: Vec2) {
        self.current = position;
    }

    /// Advance by `dt` seconds.  Without a navigator, or when it has no
    /// useful waypoint, the unit heads straight for the target.
    pub fn update(&mut self, dt: f32, nav: Option<&dyn Navigator>) -> Step {
        if self.state != MovementState::Active {
            return Step::Idle;
        }

        if self.current.distance(self.target) <= self.required_distance {
            self.state = MovementState::Arrived;
            return Step::Arrived(self.action);
        }

        let waypoint = nav
            .and_then(|n| n.next_waypoint(self.current, self.target))
            .filter(|w| *w != self.current)
            .unwrap_or(self.target);

        let to_waypoint = waypoint - self.current;
        let remaining = to_waypoint.length();
        let step = self.speed * dt.max(0.0);

        self.current = if step >= remaining {
            waypoint
        } else {
            self.current + to_waypoint.normalized() * step
        };

        Step::Moving
    }

    pub fn cancel(&mut self) {
        if self.state == MovementState::Active {
            self.state = MovementState::Cancelled;
        }
    }
}

// ---------------------------------------------------------------------------
// Simulator
// ---------------------------------------------------------------------------

/// A movement that reached range during [`MovementSimulator::tick`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Arrival {
    pub unit_id: EntityId,
    pub position: Vec2,
    pub action: ArrivalAction,
}

/// All in-flight movements, at most one per unit.
#[derive(Debug, Clone)]
pub struct MovementSimulator {
    default_speed: f32,
    movements: BTreeMap<EntityId, Movement>,
    /// Final predicted positions of units that arrived since the last
    /// reconcile.
    settled: BTreeMap<EntityId, Vec2>,
}

impl MovementSimulator {
    pub fn new(default_speed: f32) -> Self {
        Self {
            default_speed,
            movements: BTreeMap::new(),
            settled: BTreeMap::new(),
        }
    }

    /// Start moving `unit_id`, replacing any movement it already had.
    /// A non-positive `speed` uses the default speed.
    pub fn start(
        &mut self,
        unit_id: EntityId,
        from: Vec2,
        target: Vec2,
        required_distance: f32,
        speed: f32,
        action: ArrivalAction,
    ) {
        let speed = if speed > 0.0 { speed } else { self.default_speed };
        if let Some(mut prev) = self.movements.remove(&unit_id) {
            prev.cancel();
        }
        self.settled.remove(&unit_id);
        debug!(
            "Unit {} moving {} -> {} (range {:.2}, {:?})",
            unit_id, from, target, required_distance, action
        );
        self.movements.insert(
            unit_id,
            Movement::new(unit_id, from, target, required_distance, speed, action),
        );
    }

    pub fn cancel(&mut self, unit_id: EntityId) -> bool {
        match self.movements.remove(&unit_id) {
            Some(mut m) => {
                m.cancel();
                true
            }
            None => false,
        }
    }

    /// Advance every movement and return the ones that arrived, in unit-id
    /// order.  Finished movements are dropped.
    pub fn tick(&mut self, dt: f32, nav: Option<&dyn Navigator>) -> Vec<Arrival> {
        let mut arrivals = Vec::new();
        for m in self.movements.values_mut() {
            if let Step::Arrived(action) = m.update(dt, nav) {
                arrivals.push(Arrival {
                    unit_id: m.unit_id,
                    position: m.current,
                    action,
                });
            }
        }
        for a in &arrivals {
            self.settled.insert(a.unit_id, a.position);
        }
        self.movements.retain(|_, m| m.is_active());
        arrivals
    }

    /// Snap predictions to the mirror after a snapshot.  Movements whose
    /// unit is gone are dropped.
    pub fn reconcile(&mut self, state: &GameState) {
        self.settled.clear();
        self.movements.retain(|id, m| match state.unit(*id) {
            Some(unit) => {
                m.correct(unit.position());
                true
            }
            None => {
                debug!("Dropping movement for vanished unit {}", id);
                false
            }
        });
    }

    pub fn movement(&self, unit_id: EntityId) -> Option<&Movement> {
        self.movements.get(&unit_id)
    }

    pub fn is_moving(&self, unit_id: EntityId) -> bool {
        self.movements.contains_key(&unit_id)
    }

    pub fn predicted_position(&self, unit_id: EntityId) -> Option<Vec2> {
        self.movements
            .get(&unit_id)
            .map(|m| m.current)
            .or_else(|| self.settled.get(&unit_id).copied())
    }

    /// Best known position: in-flight prediction, then settled arrival
    /// point, then the mirror.
    pub fn position(&self, unit_id: EntityId, state: &GameState) -> Option<Vec2> {
        self.predicted_position(unit_id)
            .or_else(|| state.any_unit(unit_id).map(|u| u.position()))
    }

    pub fn len(&self) -> usize {
        self.movements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.movements.is_empty()
    }

    pub fn clear(&mut self) {
        self.movements.clear();
        self.settled.clear();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
