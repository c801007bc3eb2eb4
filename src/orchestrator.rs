//! Standing unit intents and arrival resolution.
//!
//! A gather task keeps a villager working a resource node across many
//! server round-trips: it walks the unit back into range when it drifts and
//! re-sends `gather` whenever the cooldown allows.  The cooldown only
//! throttles how often the command goes out; the server decides what the
//! command actually does.
//!
//! Tasks never surface errors.  When the unit or its resource goes away
//! the task is dropped on the next tick.

use crate::mirror::GameState;
use crate::movement::{Arrival, ArrivalAction, MovementSimulator};
use crate::protocol::ClientMessage;
use crate::types::{ClientConfig, EntityId, Vec2};
use log::debug;
use std::collections::{BTreeMap, VecDeque};

// ---------------------------------------------------------------------------
// Command channel
// ---------------------------------------------------------------------------

/// Outbound side of the command channel.  Intents are fire-and-forget.
pub trait CommandSink {
    fn send(&mut self, msg: ClientMessage);
}

impl CommandSink for Vec<ClientMessage> {
    fn send(&mut self, msg: ClientMessage) {
        self.push(msg);
    }
}

/// Buffered sink drained by the transport once per frame.
#[derive(Debug, Default, Clone)]
pub struct CommandQueue {
    pending: VecDeque<ClientMessage>,
}

impl CommandQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn drain(&mut self) -> Vec<ClientMessage> {
        self.pending.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

impl CommandSink for CommandQueue {
    fn send(&mut self, msg: ClientMessage) {
        debug!("Queueing {} command", msg.kind());
        self.pending.push_back(msg);
    }
}

/// Server command that fulfils `action` for `unit_id`.
pub fn command_for(unit_id: EntityId, action: ArrivalAction) -> Option<ClientMessage> {
    match action {
        ArrivalAction::MoveOnly => None,
        ArrivalAction::Attack(target_id) => Some(ClientMessage::Attack { unit_id, target_id }),
        ArrivalAction::Gather(resource_id) => Some(ClientMessage::Gather {
            unit_id,
            resource_id,
        }),
        ArrivalAction::Hunt(animal_id) => Some(ClientMessage::Hunt { unit_id, animal_id }),
        ArrivalAction::Deposit(building_id) => Some(ClientMessage::Deposit {
            unit_id,
            building_id,
        }),
        ArrivalAction::Build {
            building_type,
            x,
            y,
        } => Some(ClientMessage::Build {
            unit_id,
            building_type,
            x,
            y,
        }),
    }
}

/// Ask the server to walk the unit to `target` and predict the walk
/// locally; `action` fires when it gets within `range`.
#[allow(clippy::too_many_arguments)]
fn walk(
    unit_id: EntityId,
    from: Vec2,
    target: Vec2,
    range: f32,
    speed: f32,
    action: ArrivalAction,
    movements: &mut MovementSimulator,
    sink: &mut dyn CommandSink,
) {
    sink.send(ClientMessage::Move {
        unit_id,
        x: target.x,
        y: target.y,
    });
    movements.start(unit_id, from, target, range, speed, action);
}

// ---------------------------------------------------------------------------
// Gather task
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct GatherTask {
    pub resource_id: EntityId,
    pub target: Vec2,
    pub range: f32,
    pub cooldown: f32,
    /// Seconds until the next send is allowed.
    pub remaining: f32,
    pub last_amount: i32,
    /// Set when an arrival sent a command earlier in the current frame.
    /// That frame's `dt` was spent walking, before the send, so the tick
    /// that follows must not charge it to the fresh cooldown.
    sent_on_arrival: bool,
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct TaskOrchestrator {
    gather_range: f32,
    gather_cooldown: f32,
    range_epsilon: f32,
    tasks: BTreeMap<EntityId, GatherTask>,
}

impl TaskOrchestrator {
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            gather_range: config.gather_range,
            gather_cooldown: config.gather_cooldown,
            range_epsilon: config.range_epsilon,
            tasks: BTreeMap::new(),
        }
    }

    pub fn task(&self, unit_id: EntityId) -> Option<&GatherTask> {
        self.tasks.get(&unit_id)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Start (or replace) the standing gather intent for `unit_id`.
    /// Returns false and registers nothing when the unit is not ours or the
    /// resource is missing, hidden or depleted.
    pub fn register_gather(
        &mut self,
        unit_id: EntityId,
        resource_id: EntityId,
        state: &GameState,
        movements: &mut MovementSimulator,
        sink: &mut dyn CommandSink,
    ) -> bool {
        let Some(unit) = state.unit(unit_id) else {
            debug!("Gather ignored: unit {} is not ours", unit_id);
            return false;
        };
        let resource = match state.resource(resource_id) {
            Some(r) if r.visible && !r.is_depleted() => r,
            _ => {
                debug!("Gather ignored: resource {} is not a valid target", resource_id);
                return false;
            }
        };

        let mut task = GatherTask {
            resource_id,
            target: resource.position(),
            range: self.gather_range,
            cooldown: self.gather_cooldown,
            remaining: 0.0,
            last_amount: resource.amount,
            sent_on_arrival: false,
        };

        let pos = movements
            .position(unit_id, state)
            .unwrap_or_else(|| unit.position());
        if pos.distance(task.target) <= task.range {
            movements.cancel(unit_id);
            sink.send(ClientMessage::Gather {
                unit_id,
                resource_id,
            });
            task.remaining = task.cooldown;
        } else {
            walk(
                unit_id,
                pos,
                task.target,
                task.range,
                unit.speed,
                ArrivalAction::Gather(resource_id),
                movements,
                sink,
            );
        }

        debug!("Unit {} now gathering resource {}", unit_id, resource_id);
        self.tasks.insert(unit_id, task);
        true
    }

    /// Drop the standing intent for `unit_id` and stop its movement.
    pub fn cancel(&mut self, unit_id: EntityId, movements: &mut MovementSimulator) -> bool {
        let had = self.tasks.remove(&unit_id).is_some();
        if had {
            movements.cancel(unit_id);
        }
        had
    }

    /// Forget the intent without touching movement.  Used when another
    /// order supersedes it.
    pub fn forget(&mut self, unit_id: EntityId) -> bool {
        self.tasks.remove(&unit_id).is_some()
    }

    pub fn clear(&mut self) {
        self.tasks.clear();
    }

    /// Re-evaluate every task once.
    pub fn tick(
        &mut self,
        dt: f32,
        state: &GameState,
        movements: &mut MovementSimulator,
        sink: &mut dyn CommandSink,
    ) {
        let mut lapsed = Vec::new();

        for (&unit_id, task) in self.tasks.iter_mut() {
            if task.sent_on_arrival {
                task.sent_on_arrival = false;
            } else {
                task.remaining = (task.remaining - dt).max(0.0);
            }

            let Some(unit) = state.unit(unit_id) else {
                lapsed.push(unit_id);
                continue;
            };
            let resource = match state.resource(task.resource_id) {
                Some(r) if r.visible && !r.is_depleted() => r,
                _ => {
                    lapsed.push(unit_id);
                    continue;
                }
            };

            if resource.amount != task.last_amount {
                task.last_amount = resource.amount;
                task.remaining = 0.0;
            }
            task.target = resource.position();

            let pos = movements
                .position(unit_id, state)
                .unwrap_or_else(|| unit.position());
            if pos.distance(task.target) > task.range + self.range_epsilon {
                if !movements.is_moving(unit_id) {
                    walk(
                        unit_id,
                        pos,
                        task.target,
                        task.range,
                        unit.speed,
                        ArrivalAction::Gather(task.resource_id),
                        movements,
                        sink,
                    );
                }
                continue;
            }

            if task.remaining <= 0.0 {
                sink.send(ClientMessage::Gather {
                    unit_id,
                    resource_id: task.resource_id,
                });
                task.remaining = task.cooldown;
            }
        }

        for unit_id in lapsed {
            if let Some(task) = self.tasks.remove(&unit_id) {
                debug!(
                    "Gather task for unit {} on resource {} lapsed",
                    unit_id, task.resource_id
                );
                let heading_there = movements
                    .movement(unit_id)
                    .map(|m| m.action() == ArrivalAction::Gather(task.resource_id))
                    .unwrap_or(false);
                if heading_there {
                    movements.cancel(unit_id);
                }
            }
        }
    }

    /// Turn an arrival into the server command it stands for, provided the
    /// target is still there.
    pub fn resolve_arrival(
        &mut self,
        arrival: &Arrival,
        state: &GameState,
        sink: &mut dyn CommandSink,
    ) {
        let unit_id = arrival.unit_id;
        if state.unit(unit_id).is_none() {
            return;
        }

        let still_valid = match arrival.action {
            ArrivalAction::MoveOnly => false,
            ArrivalAction::Gather(resource_id) => {
                let Some(task) = self.tasks.get_mut(&unit_id) else {
                    return;
                };
                let valid = task.resource_id == resource_id
                    && state
                        .resource(resource_id)
                        .map(|r| r.visible && !r.is_depleted())
                        .unwrap_or(false);
                if valid && task.remaining <= 0.0 {
                    task.remaining = task.cooldown;
                    task.sent_on_arrival = true;
                    true
                } else {
                    false
                }
            }
            ArrivalAction::Attack(target) => {
                state.any_unit(target).is_some() || state.any_building(target).is_some()
            }
            ArrivalAction::Hunt(animal) => state.any_unit(animal).is_some(),
            ArrivalAction::Deposit(building) => state.building(building).is_some(),
            ArrivalAction::Build { .. } => true,
        };

        if still_valid {
            if let Some(msg) = command_for(unit_id, arrival.action) {
                sink.send(msg);
            }
        }
    }

    /// Send the command for `action` now if the unit is already within
    /// `range` of `target`, otherwise walk it there first.
    #[allow(clippy::too_many_arguments)]
    pub fn approach(
        &mut self,
        unit_id: EntityId,
        target: Vec2,
        range: f32,
        action: ArrivalAction,
        state: &GameState,
        movements: &mut MovementSimulator,
        sink: &mut dyn CommandSink,
    ) -> bool {
        let Some(unit) = state.unit(unit_id) else {
            debug!("Order ignored: unit {} is not ours", unit_id);
            return false;
        };
        let pos = movements
            .position(unit_id, state)
            .unwrap_or_else(|| unit.position());

        if pos.distance(target) <= range {
            movements.cancel(unit_id);
            if let Some(msg) = command_for(unit_id, action) {
                sink.send(msg);
            }
        } else {
            walk(unit_id, pos, target, range, unit.speed, action, movements, sink);
        }
        true
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Snapshot;
    use crate::types::{Resource, ResourceType, Unit, UnitType};

    fn villager(id: EntityId, x: f32, y: f32) -> Unit {
        Unit {
            id,
            owner: 1,
            kind: UnitType::Villager,
            x,
            y,
            hp: 25,
            max_hp: 25,
            speed: 2.0,
            carrying: 0,
            carry_type: ResourceType::Wood,
            visible: true,
        }
    }

    fn gold(id: EntityId, x: f32, y: f32, amount: i32) -> Resource {
        Resource {
            id,
            kind: ResourceType::Gold,
            amount,
            x,
            y,
            visible: true,
        }
    }

    fn world(units: Vec<Unit>, resources: Vec<Resource>) -> GameState {
        let mut gs = GameState::default();
        let mut snap = Snapshot::new(1);
        snap.units = units;
        snap.resources = resources;
        gs.apply_snapshot(&snap);
        gs
    }

    #[test]
    fn in_range_registration_sends_immediately() {
        let gs = world(vec![villager(5, 10.0, 10.0)], vec![gold(9, 11.0, 10.0, 50)]);
        let mut orch = TaskOrchestrator::new(&ClientConfig::default());
        let mut sim = MovementSimulator::new(2.0);
        let mut sent = Vec::new();

        assert!(orch.register_gather(5, 9, &gs, &mut sim, &mut sent));
        assert_eq!(
            sent,
            vec![ClientMessage::Gather {
                unit_id: 5,
                resource_id: 9
            }]
        );
        assert!(!sim.is_moving(5));

        // Frames after the order count against the cooldown in full.
        orch.tick(0.3, &gs, &mut sim, &mut sent);
        assert_eq!(sent.len(), 1);
        orch.tick(0.3, &gs, &mut sim, &mut sent);
        assert_eq!(sent.len(), 2);
    }

    #[test]
    fn arrival_send_is_not_charged_the_walking_frame() {
        let mut gs = world(vec![villager(5, 10.0, 10.0)], vec![gold(9, 12.0, 10.0, 50)]);
        let mut orch = TaskOrchestrator::new(&ClientConfig::default());
        let mut sim = MovementSimulator::new(2.0);
        let mut sent = Vec::new();
        orch.register_gather(5, 9, &gs, &mut sim, &mut sent);
        assert_eq!(sent.len(), 1); // move

        let mut snap = Snapshot::new(2);
        snap.units = vec![villager(5, 11.0, 10.0)];
        snap.resources = vec![gold(9, 12.0, 10.0, 50)];
        gs.apply_snapshot(&snap);
        sim.cancel(5);

        let arrival = Arrival {
            unit_id: 5,
            position: Vec2::new(11.0, 10.0),
            action: ArrivalAction::Gather(9),
        };
        orch.resolve_arrival(&arrival, &gs, &mut sent);
        assert_eq!(sent.len(), 2);

        // Same frame: the walk used this dt, the cooldown starts after it.
        orch.tick(0.3, &gs, &mut sim, &mut sent);
        assert_eq!(orch.task(5).map(|t| t.remaining), Some(0.6));
        orch.tick(0.3, &gs, &mut sim, &mut sent);
        assert_eq!(sent.len(), 2);
        orch.tick(0.3, &gs, &mut sim, &mut sent);
        assert_eq!(sent.len(), 3);
    }

    #[test]
    fn invalid_targets_register_nothing() {
        let gs = world(vec![villager(5, 0.0, 0.0)], vec![gold(9, 1.0, 0.0, 0)]);
        let mut orch = TaskOrchestrator::new(&ClientConfig::default());
        let mut sim = MovementSimulator::new(2.0);
        let mut sent = Vec::new();

        assert!(!orch.register_gather(5, 9, &gs, &mut sim, &mut sent));
        assert!(!orch.register_gather(6, 9, &gs, &mut sim, &mut sent));
        assert!(orch.is_empty());
        assert!(sent.is_empty());
    }

    #[test]
    fn depleted_resource_lapses_within_one_tick() {
        let mut gs = world(vec![villager(5, 10.0, 10.0)], vec![gold(9, 11.0, 10.0, 50)]);
        let mut orch = TaskOrchestrator::new(&ClientConfig::default());
        let mut sim = MovementSimulator::new(2.0);
        let mut sent = Vec::new();
        orch.register_gather(5, 9, &gs, &mut sim, &mut sent);

        let mut snap = Snapshot::new(2);
        snap.units = vec![villager(5, 10.0, 10.0)];
        snap.resources = vec![gold(9, 11.0, 10.0, 0)];
        gs.apply_snapshot(&snap);

        orch.tick(1.0, &gs, &mut sim, &mut sent);
        assert!(orch.task(5).is_none());
        orch.tick(1.0, &gs, &mut sim, &mut sent);
        assert_eq!(sent.len(), 1);
    }

    #[test]
    fn amount_change_lifts_cooldown() {
        let mut gs = world(vec![villager(5, 10.0, 10.0)], vec![gold(9, 11.0, 10.0, 50)]);
        let mut orch = TaskOrchestrator::new(&ClientConfig::default());
        let mut sim = MovementSimulator::new(2.0);
        let mut sent = Vec::new();
        orch.register_gather(5, 9, &gs, &mut sim, &mut sent);
        orch.tick(0.1, &gs, &mut sim, &mut sent);
        assert_eq!(sent.len(), 1);

        let mut snap = Snapshot::new(2);
        snap.units = vec![villager(5, 10.0, 10.0)];
        snap.resources = vec![gold(9, 11.0, 10.0, 45)];
        gs.apply_snapshot(&snap);

        orch.tick(0.1, &gs, &mut sim, &mut sent);
        assert_eq!(sent.len(), 2);
        assert_eq!(orch.task(5).map(|t| t.last_amount), Some(45));
    }

    #[test]
    fn arrival_for_missing_target_sends_nothing() {
        let gs = world(vec![villager(5, 0.0, 0.0)], Vec::new());
        let mut orch = TaskOrchestrator::new(&ClientConfig::default());
        let mut sent = Vec::new();
        let arrival = Arrival {
            unit_id: 5,
            position: Vec2::zero(),
            action: ArrivalAction::Attack(77),
        };
        orch.resolve_arrival(&arrival, &gs, &mut sent);
        assert!(sent.is_empty());

        let build = Arrival {
            action: ArrivalAction::Build {
                building_type: crate::types::BuildingType::House,
                x: 3.0,
                y: 4.0,
            },
            ..arrival
        };
        orch.resolve_arrival(&build, &gs, &mut sent);
        assert_eq!(sent.len(), 1);
    }

    #[test]
    fn command_queue_drains_in_order() {
        let mut q = CommandQueue::new();
        q.send(ClientMessage::Ready { ready: true });
        q.send(ClientMessage::Move {
            unit_id: 1,
            x: 2.0,
            y: 3.0,
        });
        assert_eq!(q.len(), 2);
        let out = q.drain();
        assert_eq!(out[0].kind(), "ready");
        assert_eq!(out[1].kind(), "move");
        assert!(q.is_empty());
    }
}
