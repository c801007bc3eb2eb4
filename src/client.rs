//! `ClientCore`: the per-frame driver.
//!
//! ## Host usage
//!
//! ```no_run
//! use rts_client_core::{ClientConfig, ClientCore};
//!
//! let mut core = ClientCore::new(ClientConfig::default());
//! core.on_transport_open();
//!
//! // Every frame:
//! # let incoming: Vec<String> = Vec::new();
//! for text in incoming {
//!     let _ = core.receive(&text);
//! }
//! core.update(1.0 / 60.0);
//! for json in core.drain_outbound_encoded() {
//!     // transport.send(json)
//! #   let _ = json;
//! }
//! for event in core.drain_events() {
//!     // update HUD, play sounds ...
//! #   let _ = event;
//! }
//! ```
//!
//! ## Frame order
//!
//! 1. Pending snapshots are merged into the mirror, oldest first.
//! 2. If anything was merged: grid occupancy is rebuilt and in-flight
//!    predictions are corrected to the new authoritative positions.
//! 3. Movements advance; arrivals become server commands.
//! 4. Standing gather tasks are re-evaluated.

use crate::error::ProtocolError;
use crate::events::ClientEvent;
use crate::mirror::GameState;
use crate::movement::{ArrivalAction, MovementSimulator};
use crate::orchestrator::{CommandQueue, CommandSink, TaskOrchestrator};
use crate::pathfinding::{Navigator, PathGrid};
use crate::protocol::{ClientMessage, ServerMessage, Snapshot};
use crate::session::{AckOutcome, ReconnectPolicy, Session};
use crate::types::{BuildingType, ClientConfig, EntityId, UnitType, Vec2};
use log::{debug, warn};
use std::collections::VecDeque;

pub struct ClientCore {
    config: ClientConfig,
    session: Session,
    reconnect: ReconnectPolicy,

    state: GameState,
    grid: PathGrid,
    movements: MovementSimulator,
    tasks: TaskOrchestrator,

    pending: VecDeque<Snapshot>,
    outbound: CommandQueue,
    events: VecDeque<ClientEvent>,
}

impl ClientCore {
    pub fn new(config: ClientConfig) -> Self {
        let mut state = GameState::new(config.map_width, config.map_height);
        state.player_id = config.player_id;
        state.player_name = config.player_name.clone();

        Self {
            session: Session::new(config.player_id, config.player_name.clone()),
            reconnect: ReconnectPolicy::new(config.max_reconnect_attempts, config.reconnect_delay),
            grid: PathGrid::new(config.map_width, config.map_height),
            movements: MovementSimulator::new(config.default_speed),
            tasks: TaskOrchestrator::new(&config),
            state,
            pending: VecDeque::new(),
            outbound: CommandQueue::new(),
            events: VecDeque::new(),
            config,
        }
    }

    // -----------------------------------------------------------------------
    // Transport hooks
    // -----------------------------------------------------------------------

    pub fn on_transport_open(&mut self) {
        self.session.on_open(&mut self.outbound);
    }

    /// Connection lost.  Entities, predictions and tasks are discarded; the
    /// next session starts from a fresh snapshot.  Explored tiles are kept.
    pub fn on_transport_closed(&mut self) {
        let dropped = self.outbound.drain().len();
        if dropped > 0 {
            debug!("Dropped {} unsent commands on disconnect", dropped);
        }
        self.session.on_close();
        self.reconnect.on_disconnect();
        self.pending.clear();
        self.state.clear();
        self.movements.clear();
        self.tasks.clear();
        let (w, h) = self.state.map_size();
        self.grid = PathGrid::new(w, h);
        self.events.push_back(ClientEvent::Disconnected);
        if self.reconnect.exhausted() {
            self.events.push_back(ClientEvent::ReconnectExhausted {
                attempts: self.reconnect.attempts(),
            });
        }
    }

    /// Feed one text frame from the server.  Malformed frames are logged,
    /// dropped and reported back.
    pub fn receive(&mut self, text: &str) -> Result<(), ProtocolError> {
        let msg = match ServerMessage::decode(text) {
            Ok(msg) => msg,
            Err(e) => {
                warn!("Dropping server message: {}", e);
                return Err(e);
            }
        };

        match msg {
            ServerMessage::Ack { ok, msg } => {
                if self.session.on_ack(ok, &mut self.outbound) == AckOutcome::Ready {
                    self.reconnect.reset();
                    self.events.push_back(ClientEvent::Connected);
                }
                self.events.push_back(ClientEvent::Ack { ok, msg });
            }
            ServerMessage::Error { error } => {
                warn!("Server error: {}", error);
                self.events.push_back(ClientEvent::ServerError(error));
            }
            ServerMessage::Snapshot(snapshot) => {
                if self.session.is_ready() {
                    self.pending.push_back(snapshot);
                } else {
                    debug!(
                        "Ignoring snapshot #{} before handshake completed",
                        snapshot.tick
                    );
                }
            }
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Frame
    // -----------------------------------------------------------------------

    pub fn update(&mut self, dt: f32) {
        if !self.session.is_joined() && self.reconnect.poll(dt) {
            self.events.push_back(ClientEvent::ReconnectDue {
                attempt: self.reconnect.attempts(),
            });
        }

        let mut merged = false;
        while let Some(snapshot) = self.pending.pop_front() {
            let report = self.state.apply_snapshot(&snapshot);
            debug!(
                "Snapshot #{}: +{} ~{} -{} destroyed {} ({} units, {} buildings, {} resources)",
                report.tick,
                report.created,
                report.updated,
                report.removed,
                report.destroyed,
                self.state.unit_count(),
                self.state.building_count(),
                self.state.resource_count()
            );
            self.events.push_back(ClientEvent::SnapshotApplied {
                tick: report.tick,
                report,
            });
            merged = true;
        }

        if merged {
            let (w, h) = self.state.map_size();
            self.grid.resize(w, h);
            self.grid.update_occupied_tiles(&self.state);
            self.movements.reconcile(&self.state);
        }

        let nav: &dyn Navigator = &self.grid;
        let arrivals = self.movements.tick(dt, Some(nav));
        for arrival in &arrivals {
            self.tasks
                .resolve_arrival(arrival, &self.state, &mut self.outbound);
        }

        self.tasks
            .tick(dt, &self.state, &mut self.movements, &mut self.outbound);
    }

    pub fn drain_outbound(&mut self) -> Vec<ClientMessage> {
        self.outbound.drain()
    }

    /// Outbound commands as JSON text frames.
    pub fn drain_outbound_encoded(&mut self) -> Vec<String> {
        self.outbound
            .drain()
            .into_iter()
            .filter_map(|msg| match msg.encode() {
                Ok(json) => Some(json),
                Err(e) => {
                    warn!("Failed to encode {} command: {}", msg.kind(), e);
                    None
                }
            })
            .collect()
    }

    pub fn drain_events(&mut self) -> Vec<ClientEvent> {
        self.events.drain(..).collect()
    }

    // -----------------------------------------------------------------------
    // Orders
    //
    // Each order supersedes whatever the unit was doing, including a
    // standing gather task.  Orders for units we do not own, or before the
    // handshake completes, are dropped and return false.
    // -----------------------------------------------------------------------

    fn can_order(&self, unit_id: EntityId) -> bool {
        if !self.session.is_ready() {
            debug!("Order for unit {} ignored: not in game", unit_id);
            return false;
        }
        self.state.unit(unit_id).is_some()
    }

    pub fn order_move(&mut self, unit_id: EntityId, x: f32, y: f32) -> bool {
        if !self.can_order(unit_id) {
            return false;
        }
        self.tasks.forget(unit_id);
        self.tasks.approach(
            unit_id,
            Vec2::new(x, y),
            self.config.move_arrival_distance,
            ArrivalAction::MoveOnly,
            &self.state,
            &mut self.movements,
            &mut self.outbound,
        )
    }

    pub fn order_attack(&mut self, unit_id: EntityId, target_id: EntityId) -> bool {
        let target = self
            .state
            .any_unit(target_id)
            .map(|u| u.position())
            .or_else(|| self.state.any_building(target_id).map(|b| b.position()));
        let Some(target) = target else {
            return false;
        };
        self.interact(unit_id, target, ArrivalAction::Attack(target_id))
    }

    /// Start a standing gather intent.
    pub fn order_gather(&mut self, unit_id: EntityId, resource_id: EntityId) -> bool {
        if !self.can_order(unit_id) {
            return false;
        }
        self.tasks.register_gather(
            unit_id,
            resource_id,
            &self.state,
            &mut self.movements,
            &mut self.outbound,
        )
    }

    pub fn order_hunt(&mut self, unit_id: EntityId, animal_id: EntityId) -> bool {
        let Some(target) = self.state.any_unit(animal_id).map(|u| u.position()) else {
            return false;
        };
        self.interact(unit_id, target, ArrivalAction::Hunt(animal_id))
    }

    pub fn order_deposit(&mut self, unit_id: EntityId, building_id: EntityId) -> bool {
        let Some(target) = self.state.building(building_id).map(|b| b.position()) else {
            return false;
        };
        self.interact(unit_id, target, ArrivalAction::Deposit(building_id))
    }

    pub fn order_build(
        &mut self,
        unit_id: EntityId,
        building_type: BuildingType,
        x: f32,
        y: f32,
    ) -> bool {
        self.interact(
            unit_id,
            Vec2::new(x, y),
            ArrivalAction::Build {
                building_type,
                x,
                y,
            },
        )
    }

    pub fn order_train(&mut self, building_id: EntityId, unit_type: UnitType) -> bool {
        if !self.session.is_ready() || self.state.building(building_id).is_none() {
            return false;
        }
        self.outbound.send(ClientMessage::Train {
            building_id,
            unit_type,
        });
        true
    }

    /// Drop any gather intent and predicted movement for the unit.
    pub fn stop(&mut self, unit_id: EntityId) {
        self.tasks.cancel(unit_id, &mut self.movements);
        self.movements.cancel(unit_id);
    }

    fn interact(&mut self, unit_id: EntityId, target: Vec2, action: ArrivalAction) -> bool {
        if !self.can_order(unit_id) {
            return false;
        }
        self.tasks.forget(unit_id);
        self.tasks.approach(
            unit_id,
            target,
            self.config.interaction_range,
            action,
            &self.state,
            &mut self.movements,
            &mut self.outbound,
        )
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn reconnect(&self) -> &ReconnectPolicy {
        &self.reconnect
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    /// Mutable mirror access for the presentation layer's selection.
    pub fn state_mut(&mut self) -> &mut GameState {
        &mut self.state
    }

    pub fn grid(&self) -> &PathGrid {
        &self.grid
    }

    pub fn movements(&self) -> &MovementSimulator {
        &self.movements
    }

    pub fn tasks(&self) -> &TaskOrchestrator {
        &self.tasks
    }

    /// Where to draw a unit: predicted position if it is moving, otherwise
    /// the mirror's.
    pub fn unit_position(&self, unit_id: EntityId) -> Option<Vec2> {
        self.movements.position(unit_id, &self.state)
    }
}
