//! RTS client core
//!
//! Client-side state reconciliation and predicted movement for a
//! server-authoritative real-time strategy game.
//!
//! ## Architecture
//!
//! ```text
//! ClientCore  (client.rs)                ← per-frame driver
//!   ├── Session / ReconnectPolicy  (session.rs)
//!   ├── GameState  (mirror.rs)           ← snapshot merger, only writer
//!   │     └── FogGrid  (fog.rs)
//!   ├── PathGrid  (pathfinding.rs)       ← 8-connected A*, building occupancy
//!   ├── MovementSimulator  (movement.rs) ← predicted motion between snapshots
//!   └── TaskOrchestrator  (orchestrator.rs) ← gather intents, arrival commands
//! ```
//!
//! The server is always right.  The client only predicts positions between
//! snapshots and re-issues intents; every snapshot resets the mirror and
//! corrects the predictions.

// Engine-independent core; always available.
pub mod client;
pub mod error;
pub mod events;
pub mod fog;
pub mod mirror;
pub mod movement;
pub mod orchestrator;
pub mod pathfinding;
pub mod protocol;
pub mod session;
pub mod settings;
pub mod types;

pub use client::ClientCore;
pub use error::{ConfigError, ProtocolError};
pub use events::ClientEvent;
pub use mirror::{GameState, MergeReport, Relation};
pub use movement::{Arrival, ArrivalAction, Movement, MovementSimulator, Step};
pub use orchestrator::{CommandQueue, CommandSink, GatherTask, TaskOrchestrator};
pub use pathfinding::{Navigator, PathGrid};
pub use protocol::{ClientMessage, EventKind, GameEvent, ServerMessage, Snapshot};
pub use session::{ConnectionState, ReconnectPolicy, Session};
pub use types::{
    Building, BuildingState, BuildingType, ClientConfig, EntityId, PlayerResources, Resource,
    ResourceType, TileCoord, TrainingQueue, Unit, UnitType, Vec2,
};
