//! Client ⇄ server wire protocol.
//!
//! Every message is a JSON object tagged by a `type` field with camelCase
//! keys.
//!
//! | Direction        | `type` values                                              |
//! |------------------|------------------------------------------------------------|
//! | client → server  | join, ready, move, attack, gather, build, train, deposit, hunt |
//! | server → client  | ack, error, snapshot                                       |
//!
//! ## Design rules
//!
//! 1. Client messages are fire-and-forget intents; the server never replies
//!    to them individually.
//! 2. Every list in a snapshot defaults to empty when absent.
//! 3. Snapshot list entries are decoded one by one: a malformed entity is
//!    dropped with a warning and never takes the rest of the snapshot down.

use crate::error::ProtocolError;
use crate::types::{
    Building, BuildingType, EntityId, PlayerResources, Resource, TileCoord, TrainingQueue, Unit,
    UnitType,
};
use log::warn;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};

// ---------------------------------------------------------------------------
// Client → server
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientMessage {
    #[serde(rename_all = "camelCase")]
    Join { player_id: i32, name: String },
    Ready { ready: bool },
    #[serde(rename_all = "camelCase")]
    Move { unit_id: EntityId, x: f32, y: f32 },
    #[serde(rename_all = "camelCase")]
    Attack { unit_id: EntityId, target_id: EntityId },
    #[serde(rename_all = "camelCase")]
    Gather {
        unit_id: EntityId,
        resource_id: EntityId,
    },
    #[serde(rename_all = "camelCase")]
    Build {
        unit_id: EntityId,
        building_type: BuildingType,
        x: f32,
        y: f32,
    },
    #[serde(rename_all = "camelCase")]
    Train {
        building_id: EntityId,
        unit_type: UnitType,
    },
    #[serde(rename_all = "camelCase")]
    Deposit {
        unit_id: EntityId,
        building_id: EntityId,
    },
    #[serde(rename_all = "camelCase")]
    Hunt {
        unit_id: EntityId,
        animal_id: EntityId,
    },
}

impl ClientMessage {
    pub fn encode(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Wire `type` tag, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            ClientMessage::Join { .. } => "join",
            ClientMessage::Ready { .. } => "ready",
            ClientMessage::Move { .. } => "move",
            ClientMessage::Attack { .. } => "attack",
            ClientMessage::Gather { .. } => "gather",
            ClientMessage::Build { .. } => "build",
            ClientMessage::Train { .. } => "train",
            ClientMessage::Deposit { .. } => "deposit",
            ClientMessage::Hunt { .. } => "hunt",
        }
    }
}

// ---------------------------------------------------------------------------
// Server → client
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerMessage {
    /// Acknowledges the join / ready handshake steps.
    Ack {
        ok: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        msg: Option<String>,
    },
    /// Rejected command or other server-side complaint.  Never fatal.
    Error { error: String },
    Snapshot(Snapshot),
}

impl ServerMessage {
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        let value: serde_json::Value = serde_json::from_str(text)?;
        let kind = value
            .get("type")
            .and_then(serde_json::Value::as_str)
            .ok_or(ProtocolError::MissingType)?;

        match kind {
            "ack" | "error" | "snapshot" => Ok(serde_json::from_value(value)?),
            other => Err(ProtocolError::UnknownType(other.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

fn default_map_extent() -> i32 {
    256
}

/// Full authoritative state for one server tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub tick: u64,
    #[serde(default = "default_map_extent")]
    pub map_width: i32,
    #[serde(default = "default_map_extent")]
    pub map_height: i32,

    /// Own units (always visible to their owner).
    #[serde(default, deserialize_with = "lenient_list")]
    pub units: Vec<Unit>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub buildings: Vec<Building>,

    /// Enemy entities currently inside this player's vision.
    #[serde(default, deserialize_with = "lenient_list")]
    pub enemy_units_in_view: Vec<Unit>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub enemy_buildings_in_view: Vec<Building>,

    #[serde(default, deserialize_with = "lenient_list")]
    pub resources: Vec<Resource>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub events: Vec<GameEvent>,

    #[serde(default)]
    pub player_resources: PlayerResources,

    #[serde(default, deserialize_with = "lenient_list")]
    pub visible_tiles: Vec<TileCoord>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub seen_tiles: Vec<TileCoord>,

    #[serde(default, deserialize_with = "lenient_list")]
    pub training_queues: Vec<TrainingQueue>,
}

impl Snapshot {
    /// Empty snapshot for `tick` on a default-sized map.
    pub fn new(tick: u64) -> Self {
        Self {
            tick,
            map_width: default_map_extent(),
            map_height: default_map_extent(),
            units: Vec::new(),
            buildings: Vec::new(),
            enemy_units_in_view: Vec::new(),
            enemy_buildings_in_view: Vec::new(),
            resources: Vec::new(),
            events: Vec::new(),
            player_resources: PlayerResources::default(),
            visible_tiles: Vec::new(),
            seen_tiles: Vec::new(),
            training_queues: Vec::new(),
        }
    }
}

/// Decode a list entry by entry, dropping (and logging) entries that fail.
/// A `null` list is treated as empty.
fn lenient_list<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let raw: Option<Vec<serde_json::Value>> = Option::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .filter_map(|entry| match serde_json::from_value::<T>(entry) {
            Ok(item) => Some(item),
            Err(e) => {
                warn!("Dropping malformed snapshot entry: {}", e);
                None
            }
        })
        .collect())
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Out-of-band change record carried inside a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "i32", into = "i32")]
pub enum EventKind {
    Create,
    Update,
    Destroy,
    Hidden,
    FogUpdate,
    QueueProgress,
    ResourceUpdate,
    /// The server's event buffer overflowed; some events were lost.
    Overflow,
    Unknown(i32),
}

impl From<i32> for EventKind {
    fn from(code: i32) -> Self {
        match code {
            0 => EventKind::Create,
            1 => EventKind::Update,
            2 => EventKind::Destroy,
            3 => EventKind::Hidden,
            4 => EventKind::FogUpdate,
            5 => EventKind::QueueProgress,
            6 => EventKind::ResourceUpdate,
            999 => EventKind::Overflow,
            other => EventKind::Unknown(other),
        }
    }
}

impl From<EventKind> for i32 {
    fn from(kind: EventKind) -> i32 {
        match kind {
            EventKind::Create => 0,
            EventKind::Update => 1,
            EventKind::Destroy => 2,
            EventKind::Hidden => 3,
            EventKind::FogUpdate => 4,
            EventKind::QueueProgress => 5,
            EventKind::ResourceUpdate => 6,
            EventKind::Overflow => 999,
            EventKind::Unknown(code) => code,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameEvent {
    #[serde(rename = "type")]
    pub kind: EventKind,
    #[serde(default)]
    pub tick: u64,
    pub entity_id: EntityId,
    /// Informational payload; only `amount` on ResourceUpdate is consumed here.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Map<String, serde_json::Value>>,
}

impl GameEvent {
    pub fn new(kind: EventKind, entity_id: EntityId) -> Self {
        Self {
            kind,
            tick: 0,
            entity_id,
            data: None,
        }
    }

    /// Integer `amount` from the payload, if present.  Whole-number floats
    /// are accepted since some encoders emit `50.0`.
    pub fn amount(&self) -> Option<i32> {
        let value = self.data.as_ref()?.get("amount")?;
        if let Some(n) = value.as_i64() {
            return i32::try_from(n).ok();
        }
        let f = value.as_f64()?;
        (f.fract() == 0.0 && f.abs() <= i32::MAX as f64).then_some(f as i32)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
