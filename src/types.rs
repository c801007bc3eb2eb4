//! Core types shared across all modules: grid math, entity records and
//! client configuration.
//!
//! Entity records double as wire records: they deserialize straight from the
//! camelCase snapshot payload, with the per-field defaults the server relies
//! on when a key is omitted.

use serde::{Deserialize, Serialize};
use std::ops::{Add, Mul, Sub};

/// Server-assigned entity identifier, unique for the lifetime of a match.
pub type EntityId = i32;

// ---------------------------------------------------------------------------
// Basic math
// ---------------------------------------------------------------------------

/// A point or direction in grid units.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn zero() -> Self {
        Self::new(0.0, 0.0)
    }

    pub fn length(self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    pub fn distance(self, other: Vec2) -> f32 {
        (other - self).length()
    }

    /// Unit vector in the same direction, or zero for a zero-length vector.
    pub fn normalized(self) -> Vec2 {
        let len = self.length();
        if len <= f32::EPSILON {
            Vec2::zero()
        } else {
            self * (1.0 / len)
        }
    }
}

impl Add for Vec2 {
    type Output = Vec2;

    fn add(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Vec2 {
    type Output = Vec2;

    fn sub(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f32> for Vec2 {
    type Output = Vec2;

    fn mul(self, rhs: f32) -> Vec2 {
        Vec2::new(self.x * rhs, self.y * rhs)
    }
}

impl std::fmt::Display for Vec2 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.2}, {:.2})", self.x, self.y)
    }
}

// ---------------------------------------------------------------------------
// Tiles
// ---------------------------------------------------------------------------

/// Integer grid coordinate.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct TileCoord {
    pub x: i32,
    pub y: i32,
}

impl TileCoord {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Nearest tile to a world position (grid nodes sit on integer coordinates).
    pub fn nearest(p: Vec2) -> Self {
        Self::new(p.x.round() as i32, p.y.round() as i32)
    }

    pub fn center(self) -> Vec2 {
        Vec2::new(self.x as f32, self.y as f32)
    }

    /// Chebyshev distance; 1 means "one of the 8 neighbours".
    pub fn chebyshev(self, other: TileCoord) -> i32 {
        (self.x - other.x).abs().max((self.y - other.y).abs())
    }
}

impl std::fmt::Display for TileCoord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{},{}]", self.x, self.y)
    }
}

// ---------------------------------------------------------------------------
// Entity kinds (integer codes on the wire)
// ---------------------------------------------------------------------------

/// Generates an enum carried as an integer code on the wire.  Codes the
/// client does not know are kept as `Other(code)` instead of failing the
/// whole record.
macro_rules! wire_code_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident = $code:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(from = "i32", into = "i32")]
        pub enum $name {
            $($variant,)+
            Other(i32),
        }

        impl From<i32> for $name {
            fn from(code: i32) -> Self {
                match code {
                    $($code => $name::$variant,)+
                    other => $name::Other(other),
                }
            }
        }

        impl From<$name> for i32 {
            fn from(value: $name) -> i32 {
                match value {
                    $($name::$variant => $code,)+
                    $name::Other(code) => code,
                }
            }
        }
    };
}

wire_code_enum!(
    /// Unit archetype.
    UnitType { Villager = 0, Militia = 1, Animal = 2 }
);

wire_code_enum!(
    /// Building archetype.
    BuildingType { TownCenter = 0, Barracks = 1, House = 2 }
);

wire_code_enum!(
    BuildingState { UnderConstruction = 0, Completed = 1 }
);

wire_code_enum!(
    /// Resource node kind; also used for the carried-resource type on units.
    ResourceType { Wood = 0, Gold = 1, Stone = 2, Food = 3 }
);

impl Default for ResourceType {
    fn default() -> Self {
        ResourceType::Wood
    }
}

impl Default for BuildingState {
    fn default() -> Self {
        BuildingState::UnderConstruction
    }
}

// ---------------------------------------------------------------------------
// Entities
// ---------------------------------------------------------------------------

fn default_true() -> bool {
    true
}

fn default_unit_max_hp() -> i32 {
    100
}

fn default_building_hp() -> i32 {
    200
}

fn default_pop_cap() -> i32 {
    10
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Unit {
    pub id: EntityId,
    /// 0 = neutral (animals), otherwise the owning player id.
    #[serde(default)]
    pub owner: i32,
    #[serde(rename = "type")]
    pub kind: UnitType,
    pub x: f32,
    pub y: f32,
    #[serde(default)]
    pub hp: i32,
    #[serde(default = "default_unit_max_hp")]
    pub max_hp: i32,
    /// Tiles per second.  Zero when the server omits it; movement then uses
    /// the configured default speed.
    #[serde(default)]
    pub speed: f32,
    #[serde(default)]
    pub carrying: i32,
    #[serde(default)]
    pub carry_type: ResourceType,
    #[serde(default = "default_true")]
    pub visible: bool,
}

impl Unit {
    pub fn position(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Building {
    pub id: EntityId,
    #[serde(default)]
    pub owner: i32,
    #[serde(rename = "type")]
    pub kind: BuildingType,
    pub x: f32,
    pub y: f32,
    #[serde(default)]
    pub state: BuildingState,
    /// Construction progress, 0–100.
    #[serde(default)]
    pub progress: i32,
    #[serde(default = "default_building_hp")]
    pub hp: i32,
    #[serde(default = "default_building_hp")]
    pub max_hp: i32,
    #[serde(default = "default_true")]
    pub visible: bool,
    /// Rendering footprint.  Collision always uses a fixed 3×3 block.
    #[serde(default)]
    pub occupied_tiles: Vec<TileCoord>,
}

impl Building {
    pub fn position(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }

    pub fn anchor(&self) -> TileCoord {
        TileCoord::nearest(self.position())
    }

    pub fn is_completed(&self) -> bool {
        self.state == BuildingState::Completed
    }

    /// A declared footprint must lie inside the map and form one 8-connected
    /// region that touches the anchor tile.  An empty footprint is valid.
    pub fn footprint_is_consistent(&self, width: i32, height: i32) -> bool {
        let tiles = &self.occupied_tiles;
        if tiles.is_empty() {
            return true;
        }
        if tiles
            .iter()
            .any(|t| t.x < 0 || t.y < 0 || t.x >= width || t.y >= height)
        {
            return false;
        }

        let anchor = self.anchor();
        let Some(seed) = tiles.iter().position(|t| t.chebyshev(anchor) <= 1) else {
            return false;
        };

        let mut reached = vec![false; tiles.len()];
        let mut stack = vec![seed];
        reached[seed] = true;
        while let Some(i) = stack.pop() {
            for (j, other) in tiles.iter().enumerate() {
                if !reached[j] && tiles[i].chebyshev(*other) <= 1 {
                    reached[j] = true;
                    stack.push(j);
                }
            }
        }
        reached.into_iter().all(|r| r)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    pub id: EntityId,
    #[serde(rename = "type")]
    pub kind: ResourceType,
    #[serde(default)]
    pub amount: i32,
    pub x: f32,
    pub y: f32,
    #[serde(default = "default_true")]
    pub visible: bool,
}

impl Resource {
    pub fn position(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }

    /// Depleted nodes must not be targeted.
    pub fn is_depleted(&self) -> bool {
        self.amount <= 0
    }
}

/// Stockpile counters, replaced wholesale every snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerResources {
    #[serde(default)]
    pub food: i32,
    #[serde(default)]
    pub gold: i32,
    #[serde(default)]
    pub stone: i32,
    #[serde(default)]
    pub wood: i32,
    #[serde(default)]
    pub pop: i32,
    #[serde(default = "default_pop_cap")]
    pub pop_cap: i32,
}

impl Default for PlayerResources {
    fn default() -> Self {
        Self {
            food: 0,
            gold: 0,
            stone: 0,
            wood: 0,
            pop: 0,
            pop_cap: default_pop_cap(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingQueue {
    pub building_id: EntityId,
    #[serde(default = "default_building_kind")]
    pub building_type: BuildingType,
    /// Queued unit-type codes, front first.
    #[serde(default)]
    pub items: Vec<UnitType>,
    #[serde(default)]
    pub current_time: i32,
    #[serde(default)]
    pub current_max: i32,
}

fn default_building_kind() -> BuildingType {
    BuildingType::TownCenter
}

impl TrainingQueue {
    /// Progress of the front item as a 0..=1 fraction.
    pub fn progress(&self) -> f32 {
        if self.current_max <= 0 {
            return 0.0;
        }
        (self.current_time as f32 / self.current_max as f32).clamp(0.0, 1.0)
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Grid size used until the first snapshot reports the real map size.
    pub map_width: i32,
    pub map_height: i32,
    /// Movement speed (tiles/s) for units whose declared speed is not positive.
    pub default_speed: f32,
    /// Distance at which a villager can gather from a resource node.
    pub gather_range: f32,
    /// Minimum seconds between two `gather` commands for the same task.
    pub gather_cooldown: f32,
    /// Slack before a unit in a gather task counts as out of range.
    pub range_epsilon: f32,
    /// Approach distance for attack / hunt / deposit orders.
    pub interaction_range: f32,
    /// Arrival distance for plain move orders.
    pub move_arrival_distance: f32,
    pub player_id: i32,
    pub player_name: String,
    /// Seconds between reconnect attempts.
    pub reconnect_delay: f32,
    pub max_reconnect_attempts: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            map_width: 256,
            map_height: 256,
            default_speed: 2.0,
            gather_range: 1.5,
            gather_cooldown: 0.6,
            range_epsilon: 0.05,
            interaction_range: 1.5,
            move_arrival_distance: 0.1,
            player_id: 1,
            player_name: "Player1".into(),
            reconnect_delay: 2.0,
            max_reconnect_attempts: 10,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
