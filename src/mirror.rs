//! `GameState`: local mirror of authoritative server state.
//!
//! Rebuilt from every snapshot by [`GameState::apply_snapshot`], which is
//! the only writer.  Movement prediction and standing tasks read from it
//! but never write back: the mirror always holds exactly what the server
//! last said.
//!
//! Own and enemy units share one table tagged with a [`Relation`]; the
//! "own" and "enemy" accessors are filtered views over it.  Buildings work
//! the same way.  Each relation is still reconciled as its own collection,
//! so an enemy that leaves vision disappears without touching own units.

use crate::fog::FogGrid;
use crate::protocol::{EventKind, GameEvent, Snapshot};
use crate::types::{
    Building, EntityId, PlayerResources, Resource, TrainingQueue, Unit,
};
use log::{debug, warn};
use std::collections::{HashMap, HashSet};

/// Largest map side a snapshot may announce.  Anything bigger (or not
/// positive) is treated as a corrupt header.
pub const MAX_MAP_EXTENT: i32 = 4096;

// ---------------------------------------------------------------------------
// Sub-records
// ---------------------------------------------------------------------------

/// Whose side an entity is on, from this client's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Relation {
    Own,
    Enemy,
}

#[derive(Debug, Clone, PartialEq)]
struct Tracked<T> {
    relation: Relation,
    entity: T,
}

/// Counts produced by one [`GameState::apply_snapshot`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeReport {
    pub tick: u64,
    /// Ids that were not in the mirror before this snapshot.
    pub created: usize,
    /// Ids overwritten in place.
    pub updated: usize,
    /// Ids dropped because they were missing from their list.
    pub removed: usize,
    /// Ids removed by explicit Destroy events.
    pub destroyed: usize,
    /// Hidden events that matched an entity.
    pub hidden: usize,
}

// ---------------------------------------------------------------------------
// Mirror
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct GameState {
    /// Local player identity, set by the driver from config.
    pub player_id: i32,
    pub player_name: String,

    tick: u64,
    map_width: i32,
    map_height: i32,
    player_resources: PlayerResources,

    units: HashMap<EntityId, Tracked<Unit>>,
    buildings: HashMap<EntityId, Tracked<Building>>,
    resources: HashMap<EntityId, Resource>,

    visible: FogGrid,
    seen: FogGrid,

    training_queues: HashMap<EntityId, TrainingQueue>,

    selected: Option<EntityId>,
    selected_units: Vec<EntityId>,
}

impl Default for GameState {
    fn default() -> Self {
        Self::new(256, 256)
    }
}

impl GameState {
    pub fn new(map_width: i32, map_height: i32) -> Self {
        Self {
            player_id: -1,
            player_name: String::new(),
            tick: 0,
            map_width,
            map_height,
            player_resources: PlayerResources::default(),
            units: HashMap::new(),
            buildings: HashMap::new(),
            resources: HashMap::new(),
            visible: FogGrid::new(map_width, map_height),
            seen: FogGrid::new(map_width, map_height),
            training_queues: HashMap::new(),
            selected: None,
            selected_units: Vec::new(),
        }
    }

    // ------------------------------------------------------------------
    // Snapshot merge
    // ------------------------------------------------------------------

    /// Merge one authoritative snapshot into the mirror.
    ///
    /// Never fails: ids that cannot be found are skipped.
    pub fn apply_snapshot(&mut self, snapshot: &Snapshot) -> MergeReport {
        let mut report = MergeReport {
            tick: snapshot.tick,
            ..Default::default()
        };

        self.tick = snapshot.tick;
        let extent_ok = |v: i32| v > 0 && v <= MAX_MAP_EXTENT;
        if extent_ok(snapshot.map_width) && extent_ok(snapshot.map_height) {
            self.map_width = snapshot.map_width;
            self.map_height = snapshot.map_height;
        } else {
            warn!(
                "Snapshot #{} announces a {}x{} map; keeping {}x{}",
                snapshot.tick,
                snapshot.map_width,
                snapshot.map_height,
                self.map_width,
                self.map_height
            );
        }
        self.player_resources = snapshot.player_resources;

        reconcile_tracked(
            &mut self.units,
            Relation::Own,
            &snapshot.units,
            |u| u.id,
            &mut report,
        );
        reconcile_tracked(
            &mut self.units,
            Relation::Enemy,
            &snapshot.enemy_units_in_view,
            |u| u.id,
            &mut report,
        );
        reconcile_tracked(
            &mut self.buildings,
            Relation::Own,
            &snapshot.buildings,
            |b| b.id,
            &mut report,
        );
        reconcile_tracked(
            &mut self.buildings,
            Relation::Enemy,
            &snapshot.enemy_buildings_in_view,
            |b| b.id,
            &mut report,
        );
        self.reconcile_resources(&snapshot.resources, &mut report);

        for b in snapshot
            .buildings
            .iter()
            .chain(&snapshot.enemy_buildings_in_view)
        {
            if !b.footprint_is_consistent(self.map_width, self.map_height) {
                warn!(
                    "Building {} declares a footprint that is out of bounds or detached from {}",
                    b.id,
                    b.anchor()
                );
            }
        }

        self.apply_fog(snapshot);

        self.training_queues = snapshot
            .training_queues
            .iter()
            .map(|q| (q.building_id, q.clone()))
            .collect();

        for event in &snapshot.events {
            self.apply_event(event, &mut report);
        }

        report
    }

    fn reconcile_resources(&mut self, incoming: &[Resource], report: &mut MergeReport) {
        let present: HashSet<EntityId> = incoming.iter().map(|r| r.id).collect();

        for r in incoming {
            let mut r = r.clone();
            r.amount = r.amount.max(0);
            if self.resources.insert(r.id, r).is_some() {
                report.updated += 1;
            } else {
                report.created += 1;
            }
        }

        let before = self.resources.len();
        self.resources.retain(|id, _| present.contains(id));
        report.removed += before - self.resources.len();
    }

    fn apply_fog(&mut self, snapshot: &Snapshot) {
        self.visible.resize(self.map_width, self.map_height);
        // Explored tiles outlive a shrinking map.
        self.seen.resize(
            self.map_width.max(self.seen.width()),
            self.map_height.max(self.seen.height()),
        );

        self.visible.clear();
        let mut dropped = 0usize;
        for tile in &snapshot.visible_tiles {
            if !self.visible.set(*tile) {
                dropped += 1;
            }
        }
        for tile in &snapshot.seen_tiles {
            if !self.seen.set(*tile) {
                dropped += 1;
            }
        }
        if dropped > 0 {
            debug!("Ignored {} fog tiles outside the map", dropped);
        }
    }

    fn apply_event(&mut self, event: &GameEvent, report: &mut MergeReport) {
        let id = event.entity_id;
        match event.kind {
            EventKind::Destroy => {
                let hit = self.units.remove(&id).is_some()
                    | self.buildings.remove(&id).is_some()
                    | self.resources.remove(&id).is_some();
                if hit {
                    report.destroyed += 1;
                }
            }
            EventKind::Hidden => {
                let mut hit = false;
                if let Some(u) = self.units.get_mut(&id) {
                    u.entity.visible = false;
                    hit = true;
                }
                if let Some(b) = self.buildings.get_mut(&id) {
                    b.entity.visible = false;
                    hit = true;
                }
                if let Some(r) = self.resources.get_mut(&id) {
                    r.visible = false;
                    hit = true;
                }
                if hit {
                    report.hidden += 1;
                }
            }
            EventKind::ResourceUpdate => {
                if let (Some(amount), Some(r)) = (event.amount(), self.resources.get_mut(&id)) {
                    r.amount = amount.max(0);
                }
            }
            EventKind::Overflow => {
                warn!(
                    "Server event buffer overflowed at tick {}; relying on bulk state",
                    event.tick
                );
            }
            // Already covered by the bulk reconciliation.
            EventKind::Create
            | EventKind::Update
            | EventKind::FogUpdate
            | EventKind::QueueProgress
            | EventKind::Unknown(_) => {}
        }
    }

    // ------------------------------------------------------------------
    // Scalars
    // ------------------------------------------------------------------

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn map_size(&self) -> (i32, i32) {
        (self.map_width, self.map_height)
    }

    pub fn player_resources(&self) -> &PlayerResources {
        &self.player_resources
    }

    // ------------------------------------------------------------------
    // Units
    // ------------------------------------------------------------------

    pub fn unit(&self, id: EntityId) -> Option<&Unit> {
        self.tracked_unit(id, Relation::Own)
    }

    pub fn enemy_unit(&self, id: EntityId) -> Option<&Unit> {
        self.tracked_unit(id, Relation::Enemy)
    }

    /// Own or enemy unit.
    pub fn any_unit(&self, id: EntityId) -> Option<&Unit> {
        self.units.get(&id).map(|t| &t.entity)
    }

    pub fn unit_relation(&self, id: EntityId) -> Option<Relation> {
        self.units.get(&id).map(|t| t.relation)
    }

    fn tracked_unit(&self, id: EntityId, relation: Relation) -> Option<&Unit> {
        self.units
            .get(&id)
            .filter(|t| t.relation == relation)
            .map(|t| &t.entity)
    }

    pub fn units(&self) -> impl Iterator<Item = &Unit> + '_ {
        view(&self.units, Relation::Own)
    }

    pub fn enemy_units(&self) -> impl Iterator<Item = &Unit> + '_ {
        view(&self.units, Relation::Enemy)
    }

    pub fn visible_units(&self) -> impl Iterator<Item = &Unit> + '_ {
        self.units().filter(|u| u.visible)
    }

    pub fn visible_enemy_units(&self) -> impl Iterator<Item = &Unit> + '_ {
        self.enemy_units().filter(|u| u.visible)
    }

    // ------------------------------------------------------------------
    // Buildings
    // ------------------------------------------------------------------

    pub fn building(&self, id: EntityId) -> Option<&Building> {
        self.tracked_building(id, Relation::Own)
    }

    pub fn enemy_building(&self, id: EntityId) -> Option<&Building> {
        self.tracked_building(id, Relation::Enemy)
    }

    pub fn any_building(&self, id: EntityId) -> Option<&Building> {
        self.buildings.get(&id).map(|t| &t.entity)
    }

    fn tracked_building(&self, id: EntityId, relation: Relation) -> Option<&Building> {
        self.buildings
            .get(&id)
            .filter(|t| t.relation == relation)
            .map(|t| &t.entity)
    }

    pub fn buildings(&self) -> impl Iterator<Item = &Building> + '_ {
        view(&self.buildings, Relation::Own)
    }

    pub fn enemy_buildings(&self) -> impl Iterator<Item = &Building> + '_ {
        view(&self.buildings, Relation::Enemy)
    }

    pub fn visible_buildings(&self) -> impl Iterator<Item = &Building> + '_ {
        self.buildings().filter(|b| b.visible)
    }

    pub fn visible_enemy_buildings(&self) -> impl Iterator<Item = &Building> + '_ {
        self.enemy_buildings().filter(|b| b.visible)
    }

    // ------------------------------------------------------------------
    // Resources
    // ------------------------------------------------------------------

    pub fn resource(&self, id: EntityId) -> Option<&Resource> {
        self.resources.get(&id)
    }

    pub fn resources(&self) -> impl Iterator<Item = &Resource> + '_ {
        self.resources.values()
    }

    pub fn visible_resources(&self) -> impl Iterator<Item = &Resource> + '_ {
        self.resources.values().filter(|r| r.visible)
    }

    // ------------------------------------------------------------------
    // Fog of war
    // ------------------------------------------------------------------

    pub fn is_visible_tile(&self, x: i32, y: i32) -> bool {
        self.visible.contains(x, y)
    }

    pub fn is_seen_tile(&self, x: i32, y: i32) -> bool {
        self.seen.contains(x, y)
    }

    pub fn visible_tile_count(&self) -> usize {
        self.visible.count()
    }

    pub fn seen_tile_count(&self) -> usize {
        self.seen.count()
    }

    // ------------------------------------------------------------------
    // Training queues
    // ------------------------------------------------------------------

    pub fn training_queue(&self, building_id: EntityId) -> Option<&TrainingQueue> {
        self.training_queues.get(&building_id)
    }

    pub fn training_queues(&self) -> impl Iterator<Item = &TrainingQueue> + '_ {
        self.training_queues.values()
    }

    // ------------------------------------------------------------------
    // Selection (driven by the presentation layer)
    // ------------------------------------------------------------------

    pub fn select(&mut self, id: Option<EntityId>) {
        self.selected = id;
    }

    pub fn selected_id(&self) -> Option<EntityId> {
        self.selected
    }

    pub fn selected_unit(&self) -> Option<&Unit> {
        self.selected.and_then(|id| self.unit(id))
    }

    pub fn selected_building(&self) -> Option<&Building> {
        self.selected.and_then(|id| self.building(id))
    }

    pub fn set_selected_units(&mut self, ids: Vec<EntityId>) {
        self.selected_units = ids;
    }

    /// Own units in the multi-selection that still exist.
    pub fn selected_units(&self) -> impl Iterator<Item = &Unit> + '_ {
        self.selected_units.iter().filter_map(|id| self.unit(*id))
    }

    // ------------------------------------------------------------------
    // Counts
    // ------------------------------------------------------------------

    pub fn unit_count(&self) -> usize {
        self.units().count()
    }
    pub fn enemy_unit_count(&self) -> usize {
        self.enemy_units().count()
    }
    pub fn building_count(&self) -> usize {
        self.buildings().count()
    }
    pub fn enemy_building_count(&self) -> usize {
        self.enemy_buildings().count()
    }
    pub fn resource_count(&self) -> usize {
        self.resources.len()
    }

    /// Reset all server-derived state (called on disconnect).  Identity
    /// survives so a reconnect can rejoin as the same player, and explored
    /// tiles stay explored.
    pub fn clear(&mut self) {
        let player_id = self.player_id;
        let player_name = std::mem::take(&mut self.player_name);
        let seen = std::mem::replace(&mut self.seen, FogGrid::new(0, 0));
        *self = GameState::new(self.map_width, self.map_height);
        self.player_id = player_id;
        self.player_name = player_name;
        self.seen = seen;
    }
}

// ---------------------------------------------------------------------------
// Reconciliation helpers
// ---------------------------------------------------------------------------

/// Upsert `incoming` under `relation`, then drop every row of that relation
/// whose id is absent from `incoming`.
fn reconcile_tracked<T: Clone>(
    table: &mut HashMap<EntityId, Tracked<T>>,
    relation: Relation,
    incoming: &[T],
    id_of: impl Fn(&T) -> EntityId,
    report: &mut MergeReport,
) {
    let present: HashSet<EntityId> = incoming.iter().map(&id_of).collect();

    for entity in incoming {
        let row = Tracked {
            relation,
            entity: entity.clone(),
        };
        if table.insert(id_of(entity), row).is_some() {
            report.updated += 1;
        } else {
            report.created += 1;
        }
    }

    let before = table.len();
    table.retain(|id, row| row.relation != relation || present.contains(id));
    report.removed += before - table.len();
}

fn view<T>(table: &HashMap<EntityId, Tracked<T>>, relation: Relation) -> impl Iterator<Item = &T> {
    table
        .values()
        .filter(move |t| t.relation == relation)
        .map(|t| &t.entity)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
