//! Snapshot merge tests, driven from wire JSON

#[cfg(test)]
mod tests {
    use rts_client_core::{GameState, ServerMessage, Snapshot};
    use serde_json::json;

    fn snapshot(value: serde_json::Value) -> Snapshot {
        match ServerMessage::decode(&value.to_string()).unwrap() {
            ServerMessage::Snapshot(s) => s,
            other => panic!("expected snapshot, got {:?}", other),
        }
    }

    fn full_snapshot(tick: u64) -> Snapshot {
        snapshot(json!({
            "type": "snapshot",
            "tick": tick,
            "mapWidth": 32,
            "mapHeight": 32,
            "units": [{"id": 1, "owner": 1, "type": 0, "x": 3, "y": 4, "hp": 25}],
            "buildings": [{"id": 2, "owner": 1, "type": 0, "x": 10, "y": 10, "state": 1}],
            "enemyUnitsInView": [{"id": 50, "owner": 2, "type": 1, "x": 20, "y": 20}],
            "enemyBuildingsInView": [{"id": 60, "owner": 2, "type": 1, "x": 25, "y": 25}],
            "resources": [{"id": 9, "type": 1, "amount": 50, "x": 12, "y": 10}],
            "events": [],
            "playerResources": {"food": 100, "wood": 50, "gold": 0, "stone": 0, "pop": 1},
            "visibleTiles": [{"x": 3, "y": 4}, {"x": 4, "y": 4}],
            "seenTiles": [{"x": 3, "y": 4}, {"x": 4, "y": 4}],
            "trainingQueues": [{"buildingId": 2, "buildingType": 0, "items": [0], "currentTime": 2, "currentMax": 10}]
        }))
    }

    fn empty_snapshot(tick: u64) -> Snapshot {
        snapshot(json!({"type": "snapshot", "tick": tick, "mapWidth": 32, "mapHeight": 32}))
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    #[test]
    fn unit_disappears_when_absent_from_next_snapshot() {
        let mut gs = GameState::default();
        gs.apply_snapshot(&snapshot(json!({
            "type": "snapshot", "tick": 1,
            "units": [{"id": 1, "owner": 1, "type": 0, "x": 0, "y": 0}]
        })));
        assert!(gs.unit(1).is_some());

        gs.apply_snapshot(&snapshot(json!({"type": "snapshot", "tick": 2, "units": []})));
        assert!(gs.unit(1).is_none());
    }

    #[test]
    fn every_category_is_reconciled() {
        let mut gs = GameState::default();
        gs.apply_snapshot(&full_snapshot(1));
        assert_eq!(gs.unit_count(), 1);
        assert_eq!(gs.building_count(), 1);
        assert_eq!(gs.enemy_unit_count(), 1);
        assert_eq!(gs.enemy_building_count(), 1);
        assert_eq!(gs.resource_count(), 1);

        let report = gs.apply_snapshot(&empty_snapshot(2));
        assert_eq!(report.removed, 5);
        assert_eq!(gs.unit_count(), 0);
        assert_eq!(gs.building_count(), 0);
        assert_eq!(gs.enemy_unit_count(), 0);
        assert_eq!(gs.enemy_building_count(), 0);
        assert_eq!(gs.resource_count(), 0);
        assert!(gs.training_queue(2).is_none());
        assert_eq!(gs.visible_tile_count(), 0);
    }

    #[test]
    fn merge_is_idempotent() {
        let snap = full_snapshot(7);
        let mut once = GameState::default();
        once.apply_snapshot(&snap);
        let mut twice = once.clone();
        twice.apply_snapshot(&snap);
        assert_eq!(once, twice);
    }

    #[test]
    fn scalars_are_replaced() {
        let mut gs = GameState::default();
        gs.apply_snapshot(&full_snapshot(4));
        assert_eq!(gs.tick(), 4);
        assert_eq!(gs.map_size(), (32, 32));
        assert_eq!(gs.player_resources().food, 100);
        assert_eq!(gs.player_resources().pop_cap, 10);
    }

    // -----------------------------------------------------------------------
    // Fog
    // -----------------------------------------------------------------------

    #[test]
    fn seen_tiles_never_shrink() {
        let mut gs = GameState::default();
        gs.apply_snapshot(&full_snapshot(1));
        let seen_before = gs.seen_tile_count();

        gs.apply_snapshot(&empty_snapshot(2));
        assert_eq!(gs.seen_tile_count(), seen_before);
        assert!(gs.is_seen_tile(3, 4));
        assert!(!gs.is_visible_tile(3, 4));
    }

    // -----------------------------------------------------------------------
    // Decoding isolation
    // -----------------------------------------------------------------------

    #[test]
    fn malformed_entity_does_not_poison_snapshot() {
        let mut gs = GameState::default();
        gs.apply_snapshot(&snapshot(json!({
            "type": "snapshot", "tick": 1,
            "units": [
                {"id": 1, "owner": 1, "type": 0, "x": 1, "y": 1},
                {"id": "not-a-number", "type": 0},
                {"id": 3, "owner": 1, "type": 7, "x": 2, "y": 2}
            ],
            "resources": null
        })));
        assert_eq!(gs.unit_count(), 2);
        assert!(gs.unit(3).is_some());
        assert_eq!(gs.resource_count(), 0);
    }

    #[test]
    fn destroy_event_wins_over_list_entry() {
        let mut gs = GameState::default();
        gs.apply_snapshot(&snapshot(json!({
            "type": "snapshot", "tick": 1,
            "resources": [{"id": 9, "type": 0, "amount": 5, "x": 1, "y": 1}],
            "events": [{"type": 2, "tick": 1, "entityId": 9}]
        })));
        assert!(gs.resource(9).is_none());
    }
}
