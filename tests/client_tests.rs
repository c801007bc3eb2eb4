//! ClientCore driver tests

#[cfg(test)]
mod tests {
    use rts_client_core::{
        ClientConfig, ClientCore, ClientEvent, ClientMessage, ConnectionState, ProtocolError,
    };
    use serde_json::json;

    const ACK: &str = r#"{"type":"ack","ok":true}"#;

    fn ready_core() -> ClientCore {
        let mut core = ClientCore::new(ClientConfig::default());
        core.on_transport_open();
        core.receive(ACK).unwrap();
        core.receive(ACK).unwrap();
        core.drain_outbound();
        core.drain_events();
        core
    }

    fn snapshot_text(tick: u64, unit_x: f32, amount: i32) -> String {
        json!({
            "type": "snapshot",
            "tick": tick,
            "units": [{"id": 5, "owner": 1, "type": 0, "x": unit_x, "y": 10, "speed": 2}],
            "buildings": [{"id": 2, "owner": 1, "type": 0, "x": 30, "y": 30, "state": 1}],
            "enemyUnitsInView": [{"id": 50, "owner": 2, "type": 1, "x": 40, "y": 10}],
            "resources": [{"id": 9, "type": 1, "amount": amount, "x": 12, "y": 10}]
        })
        .to_string()
    }

    fn gathers(out: &[ClientMessage]) -> usize {
        out.iter()
            .filter(|m| matches!(m, ClientMessage::Gather { .. }))
            .count()
    }

    // -----------------------------------------------------------------------
    // Handshake
    // -----------------------------------------------------------------------

    #[test]
    fn handshake_sends_join_then_ready() {
        let mut core = ClientCore::new(ClientConfig::default());
        core.on_transport_open();
        assert_eq!(
            core.drain_outbound(),
            vec![ClientMessage::Join {
                player_id: 1,
                name: "Player1".into()
            }]
        );

        core.receive(ACK).unwrap();
        assert_eq!(core.drain_outbound(), vec![ClientMessage::Ready { ready: true }]);
        assert_eq!(core.session().state(), ConnectionState::Joined);

        core.receive(ACK).unwrap();
        assert!(core.session().is_ready());
        let events = core.drain_events();
        assert!(events.contains(&ClientEvent::Connected));
    }

    #[test]
    fn snapshot_before_ready_is_dropped() {
        let mut core = ClientCore::new(ClientConfig::default());
        core.on_transport_open();
        core.receive(&snapshot_text(1, 10.0, 50)).unwrap();
        core.update(0.1);
        assert_eq!(core.state().unit_count(), 0);
    }

    #[test]
    fn malformed_frames_are_reported_and_ignored() {
        let mut core = ready_core();
        assert!(matches!(core.receive("{not json"), Err(ProtocolError::Json(_))));
        assert!(matches!(
            core.receive(r#"{"ok":true}"#),
            Err(ProtocolError::MissingType)
        ));
        assert!(matches!(
            core.receive(r#"{"type":"chat"}"#),
            Err(ProtocolError::UnknownType(_))
        ));
        assert!(core.session().is_ready());
    }

    #[test]
    fn server_error_becomes_event() {
        let mut core = ready_core();
        core.receive(r#"{"type":"error","error":"not enough wood"}"#)
            .unwrap();
        assert_eq!(
            core.drain_events(),
            vec![ClientEvent::ServerError("not enough wood".into())]
        );
    }

    // -----------------------------------------------------------------------
    // Frame
    // -----------------------------------------------------------------------

    #[test]
    fn snapshots_apply_in_order_and_block_building_tiles() {
        let mut core = ready_core();
        core.receive(&snapshot_text(1, 10.0, 50)).unwrap();
        core.receive(&snapshot_text(2, 11.0, 50)).unwrap();
        core.update(0.0);

        assert_eq!(core.state().tick(), 2);
        assert_eq!(core.state().unit(5).map(|u| u.x), Some(11.0));
        assert_eq!(core.grid().occupied_count(), 9);
        assert!(core.grid().is_disabled(30, 30));

        let applied: Vec<u64> = core
            .drain_events()
            .into_iter()
            .filter_map(|e| match e {
                ClientEvent::SnapshotApplied { tick, .. } => Some(tick),
                _ => None,
            })
            .collect();
        assert_eq!(applied, vec![1, 2]);
    }

    #[test]
    fn gather_order_runs_until_resource_runs_out() {
        let mut core = ready_core();
        core.receive(&snapshot_text(1, 10.0, 50)).unwrap();
        core.update(0.0);

        assert!(core.order_gather(5, 9));
        assert_eq!(
            core.drain_outbound(),
            vec![ClientMessage::Move {
                unit_id: 5,
                x: 12.0,
                y: 10.0
            }]
        );

        core.update(1.0);
        core.update(0.1);
        let out = core.drain_outbound();
        assert_eq!(gathers(&out), 1);
        assert!(core.tasks().task(5).is_some());

        // Amount changed: re-send at once.
        core.receive(&snapshot_text(2, 11.0, 45)).unwrap();
        core.update(0.05);
        assert_eq!(gathers(&core.drain_outbound()), 1);

        // Depleted: task lapses, nothing more is sent.
        core.receive(&snapshot_text(3, 11.0, 0)).unwrap();
        core.update(1.0);
        core.update(1.0);
        assert!(core.tasks().is_empty());
        assert_eq!(gathers(&core.drain_outbound()), 0);
    }

    #[test]
    fn new_order_supersedes_gather_task() {
        let mut core = ready_core();
        core.receive(&snapshot_text(1, 10.0, 50)).unwrap();
        core.update(0.0);
        core.order_gather(5, 9);
        assert!(core.order_move(5, 0.0, 0.0));
        assert!(core.tasks().is_empty());
        assert_eq!(
            core.movements().movement(5).map(|m| m.target().x),
            Some(0.0)
        );
    }

    #[test]
    fn attack_out_of_range_walks_then_attacks() {
        let mut core = ready_core();
        core.receive(&snapshot_text(1, 37.0, 50)).unwrap();
        core.update(0.0);
        core.drain_outbound();

        assert!(core.order_attack(5, 50));
        assert_eq!(core.drain_outbound().len(), 1); // move

        // 3 tiles at speed 2, one waypoint per frame; in range on the third.
        core.update(1.0);
        core.update(1.0);
        assert!(core.drain_outbound().is_empty());
        core.update(1.0);
        let out = core.drain_outbound();
        assert!(out.contains(&ClientMessage::Attack {
            unit_id: 5,
            target_id: 50
        }));
    }

    #[test]
    fn orders_for_unknown_units_are_refused() {
        let mut core = ready_core();
        core.receive(&snapshot_text(1, 10.0, 50)).unwrap();
        core.update(0.0);
        assert!(!core.order_move(99, 1.0, 1.0));
        assert!(!core.order_attack(5, 12345));
        assert!(!core.order_train(77, rts_client_core::UnitType::Villager));
        assert!(core.order_train(2, rts_client_core::UnitType::Villager));
        assert_eq!(core.drain_outbound().len(), 1);
    }

    // -----------------------------------------------------------------------
    // Disconnect
    // -----------------------------------------------------------------------

    #[test]
    fn disconnect_clears_state_and_schedules_reconnect() {
        let mut core = ready_core();
        core.receive(&snapshot_text(1, 10.0, 50)).unwrap();
        core.update(0.0);
        core.order_gather(5, 9);

        core.on_transport_closed();
        assert_eq!(core.state().unit_count(), 0);
        assert!(core.tasks().is_empty());
        assert!(core.movements().is_empty());
        assert!(core.drain_outbound().is_empty());
        assert_eq!(core.state().player_name, "Player1");

        core.drain_events();
        core.update(1.0);
        assert!(core.drain_events().is_empty());
        core.update(1.0);
        assert_eq!(
            core.drain_events(),
            vec![ClientEvent::ReconnectDue { attempt: 1 }]
        );
    }

    #[test]
    fn explored_tiles_survive_reconnect() {
        let mut core = ready_core();
        let snap = json!({"type": "snapshot", "tick": 1, "seenTiles": [{"x": 3, "y": 4}]});
        core.receive(&snap.to_string()).unwrap();
        core.update(0.0);
        assert!(core.state().is_seen_tile(3, 4));

        core.on_transport_closed();
        core.on_transport_open();
        core.receive(ACK).unwrap();
        core.receive(ACK).unwrap();
        core.receive(r#"{"type":"snapshot","tick":2}"#).unwrap();
        core.update(0.0);

        assert_eq!(core.state().tick(), 2);
        assert!(core.state().is_seen_tile(3, 4));
        assert!(!core.state().is_visible_tile(3, 4));
    }

    #[test]
    fn spent_retry_budget_is_reported() {
        let mut core = ClientCore::new(ClientConfig {
            max_reconnect_attempts: 2,
            ..ClientConfig::default()
        });

        core.on_transport_closed();
        assert_eq!(core.drain_events(), vec![ClientEvent::Disconnected]);
        core.on_transport_closed();
        assert_eq!(
            core.drain_events(),
            vec![
                ClientEvent::Disconnected,
                ClientEvent::ReconnectExhausted { attempts: 2 }
            ]
        );

        core.update(5.0);
        assert!(core.drain_events().is_empty());
    }
}
