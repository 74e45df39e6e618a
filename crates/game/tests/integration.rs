use std::time::Duration;

use orbit::{new_default_session, parse_client_message, ClientMessage, FakeClock, ServerMessage};

#[test]
fn input_message_flows_through_queue_and_session() {
    let clock = FakeClock::new();
    let mut session = new_default_session(clock.now());

    let msg = parse_client_message(r#"{"t":"input","seq":1,"thrust":1.0,"turn":0.0}"#).unwrap();
    match msg {
        ClientMessage::Input { seq, thrust, turn } => {
            session
                .enqueue(seq, orbit::Input { thrust, turn })
                .unwrap();
        }
        ClientMessage::Restart => panic!("expected input"),
    }

    clock.advance(Duration::from_millis(33));
    session.run(1, &clock);

    assert_eq!(session.world().tick, 1);
    assert!(session.world().ship.vel.x > 0.0 || session.world().ship.vel.y != 0.0);
}

#[test]
fn snapshot_round_trips_through_wire_encoding() {
    let clock = FakeClock::new();
    let mut session = new_default_session(clock.now());
    clock.advance(Duration::from_millis(330));
    session.run(10, &clock);

    let wire = ServerMessage::from_world(session.world()).encode();
    let decoded = orbit::parse_server_message(&wire).unwrap().into_world().unwrap();

    assert_eq!(decoded, *session.world());
}
