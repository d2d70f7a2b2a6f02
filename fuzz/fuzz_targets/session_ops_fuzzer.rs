//! Fuzz target for the session state machine
//!
//! Drives a `Session` with arbitrary clock advances, host calls and inbound
//! messages, checking the standard invariants after every step.
//!
//! # Invariants
//!
//! - `is_registered()` iff state is `Registered`
//! - At most one Register or Heartbeat emitted per tick
//! - Heartbeats only while registered

#![no_main]

use std::time::Duration;

use arbitrary::Arbitrary;
use dih_core::{ConnectionState, MessageIdGenerator, Session, SessionAction, SessionConfig};
use dih_harness::{InvariantRegistry, SessionSnapshot, SimInstant};
use dih_proto::{Message, MessageId, MessageKind, Payload};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
enum Op {
    Tick(u16),
    AckPending,
    AckHeartbeat,
    AckOther(u8),
    Nack,
    Data,
    Command,
    Stray(u8),
    Register,
    Deregister,
    SendData,
}

fuzz_target!(|ops: Vec<Op>| {
    let mut session: Session<SimInstant> =
        Session::new("dev-fuzz", SessionConfig::default(), MessageIdGenerator::new(7));
    let invariants = InvariantRegistry::standard();
    let mut now = SimInstant::ZERO;

    for op in ops {
        let actions = match op {
            Op::Tick(ms) => {
                now = now + Duration::from_millis(u64::from(ms));
                let actions = session.tick(now);
                let requests = actions
                    .iter()
                    .filter(|a| {
                        matches!(
                            a,
                            SessionAction::Send(m)
                                if matches!(m.kind, MessageKind::Register | MessageKind::Heartbeat)
                        )
                    })
                    .count();
                assert!(requests <= 1);
                actions
            },
            Op::AckPending => match session.pending_register_id().cloned() {
                Some(id) => session.handle_message(&Message::ack("hub", id), now),
                None => Vec::new(),
            },
            Op::AckHeartbeat => match session.pending_heartbeat_id().cloned() {
                Some(id) => session.handle_message(&Message::ack("hub", id), now),
                None => Vec::new(),
            },
            Op::AckOther(n) => {
                session.handle_message(&Message::ack("hub", MessageId::new(n.to_string())), now)
            },
            Op::Nack => session.handle_message(&Message::nack("hub", MessageId::from("x")), now),
            Op::Data => {
                let payload = Payload::from([("k".to_owned(), "v".to_owned())]);
                session.handle_message(&Message::data("hub", MessageId::from("d"), payload), now)
            },
            Op::Command => {
                let payload = Payload::from([("led".to_owned(), "on".to_owned())]);
                session.handle_message(&Message::command("hub", MessageId::from("c"), payload), now)
            },
            Op::Stray(n) => {
                let kind = if n % 2 == 0 { MessageKind::Register } else { MessageKind::Heartbeat };
                let message = Message {
                    kind,
                    device_id: "hub".to_owned(),
                    message_id: MessageId::from("s"),
                    payload: None,
                };
                session.handle_message(&message, now)
            },
            Op::Register => session.register(now).unwrap_or_default(),
            Op::Deregister => session.deregister(),
            Op::SendData => session.send_data("temperature", "20.0").unwrap_or_default(),
        };

        for action in &actions {
            if let SessionAction::Send(message) = action
                && message.kind == MessageKind::Heartbeat
            {
                assert_eq!(session.state(), ConnectionState::Registered);
            }
        }

        invariants.assert_all(&SessionSnapshot::of(&session), "session_ops_fuzzer");
    }
});
