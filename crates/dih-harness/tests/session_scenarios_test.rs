//! End-to-end session scenarios on a virtual clock.
//!
//! A real `Device` talks to a scripted `SimHub` over an in-memory transport.
//! Invariants are checked after every poll.

use std::{cell::RefCell, rc::Rc, time::Duration};

use dih_core::{
    ConnectionState, Device, Environment, SendFailure, SessionConfig, SessionEvent, TransportError,
};
use dih_harness::{
    HubPolicy, InvariantRegistry, SessionSnapshot, SimEnv, SimHub, SimInstant, SimTransport,
};
use dih_proto::{Message, MessageId, MessageKind, Payload, ProtocolError, encode_line};

struct Sim {
    env: SimEnv,
    transport: SimTransport,
    hub: SimHub,
    device: Device<SimTransport, SimInstant>,
    events: Rc<RefCell<Vec<SessionEvent>>>,
    data: Rc<RefCell<Vec<Payload>>>,
    commands: Rc<RefCell<Vec<Payload>>>,
    invariants: InvariantRegistry,
}

impl Sim {
    fn new(policy: HubPolicy) -> Self {
        Self::with_config(policy, SessionConfig::default())
    }

    fn with_config(policy: HubPolicy, config: SessionConfig) -> Self {
        let env = SimEnv::with_seed(7);
        let transport = SimTransport::default();
        let mut hub = SimHub::new(transport.clone());
        hub.set_policy(policy);

        let mut device = Device::new(&env, transport.clone(), config).unwrap();
        device.configure("dev-1");

        let events = Rc::new(RefCell::new(Vec::new()));
        let data = Rc::new(RefCell::new(Vec::new()));
        let commands = Rc::new(RefCell::new(Vec::new()));

        let sink = Rc::clone(&events);
        device.on_event(move |e| sink.borrow_mut().push(e.clone()));
        let sink = Rc::clone(&data);
        device.on_data(move |p| sink.borrow_mut().push(p.clone()));
        let sink = Rc::clone(&commands);
        device.on_command(move |p| sink.borrow_mut().push(p.clone()));

        Self {
            env,
            transport,
            hub,
            device,
            events,
            data,
            commands,
            invariants: InvariantRegistry::standard(),
        }
    }

    /// Poll the device at `at_ms`, then let the hub read and answer.
    fn poll_at(&mut self, at_ms: u64) -> Vec<Message> {
        let now = self.env.advance_to(SimInstant::from_millis(at_ms));
        self.device.poll(now);
        self.invariants.assert_all(
            &SessionSnapshot::of_device(&self.device),
            &format!("after poll at {at_ms}ms"),
        );
        self.hub.step()
    }

    /// Poll every `step_ms` from `from_ms` up to and including `to_ms`,
    /// returning (time, message) for every message the hub received.
    fn run(&mut self, from_ms: u64, to_ms: u64, step_ms: u64) -> Vec<(u64, Message)> {
        let mut log = Vec::new();
        let mut t = from_ms;
        while t <= to_ms {
            log.extend(self.poll_at(t).into_iter().map(|m| (t, m)));
            t += step_ms;
        }
        log
    }

    fn inject(&self, message: &Message) {
        self.transport.inject_line(encode_line(message, 256).unwrap());
    }

    fn events(&self) -> Vec<SessionEvent> {
        self.events.borrow().clone()
    }
}

fn kinds(log: &[(u64, Message)], kind: MessageKind) -> Vec<(u64, &Message)> {
    log.iter().filter(|(_, m)| m.kind == kind).map(|(t, m)| (*t, m)).collect()
}

#[test]
fn host_view_tracks_session_through_registration() {
    let mut sim = Sim::new(HubPolicy::default());
    assert_eq!(SessionSnapshot::of_device(&sim.device), SessionSnapshot::initial());

    sim.run(0, 200, 100);

    let snapshot = SessionSnapshot::of_device(&sim.device);
    assert_eq!(snapshot, SessionSnapshot::of(sim.device.session()));
    assert_eq!(snapshot.state, ConnectionState::Registered);
    assert!(snapshot.is_registered);
    assert!(sim.invariants.check_all(&snapshot).is_ok());
}

#[test]
fn registration_retry_scenario() {
    let mut sim = Sim::new(HubPolicy::silent());

    let sent = sim.poll_at(0);
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].kind, MessageKind::Register);
    assert_eq!(sent[0].device_id, "dev-1");
    let m1 = sent[0].message_id.clone();

    // Retry interval is 5000ms; no ack arrived.
    let sent = sim.poll_at(6_000);
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].kind, MessageKind::Register);
    let m2 = sent[0].message_id.clone();
    assert_ne!(m1, m2);
    assert!(sim.events().contains(&SessionEvent::StateChanged {
        from: ConnectionState::Registering,
        to: ConnectionState::Disconnected,
    }));

    sim.inject(&Message::ack("hub", m2));
    sim.poll_at(6_001);

    assert!(sim.device.is_registered());
    assert_eq!(sim.device.current_state(), ConnectionState::Registered);
}

#[test]
fn silent_hub_never_registers() {
    let mut sim = Sim::new(HubPolicy::silent());

    let mut seen = Vec::new();
    for t in (0..=60_000).step_by(250) {
        sim.poll_at(t);
        seen.push(sim.device.current_state());
    }

    assert!(!seen.contains(&ConnectionState::Registered));
    assert!(!sim.device.is_registered());

    // One attempt at t=0 and one every retry interval after that.
    let registers = sim.hub.received_of(MessageKind::Register);
    assert_eq!(registers.len(), 13);
    let timeouts = sim
        .events()
        .iter()
        .filter(|e| matches!(e, SessionEvent::RegistrationTimedOut { .. }))
        .count();
    assert_eq!(timeouts, 12);
}

#[test]
fn matching_ack_wins_among_unmatched_acks_in_same_tick() {
    let mut sim = Sim::new(HubPolicy::silent());
    let pending = sim.poll_at(0)[0].message_id.clone();

    sim.inject(&Message::ack("hub", MessageId::from("bogus-1")));
    sim.inject(&Message::ack("hub", pending.clone()));
    sim.inject(&Message::ack("hub", MessageId::from("bogus-2")));
    sim.inject(&Message::ack("hub", pending));
    sim.poll_at(100);

    assert!(sim.device.is_registered());
    let events = sim.events();
    let registrations = events
        .iter()
        .filter(|e| {
            matches!(e, SessionEvent::StateChanged { to: ConnectionState::Registered, .. })
        })
        .count();
    assert_eq!(registrations, 1);

    let unmatched =
        events.iter().filter(|e| matches!(e, SessionEvent::UnmatchedAck { .. })).count();
    assert_eq!(unmatched, 3);
}

#[test]
fn heartbeat_sent_once_per_interval() {
    let mut sim = Sim::new(HubPolicy::default());

    // Register at t=0, ack processed at t=100.
    let log = sim.run(0, 35_000, 100);
    assert!(sim.device.is_registered());

    let heartbeats = kinds(&log, MessageKind::Heartbeat);
    let times: Vec<u64> = heartbeats.iter().map(|(t, _)| *t).collect();
    assert_eq!(times, vec![10_100, 20_100, 30_100]);

    let ids: std::collections::HashSet<_> = heartbeats.iter().map(|(_, m)| &m.message_id).collect();
    assert_eq!(ids.len(), 3);
}

#[test]
fn missed_heartbeat_ack_disconnects_and_stays_unregistered() {
    let mut sim = Sim::new(HubPolicy::default());
    sim.run(0, 1_000, 100);
    assert!(sim.device.is_registered());

    // Hub goes away entirely.
    sim.hub.set_policy(HubPolicy::silent());

    // Heartbeat at 10_100, deadline 5_000ms later.
    sim.run(1_100, 15_000, 100);
    assert!(sim.device.is_registered());

    sim.poll_at(15_100);
    assert_eq!(sim.device.current_state(), ConnectionState::Disconnected);
    assert!(!sim.device.is_registered());
    let lost = Duration::from_millis(5_000);
    assert!(
        sim.events()
            .iter()
            .any(|e| matches!(e, SessionEvent::PeerLost { elapsed } if *elapsed == lost))
    );

    for t in (15_200..=40_000).step_by(100) {
        sim.poll_at(t);
        assert!(!sim.device.is_registered());
    }
}

#[test]
fn late_heartbeat_ack_is_ignored() {
    let mut sim = Sim::new(HubPolicy::default());
    sim.run(0, 1_000, 100);
    sim.hub.set_policy(HubPolicy { ack_heartbeat: false, ..HubPolicy::default() });

    let log = sim.run(1_100, 10_100, 100);
    let heartbeat = kinds(&log, MessageKind::Heartbeat)[0].1.message_id.clone();

    sim.hub.set_policy(HubPolicy::silent());
    sim.run(10_200, 15_100, 100);
    assert_eq!(sim.device.current_state(), ConnectionState::Disconnected);

    sim.inject(&Message::ack("hub", heartbeat.clone()));
    sim.poll_at(15_200);

    assert!(!sim.device.is_registered());
    assert!(sim.events().contains(&SessionEvent::UnmatchedAck { message_id: heartbeat }));
}

#[test]
fn session_recovers_after_peer_loss() {
    let mut sim = Sim::new(HubPolicy::default());
    sim.run(0, 1_000, 100);
    sim.hub.set_policy(HubPolicy { ack_heartbeat: false, ..HubPolicy::default() });
    sim.run(1_100, 15_100, 100);
    assert!(!sim.device.is_registered());

    sim.hub.set_policy(HubPolicy::default());
    sim.run(15_200, 16_000, 100);
    assert!(sim.device.is_registered());
}

#[test]
fn data_while_disconnected_is_delivered_and_acked() {
    let mut sim = Sim::new(HubPolicy::silent());
    let payload = Payload::from([("setpoint".to_owned(), "21.0".to_owned())]);

    let id = sim.hub.send_data(payload.clone());
    let sent = sim.poll_at(0);

    assert_eq!(sim.data.borrow().as_slice(), &[payload]);
    let acks: Vec<_> = sent.iter().filter(|m| m.kind == MessageKind::Ack).collect();
    assert_eq!(acks.len(), 1);
    assert_eq!(acks[0].message_id.as_str(), id);
}

#[test]
fn gated_data_while_disconnected_is_dropped() {
    let config = SessionConfig { gate_inbound_on_registration: true, ..Default::default() };
    let mut sim = Sim::with_config(HubPolicy::silent(), config);

    sim.hub.send_data(Payload::from([("setpoint".to_owned(), "21.0".to_owned())]));
    sim.hub.send_command(Payload::from([("led".to_owned(), "on".to_owned())]));
    let sent = sim.poll_at(0);

    assert!(sim.data.borrow().is_empty());
    assert!(sim.commands.borrow().is_empty());
    assert!(sent.iter().all(|m| m.kind != MessageKind::Ack));
}

#[test]
fn commands_are_delivered_without_ack() {
    let mut sim = Sim::new(HubPolicy::default());
    sim.run(0, 500, 100);

    sim.hub.send_command(Payload::from([("led".to_owned(), "on".to_owned())]));
    let sent = sim.poll_at(600);

    assert_eq!(sim.commands.borrow()[0].get("led").map(String::as_str), Some("on"));
    assert!(sent.iter().all(|m| m.kind != MessageKind::Ack));
}

#[test]
fn rejected_registration_backs_off_for_retry_interval() {
    let mut sim = Sim::new(HubPolicy { reject_register: true, ..HubPolicy::default() });

    let log = sim.run(0, 9_900, 100);

    assert!(!sim.device.is_registered());
    let registers = kinds(&log, MessageKind::Register);
    let times: Vec<u64> = registers.iter().map(|(t, _)| *t).collect();
    assert_eq!(times, vec![0, 5_000]);
    assert!(sim.events().iter().any(|e| matches!(e, SessionEvent::Rejected { .. })));
}

#[test]
fn send_data_only_while_registered() {
    let mut sim = Sim::new(HubPolicy::default());
    assert!(!sim.device.send_data("temperature", "23.5"));

    sim.run(0, 200, 100);
    assert!(sim.device.send_data("temperature", "23.5"));
    sim.poll_at(300);

    let data = sim.hub.received_of(MessageKind::Data);
    assert_eq!(data.len(), 1);
    assert_eq!(
        data[0].payload.as_ref().and_then(|p| p.get("temperature")).map(String::as_str),
        Some("23.5")
    );
}

#[test]
fn oversized_outbound_records_are_reported_and_not_sent() {
    let mut sim = Sim::new(HubPolicy::default());
    sim.run(0, 200, 100);
    assert!(sim.device.is_registered());

    // Reading that cannot fit a 256-byte record
    assert!(!sim.device.send_data("blob", "y".repeat(300)));
    sim.poll_at(300);

    assert!(sim.hub.received_of(MessageKind::Data).is_empty());
    assert!(sim.device.is_registered());
    assert!(sim.events().iter().any(|e| matches!(e, SessionEvent::SendFailed {
        kind: MessageKind::Data,
        error: SendFailure::Encode(ProtocolError::RecordTooLong { max: 256, .. }),
    })));
}

#[test]
fn oversized_device_id_never_reaches_hub() {
    let mut sim = Sim::new(HubPolicy::default());
    sim.device.configure("d".repeat(300));

    sim.run(0, 12_000, 500);

    // Every attempt fails to encode and times out; the hub hears nothing.
    assert!(sim.hub.received().is_empty());
    assert!(!sim.device.is_registered());
    let failures = sim
        .events()
        .iter()
        .filter(|e| {
            matches!(e, SessionEvent::SendFailed {
                kind: MessageKind::Register,
                error: SendFailure::Encode(ProtocolError::RecordTooLong { .. }),
            })
        })
        .count();
    assert_eq!(failures, 3);
}

#[test]
fn closed_link_makes_send_data_false() {
    let mut sim = Sim::new(HubPolicy::default());
    sim.run(0, 200, 100);
    assert!(sim.device.is_registered());

    sim.transport.close();

    assert!(!sim.device.send_data("temperature", "23.5"));
    assert!(sim.events().iter().any(|e| matches!(e, SessionEvent::SendFailed {
        kind: MessageKind::Data,
        error: SendFailure::Transport(TransportError::Closed),
    })));
}

#[test]
fn deregister_stops_session_until_register_requested() {
    let mut sim = Sim::new(HubPolicy::default());
    sim.run(0, 500, 100);
    assert!(sim.device.is_registered());

    sim.device.request_deregister();
    assert_eq!(sim.device.current_state(), ConnectionState::Disconnected);

    let log = sim.run(600, 30_000, 100);
    assert_eq!(kinds(&log, MessageKind::Deregister).len(), 1);
    assert!(kinds(&log, MessageKind::Register).is_empty());
    assert!(kinds(&log, MessageKind::Heartbeat).is_empty());

    let now = sim.env.now();
    assert!(sim.device.request_register(now));
    sim.run(30_100, 30_300, 100);
    assert!(sim.device.is_registered());
}

#[test]
fn oversized_and_malformed_records_are_dropped() {
    let mut sim = Sim::new(HubPolicy::silent());
    let pending = sim.poll_at(0)[0].message_id.clone();

    let mut oversized = vec![b'x'; 400];
    oversized.push(b'\n');
    sim.transport.inject_bytes(&oversized);
    sim.transport.inject_bytes(b"{\"type\":\"ack\"\n");
    let ack = encode_line(&Message::ack("hub", pending), 256).unwrap();
    sim.transport.inject_bytes(format!("{ack}\r\n").as_bytes());

    sim.poll_at(100);

    assert!(sim.device.is_registered());
    let events = sim.events();
    assert!(events.iter().any(|e| matches!(
        e,
        SessionEvent::DecodeFailed(ProtocolError::RecordTooLong { len: 400, .. })
    )));
    assert!(
        events
            .iter()
            .any(|e| matches!(e, SessionEvent::DecodeFailed(ProtocolError::Malformed(_))))
    );
}
