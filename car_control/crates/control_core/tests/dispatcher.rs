mod common;

use car_protocol::{ServerMessage, ACTIONS};
use chrono::{Local, TimeZone};
use common::{Attempt, ScriptedTransport};
use control_core::connection::{self, ConnectionEvent, ConnectionState, DisconnectReason, Link};
use control_core::{ControlConfig, ControlError, Dispatcher, MovementIndicator, NoticeLevel};
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Clone, Default)]
struct FakeLink {
    ready: Rc<Cell<bool>>,
    sent: Rc<RefCell<Vec<String>>>,
}

impl FakeLink {
    fn connected() -> Self {
        let link = Self::default();
        link.ready.set(true);
        link
    }

    fn sent_json(&self) -> Vec<serde_json::Value> {
        self.sent
            .borrow()
            .iter()
            .map(|s| serde_json::from_str(s).expect("sent valid json"))
            .collect()
    }
}

impl Link for FakeLink {
    fn is_ready(&self) -> bool {
        self.ready.get()
    }

    fn send(&self, text: String) -> Result<(), ControlError> {
        if !self.ready.get() {
            return Err(ControlError::NotConnected);
        }
        self.sent.borrow_mut().push(text);
        Ok(())
    }
}

fn dispatcher(link: &FakeLink) -> Dispatcher<FakeLink> {
    Dispatcher::new(link.clone(), &ControlConfig::default())
}

#[test]
fn unknown_action_is_rejected_without_sending() {
    let link = FakeLink::connected();
    let mut d = dispatcher(&link);

    for action in ["TURBO", "adelante", "", "G 45 DER"] {
        match d.dispatch(action) {
            Err(ControlError::InvalidAction(name)) => assert_eq!(name, action),
            other => panic!("expected invalid action, got: {other:?}"),
        }
        let notices = d.take_notices();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].level, NoticeLevel::Error);
        assert!(notices[0].text.contains(action));
    }

    assert!(link.sent.borrow().is_empty());
    assert!(d.history().is_empty());
    assert_eq!(d.indicator(), &MovementIndicator::Idle);
}

#[test]
fn every_action_is_rejected_while_disconnected() {
    let link = FakeLink::default();
    let mut d = dispatcher(&link);

    for &(action, _) in ACTIONS {
        assert!(matches!(d.dispatch(action), Err(ControlError::NotConnected)));
        let notices = d.take_notices();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].level, NoticeLevel::Error);
    }

    assert!(link.sent.borrow().is_empty());
    assert!(d.history().is_empty());
}

#[test]
fn every_action_sends_one_envelope_with_its_code() {
    let link = FakeLink::connected();
    let mut d = dispatcher(&link);

    for &(action, code) in ACTIONS {
        link.sent.borrow_mut().clear();
        d.dispatch(action).expect("dispatch");

        let sent = link.sent_json();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0]["type"], "control");
        assert_eq!(sent[0]["action"], action);
        assert_eq!(sent[0]["operationId"], code);
        assert_eq!(sent[0]["deviceId"], 1);
    }
    assert!(d.take_notices().is_empty());
}

#[test]
fn adelante_scenario() {
    let link = FakeLink::connected();
    let mut d = dispatcher(&link);
    let wall = Local.with_ymd_and_hms(2024, 5, 1, 9, 15, 42).unwrap();

    let envelope = d.dispatch_at("ADELANTE", wall, Instant::now()).unwrap();
    assert_eq!(envelope.operation_id, 1);
    assert_eq!(envelope.device_id, 1);

    let sent = link.sent_json();
    assert_eq!(sent.len(), 1);
    let timestamp = sent[0]["timestamp"].as_str().unwrap();
    assert!(timestamp.ends_with('Z'));
    let parsed = chrono::DateTime::parse_from_rfc3339(timestamp).unwrap();
    assert_eq!(parsed, wall);

    let head = d.history().latest().unwrap();
    assert_eq!(head.action, "ADELANTE");
    assert_eq!(head.display_time, "09:15:42");
    assert_eq!(d.indicator().label(), "ADELANTE");
}

#[test]
fn device_id_comes_from_config() {
    let link = FakeLink::connected();
    let config = ControlConfig {
        device_id: 7,
        ..ControlConfig::default()
    };
    let mut d = Dispatcher::new(link.clone(), &config);
    d.dispatch("ATRAS").unwrap();
    assert_eq!(link.sent_json()[0]["deviceId"], 7);
}

#[test]
fn history_keeps_ten_newest_first() {
    let link = FakeLink::connected();
    let mut d = dispatcher(&link);

    let actions: Vec<&str> = ACTIONS.iter().map(|&(name, _)| name).take(11).collect();
    for action in &actions[..10] {
        d.dispatch(action).unwrap();
    }
    assert_eq!(d.history().len(), 10);
    assert_eq!(d.history().latest().unwrap().action, actions[9]);

    d.dispatch(actions[10]).unwrap();
    let kept: Vec<&str> = d.history().iter().map(|e| e.action.as_str()).collect();
    assert_eq!(kept.len(), 10);
    assert_eq!(kept[0], actions[10]);
    assert_eq!(kept[9], actions[1]);
    assert!(!kept.contains(&actions[0]));
}

#[test]
fn indicator_reverts_after_the_latest_dispatch() {
    let link = FakeLink::connected();
    let mut d = dispatcher(&link);
    let start = Instant::now();

    d.dispatch_at("ADELANTE", Local::now(), start).unwrap();
    d.tick(start + Duration::from_secs(1));
    assert_eq!(d.indicator().label(), "ADELANTE");

    d.dispatch_at("ATRAS", Local::now(), start + Duration::from_secs(1)).unwrap();
    assert_eq!(d.revert_deadline(), Some(start + Duration::from_secs(3)));

    // The first dispatch's deadline was replaced, not left pending.
    d.tick(start + Duration::from_millis(2500));
    assert_eq!(d.indicator(), &MovementIndicator::Active("ATRAS".to_string()));

    d.tick(start + Duration::from_secs(3));
    assert_eq!(d.indicator(), &MovementIndicator::Idle);
    assert_eq!(d.indicator().label(), "IDLE");
    assert_eq!(d.revert_deadline(), None);
}

#[test]
fn control_response_uses_message_or_default() {
    let mut d = dispatcher(&FakeLink::connected());

    d.handle_inbound_text(r#"{"type":"control_response","message":"moving forward"}"#);
    d.handle_inbound_text(r#"{"type":"control_response","action":"ATRAS"}"#);

    let notices = d.take_notices();
    assert_eq!(notices.len(), 2);
    assert!(notices.iter().all(|n| n.level == NoticeLevel::Success));
    assert_eq!(notices[0].text, "moving forward");
    assert_eq!(notices[1].text, "Command ATRAS executed");
}

#[test]
fn remote_error_is_a_notice_only() {
    let link = FakeLink::connected();
    let mut d = dispatcher(&link);
    d.on_connection_event(ConnectionEvent::Opened);
    d.take_notices();

    d.handle_inbound_text(r#"{"type":"error","message":"motor stall"}"#);

    let notices = d.take_notices();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].level, NoticeLevel::Error);
    assert_eq!(notices[0].text, "Error: motor stall");
    assert_eq!(d.status(), ConnectionState::Connected);
    assert!(d.history().is_empty());
}

#[test]
fn pong_connection_and_unknown_kinds_are_silent() {
    let mut d = dispatcher(&FakeLink::connected());

    d.handle_inbound(ServerMessage::Pong { message: None });
    d.handle_inbound_text(r#"{"type":"pong"}"#);
    d.handle_inbound_text(r#"{"type":"connection","message":"welcome"}"#);
    d.handle_inbound_text(r#"{"type":"telemetry","speed":4}"#);
    d.handle_inbound_text("not json at all");

    assert!(d.take_notices().is_empty());
    assert_eq!(d.status(), ConnectionState::Disconnected);
    assert_eq!(d.indicator(), &MovementIndicator::Idle);
}

#[test]
fn connection_events_update_status_and_notify() {
    let mut d = dispatcher(&FakeLink::default());

    d.on_connection_event(ConnectionEvent::Opened);
    assert_eq!(d.status(), ConnectionState::Connected);

    d.on_connection_event(ConnectionEvent::Disconnected {
        reason: DisconnectReason::Closed,
        retry_in: Duration::from_secs(5),
    });
    assert_eq!(d.status(), ConnectionState::Disconnected);

    d.on_connection_event(ConnectionEvent::Disconnected {
        reason: DisconnectReason::Error("refused".to_string()),
        retry_in: Duration::from_secs(5),
    });

    let levels: Vec<NoticeLevel> = d.take_notices().into_iter().map(|n| n.level).collect();
    assert_eq!(
        levels,
        vec![NoticeLevel::Success, NoticeLevel::Error, NoticeLevel::Error]
    );
}

#[tokio::test(start_paused = true)]
async fn dispatches_through_a_live_connection() {
    let (transport, mut peers, _attempts) = ScriptedTransport::new(vec![Attempt::Accept]);
    let config = ControlConfig::default();
    let (handle, mut events) = connection::spawn(transport, &config);
    let mut d = Dispatcher::new(handle, &config);

    let opened = events.recv().await.expect("opened");
    d.on_connection_event(opened);
    let mut peer = peers.recv().await.expect("peer");

    d.dispatch("G 90 DER").unwrap();
    let text = peer.from_client.recv().await.expect("envelope");
    let sent: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(sent["action"], "G 90 DER");
    assert_eq!(sent["operationId"], 500);

    peer.to_client
        .send(Ok(r#"{"type":"control_response","action":"G 90 DER"}"#.to_string()))
        .unwrap();
    let reply = events.recv().await.expect("reply");
    d.on_connection_event(reply);

    let notices = d.take_notices();
    assert_eq!(notices.last().unwrap().text, "Command G 90 DER executed");
}
