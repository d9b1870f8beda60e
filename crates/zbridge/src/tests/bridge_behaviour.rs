//! Behavioural tests for client command handling.

use std::cell::RefCell;

use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use serde_json::Value;

use crate::bridge::{BridgeError, Flow};
use crate::transport::{AuthStatus, NoticeKind};

use super::support::{TestSession, events, send_line, session};

/// Test world for bridge command scenarios.
pub struct BridgeWorld {
    session: TestSession,
    flow: Option<Result<Flow, BridgeError>>,
    seen: usize,
}

impl BridgeWorld {
    fn new() -> Self {
        Self {
            session: session(),
            flow: None,
            seen: 0,
        }
    }

    /// Feeds one command line and handles whatever the network answers.
    fn submit(&mut self, line: &str) {
        let flow = self.session.handle_record(line.as_bytes());
        if matches!(flow, Ok(Flow::Continue)) {
            self.session.drain_notices().expect("drain notices");
        }
        self.flow = Some(flow);
    }

    /// Returns the next event the client has not inspected yet.
    fn next_event(&mut self) -> Value {
        let events = events(self.session.output());
        let event = events
            .get(self.seen)
            .cloned()
            .unwrap_or_else(|| panic!("no event after {} seen: {events:?}", self.seen));
        self.seen += 1;
        event
    }
}

#[fixture]
fn world() -> RefCell<BridgeWorld> {
    RefCell::new(BridgeWorld::new())
}

fn unquote(value: &str) -> &str {
    value.trim_matches('"')
}

// ---- Given steps ----

#[given("an open bridge session")]
fn given_open_session(world: &RefCell<BridgeWorld>) {
    assert!(world.borrow().session.transport().is_open());
}

#[given("the session listens on class {class}")]
fn given_listening(world: &RefCell<BridgeWorld>, class: String) {
    let line = serde_json::json!({"type": "subscribe", "classes": [unquote(&class)]}).to_string();
    world.borrow_mut().submit(&line);
}

#[given("the network cannot authenticate notices")]
fn given_unauthenticated(world: &RefCell<BridgeWorld>) {
    world
        .borrow_mut()
        .session
        .transport_mut()
        .set_authentication(AuthStatus::No);
}

#[given("the transport rejects sends with {reason}")]
fn given_rejection(world: &RefCell<BridgeWorld>, reason: String) {
    world
        .borrow_mut()
        .session
        .transport_mut()
        .set_send_rejection(Some(unquote(&reason).to_owned()));
}

// ---- When steps ----

#[when("the client sends {body} to {recipient} on class {class} tagged {tag}")]
fn when_client_sends(
    world: &RefCell<BridgeWorld>,
    body: String,
    recipient: String,
    class: String,
    tag: String,
) {
    let line = send_line(
        unquote(&tag),
        unquote(&class),
        unquote(&recipient),
        &[unquote(&body)],
    );
    world.borrow_mut().submit(&line);
}

#[when("the client submits a send without a class")]
fn when_send_without_class(world: &RefCell<BridgeWorld>) {
    world.borrow_mut().submit(
        r#"{"type":"send","tag":"t2","instance":"x","recipient":"bob","body":[]}"#,
    );
}

#[when("the client submits the line {line}")]
fn when_client_submits(world: &RefCell<BridgeWorld>, line: String) {
    world.borrow_mut().submit(unquote(&line));
}

#[when("a message {body} from {sender} arrives on class {class}")]
fn when_message_arrives(world: &RefCell<BridgeWorld>, body: String, sender: String, class: String) {
    let mut world = world.borrow_mut();
    let payload = crate::notice::encode_body(&[unquote(&body)]);
    let mut notice =
        world
            .session
            .transport()
            .message_from(unquote(&sender), unquote(&class), "PERSONAL", &payload);
    notice.kind = NoticeKind::Unacked;
    world
        .session
        .transport_mut()
        .inject(notice)
        .expect("inject notice");
    world.session.drain_notices().expect("drain notices");
}

#[when("the client quits")]
fn when_client_quits(world: &RefCell<BridgeWorld>) {
    let mut world = world.borrow_mut();
    world.submit(r#"{"type":"quit"}"#);
    if matches!(world.flow, Some(Ok(Flow::Quit))) {
        world.session.shutdown();
    }
}

// ---- Then steps ----

#[then("the client receives a message with body {body}")]
fn then_message_body(world: &RefCell<BridgeWorld>, body: String) {
    let event = world.borrow_mut().next_event();
    assert_eq!(event["type"], "message");
    assert_eq!(event["body"], serde_json::json!([unquote(&body)]));
}

#[then("the client receives a message from {sender} with auth {auth}")]
fn then_message_auth(world: &RefCell<BridgeWorld>, sender: String, auth: String) {
    let event = world.borrow_mut().next_event();
    assert_eq!(event["type"], "message");
    assert_eq!(event["sender"], unquote(&sender));
    assert_eq!(event["auth"], unquote(&auth));
}

#[then("the client receives result {result} for tag {tag}")]
fn then_result(world: &RefCell<BridgeWorld>, result: String, tag: String) {
    let event = world.borrow_mut().next_event();
    assert_eq!(
        event,
        serde_json::json!({"type": "result", "tag": unquote(&tag), "result": unquote(&result)})
    );
}

#[then("the client receives error {message}")]
fn then_error(world: &RefCell<BridgeWorld>, message: String) {
    let event = world.borrow_mut().next_event();
    assert_eq!(
        event,
        serde_json::json!({"type": "error", "message": unquote(&message)})
    );
}

#[then("the client receives nothing more")]
fn then_nothing_more(world: &RefCell<BridgeWorld>) {
    let world = world.borrow();
    let events = events(world.session.output());
    assert_eq!(events.len(), world.seen, "unexpected events: {events:?}");
}

#[then("no send is awaiting a report")]
fn then_nothing_pending(world: &RefCell<BridgeWorld>) {
    assert!(world.borrow().session.pending().is_empty());
}

#[then("the bridge stops")]
fn then_bridge_stops(world: &RefCell<BridgeWorld>) {
    assert!(matches!(world.borrow().flow, Some(Ok(Flow::Quit))));
    assert!(!world.borrow().session.transport().is_open());
}

#[then("the session holds no subscriptions")]
fn then_no_subscriptions(world: &RefCell<BridgeWorld>) {
    assert!(world.borrow().session.transport().subscriptions().is_empty());
}

#[scenario(
    path = "tests/features/bridge_commands.feature",
    name = "Acknowledged send reports delivery"
)]
fn acknowledged_send(world: RefCell<BridgeWorld>) {
    drop(world);
}

#[scenario(
    path = "tests/features/bridge_commands.feature",
    name = "Send without a class is refused before reaching the network"
)]
fn send_without_class(world: RefCell<BridgeWorld>) {
    drop(world);
}

#[scenario(
    path = "tests/features/bridge_commands.feature",
    name = "Unauthenticated notice is flagged"
)]
fn unauthenticated_notice(world: RefCell<BridgeWorld>) {
    drop(world);
}

#[scenario(
    path = "tests/features/bridge_commands.feature",
    name = "Quit releases the session silently"
)]
fn quit_releases_session(world: RefCell<BridgeWorld>) {
    drop(world);
}

#[scenario(
    path = "tests/features/bridge_commands.feature",
    name = "Transport rejection is reported against the tag"
)]
fn transport_rejection(world: RefCell<BridgeWorld>) {
    drop(world);
}

#[scenario(
    path = "tests/features/bridge_commands.feature",
    name = "Malformed input is reported and skipped"
)]
fn malformed_input(world: RefCell<BridgeWorld>) {
    drop(world);
}
