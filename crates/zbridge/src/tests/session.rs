//! Session-level tests: commands in, events out, over the loopback network.

use std::time::Duration;

use rstest::{fixture, rstest};
use serde_json::json;

use crate::bridge::{BridgeError, Flow, PERSONAL_CLASS};
use crate::transport::{
    AckMode, AuthStatus, Location, Notice, NoticeKind, SubscribeFault, Subscription, Transport,
    WILDCARD,
};

use super::support::{self, IDENTITY, TestSession, events, send_line};

#[fixture]
fn session() -> TestSession {
    support::session()
}

fn handle(session: &mut TestSession, line: &str) -> Flow {
    session.handle_record(line.as_bytes()).expect("handle record")
}

#[rstest]
fn delivered_send_reports_sent(mut session: TestSession) {
    handle(&mut session, r#"{"type":"subscribe","classes":["MSG"]}"#);
    handle(&mut session, &send_line("t1", "MSG", "bob", &["hello"]));
    session.drain_notices().expect("drain");

    let events = events(session.output());
    assert_eq!(events.len(), 2, "events: {events:?}");
    assert_eq!(events[0]["type"], "message");
    assert_eq!(events[0]["sender"], IDENTITY);
    assert_eq!(events[0]["body"], json!(["hello"]));
    assert_eq!(events[1], json!({"type": "result", "tag": "t1", "result": "SENT"}));
    assert!(session.pending().is_empty());
}

#[rstest]
fn unheard_send_reports_not_sent(mut session: TestSession) {
    handle(&mut session, &send_line("t1", "MSG", "bob", &["hello"]));
    session.drain_notices().expect("drain");

    assert_eq!(
        events(session.output()),
        [json!({"type": "result", "tag": "t1", "result": "NOTSENT"})]
    );
}

#[rstest]
fn send_missing_class_makes_no_transport_call(mut session: TestSession) {
    let flow = handle(
        &mut session,
        r#"{"type":"send","tag":"t2","instance":"x","recipient":"bob","body":[]}"#,
    );

    assert_eq!(flow, Flow::Continue);
    assert_eq!(
        events(session.output()),
        [json!({"type": "error", "message": "Required parameter missing (or of wrong type)"})]
    );
    assert_eq!(session.transport().last_correlation_id(), None);
    assert!(session.pending().is_empty());
}

#[rstest]
#[case(AuthStatus::No, "NO")]
#[case(AuthStatus::Failed, "FAILED")]
#[case(AuthStatus::Yes, "YES")]
fn inbound_message_carries_authentication(
    mut session: TestSession,
    #[case] status: AuthStatus,
    #[case] expected: &str,
) {
    let notice = session
        .transport()
        .message_from("bob@LOCAL", "MESSAGE", "PERSONAL", b"Bob\0hi there\0");
    session.transport_mut().set_authentication(status);
    session.transport_mut().inject(notice).expect("inject");

    assert_eq!(session.drain_notices().expect("drain"), 1);
    let events = events(session.output());
    assert_eq!(events[0]["auth"], expected);
    assert_eq!(events[0]["fromhost"], "127.0.0.1");
    assert_eq!(events[0]["body"], json!(["Bob", "hi there"]));
}

#[rstest]
fn quit_releases_session_without_output(mut session: TestSession) {
    handle(&mut session, r#"{"type":"subscribe","classes":["a","b"]}"#);
    session
        .announce_location(&Location {
            host: "cloud",
            tty: "zbridge",
            exposure: "OPSTAFF",
        })
        .expect("announce");

    assert_eq!(handle(&mut session, r#"{"type":"quit"}"#), Flow::Quit);
    session.shutdown();

    let transport = session.transport();
    assert!(!transport.is_open());
    assert!(transport.subscriptions().is_empty());
    assert!(transport.location().is_none());
    assert!(session.output().is_empty());
}

#[rstest]
fn rejected_send_reports_immediately(mut session: TestSession) {
    session
        .transport_mut()
        .set_send_rejection(Some(String::from("no tickets")));
    handle(&mut session, &send_line("t9", "MSG", "bob", &["hi"]));

    assert_eq!(
        events(session.output()),
        [json!({"type": "result", "tag": "t9", "result": "TRANSPORT_REJECTED"})]
    );
    assert!(session.pending().is_empty());
    assert_eq!(session.drain_notices().expect("drain"), 0);
}

#[rstest]
#[case(AckMode::Nak, "NAK")]
#[case(AckMode::Custom { kind: NoticeKind::ServerAck, payload: b"MAYBE\0".to_vec() }, "ERROR")]
#[case(AckMode::Custom { kind: NoticeKind::HostManagerAck, payload: b"SENT\0".to_vec() }, "ERROR")]
fn delivery_reports_are_classified(
    mut session: TestSession,
    #[case] mode: AckMode,
    #[case] expected: &str,
) {
    session.transport_mut().set_ack_mode(mode);
    handle(&mut session, &send_line("t1", "MSG", "bob", &["hi"]));
    session.drain_notices().expect("drain");

    assert_eq!(
        events(session.output()),
        [json!({"type": "result", "tag": "t1", "result": expected})]
    );
}

#[rstest]
fn every_send_gets_exactly_one_result(mut session: TestSession) {
    handle(&mut session, r#"{"type":"subscribe","classes":["MSG"]}"#);
    for tag in ["a", "b", "c"] {
        handle(&mut session, &send_line(tag, "MSG", "", &[tag]));
    }
    handle(&mut session, &send_line("d", "OTHER", "", &["d"]));
    session.drain_notices().expect("drain");
    session.drain_notices().expect("second drain finds nothing");

    let results: Vec<_> = events(session.output())
        .into_iter()
        .filter(|event| event["type"] == "result")
        .map(|event| event["tag"].as_str().map(str::to_owned))
        .collect();
    assert_eq!(
        results,
        ["a", "b", "c", "d"].map(|tag| Some(tag.to_owned()))
    );
}

#[rstest]
fn ordinary_message_never_consumes_a_pending_send(mut session: TestSession) {
    session.transport_mut().set_ack_mode(AckMode::Silent);
    handle(&mut session, &send_line("t1", "MSG", "bob", &["hi"]));
    let id = session
        .transport()
        .last_correlation_id()
        .expect("send accepted");

    let mut echo = session
        .transport()
        .message_from(IDENTITY, "MSG", "PERSONAL", b"hi\0");
    echo.id = id;
    let report = Notice {
        kind: NoticeKind::ServerAck,
        payload: b"SENT\0".to_vec(),
        ..echo.clone()
    };
    session.transport_mut().inject(echo).expect("inject echo");
    session.drain_notices().expect("drain echo");
    assert_eq!(session.pending().len(), 1);

    session.transport_mut().inject(report).expect("inject report");
    session.drain_notices().expect("drain report");

    let events = events(session.output());
    assert_eq!(events[0]["type"], "message");
    assert_eq!(events[1], json!({"type": "result", "tag": "t1", "result": "SENT"}));
    assert!(session.pending().is_empty());
}

#[rstest]
fn malformed_lines_are_reported_and_skipped(mut session: TestSession) {
    for line in ["not json", r#"{"kind":"send"}"#, r#"{"type":"dance"}"#, r#"{"type":"subscribe"}"#] {
        assert_eq!(handle(&mut session, line), Flow::Continue);
    }

    let messages: Vec<_> = events(session.output())
        .into_iter()
        .map(|event| event["message"].clone())
        .collect();
    assert_eq!(
        messages,
        [
            json!("Parse error"),
            json!("Command must have a 'type' attribute and it must be a string"),
            json!("Unrecognized command type"),
            json!("Missing field or bad types"),
        ]
    );
}

#[rstest]
fn refused_subscription_change_is_fatal(mut session: TestSession) {
    session
        .transport_mut()
        .set_subscribe_fault(Some(SubscribeFault::Fail));

    let error = session
        .handle_record(br#"{"type":"subscribe","classes":["a"]}"#)
        .expect_err("subscription must fail");

    assert!(matches!(error, BridgeError::Dispatch(_)));
    assert_eq!(
        events(session.output()),
        [json!({
            "type": "error",
            "message": "subscribe failed: subscription service unavailable",
        })]
    );
}

#[rstest]
fn personal_subscription_retries_server_naks(mut session: TestSession) {
    session
        .transport_mut()
        .set_subscribe_fault(Some(SubscribeFault::Nak { remaining: 2 }));

    session
        .subscribe_personal(3, Duration::ZERO)
        .expect("third attempt succeeds");

    assert_eq!(
        session.transport().subscriptions(),
        &[Subscription::new(PERSONAL_CLASS, WILDCARD, IDENTITY)]
    );
    assert!(session.output().is_empty());
}

#[rstest]
#[case(SubscribeFault::Nak { remaining: 3 })]
#[case(SubscribeFault::Fail)]
fn personal_subscription_failure_is_reported(
    mut session: TestSession,
    #[case] fault: SubscribeFault,
) {
    session.transport_mut().set_subscribe_fault(Some(fault));

    let error = session
        .subscribe_personal(3, Duration::ZERO)
        .expect_err("subscription must fail");

    assert!(matches!(error, BridgeError::PersonalSubscription { .. }));
    assert_eq!(events(session.output()).len(), 1);
    assert!(session.transport().subscriptions().is_empty());
}

#[rstest]
fn closed_transport_is_fatal_while_draining(mut session: TestSession) {
    session.transport_mut().close().expect("close");

    let error = session.drain_notices().expect_err("drain must fail");

    assert!(matches!(error, BridgeError::Receive { .. }));
    assert_eq!(events(session.output())[0]["type"], "error");
}
