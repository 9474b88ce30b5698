//! Tests for reading the remote kill switch.

use mockito::Server;
use reqwest::blocking::Client;
use rumqttc::{ConnectionError, Event, Outgoing, Packet, Publish, QoS};
use std::io;
use std::net::TcpListener;
use std::time::Duration;
use tou_cli::kill_switch::{await_switch_state, interpret, AlwaysEnabled};
use tou_cli::settings::{HttpSwitchSettings, MqttSwitchSettings};
use tou_cli::{HttpKillSwitch, KillSwitch, MqttKillSwitch};
use tou_engine::ScheduleError;

// ── Helpers ─────────────────────────────────────────────────────────────────

fn http_switch(server: &Server, token: Option<&str>) -> HttpKillSwitch {
    HttpKillSwitch::new(
        Client::new(),
        HttpSwitchSettings {
            url: format!("{}/powerwall/schedule", server.url()),
            token: token.map(str::to_string),
        },
    )
}

fn mqtt_settings(port: u16) -> MqttSwitchSettings {
    MqttSwitchSettings {
        broker: "127.0.0.1".to_string(),
        port,
        user: Some("powerwall".to_string()),
        password: Some("secret".to_string()),
        topic: "powerwall/schedule".to_string(),
    }
}

fn message(payload: &str) -> Result<Event, ConnectionError> {
    Ok(Event::Incoming(Packet::Publish(Publish::new(
        "powerwall/schedule",
        QoS::AtLeastOnce,
        payload,
    ))))
}

// ── Interpreting the state ──────────────────────────────────────────────────

#[test]
fn off_disables_the_run() {
    assert!(!interpret("off"));
    assert!(!interpret("OFF\n"));
    assert!(!interpret("  Off  "));
}

#[test]
fn anything_else_enables_the_run() {
    assert!(interpret("on"));
    assert!(interpret(""));
    assert!(interpret("offline"));
    assert!(interpret("{\"state\":\"off\"}"));
}

#[test]
fn unconfigured_switch_is_always_enabled() {
    assert!(AlwaysEnabled.check().unwrap());
}

// ── HTTP ────────────────────────────────────────────────────────────────────

#[test]
fn http_off_body_disables_the_run() {
    let mut server = Server::new();
    let mock = server
        .mock("GET", "/powerwall/schedule")
        .match_header("authorization", "Bearer switch-token")
        .with_status(200)
        .with_body("off\n")
        .create();

    assert!(!http_switch(&server, Some("switch-token")).check().unwrap());
    mock.assert();
}

#[test]
fn http_other_body_enables_the_run() {
    let mut server = Server::new();
    let mock = server
        .mock("GET", "/powerwall/schedule")
        .with_status(200)
        .with_body("on")
        .create();

    assert!(http_switch(&server, None).check().unwrap());
    mock.assert();
}

#[test]
fn http_failure_status_is_fetch_error() {
    let mut server = Server::new();
    let mock = server
        .mock("GET", "/powerwall/schedule")
        .with_status(503)
        .with_body("off")
        .create();

    assert!(matches!(
        http_switch(&server, None).check(),
        Err(ScheduleError::Fetch(_))
    ));
    mock.assert();
}

// ── MQTT ────────────────────────────────────────────────────────────────────

#[test]
fn mqtt_off_message_disables_the_run() {
    let events = vec![
        Ok(Event::Outgoing(Outgoing::Subscribe(1))),
        Ok(Event::Outgoing(Outgoing::PingReq)),
        message("off"),
    ];
    assert!(!await_switch_state(events).unwrap());
}

#[test]
fn mqtt_other_message_enables_the_run() {
    assert!(await_switch_state(vec![message("on")]).unwrap());
}

#[test]
fn mqtt_first_message_wins() {
    assert!(!await_switch_state(vec![message("OFF"), message("on")]).unwrap());
}

#[test]
fn mqtt_connection_error_is_fetch_error() {
    let events = vec![
        Err(ConnectionError::Io(io::Error::new(
            io::ErrorKind::ConnectionRefused,
            "refused",
        ))),
        message("on"),
    ];
    assert!(matches!(
        await_switch_state(events),
        Err(ScheduleError::Fetch(_))
    ));
}

#[test]
fn mqtt_without_message_is_fetch_error() {
    let events = vec![Ok(Event::Outgoing(Outgoing::PingReq))];
    assert!(matches!(
        await_switch_state(events),
        Err(ScheduleError::Fetch(_))
    ));
}

#[test]
fn mqtt_unreachable_broker_is_fetch_error() {
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };

    let switch = MqttKillSwitch::new(mqtt_settings(port)).with_wait(Duration::from_secs(2));
    assert!(matches!(switch.check(), Err(ScheduleError::Fetch(_))));
}

#[test]
fn mqtt_silent_broker_times_out_as_fetch_error() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    let switch =
        MqttKillSwitch::new(mqtt_settings(port)).with_wait(Duration::from_millis(300));
    assert!(matches!(switch.check(), Err(ScheduleError::Fetch(_))));
    drop(listener);
}
