//! Remote kill switch, checked once before a run.
//!
//! The switch is either a URL whose response body is the desired state, or an
//! MQTT topic whose (normally retained) message is. A state of `off` (any case,
//! surrounding whitespace ignored) disables the run; anything else leaves it
//! enabled.

use crate::settings::{HttpSwitchSettings, MqttSwitchSettings};
use reqwest::blocking::Client;
use rumqttc::{ConnectionError, Event, MqttOptions, Packet, QoS};
use std::time::{Duration, Instant};
use tou_engine::error::{Result, ScheduleError};
use tracing::debug;

/// How long to wait for the broker to deliver the switch state.
const MQTT_WAIT: Duration = Duration::from_secs(10);
const MQTT_KEEP_ALIVE: Duration = Duration::from_secs(30);

pub trait KillSwitch {
    /// `true` when the run may proceed.
    ///
    /// # Errors
    /// Returns `ScheduleError::Fetch` if the switch cannot be read.
    fn check(&self) -> Result<bool>;
}

/// Used when no kill switch is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysEnabled;

impl KillSwitch for AlwaysEnabled {
    fn check(&self) -> Result<bool> {
        Ok(true)
    }
}

pub struct HttpKillSwitch {
    client: Client,
    settings: HttpSwitchSettings,
}

impl HttpKillSwitch {
    pub fn new(client: Client, settings: HttpSwitchSettings) -> Self {
        Self { client, settings }
    }
}

impl KillSwitch for HttpKillSwitch {
    fn check(&self) -> Result<bool> {
        let mut request = self.client.get(&self.settings.url);
        if let Some(token) = &self.settings.token {
            request = request.bearer_auth(token);
        }
        let response = request
            .send()
            .map_err(|e| ScheduleError::Fetch(format!("kill switch: {}", e)))?;
        if !response.status().is_success() {
            return Err(ScheduleError::Fetch(format!(
                "kill switch: HTTP {}",
                response.status()
            )));
        }
        let body = response
            .text()
            .map_err(|e| ScheduleError::Fetch(format!("kill switch: {}", e)))?;
        debug!(state = body.trim(), "kill switch state");
        Ok(interpret(&body))
    }
}

/// Subscribes to the switch topic and reads the first message delivered.
pub struct MqttKillSwitch {
    settings: MqttSwitchSettings,
    wait: Duration,
}

impl MqttKillSwitch {
    pub fn new(settings: MqttSwitchSettings) -> Self {
        Self {
            settings,
            wait: MQTT_WAIT,
        }
    }

    /// Give up on the broker after `wait` instead of the default.
    pub fn with_wait(mut self, wait: Duration) -> Self {
        self.wait = wait;
        self
    }

    fn options(&self) -> MqttOptions {
        let client_id = match &self.settings.user {
            Some(user) => format!("Client-{}", user),
            None => "tou-scheduler".to_string(),
        };
        let mut options = MqttOptions::new(client_id, &self.settings.broker, self.settings.port);
        options.set_keep_alive(MQTT_KEEP_ALIVE);
        if let Some(user) = &self.settings.user {
            options.set_credentials(user, self.settings.password.clone().unwrap_or_default());
        }
        options
    }
}

impl KillSwitch for MqttKillSwitch {
    fn check(&self) -> Result<bool> {
        let (client, mut connection) = rumqttc::Client::new(self.options(), 10);
        client
            .subscribe(&self.settings.topic, QoS::AtLeastOnce)
            .map_err(|e| ScheduleError::Fetch(format!("kill switch broker: {}", e)))?;
        debug!(
            broker = %self.settings.broker,
            port = self.settings.port,
            topic = %self.settings.topic,
            "waiting for kill switch state"
        );

        let deadline = Instant::now() + self.wait;
        let events = std::iter::from_fn(|| {
            let remaining = deadline.checked_duration_since(Instant::now())?;
            connection.recv_timeout(remaining).ok()
        });
        let state = await_switch_state(events);

        if let Err(e) = client.disconnect() {
            debug!(error = %e, "kill switch broker disconnect failed");
        }
        state
    }
}

/// The switch state carried by the first message in `events`.
///
/// # Errors
/// Returns `ScheduleError::Fetch` on a connection error, or when the events
/// end before any message arrives.
pub fn await_switch_state<I>(events: I) -> Result<bool>
where
    I: IntoIterator<Item = std::result::Result<Event, ConnectionError>>,
{
    for event in events {
        match event {
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                let body = String::from_utf8_lossy(&publish.payload);
                debug!(topic = %publish.topic, state = body.trim(), "kill switch state");
                return Ok(interpret(&body));
            }
            Ok(_) => {}
            Err(e) => return Err(ScheduleError::Fetch(format!("kill switch broker: {}", e))),
        }
    }
    Err(ScheduleError::Fetch(
        "kill switch broker: no state received".to_string(),
    ))
}

/// Whether a switch body allows the run.
pub fn interpret(body: &str) -> bool {
    !body.trim().eq_ignore_ascii_case("off")
}
