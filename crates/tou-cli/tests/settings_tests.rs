//! Tests for runner settings and the configuration template.

use std::path::PathBuf;
use tou_cli::settings::{
    HttpSwitchSettings, KillSwitchSettings, MqttSwitchSettings, OctopusCredentials,
    TessieCredentials,
};
use tou_cli::{write_template, Settings, CONFIG_TEMPLATE};
use tou_engine::{KeyValues, ScheduleConfig, ScheduleError};

// ── Helpers ─────────────────────────────────────────────────────────────────

const CREDENTIALS: &str = "\
TESSIE_API_KEY tessie-123
TESLA_SITE_ID 1689267438473
OCTOPUS_API_KEY sk_live_abc
OCTOPUS_ACCOUNT_NUMBER A-1234ABCD
";

fn settings(extra: &str) -> Result<Settings, ScheduleError> {
    let kv: KeyValues = format!("{}{}", CREDENTIALS, extra).parse()?;
    Settings::from_key_values(&kv)
}

// ── Template ────────────────────────────────────────────────────────────────

#[test]
fn template_parses_but_is_not_usable() {
    let kv: KeyValues = CONFIG_TEMPLATE.parse().unwrap();

    assert!(ScheduleConfig::from_key_values(&kv).is_ok());
    assert!(matches!(
        Settings::from_key_values(&kv),
        Err(ScheduleError::Config(_))
    ));
}

#[test]
fn template_schedule_matches_defaults() {
    let kv: KeyValues = CONFIG_TEMPLATE.parse().unwrap();
    assert_eq!(
        ScheduleConfig::from_key_values(&kv).unwrap(),
        ScheduleConfig::default()
    );
}

#[test]
fn template_is_never_written_over_an_existing_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.txt");

    write_template(&path).unwrap();
    assert_eq!(std::fs::read_to_string(&path).unwrap(), CONFIG_TEMPLATE);

    std::fs::write(&path, CREDENTIALS).unwrap();
    assert!(write_template(&path).is_err());
    assert_eq!(std::fs::read_to_string(&path).unwrap(), CREDENTIALS);
}

// ── Settings ────────────────────────────────────────────────────────────────

#[test]
fn credentials_and_defaults() {
    let settings = settings("").unwrap();

    assert_eq!(
        settings.octopus,
        OctopusCredentials {
            api_key: "sk_live_abc".to_string(),
            account_number: "A-1234ABCD".to_string(),
        }
    );
    assert_eq!(
        settings.tessie,
        TessieCredentials {
            api_key: "tessie-123".to_string(),
            site_id: "1689267438473".to_string(),
        }
    );
    assert_eq!(settings.state_file, PathBuf::from("IO-Changed-Hash"));
    assert!(!settings.debug);
    assert!(settings.kill_switch.is_none());
    assert!(settings.unknown_keys.is_empty());
}

#[test]
fn debug_and_state_file_overrides() {
    let settings = settings("DEBUG True\nSTATE_FILE /var/lib/powerwall/hash\n").unwrap();
    assert!(settings.debug);
    assert_eq!(settings.state_file, PathBuf::from("/var/lib/powerwall/hash"));
}

#[test]
fn kill_switch_needs_url_when_enabled() {
    assert!(matches!(
        settings("KILL_SWITCH_ENABLE True\n"),
        Err(ScheduleError::Config(_))
    ));

    let enabled = settings("KILL_SWITCH_ENABLE True\nKILL_SWITCH_URL https://switch.local/pw\n")
        .unwrap();
    assert_eq!(
        enabled.kill_switch,
        Some(KillSwitchSettings::Http(HttpSwitchSettings {
            url: "https://switch.local/pw".to_string(),
            token: None,
        }))
    );
}

#[test]
fn kill_switch_settings_ignored_when_disabled() {
    let settings = settings("KILL_SWITCH_ENABLE False\nKILL_SWITCH_URL https://switch.local/pw\n")
        .unwrap();
    assert!(settings.kill_switch.is_none());
}

#[test]
fn mqtt_kill_switch_needs_broker_and_topic() {
    assert!(matches!(
        settings("MQTT_ENABLE True\nMQTT_TOPIC powerwall/schedule\n"),
        Err(ScheduleError::Config(_))
    ));
    assert!(matches!(
        settings("MQTT_ENABLE True\nMQTT_BROKER 192.168.1.10\n"),
        Err(ScheduleError::Config(_))
    ));

    let enabled = settings(
        "MQTT_ENABLE True\nMQTT_BROKER 192.168.1.10\nMQTT_TOPIC powerwall/schedule\n",
    )
    .unwrap();
    assert_eq!(
        enabled.kill_switch,
        Some(KillSwitchSettings::Mqtt(MqttSwitchSettings {
            broker: "192.168.1.10".to_string(),
            port: 1883,
            user: None,
            password: None,
            topic: "powerwall/schedule".to_string(),
        }))
    );
    assert!(enabled.unknown_keys.is_empty());
}

#[test]
fn mqtt_kill_switch_with_credentials_and_port() {
    let enabled = settings(
        "MQTT_ENABLE True\nMQTT_BROKER broker.local\nMQTT_PORT 8883\n\
         MQTT_USER powerwall\nMQTT_PWD secret\nMQTT_TOPIC home/powerwall\n",
    )
    .unwrap();
    assert_eq!(
        enabled.kill_switch,
        Some(KillSwitchSettings::Mqtt(MqttSwitchSettings {
            broker: "broker.local".to_string(),
            port: 8883,
            user: Some("powerwall".to_string()),
            password: Some("secret".to_string()),
            topic: "home/powerwall".to_string(),
        }))
    );
}

#[test]
fn mqtt_port_must_be_a_port_number() {
    assert!(matches!(
        settings("MQTT_ENABLE True\nMQTT_BROKER b\nMQTT_PORT mqtt\nMQTT_TOPIC t\n"),
        Err(ScheduleError::Config(_))
    ));
}

#[test]
fn both_kill_switches_enabled_is_config_error() {
    let result = settings(
        "KILL_SWITCH_ENABLE True\nKILL_SWITCH_URL https://switch.local/pw\n\
         MQTT_ENABLE True\nMQTT_BROKER 192.168.1.10\nMQTT_TOPIC powerwall/schedule\n",
    );
    assert!(matches!(result, Err(ScheduleError::Config(_))));
}

#[test]
fn mqtt_settings_ignored_when_disabled() {
    let settings = settings("MQTT_ENABLE False\nMQTT_BROKER 192.168.1.10\n").unwrap();
    assert!(settings.kill_switch.is_none());
    assert!(settings.unknown_keys.is_empty());
}

#[test]
fn unknown_keys_are_collected() {
    let settings = settings("TESLA_EMAIL me@example.com\nREENABLE_EXPORT_OFFSET 4\n").unwrap();
    assert_eq!(
        settings.unknown_keys,
        vec!["TESLA_EMAIL".to_string(), "REENABLE_EXPORT_OFFSET".to_string()]
    );
}

#[test]
fn settings_load_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.txt");
    std::fs::write(&path, format!("{}READONLY True\n", CREDENTIALS)).unwrap();

    let settings = Settings::load(&path).unwrap();
    assert!(settings.schedule.read_only);
}
