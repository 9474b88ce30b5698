//! Tests for `KEY value` parsing and the schedule configuration.

use chrono::NaiveTime;
use tou_engine::{KeyValues, ScheduleConfig, ScheduleError};

fn kv(text: &str) -> KeyValues {
    text.parse().unwrap()
}

// ── KeyValues ───────────────────────────────────────────────────────────────

#[test]
fn parses_pairs_and_skips_comments() {
    let parsed = kv("# Octopus\nOCTOPUS_API_KEY sk_live_abc\n\n   ONPEAK_RATE   0.30  \n");
    assert_eq!(parsed.get("OCTOPUS_API_KEY"), Some("sk_live_abc"));
    assert_eq!(parsed.get("ONPEAK_RATE"), Some("0.30"));
    assert_eq!(parsed.keys().count(), 2);
}

#[test]
fn value_is_rest_of_line() {
    let parsed = kv("TARIFF_NAME Intelligent Octopus Go");
    assert_eq!(parsed.get("TARIFF_NAME"), Some("Intelligent Octopus Go"));
}

#[test]
fn repeated_key_keeps_last_value() {
    let parsed = kv("DEBUG False\nDEBUG True");
    assert_eq!(parsed.get("DEBUG"), Some("True"));
}

#[test]
fn key_without_value_is_config_error() {
    let err = "DEBUG True\nREADONLY\n".parse::<KeyValues>().unwrap_err();
    match err {
        ScheduleError::Config(message) => assert!(message.contains("line 2")),
        other => panic!("expected Config error, got {:?}", other),
    }
}

#[test]
fn placeholder_value_is_rejected() {
    let parsed = kv("TESLA_SITE_ID XXXXXXXXXXXXXXXX\nTESSIE_API_KEY real");
    assert!(matches!(
        parsed.required("TESLA_SITE_ID"),
        Err(ScheduleError::Config(_))
    ));
    assert!(matches!(
        parsed.required("OCTOPUS_API_KEY"),
        Err(ScheduleError::Config(_))
    ));
    assert_eq!(parsed.required("TESSIE_API_KEY").unwrap(), "real");
}

#[test]
fn flags_accept_python_style_booleans() {
    let parsed = kv("A True\nB false\nC 1\nD maybe");
    assert!(parsed.flag("A", false).unwrap());
    assert!(!parsed.flag("B", true).unwrap());
    assert!(parsed.flag("C", false).unwrap());
    assert!(parsed.flag("MISSING", true).unwrap());
    assert!(parsed.flag("D", false).is_err());
}

#[test]
fn decimals_must_be_finite() {
    let parsed = kv("A 0.25\nB NaN\nC abc");
    assert_eq!(parsed.decimal("A", 0.0).unwrap(), 0.25);
    assert!(parsed.decimal("B", 0.0).is_err());
    assert!(parsed.decimal("C", 0.0).is_err());
}

#[test]
fn ports_are_non_zero_u16() {
    let parsed = kv("A 8883\nB 0\nC 70000");
    assert_eq!(parsed.port("A", 1883).unwrap(), 8883);
    assert_eq!(parsed.port("MISSING", 1883).unwrap(), 1883);
    assert!(parsed.port("B", 1883).is_err());
    assert!(parsed.port("C", 1883).is_err());
}

// ── ScheduleConfig ──────────────────────────────────────────────────────────

#[test]
fn empty_file_gives_defaults() {
    let config = ScheduleConfig::from_key_values(&KeyValues::default()).unwrap();
    assert_eq!(config, ScheduleConfig::default());
    assert_eq!(config.timezone, chrono_tz::Europe::London);
    assert_eq!(config.anchor_start, NaiveTime::from_hms_opt(23, 30, 0).unwrap());
    assert_eq!(config.anchor_end, NaiveTime::from_hms_opt(5, 30, 0).unwrap());
    assert_eq!(config.rates.off_peak.buy, 0.07);
    assert_eq!(config.rates.on_peak.sell, 0.15);
    assert!(config.participate_free);
    assert!(!config.participate_savings);
}

#[test]
fn overrides_are_applied() {
    let config = ScheduleConfig::from_key_values(&kv(concat!(
        "ONPEAK_RATE 0.30\n",
        "OFFPEAK_SELL_RATE 0.04\n",
        "SAVINGS_SESSIONS True\n",
        "FREE_ELECTRIC False\n",
        "READONLY True\n",
        "ANCHOR_START 00:30\n",
        "ANCHOR_END 04:30\n",
        "TIMEZONE America/New_York\n",
        "TARIFF_NAME Agile Octopus\n",
    )))
    .unwrap();

    assert_eq!(config.rates.on_peak.buy, 0.30);
    assert_eq!(config.rates.off_peak.sell, 0.04);
    assert!(config.participate_savings);
    assert!(!config.participate_free);
    assert!(config.publish_options().read_only);
    assert_eq!(config.anchor_start, NaiveTime::from_hms_opt(0, 30, 0).unwrap());
    assert_eq!(config.timezone, chrono_tz::America::New_York);
    assert_eq!(config.tariff.name, "Agile Octopus");
    assert_eq!(config.tariff.utility, "Octopus");
}

#[test]
fn malformed_values_are_config_errors() {
    for text in [
        "TIMEZONE Mars/Olympus",
        "ANCHOR_START 25:00",
        "SAVINGS_POINTS_PER_UNIT 0",
        "ONPEAK_RATE cheap",
    ] {
        let result = ScheduleConfig::from_key_values(&kv(text));
        assert!(
            matches!(result, Err(ScheduleError::Config(_))),
            "{} should be rejected",
            text
        );
    }
}

#[test]
fn config_file_is_loaded_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.txt");
    std::fs::write(&path, "ONPEAK_RATE 0.31\n").unwrap();

    let parsed = KeyValues::load(&path).unwrap();
    assert_eq!(parsed.get("ONPEAK_RATE"), Some("0.31"));

    assert!(matches!(
        KeyValues::load(&dir.path().join("missing.txt")),
        Err(ScheduleError::Config(_))
    ));
}
