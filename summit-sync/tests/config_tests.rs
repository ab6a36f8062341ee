use std::time::Duration;
use summit_sync::SyncConfig;

#[test]
fn defaults() {
    let config = SyncConfig::default();
    assert_eq!(config.write_timeout(), Some(Duration::from_secs(30)));
    assert_eq!(config.event_buffer, 256);
}

#[test]
fn missing_fields_take_defaults() {
    let config = SyncConfig::from_json(r#"{ "event_buffer": 16 }"#).unwrap();
    assert_eq!(config.event_buffer, 16);
    assert_eq!(config.write_timeout_ms, Some(30_000));
}

#[test]
fn null_timeout_disables_it() {
    let config = SyncConfig::from_json(r#"{ "write_timeout_ms": null }"#).unwrap();
    assert_eq!(config.write_timeout(), None);
}

#[test]
fn rejects_wrong_types() {
    assert!(SyncConfig::from_json(r#"{ "event_buffer": "lots" }"#).is_err());
}
