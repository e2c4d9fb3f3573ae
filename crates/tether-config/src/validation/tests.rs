//! Tests for the full validation pipeline.

use super::*;
use crate::schema::*;

fn valid_config() -> TetherConfig {
    let mut config = TetherConfig::default();
    config.app.app_id = "app-1".into();
    config
}

#[test]
fn config_with_app_id_validates() {
    assert!(validate(&valid_config()).is_ok());
}

#[test]
fn default_config_is_missing_app_id() {
    let err = validate(&TetherConfig::default()).unwrap_err().to_string();
    assert!(err.contains("app.app_id"));
}

#[test]
fn whitespace_app_id_is_rejected() {
    let mut config = valid_config();
    config.app.app_id = "   ".into();
    assert!(validate(&config).is_err());
}

#[test]
fn catches_non_http_base_url() {
    let mut config = valid_config();
    config.app.base_url = Some("ftp://example.com".into());
    let err = validate(&config).unwrap_err().to_string();
    assert!(err.contains("app.base_url"));
}

#[test]
fn accepts_stun_and_turn_urls() {
    let mut config = valid_config();
    config.call.ice_servers = vec![
        IceServerConfig {
            urls: vec!["stun:stun.example.com:3478".into()],
            ..Default::default()
        },
        IceServerConfig {
            urls: vec!["turns:turn.example.com:5349?transport=tcp".into()],
            username: Some("u".into()),
            credential: Some("p".into()),
        },
    ];
    assert!(validate(&config).is_ok());
}

#[test]
fn catches_bad_ice_url() {
    let mut config = valid_config();
    config.call.ice_servers = vec![IceServerConfig {
        urls: vec!["https://stun.example.com".into()],
        ..Default::default()
    }];
    let err = validate(&config).unwrap_err().to_string();
    assert!(err.contains("call.ice_servers[0]"));
}

#[test]
fn catches_ice_server_without_urls() {
    let mut config = valid_config();
    config.call.ice_servers = vec![IceServerConfig::default()];
    let err = validate(&config).unwrap_err().to_string();
    assert!(err.contains("has no urls"));
}

#[test]
fn catches_turn_interval_out_of_range() {
    let mut config = valid_config();
    config.turn.refresh_interval_secs = 10;
    let err = validate(&config).unwrap_err().to_string();
    assert!(err.contains("turn.refresh_interval_secs"));
}

#[test]
fn collects_multiple_errors() {
    let mut config = TetherConfig::default();
    config.turn.refresh_interval_secs = 1_000_000;
    let err = validate(&config).unwrap_err().to_string();
    assert!(err.contains("app.app_id"));
    assert!(err.contains("turn.refresh_interval_secs"));
}
