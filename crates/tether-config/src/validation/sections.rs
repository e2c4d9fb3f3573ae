//! Per-section validators.

use crate::schema::TetherConfig;

use super::helpers::{is_ice_url, validate_range};

pub(crate) fn validate_app(errors: &mut Vec<String>, config: &TetherConfig) {
    if config.app.app_id.trim().is_empty() {
        errors.push("app.app_id is required".into());
    }
    if let Some(url) = &config.app.base_url {
        if !(url.starts_with("https://") || url.starts_with("http://")) {
            errors.push(format!("app.base_url '{url}' must be an http(s) URL"));
        }
    }
}

pub(crate) fn validate_call(errors: &mut Vec<String>, config: &TetherConfig) {
    for (i, server) in config.call.ice_servers.iter().enumerate() {
        if server.urls.is_empty() {
            errors.push(format!("call.ice_servers[{i}] has no urls"));
        }
        for url in &server.urls {
            if !is_ice_url(url) {
                errors.push(format!("call.ice_servers[{i}] url '{url}' is not a stun/turn URL"));
            }
        }
    }
}

pub(crate) fn validate_turn(errors: &mut Vec<String>, config: &TetherConfig) {
    validate_range(
        errors,
        "turn.refresh_interval_secs",
        config.turn.refresh_interval_secs,
        60,
        604_800,
    );
}
