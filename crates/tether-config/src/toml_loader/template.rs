//! Default TOML config template with inline documentation comments.

/// Generate the default TOML config content with comments.
pub(crate) fn default_config_toml() -> String {
    r##"# Tether Configuration
# Schema version 1
# Only override what you want to change -- missing fields use defaults.

[app]
# Application id issued by the signaling service (required).
app_id = ""
# base_url = "https://signaling.example.com"

[call]
# audio = true
# video = true
#
# [[call.ice_servers]]
# urls = ["stun:stun.example.com:3478"]

[turn]
# enabled = true
# refresh_interval_secs = 72000   # 60-604800

[logging]
# level = "INFO"          # DEBUG, INFO, WARNING, ERROR
# tether_only = true
"##
    .to_string()
}
