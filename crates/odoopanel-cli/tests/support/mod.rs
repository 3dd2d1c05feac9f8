use assert_cmd::Command;
use std::fs;
use std::path::Path;

pub fn new_command_with_temp_home() -> (Command, tempfile::TempDir) {
    let temp_home = tempfile::tempdir().expect("temp home");
    let binary = assert_cmd::cargo::cargo_bin!("odoopanel");
    let mut command = Command::new(binary);
    command.env("HOME", temp_home.path());
    command.env("XDG_CONFIG_HOME", temp_home.path().join(".config"));
    command.env_remove("ODOOPANEL_API_URL");
    command.env_remove("ODOOPANEL_LOG");
    (command, temp_home)
}

#[allow(dead_code)]
pub fn write_valid_config(home: &Path) {
    let config_dir = home.join(".config").join("odoopanel");
    fs::create_dir_all(&config_dir).expect("create config dir");
    fs::write(
        config_dir.join("config.toml"),
        r#"
version = 1

[api]
base_url = "http://127.0.0.1:9"
timeout_secs = 2
"#,
    )
    .expect("write config");
}

#[allow(dead_code)]
pub fn write_invalid_config(home: &Path) {
    let config_dir = home.join(".config").join("odoopanel");
    fs::create_dir_all(&config_dir).expect("create config dir");
    fs::write(
        config_dir.join("config.toml"),
        r#"
version = 2

[api]
base_url = "panel.example.com"
"#,
    )
    .expect("write config");
}

#[allow(dead_code)]
pub fn assert_timestamp_log_names(entries: &[std::fs::DirEntry]) {
    assert!(!entries.is_empty(), "expected at least one diagnostics log");

    for entry in entries {
        let name = entry
            .file_name()
            .into_string()
            .expect("diagnostics filename utf8");
        let stem = name
            .strip_suffix(".log")
            .unwrap_or_else(|| panic!("diagnostics file should end with .log: {name}"));
        assert!(
            !stem.is_empty() && stem.chars().all(|character| character.is_ascii_digit()),
            "diagnostics filename must be <timestamp>.log, got: {name}"
        );
    }
}

#[allow(dead_code)]
pub fn write_session(home: &Path) {
    let config_dir = home.join(".config").join("odoopanel");
    fs::create_dir_all(&config_dir).expect("create config dir");
    fs::write(
        config_dir.join("session.toml"),
        r#"
access_token = "test-token"

[user]
username = "admin"
"#,
    )
    .expect("write session");
}
