//! CLI integration tests for the `check-config` subcommand.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const VALID_CONFIG: &str = r#"
[bot]
name = "cli-test-bot"
id = "bot-cli-01"

[executor]
symbol = "R_75"
contract_type = "ACCU"
growth_rate_percent = "2"

[risk]
base_stake = "1.00"
daily_loss_floor = "25.00"
daily_profit_ceiling = "50.00"
"#;

/// A command rooted in its own scratch directory, with the full set of
/// required environment variables. Tests unset or break pieces from here.
fn tickradar(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("tickradar").unwrap();
    cmd.current_dir(dir.path())
        .env("BROKER_APP_ID", "1089")
        .env("BROKER_API_TOKEN", "test-token")
        .env("STORE_URL", "https://store.example.com")
        .env("STORE_ANON_KEY", "anon-key");
    cmd
}

fn write_config(dir: &TempDir, contents: &str) {
    std::fs::write(dir.path().join("config.toml"), contents).expect("write config");
}

#[test]
fn help_lists_the_subcommands() {
    Command::cargo_bin("tickradar")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("radar"))
        .stdout(predicate::str::contains("executor"))
        .stdout(predicate::str::contains("check-config"));
}

#[test]
fn check_config_accepts_a_valid_setup() {
    let dir = TempDir::new().unwrap();
    write_config(&dir, VALID_CONFIG);

    tickradar(&dir)
        .arg("check-config")
        .assert()
        .success()
        .stdout(predicate::str::contains("config ok"))
        .stdout(predicate::str::contains("cli-test-bot"));
}

#[test]
fn check_config_rejects_a_bad_bot_name() {
    let dir = TempDir::new().unwrap();
    write_config(&dir, &VALID_CONFIG.replace("cli-test-bot", "bad..name"));

    tickradar(&dir)
        .arg("check-config")
        .assert()
        .failure()
        .stderr(predicate::str::contains("bot.name"));
}

#[test]
fn check_config_rejects_an_out_of_range_growth_rate() {
    let dir = TempDir::new().unwrap();
    write_config(
        &dir,
        &VALID_CONFIG.replace("growth_rate_percent = \"2\"", "growth_rate_percent = \"7\""),
    );

    tickradar(&dir)
        .arg("check-config")
        .assert()
        .failure()
        .stderr(predicate::str::contains("growth_rate_percent"));
}

#[test]
fn check_config_requires_broker_credentials() {
    let dir = TempDir::new().unwrap();
    write_config(&dir, VALID_CONFIG);

    tickradar(&dir)
        .arg("check-config")
        .env_remove("BROKER_API_TOKEN")
        .assert()
        .failure()
        .stderr(predicate::str::contains("BROKER_API_TOKEN"));
}

#[test]
fn check_config_reports_a_missing_file() {
    let dir = TempDir::new().unwrap();

    tickradar(&dir)
        .arg("check-config")
        .assert()
        .failure()
        .stderr(predicate::str::contains("read config file"));
}
