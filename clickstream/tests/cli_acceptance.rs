use std::fs;
use std::path::PathBuf;
use std::process::{Command, Output};
use tempfile::TempDir;

struct CliTestEnv {
    _temp_dir: TempDir,
    home: PathBuf,
    xdg_config: PathBuf,
    xdg_state: PathBuf,
    log: PathBuf,
}

impl CliTestEnv {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let base = temp_dir.path().to_path_buf();
        let home = base.join("home");
        let xdg_config = base.join("xdg-config");
        let xdg_state = base.join("xdg-state");

        fs::create_dir_all(&home).expect("failed to create HOME");
        fs::create_dir_all(&xdg_config).expect("failed to create XDG_CONFIG_HOME");
        fs::create_dir_all(&xdg_state).expect("failed to create XDG_STATE_HOME");

        let source = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("../clickstream-core/tests/fixtures/sparkify-sample.jsonl");
        let log = base.join("events.jsonl");
        fs::copy(source, &log).expect("failed to copy event log fixture");

        Self {
            _temp_dir: temp_dir,
            home,
            xdg_config,
            xdg_state,
            log,
        }
    }

    fn write_config(&self, contents: &str) {
        let dir = self.xdg_config.join("clickstream");
        fs::create_dir_all(&dir).expect("failed to create config dir");
        fs::write(dir.join("config.toml"), contents).expect("failed to write config");
    }

    fn log_arg(&self) -> &str {
        self.log.to_str().expect("non-utf8 temp path")
    }
}

fn run_report(env: &CliTestEnv, args: &[&str]) -> Output {
    let bin_path = PathBuf::from(assert_cmd::cargo::cargo_bin!("clickstream-report"));

    Command::new(bin_path)
        .args(args)
        .env("HOME", &env.home)
        .env("XDG_CONFIG_HOME", &env.xdg_config)
        .env("XDG_STATE_HOME", &env.xdg_state)
        .env_remove("RUST_LOG")
        .output()
        .unwrap_or_else(|e| panic!("failed to execute clickstream-report: {e}"))
}

fn assert_success(args: &[&str], output: &Output) {
    assert!(
        output.status.success(),
        "clickstream-report {:?} failed\nstdout:\n{}\nstderr:\n{}",
        args,
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
}

fn json_report(env: &CliTestEnv, extra: &[&str]) -> serde_json::Value {
    let mut args = vec![env.log_arg(), "--format", "json"];
    args.extend_from_slice(extra);
    let output = run_report(env, &args);
    assert_success(&args, &output);
    serde_json::from_slice(&output.stdout).expect("stdout should be JSON")
}

#[test]
fn json_report_covers_every_analysis() {
    let env = CliTestEnv::new();
    let report = json_report(&env, &[]);

    assert_eq!(report["records"], 19);
    assert_eq!(report["hourly_histogram"][0]["hour"], 0);
    assert_eq!(report["hourly_histogram"][0]["count"], 3);
    assert_eq!(report["top_artists"][0]["artist"], "Coldplay");
    assert_eq!(report["average_events_between_markers"], 2);
    assert_eq!(report["phases"]["users_with_downgrade"], 2);
    assert_eq!(report["cohort"]["users"], 2);
    assert_eq!(
        report["unvisited_pages"],
        serde_json::json!(["Error", "Logout", "NextSong", "Submit Downgrade"])
    );

    let log_dir = env.xdg_state.join("clickstream");
    let log_files: Vec<String> = fs::read_dir(&log_dir)
        .expect("log dir should exist")
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .collect();
    assert!(
        log_files.iter().any(|name| name.starts_with("clickstream.log.")),
        "no dated log file in {:?}",
        log_files
    );
}

#[test]
fn report_without_plays_leaves_average_unset() {
    let env = CliTestEnv::new();
    let quiet = env.log.with_file_name("quiet.jsonl");
    fs::write(
        &quiet,
        "{\"userId\":\"1\",\"sessionId\":1,\"ts\":1,\"page\":\"Home\"}\n",
    )
    .expect("failed to write log");
    let path = quiet.to_str().expect("non-utf8 temp path");

    let args = [path, "--format", "json"];
    let output = run_report(&env, &args);
    assert_success(&args, &output);
    let report: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("stdout should be JSON");
    assert!(report["average_events_between_markers"].is_null());
    assert_eq!(report["records"], 1);

    let args = [path];
    let output = run_report(&env, &args);
    assert_success(&args, &output);
    assert!(String::from_utf8_lossy(&output.stdout).contains("(avg): n/a"));
}

#[test]
fn flags_override_config() {
    let env = CliTestEnv::new();
    env.write_config(
        r#"
[time]
utc_offset = "+01:00"

[report]
top_artists = 1
"#,
    );

    let from_config = json_report(&env, &[]);
    assert_eq!(from_config["hourly_histogram"][0]["hour"], 1);
    assert_eq!(from_config["top_artists"].as_array().map(Vec::len), Some(1));

    let overridden = json_report(&env, &["--utc-offset", "+02:00", "--top", "3", "--gender", ""]);
    assert_eq!(overridden["hourly_histogram"][0]["hour"], 2);
    assert_eq!(overridden["top_artists"].as_array().map(Vec::len), Some(3));
    assert!(overridden["cohort"].is_null());
}

#[test]
fn text_and_markdown_formats() {
    let env = CliTestEnv::new();

    let args = [env.log_arg()];
    let output = run_report(&env, &args);
    assert_success(&args, &output);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("SONG PLAYS BY HOUR"));
    assert!(stdout.contains("Coldplay"));

    let args = [env.log_arg(), "--format", "md"];
    let output = run_report(&env, &args);
    assert_success(&args, &output);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("# Clickstream Report"));
    assert!(stdout.contains("| 00:00 | 3 |"));
}

#[test]
fn rejects_bad_input() {
    let env = CliTestEnv::new();

    let output = run_report(&env, &[env.log_arg(), "--rounding", "banker"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("rounding"));

    let output = run_report(&env, &[env.log_arg(), "--format", "xml"]);
    assert!(!output.status.success());

    let output = run_report(&env, &["/nonexistent/events.jsonl"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("failed to read event log"));

    let broken = env.log.with_file_name("broken.jsonl");
    fs::write(&broken, "{\"ts\":1,\"page\":\"Home\"}\nnot json\n").expect("failed to write log");
    let output = run_report(&env, &[broken.to_str().expect("non-utf8 temp path")]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("line 2"));
}
