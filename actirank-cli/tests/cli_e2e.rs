use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::tempdir;

/// Helper struct for CLI test utilities
struct CliTestEnv {
    dir: tempfile::TempDir,
    bin: &'static str,
}

impl CliTestEnv {
    fn new() -> Self {
        Self {
            dir: tempdir().unwrap(),
            bin: env!("CARGO_BIN_EXE_actirank-cli"),
        }
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    fn run(&self, args: &[&str]) -> Output {
        Command::new(self.bin)
            .args(args)
            .env("ACTIRANK_CONFIG", self.path().join("actirank.toml"))
            .current_dir(self.path())
            .output()
            .expect("failed to spawn process")
    }

    fn run_ok(&self, args: &[&str]) -> String {
        let output = self.run(args);
        if !output.status.success() {
            panic!(
                "Command failed: actirank {}\nSTDOUT: {}\nSTDERR: {}",
                args.join(" "),
                String::from_utf8_lossy(&output.stdout),
                String::from_utf8_lossy(&output.stderr)
            );
        }
        String::from_utf8_lossy(&output.stdout).to_string()
    }
}

/// Rows of `value` on 23 sensor channels, optionally followed by a label.
fn rows(value: f64, count: usize, label: Option<u32>) -> Vec<String> {
    (0..count)
        .map(|r| {
            let v = value + (r % 2) as f64 * 0.5;
            let mut cells: Vec<String> = (0..23).map(|_| v.to_string()).collect();
            if let Some(label) = label {
                cells.push(label.to_string());
            }
            cells.join("\t")
        })
        .collect()
}

#[test]
fn test_cli_full_workflow() {
    let env = CliTestEnv::new();

    // 1. Init
    let stdout = env.run_ok(&["init"]);
    assert!(stdout.contains("Config written to"));
    assert!(env.path().join("actirank.toml").exists());
    assert!(!env.run(&["init"]).status.success());

    // 2. Health without a model
    let stdout = env.run_ok(&["health"]);
    let health: serde_json::Value = serde_json::from_str(stdout.trim()).unwrap();
    assert_eq!(health["status"], "ok");
    assert_eq!(health["model_loaded"], false);

    // 3. Train
    let data = env.path().join("data");
    fs::create_dir_all(&data).unwrap();
    for subject in 0..2 {
        let mut lines = rows(1.0, 300, Some(4));
        lines.extend(rows(0.0, 40, Some(0)));
        lines.extend(rows(30.0, 300, Some(10)));
        fs::write(data.join(format!("subject{subject}.log")), lines.join("\n")).unwrap();
    }
    let stdout = env.run_ok(&["train", data.to_str().unwrap()]);
    assert!(stdout.contains("accuracy"));
    assert!(stdout.contains("Model saved to"));
    assert!(env.path().join("model").join("classifier.json").exists());

    let stdout = env.run_ok(&["health"]);
    assert!(stdout.contains("\"model_loaded\":true"));

    // 4. Detect
    let mut lines = rows(30.0, 200, None);
    lines.extend(rows(1.0, 200, None));
    let recording = env.path().join("recording.log");
    fs::write(&recording, lines.join("\n")).unwrap();

    let stdout = env.run_ok(&["detect", recording.to_str().unwrap()]);
    let report: serde_json::Value = serde_json::from_str(stdout.trim()).unwrap();
    assert_eq!(report["top_activity"], "Trotar (Jogging)");
    assert_eq!(report["total_samples"], 400);
    assert_eq!(report["total_duration"], 8.0);
    assert_eq!(report["window_duration"], 2.56);
    assert_eq!(report["ranking"].as_array().unwrap().len(), 2);
}

#[test]
fn test_cli_detect_errors() {
    let env = CliTestEnv::new();

    // No model configured: service unavailable.
    let recording = env.path().join("short.log");
    fs::write(&recording, rows(1.0, 50, None).join("\n")).unwrap();
    let output = env.run(&["detect", recording.to_str().unwrap()]);
    assert!(!output.status.success());
    let body: serde_json::Value =
        serde_json::from_str(String::from_utf8_lossy(&output.stdout).trim()).unwrap();
    assert_eq!(body["kind"], "model_unavailable");
}

#[test]
fn test_cli_labels() {
    let env = CliTestEnv::new();
    let stdout = env.run_ok(&["labels"]);
    assert!(stdout.contains("Caminando (Walking)"));
    assert_eq!(stdout.lines().count(), 13);
}
