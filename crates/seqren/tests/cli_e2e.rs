//! End-to-end runs of the seqren binary
//!
//! Every test gets its own runtime directory and config so concurrent test
//! binaries never share a leader.

use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

use assert_cmd::prelude::*;
use predicates::prelude::*;
use tempfile::{tempdir, TempDir};

struct Sandbox {
    runtime: TempDir,
    files: TempDir,
    config: PathBuf,
}

impl Sandbox {
    fn new(quiet_interval_ms: u64) -> Self {
        let runtime = tempdir().unwrap();
        let files = tempdir().unwrap();
        let config = runtime.path().join("config.toml");
        std::fs::write(
            &config,
            format!("quiet_interval_ms = {}\nclient_retries = 300\nlog_level = \"debug\"\n", quiet_interval_ms),
        )
        .unwrap();
        Self { runtime, files, config }
    }

    fn command(&self) -> Command {
        let mut cmd = Command::cargo_bin("seqren").unwrap();
        cmd.env("SEQREN_RUNTIME_DIR", self.runtime.path().join("run"))
            .env("SEQREN_CONFIG", &self.config)
            .env_remove("RUST_LOG");
        cmd
    }

    fn spawn(&self, args: &[PathBuf]) -> Child {
        self.command()
            .args(args)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .unwrap()
    }

    /// Create a file whose content is its original name
    fn touch(&self, name: &str) -> PathBuf {
        let path = self.files.path().join(name);
        std::fs::write(&path, name).unwrap();
        path
    }

    fn content(&self, name: &str) -> String {
        std::fs::read_to_string(self.files.path().join(name)).unwrap()
    }

    fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(self.files.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        names
    }
}

fn wait_for(path: &Path, timeout: Duration) -> bool {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if path.exists() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(25));
    }
    false
}

#[test]
fn test_help_and_version() {
    let sandbox = Sandbox::new(200);
    sandbox
        .command()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("FILE"));

    sandbox
        .command()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_single_launch_sorts_arguments() {
    let sandbox = Sandbox::new(200);
    let b = sandbox.touch("b.txt");
    let a = sandbox.touch("a.txt");
    let c = sandbox.touch("c.txt");

    sandbox.command().args([&b, &a, &c]).assert().success();

    assert_eq!(sandbox.names(), vec!["01.txt", "02.txt", "03.txt"]);
    assert_eq!(sandbox.content("01.txt"), "a.txt");
    assert_eq!(sandbox.content("02.txt"), "b.txt");
    assert_eq!(sandbox.content("03.txt"), "c.txt");
}

#[test]
fn test_concurrent_launches_form_one_sequence() {
    let sandbox = Sandbox::new(800);
    let originals = ["e.jpg", "c.jpg", "a.jpg", "d.jpg", "b.jpg"];
    let paths: Vec<PathBuf> = originals.iter().map(|n| sandbox.touch(n)).collect();

    let children: Vec<Child> = paths.iter().map(|p| sandbox.spawn(&[p.clone()])).collect();
    for mut child in children {
        assert!(child.wait().unwrap().success());
    }

    assert_eq!(
        sandbox.names(),
        vec!["01.jpg", "02.jpg", "03.jpg", "04.jpg", "05.jpg"]
    );
    for (i, original) in ["a.jpg", "b.jpg", "c.jpg", "d.jpg", "e.jpg"].iter().enumerate() {
        assert_eq!(sandbox.content(&format!("{:02}.jpg", i + 1)), *original);
    }
}

#[test]
fn test_missing_file_still_exits_cleanly() {
    let sandbox = Sandbox::new(200);
    let present = sandbox.touch("present.txt");
    let missing = sandbox.files.path().join("missing.txt");

    sandbox.command().args([&missing, &present]).assert().success();

    // Padding counts the requested paths, numbering only the existing ones
    assert_eq!(sandbox.names(), vec!["01.txt"]);
    assert_eq!(sandbox.content("01.txt"), "present.txt");
}

#[test]
fn test_unparsable_config_falls_back_to_defaults() {
    let sandbox = Sandbox::new(200);
    std::fs::write(&sandbox.config, "quiet_interval_ms = \"soon\"").unwrap();
    let only = sandbox.touch("only.txt");

    sandbox
        .command()
        .arg(&only)
        .assert()
        .success()
        .stderr(predicate::str::contains("Ignoring config"));

    assert_eq!(sandbox.names(), vec!["01.txt"]);
}

#[test]
fn test_standing_leader_renames_forwarded_batch() {
    let sandbox = Sandbox::new(300);
    let mut standing = sandbox.spawn(&[]);

    let lock_path = sandbox.runtime.path().join("run").join("seqren.lock");
    assert!(wait_for(&lock_path, Duration::from_secs(5)));
    std::thread::sleep(Duration::from_millis(200));

    let y = sandbox.touch("y.md");
    let x = sandbox.touch("x.md");
    sandbox.command().args([&y, &x]).assert().success();

    let renamed = wait_for(&sandbox.files.path().join("02.md"), Duration::from_secs(5));
    standing.kill().unwrap();
    let _ = standing.wait();

    assert!(renamed);
    assert_eq!(sandbox.content("01.md"), "x.md");
    assert_eq!(sandbox.content("02.md"), "y.md");
}

#[test]
fn test_status_without_leader() {
    let sandbox = Sandbox::new(200);
    sandbox
        .command()
        .arg("--status")
        .assert()
        .success()
        .stdout(predicate::str::contains("leader: none"))
        .stdout(predicate::str::contains("seqren.sock").or(predicate::str::contains("pipe")));
}

#[test]
fn test_status_reports_standing_leader() {
    let sandbox = Sandbox::new(300);
    let mut standing = sandbox.spawn(&[]);

    let lock_path = sandbox.runtime.path().join("run").join("seqren.lock");
    assert!(wait_for(&lock_path, Duration::from_secs(5)));
    std::thread::sleep(Duration::from_millis(200));

    let assert = sandbox.command().arg("--status").assert().success();
    standing.kill().unwrap();
    let _ = standing.wait();

    assert.stdout(predicate::str::contains(format!("pid {}", standing.id())));
}

#[test]
fn test_init_config_writes_defaults_once() {
    let sandbox = Sandbox::new(200);
    let fresh = sandbox.runtime.path().join("fresh").join("config.toml");

    sandbox
        .command()
        .env("SEQREN_CONFIG", &fresh)
        .arg("--init-config")
        .assert()
        .success()
        .stdout(predicate::str::contains("Wrote default config"));

    let written = std::fs::read_to_string(&fresh).unwrap();
    assert!(written.contains("quiet_interval_ms = 1500"));

    sandbox
        .command()
        .env("SEQREN_CONFIG", &fresh)
        .arg("--init-config")
        .assert()
        .success()
        .stdout(predicate::str::contains("already exists"));
}

#[cfg(unix)]
#[test]
fn test_terminated_standing_leader_renames_pending_batch() {
    // Quiet interval far longer than the test: only shutdown can flush
    let sandbox = Sandbox::new(60_000);
    let mut standing = sandbox.spawn(&[]);

    let lock_path = sandbox.runtime.path().join("run").join("seqren.lock");
    assert!(wait_for(&lock_path, Duration::from_secs(5)));
    std::thread::sleep(Duration::from_millis(200));

    let q = sandbox.touch("q.png");
    let p = sandbox.touch("p.png");
    sandbox.command().args([&q, &p]).assert().success();

    let status = Command::new("kill")
        .arg("-TERM")
        .arg(standing.id().to_string())
        .status()
        .unwrap();
    assert!(status.success());
    assert!(standing.wait().unwrap().success());

    assert_eq!(sandbox.names(), vec!["01.png", "02.png"]);
    assert_eq!(sandbox.content("01.png"), "p.png");
    assert_eq!(sandbox.content("02.png"), "q.png");
}
