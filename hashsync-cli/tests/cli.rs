use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

struct Fixture {
    _tmp: TempDir,
    home: PathBuf,
    local: PathBuf,
    store_root: PathBuf,
    scratch: PathBuf,
}

impl Fixture {
    fn new() -> Self {
        let tmp = TempDir::new().expect("tmp");
        let home = tmp.path().join("home");
        let local = tmp.path().join("Files");
        fs::create_dir_all(&home).expect("mkdir home");
        fs::create_dir_all(&local).expect("mkdir local");
        Self {
            home,
            local,
            store_root: tmp.path().join("store"),
            scratch: tmp.path().join("S3Tmp"),
            _tmp: tmp,
        }
    }

    fn write(&self, name: &str, content: &str) {
        fs::write(self.local.join(name), content).expect("write local file");
    }

    fn object(&self, name: &str) -> PathBuf {
        self.store_root.join("assets").join("game").join(name)
    }

    /// `hashsync` with an isolated home and all scope flags set.
    fn hashsync(&self) -> Command {
        let mut cmd = bare(&self.home);
        cmd.arg("--bucket")
            .arg("assets")
            .arg("--folder")
            .arg("game")
            .arg("--local")
            .arg(&self.local)
            .arg("--scratch")
            .arg(&self.scratch)
            .arg("--store-root")
            .arg(&self.store_root);
        cmd
    }
}

fn bare(home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("hashsync").expect("hashsync binary");
    cmd.env("HOME", home)
        .env("USERPROFILE", home)
        .env("CLICOLOR", "0")
        .env("NO_COLOR", "1")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn sync_uploads_files_and_publishes_index() {
    let fx = Fixture::new();
    fx.write("a.txt", "alpha");
    fx.write("b.txt", "beta");

    fx.hashsync()
        .arg("sync")
        .assert()
        .success()
        .stdout(predicate::str::contains("+ a.txt"))
        .stdout(predicate::str::contains("+ b.txt"))
        .stdout(predicate::str::contains("2 uploaded, 0 deleted"));

    assert_eq!(fs::read(fx.object("a.txt")).expect("a.txt"), b"alpha");
    assert!(fx.object("index.mhash").is_file());
}

#[test]
fn dry_run_reports_plan_and_writes_nothing() {
    let fx = Fixture::new();
    fx.write("a.txt", "alpha");

    fx.hashsync()
        .args(["sync", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[dry-run]"))
        .stdout(predicate::str::contains("+ a.txt"));

    assert!(
        !fx.store_root.join("assets").exists(),
        "dry-run must not create objects"
    );
}

#[test]
fn second_sync_has_nothing_to_do() {
    let fx = Fixture::new();
    fx.write("a.txt", "alpha");
    fx.hashsync().arg("sync").assert().success();

    fx.hashsync()
        .arg("sync")
        .assert()
        .success()
        .stdout(predicate::str::contains("nothing to do"));
}

#[test]
fn removed_local_file_is_deleted_remotely() {
    let fx = Fixture::new();
    fx.write("a.txt", "alpha");
    fx.write("b.txt", "beta");
    fx.hashsync().arg("sync").assert().success();

    fs::remove_file(fx.local.join("a.txt")).expect("rm");
    fx.hashsync()
        .arg("sync")
        .assert()
        .success()
        .stdout(predicate::str::contains("- a.txt"));

    assert!(!fx.object("a.txt").exists());
    assert!(fx.object("b.txt").exists());
}

#[test]
fn plan_json_lists_uploads_and_deletes() {
    let fx = Fixture::new();
    fx.write("keep.txt", "same");
    fx.hashsync().arg("sync").assert().success();
    fx.write("new.txt", "fresh");
    fs::remove_file(fx.local.join("keep.txt")).expect("rm");

    let output = fx
        .hashsync()
        .args(["plan", "--json"])
        .output()
        .expect("run plan");
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let plan: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json stdout");
    assert_eq!(plan["to_upload"], serde_json::json!(["new.txt"]));
    assert_eq!(plan["to_delete"], serde_json::json!(["keep.txt"]));
    assert!(fx.object("keep.txt").exists(), "plan must not delete");
}

#[test]
fn config_file_supplies_scope() {
    let fx = Fixture::new();
    fx.write("a.txt", "alpha");
    let config = fx.home.join("sync.yaml");
    fs::write(
        &config,
        format!(
            "bucket: assets\nfolder: game\nlocal_root: {}\nscratch_dir: {}\nstore:\n  kind: filesystem\n  root: {}\n",
            fx.local.display(),
            fx.scratch.display(),
            fx.store_root.display()
        ),
    )
    .expect("write config");

    bare(&fx.home)
        .arg("--config")
        .arg(&config)
        .arg("sync")
        .assert()
        .success();
    assert!(fx.object("a.txt").is_file());
}

#[test]
fn missing_bucket_fails_with_clear_error() {
    let fx = Fixture::new();
    bare(&fx.home)
        .arg("sync")
        .assert()
        .failure()
        .stderr(predicate::str::contains("bucket"));
}

#[test]
fn index_prints_md5_per_file() {
    let fx = Fixture::new();
    fx.write("abc.txt", "abc");
    fx.write("empty.txt", "");
    fs::create_dir_all(fx.local.join("nested")).expect("mkdir");

    bare(&fx.home)
        .arg("index")
        .arg(&fx.local)
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "900150983cd24fb0d6963f7d28e17f72  abc.txt",
        ))
        .stdout(predicate::str::contains(
            "d41d8cd98f00b204e9800998ecf8427e  empty.txt",
        ))
        .stdout(predicate::str::contains("nested").not());
}

#[test]
fn scratch_pointing_at_local_root_is_refused() {
    let fx = Fixture::new();
    fx.write("precious.txt", "keep me");

    bare(&fx.home)
        .arg("--bucket")
        .arg("assets")
        .arg("--local")
        .arg(&fx.local)
        .arg("--scratch")
        .arg(&fx.local)
        .arg("--store-root")
        .arg(&fx.store_root)
        .args(["sync", "--dry-run"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("overlaps local_root"));

    assert!(fx.local.join("precious.txt").is_file());
}
