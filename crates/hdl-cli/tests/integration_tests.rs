//! End-to-end tests driving the `hdl` binary.

use std::path::PathBuf;
use std::process::Command;
use tempfile::TempDir;

const HELLO_SHA: &str = "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824";

/// Test context that sets up a temporary HDL home environment
struct TestContext {
    temp_dir: TempDir,
    hdl_home: PathBuf,
}

impl TestContext {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let hdl_home = temp_dir.path().join(".hdl");
        std::fs::create_dir_all(&hdl_home).expect("failed to create hdl home");
        Self { temp_dir, hdl_home }
    }

    fn hdl_cmd(&self) -> Command {
        let bin_path = env!("CARGO_BIN_EXE_hdl");
        let mut cmd = Command::new(bin_path);
        cmd.env("HOME", self.temp_dir.path());
        cmd.env("HDL_HOME", &self.hdl_home);
        cmd.env_remove("HDL_REPOSITORIES");
        cmd
    }

    fn store_root(&self) -> PathBuf {
        self.hdl_home.join("dependencies").join("maven")
    }

    /// Put an artifact whose body is `hello` in the store.
    fn seed_artifact(&self) -> PathBuf {
        let path = self
            .store_root()
            .join("com/example/lib/1.0/lib-1.0.jar");
        std::fs::create_dir_all(path.parent().unwrap()).expect("failed to create store dir");
        std::fs::write(&path, b"hello").expect("failed to seed artifact");
        path
    }

    fn write_manifest(&self, body: &str) -> PathBuf {
        let path = self.temp_dir.path().join("hdl.toml");
        std::fs::write(&path, body).expect("failed to write manifest");
        path
    }
}

#[test]
fn test_help_command() {
    let ctx = TestContext::new();
    let output = ctx
        .hdl_cmd()
        .arg("--help")
        .output()
        .expect("failed to run hdl");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Usage:"));
}

#[test]
fn test_version_command() {
    let ctx = TestContext::new();
    let output = ctx
        .hdl_cmd()
        .arg("--version")
        .output()
        .expect("failed to run hdl");
    assert!(output.status.success());
}

#[test]
fn test_list_empty_store() {
    let ctx = TestContext::new();
    let output = ctx
        .hdl_cmd()
        .arg("list")
        .output()
        .expect("failed to run hdl list");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("No artifacts"));
}

#[test]
fn test_hash_command() {
    let ctx = TestContext::new();
    let test_file = ctx.temp_dir.path().join("test.txt");
    std::fs::write(&test_file, b"hello").expect("failed to write test file");

    let output = ctx
        .hdl_cmd()
        .arg("hash")
        .arg(&test_file)
        .output()
        .expect("failed to run hdl hash");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains(&format!("sha256:{HELLO_SHA}")));
}

#[test]
fn test_fetch_uses_pinned_cache_without_network() {
    let ctx = TestContext::new();
    let artifact = ctx.seed_artifact();
    let manifest = ctx.write_manifest(&format!(
        r#"
[[repository]]
url = "http://127.0.0.1:9/unreachable"

[[dependency]]
coordinates = "com.example:lib:1.0"
target = "com.example.lib"
sha256 = "{HELLO_SHA}"
"#
    ));

    let output = ctx
        .hdl_cmd()
        .arg("fetch")
        .arg("--manifest")
        .arg(&manifest)
        .output()
        .expect("failed to run hdl fetch");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(output.status.success(), "fetch failed: {stderr}");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("com.example.lib"));
    assert!(stdout.contains("1 dependencies ready"));
    assert!(artifact.exists());
}

#[test]
fn test_fetch_reports_failure() {
    let ctx = TestContext::new();
    let manifest = ctx.write_manifest(
        r#"
[[repository]]
url = "http://127.0.0.1:9/unreachable"

[[dependency]]
coordinates = "com.example:missing:1.0"
target = "com.example.missing"
"#,
    );

    let output = ctx
        .hdl_cmd()
        .arg("fetch")
        .arg("--manifest")
        .arg(&manifest)
        .output()
        .expect("failed to run hdl fetch");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Failed to load dependencies"));
    assert!(!ctx.store_root().join("com/example/missing/1.0/missing-1.0.jar").exists());
}

#[test]
fn test_fetch_rejects_invalid_manifest() {
    let ctx = TestContext::new();
    let manifest = ctx.write_manifest("[[dependency]]\ncoordinates = \"nope\"\ntarget = \"x\"\n");

    let output = ctx
        .hdl_cmd()
        .arg("fetch")
        .arg("--manifest")
        .arg(&manifest)
        .output()
        .expect("failed to run hdl fetch");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Failed to parse"));
}

#[test]
fn test_clean_removes_store() {
    let ctx = TestContext::new();
    ctx.seed_artifact();

    let dry = ctx
        .hdl_cmd()
        .args(["clean", "--dry-run"])
        .output()
        .expect("failed to run hdl clean");
    assert!(dry.status.success());
    assert!(ctx.store_root().exists());

    let output = ctx
        .hdl_cmd()
        .arg("clean")
        .output()
        .expect("failed to run hdl clean");
    assert!(output.status.success());
    assert!(!ctx.store_root().exists());
}

#[test]
fn test_base_dir_flag_overrides_home() {
    let ctx = TestContext::new();
    let custom = ctx.temp_dir.path().join("custom");
    let artifact = custom.join("maven/com/example/lib/1.0/lib-1.0.jar");
    std::fs::create_dir_all(artifact.parent().unwrap()).unwrap();
    std::fs::write(&artifact, b"hello").unwrap();

    let output = ctx
        .hdl_cmd()
        .arg("list")
        .arg("--base-dir")
        .arg(&custom)
        .output()
        .expect("failed to run hdl list");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("lib-1.0.jar"));
    assert!(stdout.contains("1 artifacts"));
}
