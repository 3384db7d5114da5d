#![allow(deprecated)]
use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// Nothing listens on the discard port, so requests fail fast.
const DEAD_URL: &str = "http://127.0.0.1:9";

fn voyager(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("voyager").unwrap();
    cmd.current_dir(dir.path()).env("VOYAGER_ROOT", dir.path());
    cmd
}

fn init_project(dir: &TempDir) {
    voyager(dir).arg("init").assert().success();
}

fn write_seed(dir: &TempDir, body: serde_json::Value) -> std::path::PathBuf {
    let path = dir.path().join("destinations.json");
    std::fs::write(&path, serde_json::to_vec_pretty(&body).unwrap()).unwrap();
    path
}

fn destination(name: &str, personalized: bool) -> serde_json::Value {
    serde_json::json!({
        "name": name,
        "location": format!("{name} region"),
        "description": format!("About {name}"),
        "tags": ["Nature"],
        "imagePrompt": "",
        "imageUrl": null,
        "isPersonalized": personalized,
    })
}

// ---------------------------------------------------------------------------
// voyager init
// ---------------------------------------------------------------------------

#[test]
fn init_creates_config_and_catalog() {
    let dir = TempDir::new().unwrap();
    voyager(&dir)
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("created: .voyager/config.yaml"));

    assert!(dir.path().join(".voyager/config.yaml").exists());
    assert!(dir.path().join(".voyager/catalog.redb").exists());

    let config = std::fs::read_to_string(dir.path().join(".voyager/config.yaml")).unwrap();
    assert!(config.contains("port: 5001"));
}

#[test]
fn init_is_idempotent() {
    let dir = TempDir::new().unwrap();
    voyager(&dir).arg("init").assert().success();
    voyager(&dir)
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("exists:  .voyager/config.yaml"));
}

// ---------------------------------------------------------------------------
// voyager seed / catalog
// ---------------------------------------------------------------------------

#[test]
fn seed_requires_init() {
    let dir = TempDir::new().unwrap();
    let file = write_seed(&dir, serde_json::json!([destination("Petra", false)]));

    voyager(&dir)
        .arg("seed")
        .arg(&file)
        .assert()
        .failure()
        .stderr(predicate::str::contains("not initialized"));
}

#[test]
fn seed_skips_near_duplicates() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    let file = write_seed(
        &dir,
        serde_json::json!([
            destination("Mount Fuji", true),
            destination("Fuji, Mount", true),
            destination("Lofoten", false),
        ]),
    );

    voyager(&dir)
        .arg("seed")
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::contains("skipped: Fuji, Mount (duplicate of Mount Fuji)"))
        .stdout(predicate::str::contains("Seeded 2 of 3 destination(s)."));

    // A second run adds nothing.
    voyager(&dir)
        .arg("seed")
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::contains("Seeded 0 of 3 destination(s)."));
}

#[test]
fn seed_accepts_wrapped_file() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    let file = write_seed(
        &dir,
        serde_json::json!({ "destinations": [destination("Petra", false)] }),
    );

    voyager(&dir).arg("seed").arg(&file).assert().success();
}

#[test]
fn catalog_list_json_returns_seeded_destinations() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    let file = write_seed(
        &dir,
        serde_json::json!([destination("Petra", false), destination("Kyoto", true)]),
    );
    voyager(&dir).arg("seed").arg(&file).assert().success();

    let output = voyager(&dir)
        .args(["catalog", "list", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let arr = json.as_array().expect("expected JSON array");
    assert_eq!(arr.len(), 2);
    assert_eq!(arr[0]["name"], "Petra");
    assert_eq!(arr[1]["isPersonalized"], true);
    assert_eq!(arr[0]["viewed"], false);
}

#[test]
fn catalog_list_empty() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);

    voyager(&dir)
        .args(["catalog", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No destinations"));
}

// ---------------------------------------------------------------------------
// voyager feed
// ---------------------------------------------------------------------------

#[test]
fn feed_shows_empty_state_when_backend_is_down() {
    let dir = TempDir::new().unwrap();

    voyager(&dir)
        .args(["feed", "--url", DEAD_URL])
        .assert()
        .success()
        .stdout(predicate::str::contains("No destinations to show right now."));
}

#[test]
fn feed_rejects_conflicting_filters() {
    let dir = TempDir::new().unwrap();

    voyager(&dir)
        .args(["feed", "--personalized", "--trending"])
        .assert()
        .failure();
}

// ---------------------------------------------------------------------------
// voyager account
// ---------------------------------------------------------------------------

#[test]
fn account_show_fails_when_backend_is_down() {
    let dir = TempDir::new().unwrap();

    voyager(&dir)
        .args(["account", "--url", DEAD_URL, "show", "u1"])
        .assert()
        .failure()
        .stderr(predicate::str::starts_with("error:"));
}

#[test]
fn account_delete_declined_at_prompt_deletes_nothing() {
    let dir = TempDir::new().unwrap();

    voyager(&dir)
        .args(["account", "--url", DEAD_URL, "delete", "u1"])
        .write_stdin("no\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("Cancelled. Your account was not deleted."))
        .stdout(predicate::str::contains("Deleting").not());
}

#[test]
fn account_delete_declined_emits_json_events() {
    let dir = TempDir::new().unwrap();

    let output = voyager(&dir)
        .args(["--json", "account", "--url", DEAD_URL, "delete", "u1"])
        .write_stdin("\n")
        .output()
        .unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    let events: Vec<serde_json::Value> = stdout
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0]["type"], "confirmation_requested");
    assert_eq!(events[1]["type"], "cancelled");
}

/// Run a real backend over a fresh project in `dir` on an ephemeral port and
/// return its base URL. The server thread lives until the test process exits.
fn spawn_backend(dir: &TempDir) -> String {
    voyager_core::config::Config::init(dir.path()).unwrap();
    let root = dir.path().to_path_buf();
    let (tx, rx) = std::sync::mpsc::channel();
    std::thread::spawn(move || {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async move {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            tx.send(listener.local_addr().unwrap().port()).unwrap();
            voyager_server::serve_on(root, listener).await.unwrap();
        });
    });
    let port = rx.recv().unwrap();
    format!("http://127.0.0.1:{port}")
}

#[test]
fn account_lifecycle_against_live_backend() {
    let backend = TempDir::new().unwrap();
    let url = spawn_backend(&backend);
    let dir = TempDir::new().unwrap();

    let output = voyager(&dir)
        .args(["--json", "account", "--url", &url, "create", "ada@voyager.example"])
        .args(["--name", "Ada Lovelace"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let user: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let id = user["id"].as_str().unwrap().to_string();
    assert_eq!(user["newsletter"], false);

    voyager(&dir)
        .args(["account", "--url", &url, "email", &id, "new@voyager.example"])
        .assert()
        .success()
        .stdout(predicate::str::contains("email:      new@voyager.example"));

    let output = voyager(&dir)
        .args(["--json", "account", "--url", &url, "newsletter", &id, "on"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let user: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(user["newsletter"], true);
    assert_eq!(user["email"], "new@voyager.example");

    let output = voyager(&dir)
        .args(["--json", "account", "--url", &url, "delete", &id, "-y", "--tick-ms", "10"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8(output.stdout).unwrap();
    let kinds: Vec<String> = stdout
        .lines()
        .map(|l| {
            let event: serde_json::Value = serde_json::from_str(l).unwrap();
            event["type"].as_str().unwrap().to_string()
        })
        .collect();
    assert_eq!(kinds.first().unwrap(), "confirmation_requested");
    assert!(kinds.iter().any(|k| k == "countdown_started"));
    assert_eq!(kinds.last().unwrap(), "deleted");

    voyager(&dir)
        .args(["account", "--url", &url, "show", &id])
        .assert()
        .failure()
        .stderr(predicate::str::contains("404"));
}
