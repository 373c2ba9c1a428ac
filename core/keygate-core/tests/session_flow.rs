//! End-to-end session flows: file-backed store, HTTP validator against a mock server.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use keygate_core::{
    keys, CredentialStore, FileCredentialStore, Gate, GateConfig, GateOutput, HttpValidator,
    LockPolicy, NoticeAction, RetryPolicy, SessionController, SessionSettings, SessionState,
    Sleeper,
};
use tempfile::TempDir;

struct NoSleep;

impl Sleeper for NoSleep {
    fn sleep(&self, _duration: Duration) {}
}

fn config_for(server: &mockito::Server) -> GateConfig {
    GateConfig {
        server_url: server.url(),
        ..GateConfig::default()
    }
}

fn open_controller(config: &GateConfig, credentials: &Path) -> SessionController {
    let validator = HttpValidator::from_config(config)
        .unwrap()
        .with_sleeper(Arc::new(NoSleep));
    SessionController::new(
        FileCredentialStore::new(credentials),
        validator,
        SessionSettings::from(config),
    )
}

fn seeded(dir: &TempDir, config: &GateConfig) -> std::path::PathBuf {
    let path = dir.path().join("credentials.json");
    let store = FileCredentialStore::new(&path);
    store.set(keys::SECRET, "s3cret").unwrap();
    store
        .set(keys::SERVER_URL, &config.normalized_server_url())
        .unwrap();
    path
}

#[test]
fn test_stored_secret_accepted_by_server_unlocks() {
    let mut server = mockito::Server::new();
    let mock = server
        .mock("GET", "/api/session")
        .match_header("authorization", "Bearer s3cret")
        .with_status(200)
        .expect(1)
        .create();
    let dir = TempDir::new().unwrap();
    let config = config_for(&server);
    let controller = open_controller(&config, &seeded(&dir, &config));

    assert_eq!(controller.initialize(), SessionState::Active);
    assert!(controller.is_ready());
    mock.assert();
}

#[test]
fn test_unauthorized_locks_and_expired_challenge_expires() {
    let mut server = mockito::Server::new();
    let dir = TempDir::new().unwrap();
    let config = config_for(&server);
    let credentials = seeded(&dir, &config);

    let rejected = server.mock("GET", "/api/session").with_status(401).create();
    assert_eq!(
        open_controller(&config, &credentials).initialize(),
        SessionState::Locked
    );
    rejected.remove();

    server
        .mock("GET", "/api/session")
        .with_status(401)
        .with_header(
            "www-authenticate",
            r#"Bearer error="invalid_token", error_description="The token expired""#,
        )
        .create();
    let controller = open_controller(&config, &credentials);
    assert_eq!(controller.initialize(), SessionState::Expired);

    let gate = Gate::new(&controller);
    match gate.render(|| ()) {
        GateOutput::Screen(screen) => assert!(screen.to_string().contains("expired")),
        GateOutput::Protected(()) => panic!("expired session rendered protected content"),
    }
}

#[test]
fn test_server_error_is_retried_then_reported_as_transport() {
    let mut server = mockito::Server::new();
    let mock = server
        .mock("GET", "/api/session")
        .with_status(503)
        .expect(3)
        .create();
    let dir = TempDir::new().unwrap();
    let config = GateConfig {
        retry: RetryPolicy::with_attempts(3, 10),
        ..config_for(&server)
    };
    let controller = open_controller(&config, &seeded(&dir, &config));

    assert_eq!(controller.initialize(), SessionState::Locked);
    let notices = controller.take_notices();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].action, Some(NoticeAction::Retry));
    mock.assert();
}

#[test]
fn test_empty_store_makes_no_request() {
    let mut server = mockito::Server::new();
    let mock = server.mock("GET", "/api/session").expect(0).create();
    let dir = TempDir::new().unwrap();
    let config = config_for(&server);
    let controller = open_controller(&config, &dir.path().join("credentials.json"));

    assert_eq!(controller.initialize(), SessionState::Missing);
    mock.assert();
}

#[test]
fn test_login_lock_and_restart() {
    let mut server = mockito::Server::new();
    let mock = server
        .mock("GET", "/api/session")
        .match_header("authorization", "Bearer s3cret")
        .with_status(204)
        .expect(1)
        .create();
    let dir = TempDir::new().unwrap();
    let config = config_for(&server);
    let credentials = dir.path().join("credentials.json");

    let controller = open_controller(&config, &credentials);
    assert_eq!(controller.initialize(), SessionState::Missing);

    let mut gate = Gate::new(&controller);
    gate.field_mut().push_str("s3cret");
    assert!(gate.submit().unwrap().is_accepted());
    assert!(gate.render(|| "account").is_protected());

    assert_eq!(controller.lock(Some("user")), SessionState::Locked);
    assert!(!controller.is_ready());

    let store = FileCredentialStore::new(&credentials);
    assert_eq!(store.get(keys::SECRET).unwrap(), None);
    assert!(store.get(keys::LOCKED_AT).unwrap().is_some());
    assert_eq!(store.get(keys::LAST_STATUS).unwrap().as_deref(), Some("locked"));

    // A fresh process sees the lock marker and stays locked without a request.
    let restarted = open_controller(&config, &credentials);
    assert_eq!(restarted.initialize(), SessionState::Locked);
    mock.assert();
}

#[test]
fn test_keep_secret_lock_survives_restart() {
    let mut server = mockito::Server::new();
    let mock = server
        .mock("GET", "/api/session")
        .with_status(200)
        .expect(2)
        .create();
    let dir = TempDir::new().unwrap();
    let config = GateConfig {
        lock_policy: LockPolicy::KeepSecret,
        ..config_for(&server)
    };
    let credentials = seeded(&dir, &config);

    let first = open_controller(&config, &credentials);
    assert_eq!(first.initialize(), SessionState::Active);
    first.lock(None);

    let second = open_controller(&config, &credentials);
    assert_eq!(second.initialize(), SessionState::Locked);
    assert!(second.confirm("s3cret").is_accepted());
    assert!(second.is_ready());

    let store = FileCredentialStore::new(&credentials);
    assert_eq!(store.get(keys::LOCKED_AT).unwrap(), None);
    mock.assert();
}

#[test]
fn test_logout_removes_credentials_file() {
    let mut server = mockito::Server::new();
    server.mock("GET", "/api/session").with_status(200).create();
    let dir = TempDir::new().unwrap();
    let config = config_for(&server);
    let credentials = seeded(&dir, &config);

    let controller = open_controller(&config, &credentials);
    controller.initialize();
    assert_eq!(controller.logout(None), SessionState::Missing);
    assert!(FileCredentialStore::new(&credentials).is_empty().unwrap());
    assert!(!controller.is_ready());
}

#[test]
fn test_record_from_another_server_is_signed_out() {
    let mut server = mockito::Server::new();
    let mock = server.mock("GET", "/api/session").expect(0).create();
    let dir = TempDir::new().unwrap();
    let old = GateConfig {
        server_url: "https://old.example".to_string(),
        ..GateConfig::default()
    };
    let credentials = seeded(&dir, &old);

    let controller = open_controller(&config_for(&server), &credentials);
    assert_eq!(controller.initialize(), SessionState::Missing);
    assert!(FileCredentialStore::new(&credentials).is_empty().unwrap());
    mock.assert();
}
