//! Session flows against a mocked Music Room backend.

use std::sync::Arc;

use musicroom::{
    config::{AuthMode, Config, StoreBackend},
    event::events::SessionEvent,
    http::{ApiError, ApiService, models::MusicPreferenceDto},
    session::{AuthState, SessionError, SessionManager, SessionStore},
};
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config(
    server: &MockServer,
    data_dir: &TempDir,
    store: StoreBackend,
) -> Config {
    Config {
        base_url: server.uri(),
        data_dir: data_dir.path().to_path_buf(),
        store,
        auth_mode: AuthMode::Remote,
        request_timeout_secs: 5,
    }
}

fn session(config: &Config) -> (SessionManager, Arc<ApiService>) {
    let api = Arc::new(ApiService::new(config).unwrap());
    let manager = SessionManager::from_config(config, api.clone()).unwrap();
    (manager, api)
}

fn auth_body(token: &str) -> serde_json::Value {
    json!({
        "token": token,
        "user": {
            "id": 42,
            "username": "frank_m",
            "email": "frank.m@example.com"
        }
    })
}

async fn mount_login(server: &MockServer, token: &str) {
    Mock::given(method("POST"))
        .and(path("/users/login/"))
        .and(body_json(json!({
            "username": "frank_m",
            "password": "hunter22"
        })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(auth_body(token)),
        )
        .mount(server)
        .await;
}

#[tokio::test]
async fn signup_stores_token_and_profile() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    Mock::given(method("POST"))
        .and(path("/users/signup/"))
        .and(body_json(json!({
            "username": "frank_m",
            "email": "frank.m@example.com",
            "password": "hunter22"
        })))
        .respond_with(
            ResponseTemplate::new(201).set_body_json(auth_body("tok-1")),
        )
        .expect(1)
        .mount(&server)
        .await;

    let (manager, _) = session(&config(&server, &dir, StoreBackend::Memory));
    manager
        .register_user("frank.m@example.com", "hunter22")
        .await
        .unwrap();

    assert_eq!(manager.current_auth_state(), AuthState::Authenticated);
    let profile = manager.current_profile().unwrap();
    assert_eq!(profile.id, "42");
    assert_eq!(profile.display_name, "frank_m");
    assert_eq!(manager.token().unwrap().as_deref(), Some("tok-1"));
}

#[tokio::test]
async fn signup_validation_happens_before_any_request() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let (manager, _) = session(&config(&server, &dir, StoreBackend::Memory));
    let err = manager
        .register_user("frank.m@example.com", "short")
        .await
        .unwrap_err();

    assert!(matches!(err, SessionError::PasswordTooShort));
}

#[tokio::test]
async fn login_failure_surfaces_server_message() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    Mock::given(method("POST"))
        .and(path("/users/login/"))
        .respond_with(
            ResponseTemplate::new(404)
                .set_body_json(json!({ "detail": "User not found" })),
        )
        .mount(&server)
        .await;

    let (manager, _) = session(&config(&server, &dir, StoreBackend::Memory));
    let err = manager
        .login_with_email("frank.m@example.com", "hunter22")
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "User not found");
    assert!(matches!(
        &err,
        SessionError::Api(api) if api.status() == Some(404)
    ));
    assert_eq!(manager.current_auth_state(), AuthState::NotAuthenticated);
    assert!(manager.current_profile().is_none());
}

#[tokio::test]
async fn logout_sends_token_and_clears_state() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_login(&server, "tok-2").await;
    Mock::given(method("POST"))
        .and(path("/users/logout/"))
        .and(header("authorization", "Token tok-2"))
        .and(body_json(json!({ "username": "frank_m" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let (manager, _) = session(&config(&server, &dir, StoreBackend::Memory));
    manager
        .login_with_email("frank.m@example.com", "hunter22")
        .await
        .unwrap();
    manager.logout().await.unwrap();

    assert_eq!(manager.current_auth_state(), AuthState::NotAuthenticated);
    assert!(manager.current_profile().is_none());
    assert_eq!(manager.token().unwrap(), None);
}

#[tokio::test]
async fn logout_signs_out_even_when_server_fails() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_login(&server, "tok-3").await;
    Mock::given(method("POST"))
        .and(path("/users/logout/"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let (manager, _) = session(&config(&server, &dir, StoreBackend::Memory));
    manager
        .login_with_email("frank.m@example.com", "hunter22")
        .await
        .unwrap();
    let events = manager.subscribe();

    manager.logout().await.unwrap();

    assert_eq!(manager.current_auth_state(), AuthState::NotAuthenticated);
    assert_eq!(manager.token().unwrap(), None);
    assert_eq!(
        events.drain().next(),
        Some(SessionEvent::Error("boom".to_string()))
    );
}

#[tokio::test]
async fn file_store_restores_session_across_restarts() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_login(&server, "tok-4").await;
    let config = config(&server, &dir, StoreBackend::File);

    {
        let (manager, _) = session(&config);
        manager
            .login_with_email("frank.m@example.com", "hunter22")
            .await
            .unwrap();
    }
    assert!(config.session_path().exists());

    let (restored, _) = session(&config);
    assert_eq!(restored.current_auth_state(), AuthState::Authenticated);
    assert_eq!(
        restored.current_profile().map(|p| p.email),
        Some("frank.m@example.com".to_string())
    );
    assert_eq!(restored.token().unwrap().as_deref(), Some("tok-4"));
}

#[cfg(unix)]
#[tokio::test]
async fn session_file_is_private() {
    use std::os::unix::fs::PermissionsExt;

    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_login(&server, "tok-5").await;
    let config = config(&server, &dir, StoreBackend::File);

    let (manager, _) = session(&config);
    manager
        .login_with_email("frank.m@example.com", "hunter22")
        .await
        .unwrap();

    let mode = std::fs::metadata(config.session_path())
        .unwrap()
        .permissions()
        .mode();
    assert_eq!(mode & 0o777, 0o600);
}

#[tokio::test]
async fn refresh_profile_merges_server_fields() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_login(&server, "tok-6").await;
    Mock::given(method("GET"))
        .and(path("/profile/42/"))
        .and(header("authorization", "Token tok-6"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 7,
            "user": "frank_m",
            "avatar": "https://cdn.example/frank.png",
            "name": "Frank M.",
            "bio": null,
            "music_preferences": ["Jazz", "Soul"]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (manager, _) = session(&config(&server, &dir, StoreBackend::Memory));
    manager
        .login_with_email("frank.m@example.com", "hunter22")
        .await
        .unwrap();
    let profile = manager.refresh_profile().await.unwrap();

    assert_eq!(profile.display_name, "Frank M.");
    assert_eq!(profile.avatar(), Some("https://cdn.example/frank.png"));
    assert_eq!(profile.music_preferences, vec!["Jazz", "Soul"]);
    assert_eq!(profile.email, "frank.m@example.com");
    assert_eq!(manager.current_profile(), Some(profile));
}

#[tokio::test]
async fn reset_password_posts_email() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    Mock::given(method("POST"))
        .and(path("/users/forgot_password/"))
        .and(body_json(json!({ "email": "frank.m@example.com" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "username": "frank_m",
            "email": "frank.m@example.com"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (manager, _) = session(&config(&server, &dir, StoreBackend::Memory));
    manager.reset_password("frank.m@example.com").await.unwrap();
}

#[tokio::test]
async fn search_sends_query_parameter() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    Mock::given(method("GET"))
        .and(path("/deezer/search/"))
        .and(query_param("q", "daft punk"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{
                "id": 3135556,
                "title": "Harder, Better, Faster, Stronger",
                "link": "https://www.deezer.com/track/3135556",
                "preview": "",
                "duration": 224,
                "artist": { "id": 27, "name": "Daft Punk" },
                "album": { "id": 302127, "title": "Discovery" }
            }],
            "total": 1
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (_, api) = session(&config(&server, &dir, StoreBackend::Memory));
    let results = api.search_tracks("daft punk").await.unwrap();

    assert_eq!(results.total, 1);
    assert_eq!(results.data[0].artist.name, "Daft Punk");
    assert_eq!(results.data[0].duration_label(), "3:44");
}

#[tokio::test]
async fn social_login_revokes_replaced_server_token() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_login(&server, "live-tok").await;
    Mock::given(method("POST"))
        .and(path("/users/logout/"))
        .and(header("authorization", "Token live-tok"))
        .and(body_json(json!({ "username": "frank_m" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let (manager, _) = session(&config(&server, &dir, StoreBackend::Memory));
    manager
        .login_with_email("frank.m@example.com", "hunter22")
        .await
        .unwrap();
    manager.login_with_google().unwrap();
    manager.settle().await;

    assert_eq!(manager.token().unwrap(), None);
    assert!(manager.current_profile().unwrap().id.starts_with("google_user_"));
    let logouts = server
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .filter(|r| r.url.path() == "/users/logout/")
        .count();
    assert_eq!(logouts, 1);
}

#[tokio::test]
async fn failed_revocation_is_reported() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_login(&server, "live-tok").await;
    Mock::given(method("POST"))
        .and(path("/users/logout/"))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_json(json!({ "detail": "Invalid token." })),
        )
        .mount(&server)
        .await;

    let (manager, _) = session(&config(&server, &dir, StoreBackend::Memory));
    manager
        .login_with_email("frank.m@example.com", "hunter22")
        .await
        .unwrap();
    let events = manager.subscribe();
    manager.login_with_facebook().unwrap();
    manager.settle().await;

    assert!(manager.current_auth_state().is_authenticated());
    assert!(
        events
            .drain()
            .any(|e| e == SessionEvent::Error("Invalid token.".into()))
    );
}

#[tokio::test]
async fn corrupt_session_file_does_not_lock_out() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = config(&server, &dir, StoreBackend::File);
    std::fs::write(config.session_path(), "{ nope").unwrap();

    let (manager, _) = session(&config);
    assert_eq!(manager.current_auth_state(), AuthState::NotAuthenticated);
    manager.logout().await.unwrap();
    assert!(dir.path().join("session.json.corrupt").exists());
}

#[tokio::test]
async fn music_preferences_are_fetched_with_token() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    Mock::given(method("GET"))
        .and(path("/profile/music_preferences/"))
        .and(header("authorization", "Token tok-7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": 1, "name": "Jazz" },
            { "id": 2, "name": "Rock" }
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let (_, api) = session(&config(&server, &dir, StoreBackend::Memory));
    let preferences = api.fetch_music_preferences("tok-7").await.unwrap();

    assert_eq!(
        preferences,
        vec![
            MusicPreferenceDto {
                id: 1,
                name: "Jazz".into()
            },
            MusicPreferenceDto {
                id: 2,
                name: "Rock".into()
            },
        ]
    );
}

#[tokio::test]
async fn music_preferences_rejection_carries_detail() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    Mock::given(method("GET"))
        .and(path("/profile/music_preferences/"))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_json(json!({ "detail": "Invalid token." })),
        )
        .mount(&server)
        .await;

    let (_, api) = session(&config(&server, &dir, StoreBackend::Memory));
    let err = api.fetch_music_preferences("stale").await.unwrap_err();

    assert!(matches!(
        &err,
        ApiError::Status { status: 401, message } if message == "Invalid token."
    ));
}

#[tokio::test]
async fn track_is_fetched_by_id() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    Mock::given(method("GET"))
        .and(path("/deezer/track/3135556/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 3135556,
            "title": "Harder, Better, Faster, Stronger",
            "link": "https://www.deezer.com/track/3135556",
            "preview": "https://cdn.example/preview.mp3",
            "duration": 224,
            "artist": { "id": 27, "name": "Daft Punk" },
            "album": {
                "id": 302127,
                "title": "Discovery",
                "cover_medium": "https://cdn.example/discovery.jpg"
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (_, api) = session(&config(&server, &dir, StoreBackend::Memory));
    let track = api.fetch_track("3135556").await.unwrap();

    assert_eq!(track.id, 3135556);
    assert_eq!(track.artist.name, "Daft Punk");
    let album = track.album.unwrap();
    assert_eq!(album.title, "Discovery");
    assert_eq!(
        album.cover_medium.as_deref(),
        Some("https://cdn.example/discovery.jpg")
    );
}

#[tokio::test]
async fn missing_track_surfaces_server_error() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    Mock::given(method("GET"))
        .and(path("/deezer/track/0/"))
        .respond_with(
            ResponseTemplate::new(404)
                .set_body_json(json!({ "error": "Track not found" })),
        )
        .mount(&server)
        .await;

    let (_, api) = session(&config(&server, &dir, StoreBackend::Memory));
    let err = api.fetch_track("0").await.unwrap_err();

    assert_eq!(err.status(), Some(404));
    assert_eq!(err.to_string(), "Track not found");
}

#[test]
fn store_is_shared_between_manager_instances() {
    let store = SessionStore::in_memory();
    let first = SessionManager::offline(store.clone()).unwrap();
    first.login_with_google().unwrap();

    let second = SessionManager::offline(store).unwrap();
    assert_eq!(second.current_profile(), first.current_profile());
}
