use std::collections::HashMap;
use std::fs;
use std::sync::atomic::{AtomicU16, Ordering};
use std::time::Duration;

use judge::config::{Config, OrchestratorSettings, SandboxConfig, ServerConfig};
use judge::database::init_db;
use judge::web_server::build_server;

static TEST_PORT: AtomicU16 = AtomicU16::new(19100);

fn test_config(bind_port: u16) -> Config {
    let mut images = HashMap::new();
    images.insert(harness_core::Language::C, "judge/c:latest".to_string());
    images.insert(harness_core::Language::Cpp, "judge/cpp:latest".to_string());

    Config {
        server: ServerConfig {
            bind_address: "127.0.0.1".to_string(),
            bind_port,
        },
        sandbox: SandboxConfig {
            images,
            remote_ssh_host: None,
        },
        orchestrator: OrchestratorSettings::default(),
    }
}

/// End-to-end smoke test against a real bound `HttpServer`, using a blocking
/// `reqwest` client the way a human operator would curl the service.
#[actix_web::test]
async fn health_and_languages_are_reachable_over_real_http() {
    let port = TEST_PORT.fetch_add(1, Ordering::SeqCst);
    let db_path = format!("data/test_smoke_{port}.db");
    let _ = fs::remove_file(&db_path);
    let db_pool = init_db(&db_path).await.unwrap();

    let server = build_server(test_config(port), db_pool).unwrap();
    let handle = server.handle();
    tokio::spawn(server);

    // Give the listener a moment to come up before the first request.
    tokio::time::sleep(Duration::from_millis(100)).await;

    let base = format!("http://127.0.0.1:{port}");
    let health_url = format!("{base}/health");
    let languages_url = format!("{base}/languages");

    let (health_status, languages_body) = tokio::task::spawn_blocking(move || {
        let client = reqwest::blocking::Client::new();
        let health_status = client.get(&health_url).send().unwrap().status();
        let languages_body: serde_json::Value =
            client.get(&languages_url).send().unwrap().json().unwrap();
        (health_status, languages_body)
    })
    .await
    .unwrap();

    assert_eq!(health_status.as_u16(), 200);
    assert_eq!(languages_body.as_array().unwrap().len(), 2);

    handle.stop(true).await;
    let _ = fs::remove_file(&db_path);
    let _ = fs::remove_file(format!("{db_path}-wal"));
    let _ = fs::remove_file(format!("{db_path}-shm"));
}
