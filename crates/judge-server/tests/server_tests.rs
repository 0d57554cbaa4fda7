use std::collections::HashMap;
use std::fs;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use actix_web::{App, test, web};
use harness_core::{FunctionType, Language, Literal, Parameter, ResultDocument, Status, TypeTag};
use judge::database as db;
use judge::orchestrator::{Orchestrator, OrchestratorConfig};
use judge::routes::{
    get_languages_handler, get_limits_handler, get_submission_by_id_handler,
    get_submissions_handler, health_handler, json_error_handler, post_batch_submission_handler,
    post_submission_handler, query_error_handler,
};
use judge::sandbox::{ContainerRegistry, ExecOutcome, FakeSandboxManager};
use judge::types::{BatchCase, BatchSubmission, Submission};
use sqlx::sqlite::SqlitePool;

static TEST_DB_COUNTER: AtomicU32 = AtomicU32::new(0);

async fn create_test_db() -> (SqlitePool, String) {
    let test_id = TEST_DB_COUNTER.fetch_add(1, Ordering::SeqCst);
    let db_path = format!("data/test_judge_{}.db", test_id);
    let _ = fs::remove_file(&db_path);
    let db_pool = db::init_db(&db_path).await.unwrap();
    (db_pool, db_path)
}

struct TestDbGuard {
    db_path: String,
}

impl Drop for TestDbGuard {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.db_path);
        let _ = fs::remove_file(format!("{}-wal", self.db_path));
        let _ = fs::remove_file(format!("{}-shm", self.db_path));
    }
}

fn registry() -> ContainerRegistry {
    let mut images = HashMap::new();
    images.insert(Language::C, "judge/c:latest".to_string());
    images.insert(Language::Cpp, "judge/cpp:latest".to_string());
    ContainerRegistry::new(images)
}

fn result_bytes(status: Status, is_match: Option<bool>) -> Vec<u8> {
    let doc = ResultDocument {
        status,
        stdout: String::new(),
        stderr: String::new(),
        exit_code: status.exit_code(),
        compile_time_ms: 5.0,
        time_ms: 2.0,
        cpu_utime: 0.0,
        cpu_stime: 0.0,
        maxrss_mb: 0.5,
        expected: None,
        actual: None,
        is_match,
        error: None,
    };
    serde_json::to_vec(&doc).unwrap()
}

fn sample_submission() -> Submission {
    Submission {
        language: Language::C,
        source_code: "int solve(int*a){*a=*a+1;return 0;}".to_string(),
        parameters: vec![Parameter {
            name: "a".to_string(),
            type_tag: TypeTag::Int,
            input_value: Literal::Int(1),
        }],
        expected: HashMap::new(),
        function_type: FunctionType::Typed(TypeTag::Int),
        compiler_settings: None,
        resource_limits: None,
    }
}

#[actix_web::test]
async fn post_submission_returns_a_verdict_and_records_history() {
    let (db_pool, db_path) = create_test_db().await;
    let _guard = TestDbGuard { db_path };

    let fake = Arc::new(FakeSandboxManager::new());
    fake.set_download("result.json", result_bytes(Status::Success, Some(true)));
    fake.push_response(ExecOutcome {
        exit_code: 0,
        stdout: Vec::new(),
        stderr: Vec::new(),
        wall_ms: 3,
        killed_by_deadline: false,
    });

    let orchestrator = web::Data::new(Orchestrator::new(
        fake,
        registry(),
        OrchestratorConfig::default(),
    ));
    let db_pool = web::Data::new(db_pool);

    let app = test::init_service(
        App::new()
            .app_data(orchestrator.clone())
            .app_data(db_pool.clone())
            .app_data(web::JsonConfig::default().error_handler(json_error_handler))
            .service(post_submission_handler)
            .service(get_submissions_handler)
            .service(get_submission_by_id_handler),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/submissions")
        .set_json(&sample_submission())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);

    let verdict: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(verdict["status"], "SUCCESS");
    assert_eq!(verdict["match"], true);

    let req = test::TestRequest::get().uri("/submissions").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    let records: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(records.as_array().unwrap().len(), 1);

    let id = records[0]["id"].as_i64().unwrap();
    let req = test::TestRequest::get()
        .uri(&format!("/submissions/{id}"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
}

#[actix_web::test]
async fn post_submission_rejects_oversized_source() {
    let (db_pool, db_path) = create_test_db().await;
    let _guard = TestDbGuard { db_path };

    let fake = Arc::new(FakeSandboxManager::new());
    let orchestrator = web::Data::new(Orchestrator::new(
        fake,
        registry(),
        OrchestratorConfig::default(),
    ));
    let db_pool = web::Data::new(db_pool);

    let app = test::init_service(
        App::new()
            .app_data(orchestrator.clone())
            .app_data(db_pool.clone())
            .app_data(web::JsonConfig::default().error_handler(json_error_handler))
            .service(post_submission_handler),
    )
    .await;

    let mut submission = sample_submission();
    submission.source_code = "x".repeat(50_001);

    let req = test::TestRequest::post()
        .uri("/submissions")
        .set_json(&submission)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);

    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["reason"], "ERR_INVALID_ARGUMENT");
}

#[actix_web::test]
async fn post_batch_submission_rejects_oversized_batches() {
    let (db_pool, db_path) = create_test_db().await;
    let _guard = TestDbGuard { db_path };

    let fake = Arc::new(FakeSandboxManager::new());
    let orchestrator = web::Data::new(Orchestrator::new(
        fake,
        registry(),
        OrchestratorConfig::default(),
    ));
    let db_pool = web::Data::new(db_pool);

    let app = test::init_service(
        App::new()
            .app_data(orchestrator.clone())
            .app_data(db_pool.clone())
            .app_data(web::JsonConfig::default().error_handler(json_error_handler))
            .service(post_batch_submission_handler),
    )
    .await;

    let case = BatchCase {
        parameters: vec![Parameter {
            name: "a".to_string(),
            type_tag: TypeTag::Int,
            input_value: Literal::Int(1),
        }],
        expected: HashMap::new(),
        function_type: FunctionType::Typed(TypeTag::Int),
    };
    let batch = BatchSubmission {
        language: Language::C,
        source_code: "int solve(int*a){*a=*a+1;return 0;}".to_string(),
        compiler_settings: None,
        resource_limits: None,
        cases: (0..101).map(|_| case.clone()).collect(),
    };

    let req = test::TestRequest::post()
        .uri("/submissions/batch")
        .set_json(&batch)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
}

#[actix_web::test]
async fn get_languages_lists_the_registered_images() {
    let (db_pool, db_path) = create_test_db().await;
    let _guard = TestDbGuard { db_path };

    let fake = Arc::new(FakeSandboxManager::new());
    let orchestrator = web::Data::new(Orchestrator::new(
        fake,
        registry(),
        OrchestratorConfig::default(),
    ));
    let registry_data = web::Data::new(registry());
    let db_pool = web::Data::new(db_pool);

    let app = test::init_service(
        App::new()
            .app_data(orchestrator.clone())
            .app_data(registry_data.clone())
            .app_data(db_pool.clone())
            .app_data(web::QueryConfig::default().error_handler(query_error_handler))
            .service(get_languages_handler)
            .service(get_limits_handler)
            .service(health_handler),
    )
    .await;

    let req = test::TestRequest::get().uri("/languages").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    let languages: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(languages.as_array().unwrap().len(), 2);

    let req = test::TestRequest::get().uri("/limits").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);

    let req = test::TestRequest::get().uri("/health").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
}
