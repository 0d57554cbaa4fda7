use actix_web::{HttpResponse, Responder, get, post, web};
use harness_core::Language;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqlitePool;

use super::{ErrorResponse, ErrorResponseWithMessage};
use crate::codec::ConfigError;
use crate::database as db;
use crate::orchestrator::Orchestrator;
use crate::sandbox::ContainerRegistry;
use crate::types::{BatchSubmission, Submission};

const MAX_BATCH_SIZE: usize = 100;

fn config_error_response(err: ConfigError) -> HttpResponse {
    HttpResponse::BadRequest().json(ErrorResponseWithMessage {
        reason: "ERR_INVALID_ARGUMENT",
        code: 1,
        message: err.to_string(),
    })
}

#[post("/submissions")]
pub async fn post_submission_handler(
    orchestrator: web::Data<Orchestrator>,
    pool: web::Data<SqlitePool>,
    body: web::Json<Submission>,
) -> impl Responder {
    let submission = body.into_inner();

    match crate::codec::validate(&submission) {
        Ok(()) => {}
        Err(e) => return config_error_response(e),
    }

    match orchestrator.evaluate(submission.clone()).await {
        Ok(verdict) => {
            if let Err(e) = db::record_submission(
                pool.as_ref(),
                submission.language.source_extension(),
                &submission.source_code,
                &verdict,
            )
            .await
            {
                log::warn!("failed to record submission history: {e}");
            }
            HttpResponse::Ok().json(verdict)
        }
        Err(e) => config_error_response(e),
    }
}

#[post("/submissions/batch")]
pub async fn post_batch_submission_handler(
    orchestrator: web::Data<Orchestrator>,
    pool: web::Data<SqlitePool>,
    body: web::Json<BatchSubmission>,
) -> impl Responder {
    let batch = body.into_inner();

    if batch.cases.len() > MAX_BATCH_SIZE {
        return HttpResponse::BadRequest().json(ErrorResponseWithMessage {
            reason: "ERR_INVALID_ARGUMENT",
            code: 1,
            message: format!(
                "batch size {} exceeds the limit of {MAX_BATCH_SIZE}",
                batch.cases.len()
            ),
        });
    }

    let verdicts = orchestrator.evaluate_batch(batch.clone()).await;

    for verdict in &verdicts {
        if let Err(e) = db::record_submission(
            pool.as_ref(),
            batch.language.source_extension(),
            &batch.source_code,
            verdict,
        )
        .await
        {
            log::warn!("failed to record batch submission history: {e}");
        }
    }

    HttpResponse::Ok().json(verdicts)
}

#[derive(Serialize)]
struct LanguageInfo {
    language: &'static str,
}

#[get("/languages")]
pub async fn get_languages_handler(registry: web::Data<ContainerRegistry>) -> impl Responder {
    let mut languages = Vec::new();
    if registry.image_for(Language::C).is_ok() {
        languages.push(LanguageInfo { language: "c" });
    }
    if registry.image_for(Language::Cpp).is_ok() {
        languages.push(LanguageInfo { language: "c++" });
    }
    HttpResponse::Ok().json(languages)
}

#[get("/limits")]
pub async fn get_limits_handler() -> impl Responder {
    HttpResponse::Ok().json(harness_core::ResourceLimits::default())
}

#[get("/health")]
pub async fn health_handler() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({"status": "ok"}))
}

#[derive(Deserialize)]
pub struct SubmissionsQuery {
    pub limit: Option<i64>,
}

#[get("/submissions")]
pub async fn get_submissions_handler(
    pool: web::Data<SqlitePool>,
    query: web::Query<SubmissionsQuery>,
) -> impl Responder {
    let limit = query.limit.unwrap_or(50).clamp(1, 500);
    match db::fetch_recent_submissions(pool.as_ref(), limit).await {
        Ok(records) => HttpResponse::Ok().json(records),
        Err(e) => {
            log::error!("failed to fetch submission history: {e}");
            HttpResponse::InternalServerError().json(ErrorResponse {
                reason: "ERR_EXTERNAL",
                code: 5,
            })
        }
    }
}

#[get("/submissions/{id}")]
pub async fn get_submission_by_id_handler(
    pool: web::Data<SqlitePool>,
    path: web::Path<i64>,
) -> impl Responder {
    let id = path.into_inner();
    match db::fetch_submission(pool.as_ref(), id).await {
        Ok(record) => HttpResponse::Ok().json(record),
        Err(sqlx::Error::RowNotFound) => HttpResponse::NotFound().json(ErrorResponseWithMessage {
            reason: "ERR_NOT_FOUND",
            code: 3,
            message: format!("submission {id} not found"),
        }),
        Err(e) => {
            log::error!("failed to fetch submission {id}: {e}");
            HttpResponse::InternalServerError().json(ErrorResponse {
                reason: "ERR_EXTERNAL",
                code: 5,
            })
        }
    }
}
