use std::sync::Arc;

use actix_web::{App, HttpServer, dev::Server, middleware, web};
use sqlx::sqlite::SqlitePool;

use crate::config::Config;
use crate::orchestrator::{self, Orchestrator};
use crate::routes::{
    exit, get_languages_handler, get_limits_handler, get_submission_by_id_handler,
    get_submissions_handler, health_handler, json_error_handler, post_batch_submission_handler,
    post_submission_handler, query_error_handler,
};
use crate::sandbox::{ContainerRegistry, LocalDockerSandbox, RemoteSandbox, SandboxManager};

pub fn build_server(config: Config, db_pool: SqlitePool) -> anyhow::Result<Server> {
    let Config {
        server: server_config,
        sandbox: sandbox_config,
        orchestrator: orchestrator_config,
    } = config;

    let registry = ContainerRegistry::new(sandbox_config.images.clone());

    let sandboxes: Arc<dyn SandboxManager> = match &sandbox_config.remote_ssh_host {
        Some(host) => Arc::new(RemoteSandbox::new(host.clone(), registry.clone())),
        None => Arc::new(LocalDockerSandbox::connect_with_defaults(registry.clone())?),
    };

    let orchestrator_config = orchestrator::OrchestratorConfig {
        max_concurrent_sandboxes: orchestrator_config.max_concurrent_sandboxes,
        margin: std::time::Duration::from_secs_f64(orchestrator_config.margin_s),
    };
    let orchestrator = web::Data::new(Orchestrator::new(sandboxes, registry.clone(), orchestrator_config));
    let registry = web::Data::new(registry);
    let db_pool = web::Data::new(db_pool);

    let server = HttpServer::new(move || {
        App::new()
            .app_data(orchestrator.clone())
            .app_data(registry.clone())
            .app_data(db_pool.clone())
            .app_data(web::JsonConfig::default().error_handler(json_error_handler))
            .app_data(web::QueryConfig::default().error_handler(query_error_handler))
            .wrap(middleware::Logger::default())
            .service(post_submission_handler)
            .service(post_batch_submission_handler)
            .service(get_languages_handler)
            .service(get_limits_handler)
            .service(health_handler)
            .service(get_submissions_handler)
            .service(get_submission_by_id_handler)
            .service(exit)
    })
    .bind((
        server_config.bind_address.clone(),
        server_config.bind_port,
    ))?
    .run();

    Ok(server)
}
