use clap::Parser;

use judge::config::CliArgs;
use judge::database::{get_db_path, init_db, remove_db};
use judge::web_server::build_server;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let cli = CliArgs::parse();
    let config = cli.read_config().expect("failed to load configuration");

    let db_path = get_db_path();
    if cli.flush_data {
        remove_db(&db_path);
    }

    let db_pool = init_db(&db_path)
        .await
        .expect("failed to initialize database");

    build_server(config, db_pool)
        .expect("failed to start server")
        .await
}
