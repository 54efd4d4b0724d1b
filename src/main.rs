mod backend;
mod cli;
mod client;
mod config;
mod error;
mod reply;
mod stream;
mod transcript;
mod upload;
mod web;

use actix_files as fs;
use actix_web::{web::Data, App, HttpServer};
use anyhow::Context;
use clap::Parser;
use dotenv::dotenv;
use log::{error, info};
use std::sync::Arc;
use tera::Tera;

use backend::BackendClient;
use cli::{Cli, Command};
use config::Config;
use web::routes;

// App state structure
pub struct AppState {
    pub tera: Tera,
    pub config: Arc<Config>,
    pub backend: BackendClient,
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Initialize environment
    dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    match Cli::parse().command.unwrap_or(Command::Serve) {
        Command::Serve => serve().await,
        command => cli::run_client(command).await,
    }
}

async fn serve() -> anyhow::Result<()> {
    info!("Starting MOBIN chat proxy");

    let config = Arc::new(Config::from_env().context("invalid configuration")?);

    let backend = match BackendClient::new(config.clone()) {
        Ok(backend) => backend,
        Err(e) => {
            error!("Failed to initialize backend client: {}", e);
            return Err(e.into());
        }
    };

    // Initialize template engine
    let mut tera = Tera::new(&config.templates_glob)
        .with_context(|| format!("template parsing failed for {}", config.templates_glob))?;
    tera.autoescape_on(vec![".html"]);

    let bind = (config.host.clone(), config.port);
    let static_dir = config.static_dir.clone();
    info!("Uploads are stored in {}", config.upload_dir.display());

    let app_state = Data::new(AppState {
        tera,
        config,
        backend,
    });

    info!("Listening on http://{}:{}", bind.0, bind.1);

    HttpServer::new(move || {
        App::new()
            .app_data(app_state.clone())
            .configure(routes::configure)
            .service(fs::Files::new("/static", static_dir.clone()))
    })
    .bind(bind)?
    .run()
    .await?;

    Ok(())
}
