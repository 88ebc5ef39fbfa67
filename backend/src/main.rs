use actix_web::middleware::Logger;
use actix_web::{web, App, HttpServer};
use certifyhub::config::Config;
use certifyhub::export::render::PdfRenderer;
use certifyhub::services;
use certifyhub::store::Store;
use certifyhub::AppState;
use env_logger::Env;
use log::info;
use std::io;
use std::sync::Arc;

#[actix_web::main]
async fn main() -> io::Result<()> {
    env_logger::init_from_env(Env::default().default_filter_or("info"));

    let config = Config::load().map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    std::fs::create_dir_all(&config.storage_dir)?;
    let store = Store::open(&config.database_path).map_err(io::Error::other)?;
    let renderer = Arc::new(PdfRenderer::new(
        config.fonts_dir.clone(),
        config.default_font.clone(),
    ));

    let host = config.host.clone();
    let port = config.port;
    let max_upload = config.max_upload_bytes;
    let state = web::Data::new(AppState::new(config, store, renderer));

    info!("Server running at http://{}:{}", host, port);

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .app_data(web::JsonConfig::default().limit(max_upload))
            .app_data(web::PayloadConfig::new(max_upload))
            .app_data(state.clone())
            .configure(services::configure_app)
    })
    .bind((host.as_str(), port))?
    .run()
    .await
}
