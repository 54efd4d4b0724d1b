use actix_web::web;

use crate::error::ProxyError;
use crate::web::handlers;

pub fn configure(cfg: &mut web::ServiceConfig) {
    // Malformed JSON gets the same `{"error": ...}` body as every other failure.
    let json_config = web::JsonConfig::default()
        .error_handler(|err, _req| ProxyError::bad_request(err.to_string()).into());

    cfg.service(
        web::scope("/api")
            .app_data(json_config)
            .route("/chat", web::post().to(handlers::chat))
            .route("/upload", web::post().to(handlers::upload))
            .route("/role", web::post().to(handlers::role))
            .route("/reset", web::post().to(handlers::reset)),
    )
    .route("/", web::get().to(handlers::index))
    .route("/health", web::get().to(handlers::health_check));
}
