use actix_multipart::Multipart;
use actix_web::http::header;
use actix_web::{web, HttpResponse, Responder};
use futures_util::TryStreamExt;
use log::{error, info, warn};
use serde_json::{json, Value};
use tera::Context;
use uuid::Uuid;

use crate::error::{ProxyError, Result};
use crate::reply::GREETING;
use crate::upload;
use crate::web::models::{ChatRequest, RoleRequest, RoleResponse, SuccessResponse, UploadResponse};
use crate::AppState;

// Index page handler
pub async fn index(data: web::Data<AppState>) -> Result<HttpResponse> {
    let mut context = Context::new();
    context.insert("title", "MOBIN");
    context.insert("subtitle", "دستیار هوشمند شما");
    context.insert("greeting", GREETING);
    context.insert("roles", &data.config.roles);
    context.insert("max_upload_bytes", &data.config.max_upload_bytes);

    let html = data.tera.render("index.html", &context).map_err(|e| {
        error!("Template error: {}", e);
        ProxyError::from(e)
    })?;
    Ok(HttpResponse::Ok().content_type("text/html; charset=utf-8").body(html))
}

// Health check endpoint
pub async fn health_check() -> impl Responder {
    HttpResponse::Ok().json(json!({ "status": "ok" }))
}

/// Relays the backend's event stream for one prompt, byte for byte.
pub async fn chat(data: web::Data<AppState>, req: web::Json<ChatRequest>) -> Result<HttpResponse> {
    let message = match req.message.as_deref() {
        Some(m) if !m.trim().is_empty() => m,
        _ => {
            warn!("Rejected chat request without a message");
            return Err(ProxyError::bad_request("Message is required"));
        }
    };

    let request_id = Uuid::new_v4();
    info!("Chat request {}: {} characters", request_id, message.chars().count());

    let upstream = data
        .backend
        .open_prompt_stream(message, req.file_path.as_deref())
        .await
        .map_err(|e| {
            error!("Error forwarding message {} to backend: {}", request_id, e);
            e
        })?;

    // Dropping this stream when the browser goes away also drops the
    // upstream body, which closes the backend connection.
    let body = upstream
        .bytes_stream()
        .inspect_err(move |e| error!("Stream {} from backend failed: {}", request_id, e));

    Ok(HttpResponse::Ok()
        .insert_header((header::CONTENT_TYPE, "text/event-stream"))
        .insert_header((header::CACHE_CONTROL, "no-cache, no-transform"))
        .insert_header(("X-Accel-Buffering", "no"))
        .streaming(body))
}

/// Stores an uploaded Word document and hands its text to the backend.
pub async fn upload(data: web::Data<AppState>, payload: Multipart) -> Result<HttpResponse> {
    let config = &data.config;
    let file = upload::read_file_field(payload, config.max_upload_bytes)
        .await?
        .ok_or_else(|| ProxyError::bad_request("No file provided"))?;

    let name = upload::sanitize_file_name(&file.name)?;
    let kind = upload::validate(&name, file.content_type.as_deref()).map_err(|e| {
        warn!("Rejected upload {:?}: {}", name, e);
        e
    })?;

    info!("Upload {:?}: {} bytes ({:?})", name, file.bytes.len(), kind);

    let saved = upload::save(&config.upload_dir, &name, &file.bytes)
        .await
        .map_err(|e| {
            error!("Error saving {:?} to {}: {}", name, config.upload_dir.display(), e);
            ProxyError::from(e)
        })?;

    let extracted = upload::extract_text(kind, &name, &file.bytes);
    let prompt = upload::prompt_for(&extracted, &name);
    let remote_path = config.remote_file_path(&name);

    let backend_response = data
        .backend
        .process_file(&prompt, &remote_path, &config.username)
        .await
        .map_err(|e| {
            error!("Error processing file upload {:?}: {}", name, e);
            e
        })?;

    Ok(HttpResponse::Ok().json(UploadResponse {
        success: true,
        message: format!("File \"{name}\" uploaded and processed successfully"),
        filename: name,
        filepath: saved.display().to_string(),
        extracted_text: upload::preview(&extracted),
        backend_response,
    }))
}

pub async fn role(data: web::Data<AppState>, req: web::Json<RoleRequest>) -> Result<HttpResponse> {
    let role = req
        .role_text()
        .ok_or_else(|| ProxyError::bad_request("Role is required"))?;
    let roles = req
        .roles_list()
        .ok_or_else(|| ProxyError::bad_request("Roles array is required"))?;

    let reply = data.backend.set_role(&role, roles).await.map_err(|e| {
        error!("Error forwarding role to backend: {}", e);
        e
    })?;

    Ok(HttpResponse::Ok().json(RoleResponse {
        success: true,
        role: reply.get("role").cloned().unwrap_or(Value::Null),
    }))
}

pub async fn reset(data: web::Data<AppState>) -> Result<HttpResponse> {
    data.backend.reset_chat().await.map_err(|e| {
        error!("Error resetting chat history: {}", e);
        e
    })?;
    Ok(HttpResponse::Ok().json(SuccessResponse { success: true }))
}
