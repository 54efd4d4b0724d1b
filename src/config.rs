use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;

const DEFAULT_BACKEND_URL: &str = "http://172.16.100.22:4000";
const DEFAULT_CONTROL_URL: &str = "http://172.16.100.22:80";
const DEFAULT_RESET_ENDPOINT: &str = "/reset_chat/";
const DEFAULT_REMOTE_UPLOAD_DIR: &str =
    "/home/ubuntu2204/Desktop/arash/chat_bot_mobin/module/upload/guest";
const DEFAULT_MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

/// Runtime settings, resolved once from the environment at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub backend_url: String,
    pub control_url: String,
    pub reset_endpoint: String,
    pub upload_dir: PathBuf,
    pub username: String,
    pub remote_file_path: Option<String>,
    pub remote_upload_dir: String,
    pub max_upload_bytes: usize,
    pub roles: Vec<String>,
    pub templates_glob: String,
    pub static_dir: PathBuf,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a config from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let port = match get("PORT") {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .with_context(|| format!("PORT must be a port number, got {raw:?}"))?,
            None => 8080,
        };

        let max_upload_bytes = match get("MAX_UPLOAD_BYTES") {
            Some(raw) => raw
                .trim()
                .parse::<usize>()
                .with_context(|| format!("MAX_UPLOAD_BYTES must be a byte count, got {raw:?}"))?,
            None => DEFAULT_MAX_UPLOAD_BYTES,
        };

        // Role and reset calls historically target a different port of the
        // same host unless BACKEND_URL pins both.
        let backend_override = get("BACKEND_URL");
        let control_url = get("BACKEND_CONTROL_URL")
            .or_else(|| backend_override.clone())
            .unwrap_or_else(|| DEFAULT_CONTROL_URL.to_string());
        let backend_url = backend_override.unwrap_or_else(|| DEFAULT_BACKEND_URL.to_string());

        let roles = get("CHAT_ROLES")
            .map(|raw| parse_roles(&raw))
            .filter(|roles| !roles.is_empty())
            .unwrap_or_else(|| vec!["general".to_string()]);

        Ok(Self {
            host: get("HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            port,
            backend_url,
            control_url,
            reset_endpoint: get("BACKEND_RESET_ENDPOINT")
                .unwrap_or_else(|| DEFAULT_RESET_ENDPOINT.to_string()),
            upload_dir: get("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("uploads").join("guest")),
            username: get("USERNAME").unwrap_or_else(|| "guest".to_string()),
            remote_file_path: get("REMOTE_FILE_PATH"),
            remote_upload_dir: get("REMOTE_UPLOAD_DIR")
                .unwrap_or_else(|| DEFAULT_REMOTE_UPLOAD_DIR.to_string()),
            max_upload_bytes,
            roles,
            templates_glob: get("TEMPLATES_GLOB").unwrap_or_else(|| "templates/**/*".to_string()),
            static_dir: get("STATIC_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./static")),
        })
    }

    pub fn process_request_url(&self) -> String {
        join_endpoint(&self.backend_url, "/process_request/")
    }

    pub fn set_role_url(&self) -> String {
        join_endpoint(&self.control_url, "/set_role/")
    }

    pub fn reset_url(&self) -> String {
        join_endpoint(&self.control_url, &self.reset_endpoint)
    }

    /// Path the backend should read an uploaded file from.
    pub fn remote_file_path(&self, file_name: &str) -> String {
        match &self.remote_file_path {
            Some(fixed) => fixed.clone(),
            None => format!("{}/{}", self.remote_upload_dir.trim_end_matches('/'), file_name),
        }
    }
}

/// Joins a base URL and an endpoint path with exactly one `/` between them.
pub fn join_endpoint(base: &str, path: &str) -> String {
    let base = base.strip_suffix('/').unwrap_or(base);
    if path.starts_with('/') {
        format!("{base}{path}")
    } else {
        format!("{base}/{path}")
    }
}

fn parse_roles(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|role| !role.is_empty())
        .map(str::to_string)
        .collect()
}
