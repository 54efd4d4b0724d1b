pub mod docx;

use actix_multipart::Multipart;
use futures_util::TryStreamExt;
use log::warn;
use std::path::{Path, PathBuf};

use crate::error::{ProxyError, Result};

const WORD_MIME_TYPES: &[&str] = &[
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
];
const WORD_EXTENSIONS: &[&str] = &[".doc", ".docx"];
const PREVIEW_CHARS: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WordKind {
    Doc,
    Docx,
}

#[derive(Debug)]
pub struct UploadedFile {
    pub name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// Reads the `file` field out of a multipart body, enforcing the size limit.
pub async fn read_file_field(mut payload: Multipart, limit: usize) -> Result<Option<UploadedFile>> {
    while let Some(mut field) = payload.try_next().await? {
        if field.content_disposition().get_name() != Some("file") {
            continue;
        }

        let name = field
            .content_disposition()
            .get_filename()
            .unwrap_or_default()
            .to_string();
        let content_type = field.content_type().map(|mime| mime.essence_str().to_string());

        let mut bytes = Vec::new();
        while let Some(chunk) = field.try_next().await? {
            if bytes.len() + chunk.len() > limit {
                return Err(ProxyError::PayloadTooLarge { limit });
            }
            bytes.extend_from_slice(&chunk);
        }

        return Ok(Some(UploadedFile {
            name,
            content_type,
            bytes,
        }));
    }
    Ok(None)
}

/// Lowercased extension including the dot, taken from the last `.`.
pub fn extension_of(name: &str) -> Option<String> {
    name.rfind('.').map(|idx| name[idx..].to_lowercase())
}

/// Reduces a client-supplied name to its final path component.
pub fn sanitize_file_name(raw: &str) -> Result<String> {
    let name = raw.rsplit(|c: char| c == '/' || c == '\\').next().unwrap_or_default().trim();
    if name.is_empty() || name == "." || name == ".." {
        return Err(ProxyError::bad_request("Invalid file name"));
    }
    Ok(name.to_string())
}

/// Accepts Word documents by content type or extension and rejects images.
pub fn validate(name: &str, content_type: Option<&str>) -> Result<WordKind> {
    let content_type = content_type.unwrap_or_default().to_ascii_lowercase();
    if content_type.starts_with("image/") {
        return Err(ProxyError::bad_request(
            "Images are not allowed. Please upload a Word document (.doc or .docx).",
        ));
    }

    let extension = extension_of(name);
    let allowed_type = WORD_MIME_TYPES.contains(&content_type.as_str());
    let allowed_extension = extension
        .as_deref()
        .map(|ext| WORD_EXTENSIONS.contains(&ext))
        .unwrap_or(false);

    if !allowed_type && !allowed_extension {
        return Err(ProxyError::bad_request(
            "Only Word documents (.doc, .docx) are allowed",
        ));
    }

    Ok(match extension.as_deref() {
        Some(".docx") => WordKind::Docx,
        _ => WordKind::Doc,
    })
}

/// Text sent to the backend on behalf of the document.
pub fn extract_text(kind: WordKind, name: &str, bytes: &[u8]) -> String {
    match kind {
        WordKind::Docx => match docx::extract_text(bytes) {
            Ok(text) => text,
            Err(e) => {
                warn!("Error extracting text from {}: {}", name, e);
                format!("[File uploaded: {name}. Could not extract text content.]")
            }
        },
        WordKind::Doc => format!(
            "[File uploaded: {name}. Text extraction for .doc files may require additional processing.]"
        ),
    }
}

pub fn prompt_for(extracted: &str, name: &str) -> String {
    if extracted.is_empty() {
        format!("لطفا این فایل من بررسی شود: {name}")
    } else {
        extracted.to_string()
    }
}

pub fn preview(text: &str) -> String {
    let head: String = text.chars().take(PREVIEW_CHARS).collect();
    format!("{head}...")
}

/// Writes the file into `dir`, creating it when needed.
pub async fn save(dir: &Path, name: &str, bytes: &[u8]) -> std::io::Result<PathBuf> {
    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(name);
    tokio::fs::write(&path, bytes).await?;
    Ok(path)
}
