use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: Option<String>,
    pub file_path: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RoleRequest {
    pub role: Option<Value>,
    pub roles: Option<Value>,
}

impl RoleRequest {
    /// The selected role as trimmed text. Strings, numbers and booleans are accepted.
    pub fn role_text(&self) -> Option<String> {
        let text = match self.role.as_ref()? {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            _ => return None,
        };
        let trimmed = text.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    }

    pub fn roles_list(&self) -> Option<&Vec<Value>> {
        self.roles.as_ref().and_then(Value::as_array)
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RoleResponse {
    pub success: bool,
    pub role: Value,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub success: bool,
    pub message: String,
    pub filename: String,
    pub filepath: String,
    pub extracted_text: String,
    pub backend_response: Value,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SuccessResponse {
    pub success: bool,
}
