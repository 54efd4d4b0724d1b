use chrono::{DateTime, Local, Timelike};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sender {
    #[serde(rename = "user")]
    User,
    #[serde(rename = "bot")]
    Bot,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub content_type: String,
    pub size: u64,
}

/// One line of the conversation as shown to the user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub text: String,
    pub sender: Sender,
    pub timestamp: DateTime<Local>,
    pub file: Option<FileInfo>,
}

impl ChatMessage {
    pub fn new(sender: Sender, text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            text: text.into(),
            sender,
            timestamp: Local::now(),
            file: None,
        }
    }

    pub fn with_file(mut self, file: FileInfo) -> Self {
        self.file = Some(file);
        self
    }

    pub fn render(&self) -> String {
        let who = match self.sender {
            Sender::User => "you",
            Sender::Bot => "MOBIN",
        };
        let mut out = format!("[{}] {}: {}", format_time(&self.timestamp), who, self.text);
        if let Some(file) = &self.file {
            out.push_str(&format!(" ({}, {})", file.name, format_file_size(file.size)));
        }
        out
    }
}

pub fn format_file_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

/// 12-hour clock, e.g. `9:05 PM`.
pub fn format_time<T: Timelike>(time: &T) -> String {
    let hours = time.hour();
    let ampm = if hours >= 12 { "PM" } else { "AM" };
    let display_hours = match hours % 12 {
        0 => 12,
        h => h,
    };
    format!("{}:{:02} {}", display_hours, time.minute(), ampm)
}
