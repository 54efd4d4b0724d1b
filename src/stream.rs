//! Incremental decoding of streamed chat replies.
//!
//! The backend answers `/process_request/` with `text/event-stream` framing.
//! Chunks arrive at arbitrary byte boundaries, so lines are buffered as raw
//! bytes and only decoded once the terminating newline has been seen.

use serde_json::Value;

use crate::reply::FILE_REPORT_LABEL;

/// Fields that may carry reply text in a JSON payload, in priority order.
const TEXT_FIELDS: &[&str] = &[
    "text_response",
    "response",
    "message",
    "answer",
    "content",
    "delta",
    "token",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseEvent {
    Data(String),
    Done,
}

/// Splits a byte stream into SSE events.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        let mut consumed = 0;
        while let Some(offset) = self.buffer[consumed..].iter().position(|b| *b == b'\n') {
            let end = consumed + offset;
            if let Some(event) = parse_line(&self.buffer[consumed..end]) {
                events.push(event);
            }
            consumed = end + 1;
        }
        self.buffer.drain(..consumed);
        events
    }

    /// Flushes a final line that was never newline-terminated.
    pub fn finish(&mut self) -> Vec<SseEvent> {
        let rest = std::mem::take(&mut self.buffer);
        parse_line(&rest).into_iter().collect()
    }
}

fn parse_line(raw: &[u8]) -> Option<SseEvent> {
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    let line = String::from_utf8_lossy(raw);
    let payload = line.strip_prefix("data:")?;
    let payload = payload.strip_prefix(' ').unwrap_or(payload);
    if payload.trim() == "[DONE]" {
        return Some(SseEvent::Done);
    }
    Some(SseEvent::Data(payload.to_string()))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatUpdate {
    /// New text appended to the reply.
    Text(String),
    FileReport(String),
    Error(String),
    Done,
}

/// Interprets one `data:` payload.
pub fn interpret_payload(payload: &str) -> Vec<ChatUpdate> {
    if payload.is_empty() {
        return Vec::new();
    }

    match serde_json::from_str::<Value>(payload) {
        Ok(Value::Object(map)) => {
            let mut updates = Vec::new();
            if let Some(err) = map.get("error") {
                let message = err
                    .as_str()
                    .map(str::to_owned)
                    .or_else(|| err.pointer("/message").and_then(Value::as_str).map(str::to_owned))
                    .unwrap_or_else(|| err.to_string());
                updates.push(ChatUpdate::Error(message));
            }
            if let Some(text) = TEXT_FIELDS
                .iter()
                .find_map(|key| map.get(*key).and_then(Value::as_str))
            {
                if !text.is_empty() {
                    updates.push(ChatUpdate::Text(text.to_string()));
                }
            }
            if let Some(report) = map.get("file_report").and_then(Value::as_str) {
                updates.push(ChatUpdate::FileReport(report.to_string()));
            }
            updates
        }
        Ok(Value::String(text)) => vec![ChatUpdate::Text(text)],
        // Numbers, arrays and plain prose are shown as sent.
        _ => vec![ChatUpdate::Text(payload.to_string())],
    }
}

/// The reply being assembled from a streamed response.
#[derive(Debug, Default)]
pub struct ChatStream {
    decoder: SseDecoder,
    text: String,
    file_report: Option<String>,
    finished: bool,
}

impl ChatStream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &[u8]) -> Vec<ChatUpdate> {
        let events = self.decoder.push(chunk);
        self.apply(events)
    }

    pub fn finish(&mut self) -> Vec<ChatUpdate> {
        let events = self.decoder.finish();
        let mut updates = self.apply(events);
        if !self.finished {
            self.finished = true;
            updates.push(ChatUpdate::Done);
        }
        updates
    }

    fn apply(&mut self, events: Vec<SseEvent>) -> Vec<ChatUpdate> {
        let mut updates = Vec::new();
        for event in events {
            if self.finished {
                break;
            }
            match event {
                SseEvent::Done => {
                    self.finished = true;
                    updates.push(ChatUpdate::Done);
                }
                SseEvent::Data(payload) => {
                    for update in interpret_payload(&payload) {
                        match &update {
                            ChatUpdate::Text(text) => self.text.push_str(text),
                            ChatUpdate::FileReport(report) => {
                                self.file_report = Some(report.clone())
                            }
                            _ => {}
                        }
                        updates.push(update);
                    }
                }
            }
        }
        updates
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn display_text(&self) -> String {
        match &self.file_report {
            Some(report) => format!("{}\n\n{}\n{}", self.text, FILE_REPORT_LABEL, report),
            None => self.text.clone(),
        }
    }
}
