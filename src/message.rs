//! Message definitions
//!
//! A `Message` is a `(sender, body)` pair. The same shape is accepted as JSON
//! by the HTTP endpoint, so the serde field names match the wire keys.

use chrono::{DateTime, Local, TimeZone};
use serde::{Deserialize, Serialize};

/// Canonical line terminator for everything written to clients
pub const LINE_TERMINATOR: &str = "\r\n";

/// Body of the notice broadcast when a client finishes its handshake
pub const JOINED: &str = "joined";

/// Body of the notice broadcast when a client's session ends
pub const DISCONNECTED: &str = "disconnected";

/// Message to be broadcast to every attached client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Message body
    pub message: String,
    /// Display name of the sender (may be empty for unknown senders)
    pub sender: String,
}

impl Message {
    pub fn new(sender: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            sender: sender.into(),
        }
    }

    /// "joined" notice for `sender`
    pub fn joined(sender: impl Into<String>) -> Self {
        Self::new(sender, JOINED)
    }

    /// "disconnected" notice for `sender`
    pub fn disconnected(sender: impl Into<String>) -> Self {
        Self::new(sender, DISCONNECTED)
    }

    /// Body with any trailing `\r`/`\n` replaced by exactly one canonical terminator
    pub fn normalized_body(&self) -> String {
        let trimmed = self.message.trim_end_matches(['\r', '\n']);
        format!("{trimmed}{LINE_TERMINATOR}")
    }

    /// Render as `HH:MM:SS sender: body\r\n` using the given time
    pub fn render_at<Tz: TimeZone>(&self, at: &DateTime<Tz>) -> String
    where
        Tz::Offset: std::fmt::Display,
    {
        format!(
            "{} {}: {}",
            at.format("%H:%M:%S"),
            self.sender,
            self.normalized_body()
        )
    }

    /// Render as a display line stamped with the current local time
    pub fn render(&self) -> String {
        self.render_at(&Local::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_normalized_body_appends_terminator() {
        let msg = Message::new("name", "test");
        assert_eq!(msg.normalized_body(), "test\r\n");
    }

    #[test]
    fn test_normalized_body_collapses_existing_terminators() {
        assert_eq!(Message::new("a", "hi\r\n").normalized_body(), "hi\r\n");
        assert_eq!(Message::new("a", "hi\n").normalized_body(), "hi\r\n");
        assert_eq!(Message::new("a", "hi\n\r\n").normalized_body(), "hi\r\n");
    }

    #[test]
    fn test_render_format() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 9, 4, 7).unwrap();
        let msg = Message::new("api", "hi");
        assert_eq!(msg.render_at(&at), "09:04:07 api: hi\r\n");
    }

    #[test]
    fn test_render_empty_sender() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 23, 59, 59).unwrap();
        let msg = Message::disconnected("");
        assert_eq!(msg.render_at(&at), "23:59:59 : disconnected\r\n");
    }

    #[test]
    fn test_render_now_shape() {
        let line = Message::joined("alice").render();
        let (stamp, rest) = line.split_at(8);
        assert_eq!(stamp.len(), 8);
        assert_eq!(stamp.matches(':').count(), 2);
        assert_eq!(rest, " alice: joined\r\n");
    }

    #[test]
    fn test_message_deserialize() {
        let json = r#"{"message": "hi", "sender": "api"}"#;
        let msg: Message = serde_json::from_str(json).unwrap();
        assert_eq!(msg, Message::new("api", "hi"));
    }
}
