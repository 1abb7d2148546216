//! Minimal STOMP 1.2 frame codec, enough for a text-only analysis feed.

use std::fmt::Write as _;

use strum_macros::{Display, EnumString};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "UPPERCASE")]
pub enum Command {
    Connect,
    Stomp,
    Connected,
    Send,
    Subscribe,
    Unsubscribe,
    Message,
    Receipt,
    Error,
    Disconnect,
}

impl Command {
    /// CONNECT and CONNECTED frames carry their headers unescaped.
    fn escapes_headers(self) -> bool {
        !matches!(self, Command::Connect | Command::Connected)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("unknown STOMP command `{0}`")]
    UnknownCommand(String),
    #[error("malformed header line `{0}`")]
    MalformedHeader(String),
    #[error("invalid escape sequence in `{0}`")]
    InvalidEscape(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub command: Command,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl Frame {
    pub fn new(command: Command) -> Self {
        Self {
            command,
            headers: Vec::new(),
            body: String::new(),
        }
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// First occurrence wins, as the protocol requires for repeated headers.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn connect(host: &str, heartbeat_out_ms: u64, heartbeat_in_ms: u64) -> Self {
        Frame::new(Command::Connect)
            .header("accept-version", "1.2")
            .header("host", host)
            .header("heart-beat", format!("{},{}", heartbeat_out_ms, heartbeat_in_ms))
    }

    pub fn subscribe(id: &str, destination: &str) -> Self {
        Frame::new(Command::Subscribe)
            .header("id", id)
            .header("destination", destination)
            .header("ack", "auto")
    }

    pub fn unsubscribe(id: &str) -> Self {
        Frame::new(Command::Unsubscribe).header("id", id)
    }

    pub fn send(destination: &str, json_body: &str) -> Self {
        Frame::new(Command::Send)
            .header("destination", destination)
            .header("content-type", "application/json")
            .header("content-length", json_body.len().to_string())
            .with_body(json_body)
    }

    pub fn disconnect() -> Self {
        Frame::new(Command::Disconnect)
    }

    pub fn encode(&self) -> String {
        let escape = self.command.escapes_headers();
        let mut out = String::with_capacity(64 + self.body.len());
        let _ = writeln!(out, "{}", self.command);
        for (k, v) in &self.headers {
            if escape {
                let _ = writeln!(out, "{}:{}", escape_header(k), escape_header(v));
            } else {
                let _ = writeln!(out, "{}:{}", k, v);
            }
        }
        out.push('\n');
        out.push_str(&self.body);
        out.push('\0');
        out
    }

    /// Parses one frame. `Ok(None)` means the payload was a heart-beat.
    pub fn decode(raw: &str) -> Result<Option<Frame>, FrameError> {
        let raw = raw.trim_start_matches(['\r', '\n']);
        if raw.is_empty() || raw == "\0" {
            return Ok(None);
        }

        let (head, rest) = raw
            .split_once("\n\n")
            .or_else(|| raw.split_once("\r\n\r\n"))
            .unwrap_or((raw.trim_end_matches('\0'), ""));

        let mut lines = head.lines().map(|l| l.trim_end_matches('\r'));
        let command_line = lines.next().unwrap_or_default();
        let command: Command = command_line
            .parse()
            .map_err(|_| FrameError::UnknownCommand(command_line.to_string()))?;

        let mut frame = Frame::new(command);
        for line in lines {
            if line.is_empty() {
                continue;
            }
            let (k, v) = line
                .split_once(':')
                .ok_or_else(|| FrameError::MalformedHeader(line.to_string()))?;
            if command.escapes_headers() {
                frame.headers.push((unescape_header(k)?, unescape_header(v)?));
            } else {
                frame.headers.push((k.to_string(), v.to_string()));
            }
        }

        let body = match frame.get("content-length").and_then(|n| n.parse::<usize>().ok()) {
            Some(len) => rest.get(..len).unwrap_or(rest),
            None => rest.split('\0').next().unwrap_or_default(),
        };
        frame.body = body.trim_end_matches('\0').to_string();
        Ok(Some(frame))
    }
}

fn escape_header(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            ':' => out.push_str("\\c"),
            other => out.push(other),
        }
    }
    out
}

fn unescape_header(value: &str) -> Result<String, FrameError> {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('c') => out.push(':'),
            _ => return Err(FrameError::InvalidEscape(value.to_string())),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_send_frame() {
        let frame = Frame::send("/app/analysis.start", r#"{"cardId":"a"}"#);
        assert_eq!(
            frame.encode(),
            "SEND\ndestination:/app/analysis.start\ncontent-type:application/json\ncontent-length:14\n\n{\"cardId\":\"a\"}\0"
        );
    }

    #[test]
    fn decodes_message_frame_from_broker() {
        let raw = "MESSAGE\ndestination:/topic/analysis.binance-btcusdt-1\ncontent-type:application/json\nsubscription:sub-0\nmessage-id:7\ncontent-length:17\n\n{\"cardId\":\"ab-1\"}\0\n";
        let frame = Frame::decode(raw).unwrap().unwrap();
        assert_eq!(frame.command, Command::Message);
        assert_eq!(frame.get("subscription"), Some("sub-0"));
        assert_eq!(frame.body, "{\"cardId\":\"ab-1\"}");
    }

    #[test]
    fn body_without_content_length_ends_at_nul() {
        let frame = Frame::decode("ERROR\nmessage:bad\n\nsomething broke\0").unwrap().unwrap();
        assert_eq!(frame.command, Command::Error);
        assert_eq!(frame.get("message"), Some("bad"));
        assert_eq!(frame.body, "something broke");
    }

    #[test]
    fn heartbeats_decode_to_none() {
        assert_eq!(Frame::decode("\n").unwrap(), None);
        assert_eq!(Frame::decode("\r\n").unwrap(), None);
    }

    #[test]
    fn header_escaping_roundtrips_through_decode() {
        let frame = Frame::new(Command::Message)
            .header("destination", "/topic/a:b")
            .with_body("x");
        let encoded = frame.encode();
        assert!(encoded.contains("destination:/topic/a\\cb"));
        assert_eq!(Frame::decode(&encoded).unwrap().unwrap(), frame);
    }

    #[test]
    fn connected_frame_is_not_unescaped() {
        let frame = Frame::decode("CONNECTED\nversion:1.2\nheart-beat:0,0\n\n\0").unwrap().unwrap();
        assert_eq!(frame.command, Command::Connected);
        assert_eq!(frame.get("version"), Some("1.2"));
        assert!(frame.body.is_empty());
    }

    #[test]
    fn rejects_unknown_commands() {
        assert_eq!(
            Frame::decode("HELLO\n\n\0"),
            Err(FrameError::UnknownCommand("HELLO".to_string()))
        );
    }
}
