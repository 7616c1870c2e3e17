use std::fmt;

/// A STOMP 1.0 frame: command, ordered headers, raw body bytes.
///
/// Headers are kept as an ordered list of (name, value) pairs. Duplicates
/// are preserved; lookups return the first match, which is also what the
/// protocol specifies for duplicate headers on receipt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// STOMP command (e.g. CONNECT, SEND, SUBSCRIBE)
    pub command: String,
    /// Ordered headers as (name, value) pairs
    pub headers: Vec<(String, String)>,
    /// Raw body bytes
    pub body: Vec<u8>,
}

impl Frame {
    /// Create a new frame with the given command and empty headers/body.
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    /// Append a header (builder style).
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Request a receipt for this frame (builder style). The server answers
    /// with a RECEIPT frame carrying the same id.
    pub fn receipt(self, id: impl Into<String>) -> Self {
        self.header("receipt", id)
    }

    /// Set the frame body (builder style).
    pub fn set_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// First header value matching `name`, or `None`.
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Command: {}", self.command)?;
        for (k, v) in &self.headers {
            writeln!(f, "{}: {}", k, v)?;
        }
        writeln!(f, "Body ({} bytes)", self.body.len())
    }
}

/// A delivered message: the `message-id` header value, the full header list
/// of the MESSAGE frame it came from, and the body.
///
/// Only MESSAGE frames carrying a `message-id` header become `Message`s;
/// the conversion hands the frame back otherwise so callers can report it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl Message {
    /// First header value matching `name`, or `None`.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

impl TryFrom<Frame> for Message {
    type Error = Frame;

    fn try_from(frame: Frame) -> Result<Self, Frame> {
        if frame.command != "MESSAGE" {
            return Err(frame);
        }
        match frame.get_header("message-id") {
            Some(id) => Ok(Message {
                id: id.to_string(),
                headers: frame.headers,
                body: frame.body,
            }),
            None => Err(frame),
        }
    }
}

/// Point-to-point destination name for `name`.
pub fn queue_destination(name: &str) -> String {
    format!("/queue/{}", name)
}

/// Publish-subscribe destination name for `name`.
pub fn topic_destination(name: &str) -> String {
    format!("/topic/{}", name)
}
