//! Shared test support: an in-memory transport fed from a canned byte
//! script, with a handle for inspecting everything the client wrote.
#![allow(dead_code)]

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use stomp_mq::{ConnectOptions, Connection, Transport};

/// In-memory transport. Reads come from the canned `input`; writes are
/// captured for inspection through the paired [`Outbox`].
#[derive(Debug)]
pub struct ScriptTransport {
    input: Vec<u8>,
    pos: usize,
    written: Arc<Mutex<Vec<u8>>>,
    closed: Arc<AtomicBool>,
}

impl ScriptTransport {
    pub fn new(input: &[u8]) -> (Self, Outbox) {
        let written = Arc::new(Mutex::new(Vec::new()));
        let closed = Arc::new(AtomicBool::new(false));
        let outbox = Outbox {
            written: written.clone(),
            closed: closed.clone(),
        };
        (
            Self {
                input: input.to_vec(),
                pos: 0,
                written,
                closed,
            },
            outbox,
        )
    }
}

/// Test-side view of what the client wrote to a [`ScriptTransport`].
#[derive(Clone)]
pub struct Outbox {
    written: Arc<Mutex<Vec<u8>>>,
    closed: Arc<AtomicBool>,
}

impl Outbox {
    pub fn bytes(&self) -> Vec<u8> {
        self.written.lock().unwrap().clone()
    }

    pub fn text(&self) -> String {
        String::from_utf8(self.bytes()).unwrap()
    }

    /// Drain the captured bytes, so later assertions see only later writes.
    pub fn take(&self) -> Vec<u8> {
        std::mem::take(&mut *self.written.lock().unwrap())
    }

    pub fn closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

fn eof() -> io::Error {
    io::Error::new(io::ErrorKind::UnexpectedEof, "script exhausted")
}

#[async_trait]
impl Transport for ScriptTransport {
    async fn read_line(&mut self) -> io::Result<Vec<u8>> {
        if self.pos >= self.input.len() {
            return Err(eof());
        }
        let rest = &self.input[self.pos..];
        match rest.iter().position(|&b| b == b'\n') {
            Some(i) => {
                let line = rest[..i].to_vec();
                self.pos += i + 1;
                Ok(line)
            }
            None => {
                let line = rest.to_vec();
                self.pos = self.input.len();
                Ok(line)
            }
        }
    }

    async fn read_byte(&mut self) -> io::Result<u8> {
        if self.pos >= self.input.len() {
            return Err(eof());
        }
        let byte = self.input[self.pos];
        self.pos += 1;
        Ok(byte)
    }

    async fn read_exact(&mut self, len: usize) -> io::Result<Vec<u8>> {
        if self.pos + len > self.input.len() {
            return Err(eof());
        }
        let out = self.input[self.pos..self.pos + len].to_vec();
        self.pos += len;
        Ok(out)
    }

    async fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.written.lock().unwrap().extend_from_slice(buf);
        Ok(())
    }

    async fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }

    async fn close(&mut self) -> io::Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// CONNECTED reply in the `\0\n`-terminated convention.
pub const CONNECTED: &[u8] = b"CONNECTED\n\n\0\n";

/// CONNECTED reply in RabbitMQ's bare-`\0` convention (with an explicit
/// content-length, as the broker sends).
pub const CONNECTED_RABBIT: &[u8] = b"CONNECTED\ncontent-length: 0\n\n\0";

/// Handshake a connection whose server script is `CONNECTED` followed by
/// `script`. The captured CONNECT bytes are drained so assertions see only
/// what the test itself provokes.
pub async fn connected(script: &[u8]) -> (Connection<ScriptTransport>, Outbox) {
    let mut input = CONNECTED.to_vec();
    input.extend_from_slice(script);
    let (transport, outbox) = ScriptTransport::new(&input);
    let conn = Connection::handshake(transport, ConnectOptions::new())
        .await
        .expect("handshake failed");
    outbox.take();
    (conn, outbox)
}

/// Like [`connected`], in the bare-`\0` convention used by RabbitMQ.
pub async fn connected_rabbit(script: &[u8]) -> (Connection<ScriptTransport>, Outbox) {
    let mut input = CONNECTED_RABBIT.to_vec();
    input.extend_from_slice(script);
    let (transport, outbox) = ScriptTransport::new(&input);
    let conn = Connection::handshake(transport, ConnectOptions::new().eof_nl(false))
        .await
        .expect("handshake failed");
    outbox.take();
    (conn, outbox)
}
