//! Frame reader and writer over the transport capability.
//!
//! Writing always terminates frames with `\0\n`, which both peer
//! conventions accept. Reading honors the connection's `eof_nl` mode: after
//! a length-delimited body, `eof_nl = true` peers (ActiveMQ, ocamlmq) leave
//! a full `\0\n` line to discard while `eof_nl = false` peers (RabbitMQ)
//! leave a single bare `\0` byte.

use std::io;

use bytes::{BufMut, BytesMut};

use crate::frame::Frame;
use crate::transport::Transport;

/// Serialize `frame` and write it in one buffered pass, flushing afterwards.
///
/// Layout: command, LF, one `name: value` line per header, a blank line,
/// the body, then the `\0\n` terminator. No headers are invented here; the
/// verbs that need `content-length` add it themselves.
pub async fn write_frame<T: Transport>(transport: &mut T, frame: &Frame) -> io::Result<()> {
    let mut buf = BytesMut::with_capacity(frame.body.len() + 64);
    buf.extend_from_slice(frame.command.as_bytes());
    buf.put_u8(b'\n');
    for (name, value) in &frame.headers {
        buf.extend_from_slice(name.as_bytes());
        buf.extend_from_slice(b": ");
        buf.extend_from_slice(value.as_bytes());
        buf.put_u8(b'\n');
    }
    buf.put_u8(b'\n');
    buf.extend_from_slice(&frame.body);
    buf.extend_from_slice(b"\0\n");
    transport.write_all(&buf).await?;
    transport.flush().await
}

/// Read one frame.
///
/// Blank lines before the command are skipped. Header lines are split at
/// the first colon; names are lowercased and values stripped of surrounding
/// whitespace; duplicates are preserved; lines without a colon are skipped.
/// A `content-length` header that parses as a non-negative integer selects
/// length-delimited body reading, after which the terminator is consumed
/// according to `eof_nl` (a discarded line, or a discarded byte). Without
/// it the body is rebuilt from lines joined by `\n` until a line containing
/// `\0` ends it.
pub async fn read_frame<T: Transport>(transport: &mut T, eof_nl: bool) -> io::Result<Frame> {
    let command = loop {
        let line = transport.read_line().await?;
        if !line.is_empty() {
            break into_utf8(line, "command")?;
        }
    };

    let mut headers: Vec<(String, String)> = Vec::new();
    loop {
        let line = transport.read_line().await?;
        if line.is_empty() {
            break;
        }
        if let Some(colon) = line.iter().position(|&b| b == b':') {
            let name = into_utf8(line[..colon].to_vec(), "header name")?.to_lowercase();
            let value = into_utf8(line[colon + 1..].to_vec(), "header value")?
                .trim()
                .to_string();
            headers.push((name, value));
        }
    }

    let content_length = headers
        .iter()
        .find(|(name, _)| name == "content-length")
        .and_then(|(_, value)| value.parse::<usize>().ok());

    let body = match content_length {
        Some(len) => {
            let body = transport.read_exact(len).await?;
            // Terminator bytes are discarded without inspection.
            if eof_nl {
                transport.read_line().await?;
            } else {
                transport.read_byte().await?;
            }
            body
        }
        None => {
            let mut body = Vec::new();
            let mut first = true;
            loop {
                let line = transport.read_line().await?;
                if !first {
                    body.push(b'\n');
                }
                first = false;
                if let Some(nul) = line.iter().position(|&b| b == 0) {
                    body.extend_from_slice(&line[..nul]);
                    break;
                }
                body.extend_from_slice(&line);
            }
            body
        }
    };

    Ok(Frame {
        command,
        headers,
        body,
    })
}

fn into_utf8(bytes: Vec<u8>, what: &str) -> io::Result<String> {
    String::from_utf8(bytes).map_err(|e| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("invalid utf8 in {}: {}", what, e),
        )
    })
}
