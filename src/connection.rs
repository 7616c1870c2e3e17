//! Generic STOMP client: handshake, receipt correlation, pending-message
//! buffering, transactions, and the public verbs.
//!
//! A `Connection` is not internally synchronized. Every verb takes
//! `&mut self`, so at most one operation can be outstanding at a time; the
//! wire therefore sees frames in call order and the receipt correlation
//! cannot be interleaved by a concurrent caller.

use std::collections::{BTreeSet, VecDeque};
use std::io;
use std::net::SocketAddr;

use log::{debug, info, trace};

use crate::codec;
use crate::error::{ConnectionError, ErrorKind, Result, StompError};
use crate::frame::{Frame, Message};
use crate::transport::{Connector, Transport};

/// Options for the CONNECT handshake.
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    pub login: Option<String>,
    pub passcode: Option<String>,
    /// Frame-terminator convention of the peer: `true` when the server
    /// terminates frames with `\0\n` (ActiveMQ, ocamlmq), `false` for a
    /// bare `\0` (RabbitMQ).
    pub eof_nl: bool,
    /// Extra CONNECT headers, appended after the credentials in order.
    pub headers: Vec<(String, String)>,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            login: None,
            passcode: None,
            eof_nl: true,
            headers: Vec::new(),
        }
    }
}

impl ConnectOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn login(mut self, login: impl Into<String>) -> Self {
        self.login = Some(login.into());
        self
    }

    pub fn passcode(mut self, passcode: impl Into<String>) -> Self {
        self.passcode = Some(passcode.into());
        self
    }

    pub fn credentials(self, login: impl Into<String>, passcode: impl Into<String>) -> Self {
        self.login(login).passcode(passcode)
    }

    pub fn eof_nl(mut self, eof_nl: bool) -> Self {
        self.eof_nl = eof_nl;
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// A live STOMP connection over a transport `T`.
#[derive(Debug)]
pub struct Connection<T> {
    transport: T,
    closed: bool,
    eof_nl: bool,
    transactions: BTreeSet<String>,
    pending: VecDeque<Message>,
    receipt_seq: u64,
    transaction_seq: u64,
}

impl<T: Connector> Connection<T> {
    /// Open a transport to `addr` and perform the CONNECT handshake.
    ///
    /// A refused connection fails with an `Abort` hint and
    /// `ConnectionRefused`; any other open failure is reported as transport
    /// breakage with a `Reconnect` hint.
    pub async fn connect(addr: SocketAddr, options: ConnectOptions) -> Result<Self> {
        let transport = T::open(addr).await.map_err(|e| {
            if e.kind() == io::ErrorKind::ConnectionRefused {
                StompError::abort(
                    ErrorKind::Connection(ConnectionError::ConnectionRefused),
                    format!("connecting to {}", addr),
                )
            } else {
                StompError::closed(format!("connecting to {}: {}", addr, e))
            }
        })?;
        Self::handshake(transport, options).await
    }
}

impl<T: Transport> Connection<T> {
    /// Perform the CONNECT handshake over an already-open transport.
    ///
    /// When either of login/passcode is supplied both headers are sent, the
    /// absent one as an empty string. MESSAGE frames arriving before the
    /// server's answer are buffered (or dropped if malformed); the first
    /// non-MESSAGE frame decides the outcome: CONNECTED succeeds, ERROR
    /// with `message: access_refused` is a credentials rejection, anything
    /// else is a protocol error.
    pub async fn handshake(transport: T, options: ConnectOptions) -> Result<Self> {
        let mut conn = Connection {
            transport,
            closed: false,
            eof_nl: options.eof_nl,
            transactions: BTreeSet::new(),
            pending: VecDeque::new(),
            receipt_seq: 1,
            transaction_seq: 1,
        };

        let mut frame = Frame::new("CONNECT");
        if options.login.is_some() || options.passcode.is_some() {
            frame = frame
                .header("login", options.login.clone().unwrap_or_default())
                .header("passcode", options.passcode.clone().unwrap_or_default());
        }
        for (name, value) in &options.headers {
            frame = frame.header(name.as_str(), value.as_str());
        }

        conn.write_frame(&frame, "CONNECT").await?;
        let reply = conn.next_control_frame("CONNECT handshake").await?;
        match reply.command.as_str() {
            "CONNECTED" => {
                info!("connected");
                Ok(conn)
            }
            "ERROR" if reply.get_header("message") == Some("access_refused") => {
                Err(StompError::abort(
                    ErrorKind::Connection(ConnectionError::AccessRefused),
                    "CONNECT handshake",
                ))
            }
            _ => Err(StompError::reconnect(
                ErrorKind::Protocol(reply),
                "CONNECT handshake",
            )),
        }
    }

    /// Send DISCONNECT and close the transport. Idempotent; transport
    /// errors are swallowed because the intent is already to tear down.
    pub async fn disconnect(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        let frame = Frame::new("DISCONNECT");
        if let Err(e) = codec::write_frame(&mut self.transport, &frame).await {
            debug!("ignoring write error during disconnect: {}", e);
        }
        if let Err(e) = self.transport.close().await {
            debug!("ignoring close error during disconnect: {}", e);
        }
        info!("disconnected");
        Ok(())
    }

    /// Whether `disconnect` has run or a transport failure was observed.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Number of buffered, not-yet-delivered messages.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Ids of transactions begun on this connection and not yet committed
    /// or aborted, smallest first.
    pub fn active_transactions(&self) -> Vec<String> {
        self.transactions.iter().cloned().collect()
    }

    /// Send `frame` with a freshly allocated receipt id prepended and wait
    /// for the matching RECEIPT, which is returned (some overlays read
    /// answer headers off it). MESSAGE frames arriving in between are
    /// buffered in wire order; any other frame, or a RECEIPT with the wrong
    /// id, is a protocol error.
    pub async fn request(&mut self, mut frame: Frame) -> Result<Frame> {
        let context = frame.command.clone();
        self.check_open(&context)?;
        let receipt_id = self.next_receipt_id();
        frame
            .headers
            .insert(0, ("receipt".to_string(), receipt_id.clone()));
        self.write_frame(&frame, &context).await?;

        let reply = self.next_control_frame(&context).await?;
        if reply.command == "RECEIPT" && reply.get_header("receipt-id") == Some(receipt_id.as_str())
        {
            Ok(reply)
        } else {
            Err(StompError::reconnect(
                ErrorKind::Protocol(reply),
                format!("waiting for receipt {}", receipt_id),
            ))
        }
    }

    /// SEND `body` to `destination` with `persistent: true`. Outside a
    /// transaction the send is confirmed by a receipt; inside one the
    /// broker only durably applies it at COMMIT, so no receipt is asked
    /// for.
    pub async fn send(
        &mut self,
        destination: &str,
        transaction: Option<&str>,
        body: &[u8],
    ) -> Result<()> {
        self.send_with_headers(destination, transaction, true, transaction.is_none(), &[], body)
            .await
    }

    /// Fire-and-forget SEND: `persistent: false`, no receipt.
    pub async fn send_no_ack(&mut self, destination: &str, body: &[u8]) -> Result<()> {
        self.send_with_headers(destination, None, false, false, &[], body)
            .await
    }

    /// The SEND builder shared with the dialect overlays. Headers are
    /// emitted in the order: receipt (when confirmed), content-length,
    /// destination, persistent, transaction, then `extra`.
    pub async fn send_with_headers(
        &mut self,
        destination: &str,
        transaction: Option<&str>,
        persistent: bool,
        want_receipt: bool,
        extra: &[(String, String)],
        body: &[u8],
    ) -> Result<()> {
        let mut frame = Frame::new("SEND")
            .header("content-length", body.len().to_string())
            .header("destination", destination)
            .header("persistent", if persistent { "true" } else { "false" });
        if let Some(tx) = transaction {
            frame = frame.header("transaction", tx);
        }
        for (name, value) in extra {
            frame = frame.header(name.as_str(), value.as_str());
        }
        frame = frame.set_body(body.to_vec());

        if want_receipt {
            self.request(frame).await.map(|_| ())
        } else {
            self.check_open("SEND")?;
            self.write_frame(&frame, "SEND").await
        }
    }

    /// SUBSCRIBE to `destination`, confirmed by receipt.
    pub async fn subscribe(&mut self, destination: &str) -> Result<()> {
        self.request(Frame::new("SUBSCRIBE").header("destination", destination))
            .await
            .map(|_| ())
    }

    /// UNSUBSCRIBE from `destination`, confirmed by receipt.
    pub async fn unsubscribe(&mut self, destination: &str) -> Result<()> {
        self.request(Frame::new("UNSUBSCRIBE").header("destination", destination))
            .await
            .map(|_| ())
    }

    /// Deliver the next message: from the pending buffer when non-empty,
    /// otherwise from the wire. Non-MESSAGE frames read here are discarded.
    /// A MESSAGE without `message-id` at the head of the read is surfaced
    /// with a `Retry` hint so the caller can skip it and try again.
    pub async fn receive_msg(&mut self) -> Result<Message> {
        self.check_open("receiving message")?;
        if let Some(msg) = self.pending.pop_front() {
            return Ok(msg);
        }
        loop {
            let frame = self.read_frame("receiving message").await?;
            if frame.command != "MESSAGE" {
                debug!("discarding {} frame while receiving", frame.command);
                continue;
            }
            return match Message::try_from(frame) {
                Ok(msg) => Ok(msg),
                Err(frame) => Err(StompError::retry(
                    ErrorKind::Protocol(frame),
                    "MESSAGE without message-id",
                )),
            };
        }
    }

    /// ACK a delivered message, confirmed by receipt.
    pub async fn ack_msg(&mut self, msg: &Message, transaction: Option<&str>) -> Result<()> {
        let mut frame = Frame::new("ACK").header("message-id", msg.id.as_str());
        if let Some(tx) = transaction {
            frame = frame.header("transaction", tx);
        }
        self.request(frame).await.map(|_| ())
    }

    /// BEGIN a transaction and return its id. The id joins the active set
    /// only once the broker's receipt confirms the BEGIN.
    pub async fn transaction_begin(&mut self) -> Result<String> {
        let tx = self.next_transaction_id();
        self.request(Frame::new("BEGIN").header("transaction", tx.as_str()))
            .await?;
        self.transactions.insert(tx.clone());
        Ok(tx)
    }

    /// COMMIT `tx`, confirmed by receipt, and retire it from the active set.
    pub async fn transaction_commit(&mut self, tx: &str) -> Result<()> {
        self.request(Frame::new("COMMIT").header("transaction", tx))
            .await?;
        self.transactions.remove(tx);
        Ok(())
    }

    /// ABORT `tx`, confirmed by receipt, and retire it from the active set.
    pub async fn transaction_abort(&mut self, tx: &str) -> Result<()> {
        self.request(Frame::new("ABORT").header("transaction", tx))
            .await?;
        self.transactions.remove(tx);
        Ok(())
    }

    /// Commit every active transaction, smallest id first, re-reading the
    /// live set after each commit.
    pub async fn transaction_commit_all(&mut self) -> Result<()> {
        while let Some(tx) = self.transactions.iter().next().cloned() {
            self.transaction_commit(&tx).await?;
        }
        Ok(())
    }

    /// Abort every active transaction, smallest id first.
    pub async fn transaction_abort_all(&mut self) -> Result<()> {
        while let Some(tx) = self.transactions.iter().next().cloned() {
            self.transaction_abort(&tx).await?;
        }
        Ok(())
    }

    fn check_open(&self, context: &str) -> Result<()> {
        if self.closed {
            Err(StompError::closed(format!(
                "{}: connection is closed",
                context
            )))
        } else {
            Ok(())
        }
    }

    fn next_receipt_id(&mut self) -> String {
        self.receipt_seq += 1;
        format!("receipt-{}", self.receipt_seq)
    }

    fn next_transaction_id(&mut self) -> String {
        self.transaction_seq += 1;
        format!("transaction-{}", self.transaction_seq)
    }

    /// Read frames until a non-MESSAGE frame arrives. Well-formed MESSAGEs
    /// seen on the way are buffered in arrival order; MESSAGEs without a
    /// `message-id` header are dropped.
    async fn next_control_frame(&mut self, context: &str) -> Result<Frame> {
        loop {
            let frame = self.read_frame(context).await?;
            if frame.command == "MESSAGE" {
                match Message::try_from(frame) {
                    Ok(msg) => {
                        trace!("buffering message {}", msg.id);
                        self.pending.push_back(msg);
                    }
                    Err(frame) => {
                        debug!(
                            "dropping MESSAGE without message-id ({} body bytes)",
                            frame.body.len()
                        );
                    }
                }
                continue;
            }
            return Ok(frame);
        }
    }

    async fn write_frame(&mut self, frame: &Frame, context: &str) -> Result<()> {
        debug!("--> {}", frame.command);
        match codec::write_frame(&mut self.transport, frame).await {
            Ok(()) => Ok(()),
            Err(e) => {
                self.closed = true;
                Err(StompError::closed(format!(
                    "{}: write failed: {}",
                    context, e
                )))
            }
        }
    }

    async fn read_frame(&mut self, context: &str) -> Result<Frame> {
        match codec::read_frame(&mut self.transport, self.eof_nl).await {
            Ok(frame) => {
                debug!("<-- {}", frame.command);
                Ok(frame)
            }
            Err(e) => {
                self.closed = true;
                Err(StompError::closed(format!(
                    "{}: read failed: {}",
                    context, e
                )))
            }
        }
    }
}
