//! ocamlmq dialect: ActiveMQ-style framing (`\0\n` terminator) plus a
//! queue-size control query and a per-message ack timeout. Callers name
//! bare queues; the `/queue/` prefix is added here.

use std::net::SocketAddr;

use crate::connection::{ConnectOptions, Connection};
use crate::error::Result;
use crate::frame::{queue_destination, Frame, Message};
use crate::transport::{Connector, Transport};

/// Per-send options understood by ocamlmq.
#[derive(Debug, Clone, Default)]
pub struct SendOptions {
    /// Enclosing transaction id, if any. Transactional sends are not
    /// confirmed by a receipt.
    pub transaction: Option<String>,
    /// Seconds the broker waits for an ACK before redelivering, sent as an
    /// `ack-timeout` header.
    pub ack_timeout: Option<f64>,
}

impl SendOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn transaction(mut self, tx: impl Into<String>) -> Self {
        self.transaction = Some(tx.into());
        self
    }

    pub fn ack_timeout(mut self, seconds: f64) -> Self {
        self.ack_timeout = Some(seconds);
        self
    }

    fn extra_headers(&self) -> Vec<(String, String)> {
        match self.ack_timeout {
            Some(seconds) => vec![("ack-timeout".to_string(), format!("{}", seconds))],
            None => Vec::new(),
        }
    }
}

/// Client for the ocamlmq broker.
pub struct OcamlmqClient<T> {
    conn: Connection<T>,
}

impl<T: Connector> OcamlmqClient<T> {
    pub async fn connect(
        addr: SocketAddr,
        login: Option<&str>,
        passcode: Option<&str>,
    ) -> Result<Self> {
        let mut options = ConnectOptions::new();
        if let Some(login) = login {
            options = options.login(login);
        }
        if let Some(passcode) = passcode {
            options = options.passcode(passcode);
        }
        Ok(Self {
            conn: Connection::connect(addr, options).await?,
        })
    }
}

impl<T: Transport> OcamlmqClient<T> {
    /// Wrap an established generic connection.
    pub fn from_connection(conn: Connection<T>) -> Self {
        Self { conn }
    }

    pub fn connection_mut(&mut self) -> &mut Connection<T> {
        &mut self.conn
    }

    pub async fn disconnect(&mut self) -> Result<()> {
        self.conn.disconnect().await
    }

    pub async fn send(&mut self, queue: &str, options: &SendOptions, body: &[u8]) -> Result<()> {
        self.conn
            .send_with_headers(
                &queue_destination(queue),
                options.transaction.as_deref(),
                true,
                options.transaction.is_none(),
                &options.extra_headers(),
                body,
            )
            .await
    }

    pub async fn send_no_ack(
        &mut self,
        queue: &str,
        options: &SendOptions,
        body: &[u8],
    ) -> Result<()> {
        self.conn
            .send_with_headers(
                &queue_destination(queue),
                options.transaction.as_deref(),
                false,
                false,
                &options.extra_headers(),
                body,
            )
            .await
    }

    /// Ask the broker how many messages are waiting in `queue`.
    ///
    /// The query is a zero-body SEND to the `/control/count-msgs/` pseudo
    /// destination; the answer comes back on the RECEIPT's `num-messages`
    /// header. `None` when the header is absent or not a number.
    pub async fn queue_size(&mut self, queue: &str) -> Result<Option<i64>> {
        let frame = Frame::new("SEND").header(
            "destination",
            format!("/control/count-msgs/{}", queue),
        );
        let receipt = self.conn.request(frame).await?;
        Ok(receipt
            .get_header("num-messages")
            .and_then(|v| v.parse::<i64>().ok()))
    }

    pub async fn subscribe(&mut self, queue: &str) -> Result<()> {
        self.conn.subscribe(&queue_destination(queue)).await
    }

    pub async fn unsubscribe(&mut self, queue: &str) -> Result<()> {
        self.conn.unsubscribe(&queue_destination(queue)).await
    }

    pub async fn receive_msg(&mut self) -> Result<Message> {
        self.conn.receive_msg().await
    }

    pub async fn ack_msg(&mut self, msg: &Message, transaction: Option<&str>) -> Result<()> {
        self.conn.ack_msg(msg, transaction).await
    }

    pub async fn transaction_begin(&mut self) -> Result<String> {
        self.conn.transaction_begin().await
    }

    pub async fn transaction_commit(&mut self, tx: &str) -> Result<()> {
        self.conn.transaction_commit(tx).await
    }

    pub async fn transaction_abort(&mut self, tx: &str) -> Result<()> {
        self.conn.transaction_abort(tx).await
    }

    pub async fn transaction_commit_all(&mut self) -> Result<()> {
        self.conn.transaction_commit_all().await
    }

    pub async fn transaction_abort_all(&mut self) -> Result<()> {
        self.conn.transaction_abort_all().await
    }
}
