//! RabbitMQ dialect (STOMP gateway): bare-`\0` frame terminator, an
//! octet-stream content type on every SEND, topic routing through the
//! `amq.topic` exchange, durable queue subscriptions, and queue creation
//! via a transient side-connection.

use std::collections::HashMap;
use std::net::SocketAddr;

use log::debug;

use crate::connection::{ConnectOptions, Connection};
use crate::error::Result;
use crate::frame::{queue_destination, topic_destination, Frame, Message};
use crate::transport::{Connector, Transport};
use crate::uuid::Uuid;

const CONTENT_TYPE: (&str, &str) = ("content-type", "application/octet-stream");
const TOPIC_EXCHANGE: &str = "amq.topic";

fn content_type_header() -> Vec<(String, String)> {
    vec![(CONTENT_TYPE.0.to_string(), CONTENT_TYPE.1.to_string())]
}

fn topic_send_headers() -> Vec<(String, String)> {
    vec![
        (CONTENT_TYPE.0.to_string(), CONTENT_TYPE.1.to_string()),
        ("exchange".to_string(), TOPIC_EXCHANGE.to_string()),
    ]
}

/// SUBSCRIBE that declares `queue` durable and non-auto-delete with client
/// acks; also the frame the side-connection of `create_queue` sends.
fn subscribe_queue_frame(queue: &str) -> Frame {
    Frame::new("SUBSCRIBE")
        .header("destination", queue_destination(queue))
        .header("auto-delete", "false")
        .header("durable", "true")
        .header("ack", "client")
}

/// Client for RabbitMQ's STOMP gateway.
///
/// Keeps the connect credentials and address so `create_queue` can open
/// ad-hoc side-connections, and a topic-name to subscription-id map so
/// topic subscriptions are idempotent.
pub struct RabbitMqClient<T> {
    conn: Connection<T>,
    addr: SocketAddr,
    login: Option<String>,
    passcode: Option<String>,
    topics: HashMap<String, String>,
    topic_seq: u64,
}

impl<T: Connector> RabbitMqClient<T> {
    /// Connect with the bare-`\0` terminator convention. `prefetch`, when
    /// given, caps unacked in-flight messages per subscriber.
    pub async fn connect(
        addr: SocketAddr,
        login: Option<&str>,
        passcode: Option<&str>,
        prefetch: Option<u32>,
    ) -> Result<Self> {
        let mut options = ConnectOptions::new().eof_nl(false);
        if let Some(login) = login {
            options = options.login(login);
        }
        if let Some(passcode) = passcode {
            options = options.passcode(passcode);
        }
        if let Some(n) = prefetch {
            options = options.header("prefetch", n.to_string());
        }
        let conn = Connection::connect(addr, options).await?;
        Ok(Self::from_connection(
            conn,
            addr,
            login.map(str::to_string),
            passcode.map(str::to_string),
        ))
    }

    /// Declare a durable queue by opening a transient side-connection,
    /// subscribing to the queue on it (which creates it broker-side as
    /// durable and non-auto-delete), and disconnecting without consuming
    /// anything. The broker keeps the queue across the disconnect; this is
    /// documented broker behavior rather than a protocol guarantee.
    pub async fn create_queue(&mut self, queue: &str) -> Result<()> {
        debug!("declaring queue {} via side-connection", queue);
        let mut options = ConnectOptions::new().eof_nl(false).header("prefetch", "1");
        if let Some(login) = &self.login {
            options = options.login(login.as_str());
        }
        if let Some(passcode) = &self.passcode {
            options = options.passcode(passcode.as_str());
        }
        let mut side = Connection::<T>::connect(self.addr, options).await?;
        let subscribed = side.request(subscribe_queue_frame(queue)).await;
        side.disconnect().await?;
        subscribed.map(|_| ())
    }
}

impl<T: Transport> RabbitMqClient<T> {
    /// Wrap an established connection, keeping `addr` and the credentials
    /// for later side-connections.
    pub fn from_connection(
        conn: Connection<T>,
        addr: SocketAddr,
        login: Option<String>,
        passcode: Option<String>,
    ) -> Self {
        Self {
            conn,
            addr,
            login,
            passcode,
            topics: HashMap::new(),
            topic_seq: 0,
        }
    }

    pub fn connection_mut(&mut self) -> &mut Connection<T> {
        &mut self.conn
    }

    /// The server-facing subscription id for `topic`, if subscribed.
    pub fn topic_subscription(&self, topic: &str) -> Option<&str> {
        self.topics.get(topic).map(String::as_str)
    }

    pub async fn disconnect(&mut self) -> Result<()> {
        self.conn.disconnect().await
    }

    pub async fn send(
        &mut self,
        queue: &str,
        transaction: Option<&str>,
        body: &[u8],
    ) -> Result<()> {
        self.conn
            .send_with_headers(
                &queue_destination(queue),
                transaction,
                true,
                transaction.is_none(),
                &content_type_header(),
                body,
            )
            .await
    }

    pub async fn send_no_ack(&mut self, queue: &str, body: &[u8]) -> Result<()> {
        self.conn
            .send_with_headers(
                &queue_destination(queue),
                None,
                false,
                false,
                &content_type_header(),
                body,
            )
            .await
    }

    /// Publish to `topic` through the `amq.topic` exchange.
    pub async fn topic_send(
        &mut self,
        topic: &str,
        transaction: Option<&str>,
        body: &[u8],
    ) -> Result<()> {
        self.conn
            .send_with_headers(
                &topic_destination(topic),
                transaction,
                true,
                transaction.is_none(),
                &topic_send_headers(),
                body,
            )
            .await
    }

    pub async fn topic_send_no_ack(&mut self, topic: &str, body: &[u8]) -> Result<()> {
        self.conn
            .send_with_headers(
                &topic_destination(topic),
                None,
                false,
                false,
                &topic_send_headers(),
                body,
            )
            .await
    }

    /// Subscribe to `queue`, declaring it durable and non-auto-delete with
    /// client acks.
    pub async fn subscribe_queue(&mut self, queue: &str) -> Result<()> {
        self.conn.request(subscribe_queue_frame(queue)).await.map(|_| ())
    }

    pub async fn unsubscribe_queue(&mut self, queue: &str) -> Result<()> {
        self.conn.unsubscribe(&queue_destination(queue)).await
    }

    /// Subscribe to `topic`. Idempotent: a second call for the same topic
    /// is a no-op. The SUBSCRIBE routes through `amq.topic` with a fresh
    /// `topic-N` subscription id and carries a random base64url token as
    /// its body, which the broker uses to seed the transient queue name.
    pub async fn subscribe_topic(&mut self, topic: &str) -> Result<()> {
        if self.topics.contains_key(topic) {
            return Ok(());
        }
        self.topic_seq += 1;
        let id = format!("topic-{}", self.topic_seq);
        let frame = Frame::new("SUBSCRIBE")
            .header("exchange", TOPIC_EXCHANGE)
            .header("routing_key", topic_destination(topic))
            .header("id", id.as_str())
            .set_body(Uuid::random().to_base64url().into_bytes());
        self.conn.request(frame).await?;
        self.topics.insert(topic.to_string(), id);
        Ok(())
    }

    /// Drop the subscription for `topic`; a no-op when not subscribed.
    pub async fn unsubscribe_topic(&mut self, topic: &str) -> Result<()> {
        let id = match self.topics.get(topic) {
            Some(id) => id.clone(),
            None => return Ok(()),
        };
        let frame = Frame::new("UNSUBSCRIBE")
            .header("destination", topic_destination(topic))
            .header("id", id);
        self.conn.request(frame).await?;
        self.topics.remove(topic);
        Ok(())
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
