//! # stomp-mq
//!
//! A STOMP 1.0 message-queue client with broker dialect overlays for
//! RabbitMQ's STOMP gateway and the ocamlmq broker.
//!
//! The protocol engine is written once against the [`transport::Transport`]
//! capability and runs under two execution models: cooperative tasks (via
//! [`transport::TcpTransport`] on a tokio runtime) and plain blocking
//! threads (via [`transport::BlockingTcpTransport`] driven with
//! `futures::executor::block_on`; every primitive completes without
//! suspending, so no reactor is needed).
//!
//! Connecting and sending on a tokio runtime:
//!
//! ```no_run
//! use stomp_mq::{ConnectOptions, Connection, TcpTransport};
//!
//! async fn example() -> stomp_mq::Result<()> {
//!     let addr = "127.0.0.1:61613".parse().unwrap();
//!     let mut conn = Connection::<TcpTransport>::connect(
//!         addr,
//!         ConnectOptions::new().credentials("guest", "guest"),
//!     )
//!     .await?;
//!     conn.send("/queue/jobs", None, b"payload").await?;
//!     let msg = conn.receive_msg().await?;
//!     conn.ack_msg(&msg, None).await?;
//!     conn.disconnect().await
//! }
//! ```
//!
//! The same engine on a plain thread:
//!
//! ```no_run
//! use futures::executor::block_on;
//! use stomp_mq::{BlockingTcpTransport, ConnectOptions, Connection};
//!
//! fn example() -> stomp_mq::Result<()> {
//!     let addr = "127.0.0.1:61613".parse().unwrap();
//!     let mut conn = block_on(Connection::<BlockingTcpTransport>::connect(
//!         addr,
//!         ConnectOptions::new(),
//!     ))?;
//!     block_on(conn.send("/queue/jobs", None, b"payload"))?;
//!     block_on(conn.disconnect())
//! }
//! ```
//!
//! Every failure carries a restartability hint ([`Restart`]) alongside its
//! kind; the hints are advisory and meant for recovery loops built above
//! the client.
//!
//! A connection is not internally synchronized: all verbs take `&mut self`,
//! so the borrow checker enforces the one-outstanding-operation contract.

pub mod codec;
pub mod connection;
pub mod error;
pub mod frame;
pub mod ocamlmq;
pub mod rabbitmq;
pub mod transport;
pub mod uuid;

pub use connection::{ConnectOptions, Connection};
pub use error::{ConnectionError, ErrorKind, Restart, Result, StompError};
pub use frame::{queue_destination, topic_destination, Frame, Message};
pub use ocamlmq::OcamlmqClient;
pub use rabbitmq::RabbitMqClient;
pub use transport::{BlockingTcpTransport, Connector, TcpTransport, Transport};
pub use uuid::Uuid;
