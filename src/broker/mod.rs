//! Broker session capability.
//!
//! The migration pipeline only talks to brokers through the traits in this
//! module. [`amqp`] provides the AMQP 1.0 implementation used by the binary;
//! tests substitute in-memory doubles. Message content keeps its AMQP types
//! so a job leaves the tool exactly as it arrived, apart from the fields the
//! pipeline rewrites.

pub mod amqp;

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use fe2o3_amqp::types::messaging::{Header, MessageAnnotations, Properties};
use fe2o3_amqp::types::primitives::{OrderedMap, SimpleValue, Value};

use crate::error::TransportError;

const QUEUE_PREFIX: &str = "queue://";
const TOPIC_PREFIX: &str = "topic://";
const TEMP_QUEUE_PREFIX: &str = "temp-queue://";

/// A named queue or topic on a broker.
///
/// Rendered with ActiveMQ-style scheme prefixes (`queue://orders`), which is
/// also the AMQP address format the broker accepts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Destination {
    Queue(String),
    Topic(String),
    /// Broker-assigned queue that lives as long as the connection that
    /// created it.
    TempQueue(String),
}

impl Destination {
    pub fn queue(name: impl Into<String>) -> Self {
        Destination::Queue(name.into())
    }

    pub fn topic(name: impl Into<String>) -> Self {
        Destination::Topic(name.into())
    }

    /// Parses an address. Bare names are queues; an empty name is not a
    /// destination at all.
    pub fn parse(address: &str) -> Option<Self> {
        let address = address.trim();
        let (destination, name) = if let Some(name) = address.strip_prefix(TOPIC_PREFIX) {
            (Destination::Topic(name.to_string()), name)
        } else if let Some(name) = address.strip_prefix(TEMP_QUEUE_PREFIX) {
            (Destination::TempQueue(name.to_string()), name)
        } else if let Some(name) = address.strip_prefix(QUEUE_PREFIX) {
            (Destination::Queue(name.to_string()), name)
        } else {
            (Destination::Queue(address.to_string()), address)
        };

        if name.is_empty() {
            None
        } else {
            Some(destination)
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Destination::Queue(name) | Destination::Topic(name) | Destination::TempQueue(name) => {
                name
            }
        }
    }

    pub fn is_topic(&self) -> bool {
        matches!(self, Destination::Topic(_))
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Destination::Queue(name) => write!(f, "{QUEUE_PREFIX}{name}"),
            Destination::Topic(name) => write!(f, "{TOPIC_PREFIX}{name}"),
            Destination::TempQueue(name) => write!(f, "{TEMP_QUEUE_PREFIX}{name}"),
        }
    }
}

/// Message payload, classified once when the message is decoded.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum MessageBody {
    Text(String),
    Map(OrderedMap<Value, Value>),
    Binary(Vec<u8>),
    /// Any other single value the broker handed us.
    Opaque(Value),
    /// One list per `amqp-sequence` section.
    Sequence(Vec<Vec<Value>>),
    /// No body, or a body the decoder could not place.
    #[default]
    Unclassified,
}

impl MessageBody {
    pub fn kind(&self) -> &'static str {
        match self {
            MessageBody::Text(_) => "text",
            MessageBody::Map(_) => "map",
            MessageBody::Binary(_) => "binary",
            MessageBody::Opaque(_) => "opaque",
            MessageBody::Sequence(_) => "sequence",
            MessageBody::Unclassified => "unclassified",
        }
    }
}

/// Sections of a received message that the pipeline passes through untouched.
///
/// `to`, `reply-to`, `creation-time` and the application properties are
/// re-derived from [`WireMessage`] when the message is sent again; every other
/// field goes out as it came in.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Envelope {
    pub header: Option<Header>,
    pub properties: Option<Properties>,
    pub annotations: Option<MessageAnnotations>,
    /// Application properties with their original AMQP types.
    pub typed_properties: BTreeMap<String, SimpleValue>,
}

/// A message as seen by the pipeline.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WireMessage {
    pub message_id: Option<String>,
    /// Destination the message is addressed to.
    pub to: Option<Destination>,
    pub reply_to: Option<Destination>,
    /// Destination a scheduled job will be delivered to once it fires.
    pub original_destination: Option<Destination>,
    /// Creation time in milliseconds since the UNIX epoch.
    pub timestamp: Option<i64>,
    /// Application properties rendered as text, the form filters and the
    /// archive work with.
    pub properties: BTreeMap<String, String>,
    pub body: MessageBody,
    pub envelope: Envelope,
}

impl WireMessage {
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }
}

/// Connection to the broker whose scheduler store is being drained.
#[async_trait]
pub trait SourceBroker: Send {
    /// Opens a private channel for replies and returns its address.
    async fn open_reply_channel(&mut self) -> Result<Destination, TransportError>;

    async fn send(&mut self, to: &Destination, message: WireMessage)
        -> Result<(), TransportError>;

    /// Waits up to `timeout` for the next message on the reply channel.
    /// `Ok(None)` means nothing arrived in time.
    async fn receive(&mut self, timeout: Duration) -> Result<Option<WireMessage>, TransportError>;

    async fn close(&mut self) -> Result<(), TransportError>;
}

/// Connection to the broker receiving migrated jobs.
#[async_trait]
pub trait TargetBroker: Send {
    async fn open_sender(
        &mut self,
        destination: &Destination,
    ) -> Result<Box<dyn MessageSender>, TransportError>;

    async fn close(&mut self) -> Result<(), TransportError>;
}

/// A producer bound to a single destination.
#[async_trait]
pub trait MessageSender: Send {
    async fn send(&mut self, message: WireMessage) -> Result<(), TransportError>;

    async fn close(&mut self) -> Result<(), TransportError>;
}
