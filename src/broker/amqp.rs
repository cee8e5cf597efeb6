//! AMQP 1.0 implementation of the broker traits.
//!
//! Maps between `fe2o3-amqp` messages and [`WireMessage`]:
//! - application properties ⇄ `properties` (values rendered as strings,
//!   unchanged values sent back with their original type)
//! - `properties.creation-time` ⇄ `timestamp`
//! - `properties.to` / `reply-to` ⇄ `to` / `reply_to`
//! - message annotation `x-opt-original-destination` ⇄ `original_destination`
//! - body sections ⇄ [`MessageBody`]
//! - header, remaining properties and annotations ⇄ [`Envelope`]

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use async_trait::async_trait;
use fe2o3_amqp::connection::{Connection, ConnectionHandle};
use fe2o3_amqp::link::{Receiver, Sender};
use fe2o3_amqp::sasl_profile::SaslProfile;
use fe2o3_amqp::session::{Session, SessionHandle};
use fe2o3_amqp::types::messaging::annotations::OwnedKey;
use fe2o3_amqp::types::messaging::{
    AmqpSequence, AmqpValue, ApplicationProperties, Body, Data, Message, MessageAnnotations,
    MessageId, Outcome, Properties, Source,
};
use fe2o3_amqp::types::primitives::{Binary, OrderedMap, SimpleValue, Symbol, Timestamp, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use super::{
    Destination, Envelope, MessageBody, MessageSender, SourceBroker, TargetBroker, WireMessage,
};
use crate::error::TransportError;
use crate::helpers::amqp_value::{message_id_to_string, simple_value_to_string};
use crate::protocol::{SCHEDULED_DELAY, SCHEDULED_PERIOD, SCHEDULED_REPEAT};

/// Type alias for the messages exchanged with the broker.
pub type AmqpMessage = Message<Body<Value>>;

/// Annotation carrying the destination a scheduled job fires into.
pub const ORIGINAL_DESTINATION_ANNOTATION: &str = "x-opt-original-destination";

/// Broker url plus optional credentials.
#[derive(Debug, Clone)]
pub struct BrokerEndpoint {
    pub url: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl BrokerEndpoint {
    fn sasl_profile(&self) -> SaslProfile {
        match &self.username {
            Some(username) => SaslProfile::Plain {
                username: username.clone(),
                password: self.password.clone().unwrap_or_default(),
            },
            None => SaslProfile::Anonymous,
        }
    }
}

async fn connect(
    endpoint: &BrokerEndpoint,
    role: &str,
) -> Result<(ConnectionHandle<()>, SessionHandle<()>), TransportError> {
    let connect_error = |reason: String| TransportError::Connect {
        endpoint: endpoint.url.clone(),
        reason,
    };

    let mut connection = Connection::builder()
        .container_id(format!("scheduler-migrate-{}-{}", role, Uuid::new_v4()))
        .sasl_profile(endpoint.sasl_profile())
        .open(endpoint.url.as_str())
        .await
        .map_err(|e| connect_error(e.to_string()))?;

    let session = Session::begin(&mut connection)
        .await
        .map_err(|e| connect_error(e.to_string()))?;

    debug!(url = %endpoint.url, role, "AMQP session established");
    Ok((connection, session))
}

async fn attach_sender(
    session: &mut SessionHandle<()>,
    destination: &Destination,
) -> Result<Sender, TransportError> {
    let address = destination.to_string();
    let link_name = format!("scheduler-migrate-sender-{}", Uuid::new_v4());
    Sender::attach(session, link_name, address.as_str())
        .await
        .map_err(|e| TransportError::Attach {
            address,
            reason: e.to_string(),
        })
}

async fn send_on(sender: &mut Sender, message: &WireMessage) -> Result<(), TransportError> {
    let address = message
        .to
        .as_ref()
        .map(|d| d.to_string())
        .unwrap_or_default();

    let outcome = sender
        .send(encode_message(message))
        .await
        .map_err(|e| TransportError::Send {
            address: address.clone(),
            reason: e.to_string(),
        })?;

    if matches!(outcome, Outcome::Accepted(_)) {
        Ok(())
    } else {
        Err(TransportError::Send {
            address,
            reason: format!("delivery not accepted: {:?}", outcome),
        })
    }
}

async fn shutdown(
    connection: &mut ConnectionHandle<()>,
    session: &mut SessionHandle<()>,
) -> Result<(), TransportError> {
    session
        .end()
        .await
        .map_err(|e| TransportError::Close(e.to_string()))?;
    connection
        .close()
        .await
        .map_err(|e| TransportError::Close(e.to_string()))
}

// ---------------------------------------------------------------------------
// Source
// ---------------------------------------------------------------------------

/// Connection to the source broker: one producer per control address and a
/// single receiver on the dynamic reply queue.
pub struct AmqpSource {
    connection: ConnectionHandle<()>,
    session: SessionHandle<()>,
    producers: HashMap<Destination, Sender>,
    replies: Option<Receiver>,
}

impl AmqpSource {
    pub async fn connect(endpoint: &BrokerEndpoint) -> Result<Self, TransportError> {
        let (connection, session) = connect(endpoint, "source").await?;
        Ok(Self {
            connection,
            session,
            producers: HashMap::new(),
            replies: None,
        })
    }
}

#[async_trait]
impl SourceBroker for AmqpSource {
    async fn open_reply_channel(&mut self) -> Result<Destination, TransportError> {
        let receiver = Receiver::builder()
            .name(format!("scheduler-migrate-replies-{}", Uuid::new_v4()))
            .source(Source::builder().dynamic(true).build())
            .attach(&mut self.session)
            .await
            .map_err(|e| TransportError::Attach {
                address: "<dynamic>".to_string(),
                reason: e.to_string(),
            })?;

        let address = receiver
            .source()
            .as_ref()
            .and_then(|s| s.address.as_ref())
            .map(|a| a.to_string())
            .and_then(|a| Destination::parse(&a))
            .ok_or(TransportError::NoReplyChannel)?;

        debug!(reply_to = %address, "Reply channel opened");
        self.replies = Some(receiver);
        Ok(address)
    }

    async fn send(&mut self, to: &Destination, message: WireMessage) -> Result<(), TransportError> {
        if !self.producers.contains_key(to) {
            let sender = attach_sender(&mut self.session, to).await?;
            self.producers.insert(to.clone(), sender);
        }

        let message = WireMessage {
            to: Some(to.clone()),
            ..message
        };
        match self.producers.get_mut(to) {
            Some(sender) => send_on(sender, &message).await,
            None => Err(TransportError::Send {
                address: to.to_string(),
                reason: "producer unavailable".to_string(),
            }),
        }
    }

    async fn receive(&mut self, timeout: Duration) -> Result<Option<WireMessage>, TransportError> {
        let receiver = self.replies.as_mut().ok_or(TransportError::NoReplyChannel)?;

        let delivery = match tokio::time::timeout(timeout, receiver.recv::<Body<Value>>()).await {
            Err(_) => return Ok(None),
            Ok(result) => result.map_err(|e| TransportError::Receive(e.to_string()))?,
        };

        receiver
            .accept(&delivery)
            .await
            .map_err(|e| TransportError::Receive(e.to_string()))?;

        Ok(Some(decode_message(delivery.message())))
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        for (destination, mut sender) in self.producers.drain() {
            if let Err(e) = sender.close().await {
                warn!(destination = %destination, error = %e, "Failed to close producer");
            }
        }
        if let Some(mut receiver) = self.replies.take() {
            if let Err(e) = receiver.close().await {
                warn!(error = %e, "Failed to close reply receiver");
            }
        }
        shutdown(&mut self.connection, &mut self.session).await
    }
}

// ---------------------------------------------------------------------------
// Target
// ---------------------------------------------------------------------------

/// Connection to the target broker. Senders are handed out per destination
/// and cached by the caller.
pub struct AmqpTarget {
    connection: ConnectionHandle<()>,
    session: SessionHandle<()>,
}

impl AmqpTarget {
    pub async fn connect(endpoint: &BrokerEndpoint) -> Result<Self, TransportError> {
        let (connection, session) = connect(endpoint, "target").await?;
        Ok(Self {
            connection,
            session,
        })
    }
}

#[async_trait]
impl TargetBroker for AmqpTarget {
    async fn open_sender(
        &mut self,
        destination: &Destination,
    ) -> Result<Box<dyn MessageSender>, TransportError> {
        let sender = attach_sender(&mut self.session, destination).await?;
        Ok(Box::new(AmqpSender {
            destination: destination.clone(),
            sender: Some(sender),
        }))
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        shutdown(&mut self.connection, &mut self.session).await
    }
}

/// Sender link bound to one destination on the target broker.
pub struct AmqpSender {
    destination: Destination,
    sender: Option<Sender>,
}

#[async_trait]
impl MessageSender for AmqpSender {
    async fn send(&mut self, message: WireMessage) -> Result<(), TransportError> {
        let sender = self.sender.as_mut().ok_or_else(|| TransportError::Send {
            address: self.destination.to_string(),
            reason: "sender already closed".to_string(),
        })?;
        send_on(sender, &message).await
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        match self.sender.take() {
            Some(mut sender) => sender
                .close()
                .await
                .map_err(|e| TransportError::Close(e.to_string())),
            None => Ok(()),
        }
    }
}

// ---------------------------------------------------------------------------
// Message mapping
// ---------------------------------------------------------------------------

/// Message annotations that describe the browse response rather than the job.
/// `x-opt-jms-dest` types the `to` address, which is rewritten on forward.
const RESPONSE_ONLY_ANNOTATIONS: [&str; 2] = [ORIGINAL_DESTINATION_ANNOTATION, "x-opt-jms-dest"];

fn original_destination_key() -> OwnedKey {
    OwnedKey::Symbol(Symbol::from(ORIGINAL_DESTINATION_ANNOTATION))
}

fn is_response_only(key: &OwnedKey) -> bool {
    match key {
        OwnedKey::Symbol(symbol) => RESPONSE_ONLY_ANNOTATIONS.contains(&symbol.as_str()),
        OwnedKey::Ulong(_) => false,
    }
}

/// Decodes a received AMQP message.
pub fn decode_message(message: &AmqpMessage) -> WireMessage {
    let props = message.properties.as_ref();

    let typed_properties: BTreeMap<String, SimpleValue> = message
        .application_properties
        .as_ref()
        .map(|ap| ap.0.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
        .unwrap_or_default();
    let properties = typed_properties
        .iter()
        .map(|(k, v)| (k.clone(), simple_value_to_string(v)))
        .collect();

    let original_destination = message
        .message_annotations
        .as_ref()
        .and_then(|ma| ma.0.get(&original_destination_key()))
        .and_then(|v| match v {
            Value::String(s) => Destination::parse(s),
            Value::Symbol(s) => Destination::parse(s.as_str()),
            _ => None,
        });

    let annotations = message.message_annotations.as_ref().and_then(|ma| {
        let kept: OrderedMap<OwnedKey, Value> = ma
            .0
            .iter()
            .filter(|(k, _)| !is_response_only(k))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        if kept.is_empty() {
            None
        } else {
            Some(MessageAnnotations(kept))
        }
    });

    WireMessage {
        message_id: props
            .and_then(|p| p.message_id.as_ref())
            .map(message_id_to_string),
        to: props
            .and_then(|p| p.to.as_deref())
            .and_then(Destination::parse),
        reply_to: props
            .and_then(|p| p.reply_to.as_deref())
            .and_then(Destination::parse),
        original_destination,
        timestamp: props
            .and_then(|p| p.creation_time.as_ref())
            .map(|t| t.milliseconds()),
        properties,
        body: decode_body(&message.body),
        envelope: Envelope {
            header: message.header.clone(),
            properties: message.properties.clone(),
            annotations,
            typed_properties,
        },
    }
}

fn decode_body(body: &Body<Value>) -> MessageBody {
    match body {
        Body::Value(AmqpValue(Value::String(s))) => MessageBody::Text(s.clone()),
        Body::Value(AmqpValue(Value::Map(map))) => MessageBody::Map(map.clone()),
        Body::Value(AmqpValue(Value::Null)) => MessageBody::Unclassified,
        Body::Value(AmqpValue(other)) => MessageBody::Opaque(other.clone()),
        Body::Data(sections) => MessageBody::Binary(
            sections
                .iter()
                .flat_map(|section| section.0.iter().copied())
                .collect(),
        ),
        Body::Sequence(sections) => {
            MessageBody::Sequence(sections.iter().map(|section| section.0.clone()).collect())
        }
        Body::Empty => MessageBody::Unclassified,
    }
}

/// Typed value for an application property on the way out.
///
/// A value the pipeline left alone goes back with its original type. New or
/// rewritten values are strings, except the scheduler keys, which the broker
/// reads as integers.
fn encode_property(key: &str, value: &str, original: Option<&SimpleValue>) -> SimpleValue {
    if let Some(original) = original {
        if simple_value_to_string(original) == value {
            return original.clone();
        }
    }
    match key {
        SCHEDULED_DELAY | SCHEDULED_PERIOD => value
            .parse::<i64>()
            .map(SimpleValue::Long)
            .unwrap_or_else(|_| SimpleValue::String(value.to_string())),
        SCHEDULED_REPEAT => value
            .parse::<i32>()
            .map(SimpleValue::Int)
            .unwrap_or_else(|_| SimpleValue::String(value.to_string())),
        _ => SimpleValue::String(value.to_string()),
    }
}

/// Encodes a message for sending.
///
/// Starts from the carried [`Envelope`] and overrides `to`, `reply-to`,
/// `creation-time`, the application properties and the original-destination
/// annotation.
pub fn encode_message(message: &WireMessage) -> AmqpMessage {
    let body = match &message.body {
        MessageBody::Text(s) => Body::Value(AmqpValue(Value::String(s.clone()))),
        MessageBody::Map(map) => Body::Value(AmqpValue(Value::Map(map.clone()))),
        MessageBody::Binary(bytes) => Body::from(Data(Binary::from(bytes.clone()))),
        MessageBody::Opaque(value) => Body::Value(AmqpValue(value.clone())),
        MessageBody::Sequence(sections) => Body::Sequence(
            sections
                .iter()
                .map(|section| AmqpSequence(section.clone()))
                .collect(),
        ),
        MessageBody::Unclassified => Body::Value(AmqpValue(Value::Null)),
    };

    let mut amqp = Message::builder().body(body).build();
    amqp.header = message.envelope.header.clone();

    let mut properties: Properties = message.envelope.properties.clone().unwrap_or_default();
    if properties.message_id.is_none() {
        properties.message_id = message.message_id.clone().map(MessageId::String);
    }
    properties.to = message.to.as_ref().map(|d| d.to_string());
    properties.reply_to = message.reply_to.as_ref().map(|d| d.to_string());
    properties.creation_time = message.timestamp.map(Timestamp::from_milliseconds);
    amqp.properties = Some(properties);

    if !message.properties.is_empty() {
        amqp.application_properties = Some(ApplicationProperties(OrderedMap::from_iter(
            message.properties.iter().map(|(k, v)| {
                let original = message.envelope.typed_properties.get(k);
                (k.clone(), encode_property(k, v, original))
            }),
        )));
    }

    let mut annotations: OrderedMap<OwnedKey, Value> = message
        .envelope
        .annotations
        .as_ref()
        .map(|ma| ma.0.clone())
        .unwrap_or_default();
    if let Some(original) = &message.original_destination {
        annotations.insert(original_destination_key(), Value::String(original.to_string()));
    }
    if !annotations.is_empty() {
        amqp.message_annotations = Some(MessageAnnotations(annotations));
    }

    amqp
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::DEFAULT_TRACKING_PROPERTY;
    use crate::record::ScheduledJobRecord;
    use crate::transform::MessageTransformer;
    use fe2o3_amqp::types::messaging::Header;
    use fe2o3_amqp::types::primitives::Uuid;

    fn browse_response() -> AmqpMessage {
        let mut message = Message::builder()
            .body(Body::Value(AmqpValue(Value::String("payload".to_string()))))
            .build();
        message.properties = Some(Properties {
            message_id: Some(MessageId::String("ID:broker-1:1:1:1".to_string())),
            to: Some("temp-queue://ID:client-1:1:1".to_string()),
            creation_time: Some(Timestamp::from_milliseconds(1_700_000_000_000)),
            ..Default::default()
        });
        message.application_properties = Some(
            ApplicationProperties::builder()
                .insert("scheduledJobId", "job-42")
                .insert("AMQ_SCHEDULED_DELAY", SimpleValue::Long(600_000))
                .insert("region", "eu")
                .build(),
        );
        message.message_annotations = Some(
            MessageAnnotations::builder()
                .insert(
                    ORIGINAL_DESTINATION_ANNOTATION,
                    Value::String("queue://orders.queue".to_string()),
                )
                .insert("x-opt-jms-dest", Value::Byte(3))
                .insert("x-opt-jms-msg-type", Value::Byte(5))
                .build(),
        );
        message
    }

    /// Decode, transform at `now`, encode: the path a job takes to the target.
    fn migrate(message: &AmqpMessage, now: i64) -> AmqpMessage {
        let record = ScheduledJobRecord::from_wire(decode_message(message)).unwrap();
        let job = MessageTransformer::new(DEFAULT_TRACKING_PROPERTY).fix(&record, now);
        encode_message(&job.to_wire())
    }

    #[test]
    fn test_decode_browse_response() {
        let decoded = decode_message(&browse_response());

        assert_eq!(decoded.message_id.as_deref(), Some("ID:broker-1:1:1:1"));
        assert_eq!(decoded.timestamp, Some(1_700_000_000_000));
        assert_eq!(decoded.property("scheduledJobId"), Some("job-42"));
        assert_eq!(decoded.property("AMQ_SCHEDULED_DELAY"), Some("600000"));
        assert_eq!(decoded.property("region"), Some("eu"));
        assert_eq!(
            decoded.original_destination,
            Some(Destination::queue("orders.queue"))
        );
        assert_eq!(decoded.body, MessageBody::Text("payload".to_string()));

        let annotations = decoded.envelope.annotations.unwrap();
        assert_eq!(annotations.0.len(), 1);
        assert!(annotations
            .0
            .contains_key(&OwnedKey::from("x-opt-jms-msg-type")));
    }

    #[test]
    fn test_decode_body_variants() {
        let map = OrderedMap::from_iter(vec![(Value::String("k".to_string()), Value::Int(1))]);
        assert_eq!(
            decode_body(&Body::Value(AmqpValue(Value::Map(map.clone())))),
            MessageBody::Map(map)
        );
        assert_eq!(
            decode_body(&Body::from(Data(Binary::from(vec![0u8, 1, 2])))),
            MessageBody::Binary(vec![0, 1, 2])
        );
        assert_eq!(
            decode_body(&Body::Value(AmqpValue(Value::Long(9)))),
            MessageBody::Opaque(Value::Long(9))
        );
        assert_eq!(
            decode_body(&Body::Sequence(
                vec![AmqpSequence(vec![Value::Int(1)])].into()
            )),
            MessageBody::Sequence(vec![vec![Value::Int(1)]])
        );
        assert_eq!(decode_body(&Body::Empty), MessageBody::Unclassified);
    }

    #[test]
    fn test_encode_sets_numeric_delay() {
        let message = WireMessage {
            to: Some(Destination::queue("orders.queue")),
            timestamp: Some(5),
            body: MessageBody::Binary(vec![9, 8]),
            ..Default::default()
        }
        .with_property("AMQ_SCHEDULED_DELAY", "-1500")
        .with_property("originalScheduledJobId", "job-42");

        let encoded = encode_message(&message);

        let app_props = encoded.application_properties.as_ref().unwrap();
        assert_eq!(
            *app_props.0.get("AMQ_SCHEDULED_DELAY").unwrap(),
            SimpleValue::Long(-1500)
        );
        assert_eq!(
            *app_props.0.get("originalScheduledJobId").unwrap(),
            SimpleValue::String("job-42".to_string())
        );

        let props = encoded.properties.as_ref().unwrap();
        assert_eq!(props.to.as_deref(), Some("queue://orders.queue"));
        assert_eq!(props.creation_time, Some(Timestamp::from_milliseconds(5)));
        assert!(encoded.header.is_none());
        assert!(encoded.message_annotations.is_none());
        assert_eq!(decode_body(&encoded.body), MessageBody::Binary(vec![9, 8]));
    }

    #[test]
    fn test_migrated_job_keeps_header_and_properties() {
        let mut message = browse_response();
        message.header = Some(Header {
            durable: true,
            priority: 9.into(),
            ttl: Some(60_000),
            ..Default::default()
        });
        let props = message.properties.as_mut().unwrap();
        props.correlation_id = Some(MessageId::String("corr-1".to_string()));
        props.subject = Some("InvoiceType".to_string());
        props.content_type = Some(Symbol::from("text/plain"));
        props.group_id = Some("invoices".to_string());
        props.absolute_expiry_time = Some(Timestamp::from_milliseconds(1_800_000_000_000));
        props.reply_to = Some("queue://replies".to_string());

        let out = migrate(&message, 1_700_000_005_000);

        assert_eq!(out.header, message.header);
        let out_props = out.properties.unwrap();
        assert_eq!(out_props.correlation_id, Some(MessageId::String("corr-1".to_string())));
        assert_eq!(out_props.subject.as_deref(), Some("InvoiceType"));
        assert_eq!(out_props.content_type, Some(Symbol::from("text/plain")));
        assert_eq!(out_props.group_id.as_deref(), Some("invoices"));
        assert_eq!(
            out_props.absolute_expiry_time,
            Some(Timestamp::from_milliseconds(1_800_000_000_000))
        );
        assert_eq!(out_props.message_id, Some(MessageId::String("ID:broker-1:1:1:1".to_string())));
        assert_eq!(out_props.reply_to.as_deref(), Some("queue://replies"));
        assert_eq!(out_props.to.as_deref(), Some("queue://orders.queue"));
        assert_eq!(
            out_props.creation_time,
            Some(Timestamp::from_milliseconds(1_700_000_000_000))
        );

        // The JMS message type survives, the response-only annotations do not.
        let annotations = out.message_annotations.unwrap();
        assert_eq!(annotations.0.len(), 1);
        assert_eq!(
            annotations.0.get(&OwnedKey::from("x-opt-jms-msg-type")),
            Some(&Value::Byte(5))
        );
    }

    #[test]
    fn test_migrated_job_keeps_property_types() {
        let mut message = browse_response();
        let app = &mut message.application_properties.as_mut().unwrap().0;
        app.insert("traceId".to_string(), SimpleValue::Uuid(Uuid::from([7u8; 16])));
        app.insert("blob".to_string(), SimpleValue::Binary(Binary::from(vec![1u8, 2])));
        app.insert("attempts".to_string(), SimpleValue::Int(5));

        let out = migrate(&message, 1_700_000_005_000);
        let out_app = out.application_properties.unwrap().0;

        assert_eq!(
            out_app.get("traceId"),
            Some(&SimpleValue::Uuid(Uuid::from([7u8; 16])))
        );
        assert_eq!(
            out_app.get("blob"),
            Some(&SimpleValue::Binary(Binary::from(vec![1u8, 2])))
        );
        assert_eq!(out_app.get("attempts"), Some(&SimpleValue::Int(5)));
        assert_eq!(out_app.get("region"), Some(&SimpleValue::String("eu".to_string())));
        assert_eq!(out_app.get("AMQ_SCHEDULED_DELAY"), Some(&SimpleValue::Long(595_000)));
        assert_eq!(
            out_app.get(DEFAULT_TRACKING_PROPERTY),
            Some(&SimpleValue::String("job-42".to_string()))
        );
        assert!(!out_app.contains_key("scheduledJobId"));
    }

    #[test]
    fn test_migrated_job_keeps_body_types() {
        let map = Value::Map(OrderedMap::from_iter(vec![
            (Value::String("qty".to_string()), Value::Int(3)),
            (Value::String("sig".to_string()), Value::Binary(Binary::from(vec![0xde, 0xad]))),
            (Value::String("big".to_string()), Value::Ulong(u64::MAX)),
        ]));
        let mut message = browse_response();
        message.body = Body::Value(AmqpValue(map.clone()));
        assert_eq!(migrate(&message, 0).body, Body::Value(AmqpValue(map)));

        let list = Value::List(vec![Value::Short(1), Value::Symbol(Symbol::from("s"))]);
        message.body = Body::Value(AmqpValue(list.clone()));
        assert_eq!(migrate(&message, 0).body, Body::Value(AmqpValue(list)));

        let sequence =
            Body::Sequence(vec![AmqpSequence(vec![Value::Int(1), Value::Char('x')])].into());
        message.body = sequence.clone();
        assert_eq!(migrate(&message, 0).body, sequence);
    }

    #[test]
    fn test_encode_then_decode_keeps_control_headers() {
        let request = WireMessage {
            reply_to: Some(Destination::TempQueue("ID:c-1:1:1".to_string())),
            ..Default::default()
        }
        .with_property("AMQ_SCHEDULER_ACTION", "BROWSE");

        let decoded = decode_message(&encode_message(&request));
        assert_eq!(decoded.reply_to, request.reply_to);
        assert_eq!(decoded.property("AMQ_SCHEDULER_ACTION"), Some("BROWSE"));
        assert_eq!(decoded.body, MessageBody::Unclassified);
    }

    #[test]
    fn test_sasl_profile_from_credentials() {
        let anonymous = BrokerEndpoint {
            url: "amqp://localhost:5672".to_string(),
            username: None,
            password: None,
        };
        assert!(matches!(anonymous.sasl_profile(), SaslProfile::Anonymous));

        let plain = BrokerEndpoint {
            username: Some("admin".to_string()),
            password: Some("secret".to_string()),
            ..anonymous
        };
        assert!(matches!(plain.sasl_profile(), SaslProfile::Plain { .. }));
    }
}
