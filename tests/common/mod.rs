#![allow(dead_code)]

use std::collections::{HashSet, VecDeque};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use scheduler_migrate::broker::amqp::BrokerEndpoint;
use scheduler_migrate::broker::{
    Destination, MessageBody, MessageSender, SourceBroker, TargetBroker, WireMessage,
};
use scheduler_migrate::config::RunConfig;
use scheduler_migrate::error::TransportError;
use scheduler_migrate::filter::PropertyFilter;
use scheduler_migrate::protocol::{DEFAULT_TRACKING_PROPERTY, SCHEDULED_DELAY, SCHEDULED_ID};
use scheduler_migrate::removal::RemovalMode;

pub const REPLY_CHANNEL: &str = "ID:fake-source:1:1";

/// Scripted source broker state, shared with the test body.
#[derive(Default)]
pub struct SourceState {
    /// Browse responses, handed out in order. An `Err` simulates a transport fault.
    pub responses: VecDeque<Result<WireMessage, TransportError>>,
    pub sent: Vec<(Destination, WireMessage)>,
    pub reply_channels: usize,
    /// Number of sends that succeed before every further send fails.
    pub send_budget: Option<usize>,
    pub closed: bool,
}

#[derive(Clone, Default)]
pub struct FakeSource {
    pub state: Arc<Mutex<SourceState>>,
}

impl FakeSource {
    pub fn with_responses(responses: Vec<WireMessage>) -> Self {
        let source = Self::default();
        source
            .state
            .lock()
            .unwrap()
            .responses
            .extend(responses.into_iter().map(Ok));
        source
    }

    pub fn push_fault(&self, reason: &str) {
        self.state
            .lock()
            .unwrap()
            .responses
            .push_back(Err(TransportError::Receive(reason.to_string())));
    }

    /// Messages sent to the source, in order.
    pub fn sent(&self) -> Vec<(Destination, WireMessage)> {
        self.state.lock().unwrap().sent.clone()
    }

    pub fn closed(&self) -> bool {
        self.state.lock().unwrap().closed
    }
}

#[async_trait]
impl SourceBroker for FakeSource {
    async fn open_reply_channel(&mut self) -> Result<Destination, TransportError> {
        self.state.lock().unwrap().reply_channels += 1;
        Ok(Destination::TempQueue(REPLY_CHANNEL.to_string()))
    }

    async fn send(&mut self, to: &Destination, message: WireMessage) -> Result<(), TransportError> {
        let mut state = self.state.lock().unwrap();
        match state.send_budget {
            Some(0) => {
                return Err(TransportError::Send {
                    address: to.to_string(),
                    reason: "connection reset".to_string(),
                })
            }
            Some(n) => state.send_budget = Some(n - 1),
            None => {}
        }
        state.sent.push((to.clone(), message));
        Ok(())
    }

    async fn receive(&mut self, _timeout: Duration) -> Result<Option<WireMessage>, TransportError> {
        match self.state.lock().unwrap().responses.pop_front() {
            Some(Ok(message)) => Ok(Some(message)),
            Some(Err(e)) => Err(e),
            None => Ok(None),
        }
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.state.lock().unwrap().closed = true;
        Ok(())
    }
}

/// Target broker state, shared with the test body.
#[derive(Default)]
pub struct TargetState {
    /// Every sender creation, in order.
    pub opened: Vec<Destination>,
    pub sent: Vec<(Destination, WireMessage)>,
    pub fail_open: HashSet<Destination>,
    pub fail_send: bool,
    pub closed_senders: usize,
    pub closed: bool,
}

#[derive(Clone, Default)]
pub struct FakeTarget {
    pub state: Arc<Mutex<TargetState>>,
}

impl FakeTarget {
    pub fn opened(&self) -> Vec<Destination> {
        self.state.lock().unwrap().opened.clone()
    }

    pub fn sent(&self) -> Vec<(Destination, WireMessage)> {
        self.state.lock().unwrap().sent.clone()
    }

    pub fn boxed(&self) -> Option<Box<dyn TargetBroker>> {
        Some(Box::new(self.clone()))
    }
}

#[async_trait]
impl TargetBroker for FakeTarget {
    async fn open_sender(
        &mut self,
        destination: &Destination,
    ) -> Result<Box<dyn MessageSender>, TransportError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_open.contains(destination) {
            return Err(TransportError::Attach {
                address: destination.to_string(),
                reason: "not authorized".to_string(),
            });
        }
        state.opened.push(destination.clone());
        Ok(Box::new(FakeSender {
            destination: destination.clone(),
            state: self.state.clone(),
        }))
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.state.lock().unwrap().closed = true;
        Ok(())
    }
}

pub struct FakeSender {
    destination: Destination,
    state: Arc<Mutex<TargetState>>,
}

#[async_trait]
impl MessageSender for FakeSender {
    async fn send(&mut self, message: WireMessage) -> Result<(), TransportError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_send {
            return Err(TransportError::Send {
                address: self.destination.to_string(),
                reason: "rejected".to_string(),
            });
        }
        state.sent.push((self.destination.clone(), message));
        Ok(())
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.state.lock().unwrap().closed_senders += 1;
        Ok(())
    }
}

/// A browse response for job `id`.
pub fn job_response(
    id: &str,
    destination: &str,
    enqueue_timestamp: i64,
    delay: i64,
    body: MessageBody,
) -> WireMessage {
    WireMessage {
        message_id: Some(format!("ID:producer-1:1:1:{}", id)),
        to: None,
        reply_to: None,
        original_destination: Destination::parse(destination),
        timestamp: Some(enqueue_timestamp),
        properties: Default::default(),
        body,
        envelope: Default::default(),
    }
    .with_property(SCHEDULED_ID, id)
    .with_property(SCHEDULED_DELAY, delay.to_string())
}

pub fn run_config(target_dir: Option<PathBuf>, removal_mode: RemovalMode, dry_run: bool) -> RunConfig {
    RunConfig {
        source: BrokerEndpoint {
            url: "amqp://source:5672".to_string(),
            username: None,
            password: None,
        },
        source_timeout: Duration::from_millis(50),
        removal_mode,
        target: None,
        target_dir,
        tracking_property: DEFAULT_TRACKING_PROPERTY.to_string(),
        dry_run,
        filter: PropertyFilter::default(),
    }
}
