//! Vocabulary of the ActiveMQ scheduler management protocol.

/// Topic the broker's job scheduler listens on for control requests.
pub const MANAGEMENT_DESTINATION: &str = "ActiveMQ.Scheduler.Management";

/// Property carrying the requested action on a control message.
pub const SCHEDULER_ACTION: &str = "AMQ_SCHEDULER_ACTION";
pub const ACTION_BROWSE: &str = "BROWSE";
pub const ACTION_REMOVE: &str = "REMOVE";

/// Scheduler-assigned job id; present on browse responses and required on
/// removal requests.
pub const SCHEDULED_ID: &str = "scheduledJobId";

/// Remaining delay in milliseconds.
pub const SCHEDULED_DELAY: &str = "AMQ_SCHEDULED_DELAY";
pub const SCHEDULED_PERIOD: &str = "AMQ_SCHEDULED_PERIOD";
pub const SCHEDULED_REPEAT: &str = "AMQ_SCHEDULED_REPEAT";
pub const SCHEDULED_CRON: &str = "AMQ_SCHEDULED_CRON";

/// Default property under which a migrated job keeps its source scheduler id.
pub const DEFAULT_TRACKING_PROPERTY: &str = "originalScheduledJobId";
