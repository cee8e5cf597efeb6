pub mod archive;
pub mod broker;
pub mod config;
pub mod error;
pub mod filter;
pub mod migrator;
pub mod protocol;
pub mod record;
pub mod removal;
pub mod router;
pub mod session;
pub mod transform;

mod helpers {
    pub(crate) mod amqp_value;
}
