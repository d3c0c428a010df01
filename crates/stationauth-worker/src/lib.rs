//! The asynchronous authorization task.
//!
//! One invocation runs `expiry check -> validation -> store query -> callback
//! -> audit` strictly in order and always ends with exactly one audit record.
//!
//! - [`acl`]: client for the access-control store's membership query
//! - [`resolver`]: maps a request to one of four [`DecisionOutcome`]s
//! - [`dispatcher`]: single POST of the decision to the caller's callback URL
//! - [`task`]: the orchestrator tying the stages together
//! - [`queue`] / [`processor`]: message passing from the front door and the
//!   consumer loop that drives invocations
//!
//! [`DecisionOutcome`]: stationauth_core::DecisionOutcome

pub mod acl;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod processor;
pub mod queue;
pub mod resolver;
pub mod task;

pub use acl::{AccessControlStore, HttpAccessControlStore};
pub use config::{AclClientConfig, WorkerConfig};
pub use dispatcher::{CallbackDispatcher, HttpCallbackDispatcher};
pub use error::{AclError, QueueError, WorkerError};
pub use processor::TaskProcessor;
pub use queue::{ChannelTaskQueue, Dequeued, RedisTaskQueue, TaskQueue};
pub use resolver::DecisionResolver;
pub use task::{AuthorizationTask, TaskSummary};
