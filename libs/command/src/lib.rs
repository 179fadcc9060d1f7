//! Remote command dispatch for fleet nodes.
//!
//! This crate sends command documents to a set of nodes in one provider call
//! and tracks each node's invocation until the command finishes:
//!
//! - [`CommandDispatcher::dispatch`] sends the command with bounded
//!   concurrency and zero tolerated errors
//! - [`CommandDispatcher::await_completion`] polls per node with backoff
//! - [`CommandDispatcher::wait_until_ready`] waits for nodes to pass status
//!   checks before anything is sent

mod backoff;
mod dispatcher;
mod document;
mod error;
mod invocation;
mod readiness;

pub use backoff::BackoffPolicy;
pub use dispatcher::{
    max_concurrency, CommandDispatcher, CommandReport, MAX_CONCURRENCY_CAP, MAX_ERRORS,
};
pub use document::{
    CommandDocument, AGENT_PACKAGE, CONFIGURE_PACKAGE, MANAGE_AGENT, RUN_SHELL_SCRIPT,
};
pub use error::{CommandError, CommandResult};
pub use invocation::{CommandInvocation, InvocationSet};
