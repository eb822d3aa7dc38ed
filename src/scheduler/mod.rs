//! Time-windowed batch email delivery
//!
//! This module is the heart of the service: a cron-invoked batch runner
//! that resolves the current delivery-zone time, fetches every user with a
//! configured preference, decides per user whether this tick falls inside
//! their send window, selects their highlight, hands it to the transport,
//! and writes one audit record per attempt.
//!
//! # Invocation model
//!
//! One external trigger (platform cron, operator request) produces one
//! batch run that processes all due users to completion. Users are handled
//! strictly one after another; a user's selection or transport failure is
//! recorded and the loop moves on. Only two things abort a batch: an
//! unreadable candidate directory and a malformed window override.
//!
//! Overlapping trigger firings are NOT coordinated. Two ticks landing
//! inside the same tolerance window will both send to the same due user;
//! in this domain an occasional duplicate highlight beats a missed one,
//! so the design accepts duplicates instead of carrying a lock or lease.
//!
//! # Modules
//!
//! - [`batch`] - The batch runner, its request/report types, and the
//!   per-user processing pipeline
//! - [`error`] - Scheduler error types

pub mod batch;
pub mod error;

pub use batch::{
    BatchReport, BatchRequest, DeliveryScheduler, OutcomeStatus, TestSendReport, UserOutcome,
};
pub use error::{SchedulerError, SchedulerResult};
