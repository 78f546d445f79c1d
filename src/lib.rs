//! Resumable batch runner for slow, fallible agent calls.
//!
//! Items flow from the [`source`] through the [`ledger`] (which drops
//! everything already recorded in the output), into the [`dispatch`] pool
//! where each [`worker`] turns one item into one [`record`], and out to the
//! [`store::sink`] which persists it. The [`processor`] and [`inspect`]
//! traits are the seams to the agent and the attachment tooling.

pub mod banner;
pub mod batch;
pub mod config;
pub mod consts;
pub mod dispatch;
pub mod engine;
pub mod inspect;
pub mod item;
pub mod ledger;
pub mod logging;
pub mod memory;
pub mod processor;
pub mod progress;
pub mod prompts;
pub mod record;
pub mod source;
pub mod store;
pub mod thinker;
pub mod tools;
pub mod worker;

pub use batch::run_batch;
pub use config::{DuplicatePolicy, ResumePolicy, RunConfig, SessionConfig};
pub use item::WorkItem;
pub use progress::RunSummary;
pub use record::{ResultRecord, Status};
