//! Intra-process pub/sub fabric.
//!
//! A [`Topic`] broadcasts one message type to named consumer groups, each
//! with its own bounded delivery queue and [`BufferPolicy`]. The daemon uses
//! a single `Topic<ServiceStates>` to fan service state snapshots out to
//! watchers; the fabric itself is generic and usable for any message type.
//!
//! ## Contents
//! - [`Topic`], [`TopicConfig`] - the broadcast surface
//! - [`SubscriberConfig`], [`BufferPolicy`] - per-group delivery options
//! - [`Subscription`] - the consumer handle
//!
//! See `broadcaster.rs` for the single-owner fan-out task and `delivery.rs`
//! for the bounded queue the policies act on.

mod broadcaster;
mod delivery;
mod topic;

pub use delivery::{BufferPolicy, Subscription};
pub use topic::{DEFAULT_REQUEST_TIMEOUT, SubscriberConfig, Topic, TopicConfig};
