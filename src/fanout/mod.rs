//! Realtime fan-out of bin updates
//!
//! Every registry mutation is pushed to all connected observers. Delivery is
//! at most once per observer and there is no replay: a new observer should
//! read the current snapshot from the query surface first.

pub mod event;
pub mod hub;

pub use event::{BinEvent, EventEnvelope, BIN_EVENT_NAME};
pub use hub::{FanoutHub, Subscription, DEFAULT_BROADCAST_CAPACITY};
