//! Per-job publish/subscribe fan-out of progress records.
//!
//! Listeners are registered under a job key and receive every record
//! published for that key, in subscription order. The bus also keeps the
//! latest record per key so late subscribers can render current state
//! immediately.

mod bus;

pub use bus::{listener, EventBus, Listener, ListenerError, Subscription};
