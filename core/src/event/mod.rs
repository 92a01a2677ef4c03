//! Event Admin: synchronous and asynchronous
//! publish/subscribe over named topics.

mod admin;
mod topic;

pub use admin::{Event, EventAdmin, EventHandler, EVENT_HANDLER_INTERFACE, FILTER_KEY, TOPICS_KEY};
pub use topic::matches as topic_matches;
