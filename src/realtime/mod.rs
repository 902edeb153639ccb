//! Realtime requisition feed: database change listener, in-process bus and
//! per-connection feed subscriptions

pub mod bus;
pub mod feed;
pub mod listener;
pub mod subscription;

pub use bus::{ChangeBus, ChangeEvent};
pub use feed::{FeedDelta, FeedScope, FeedUpdate, RequisitionFeed};
pub use subscription::{Backoff, FeedSubscription, RequisitionSource};
