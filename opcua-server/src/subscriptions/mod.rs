// OPC UA server — SPDX-License-Identifier: MPL-2.0

//! The subscription engine: `CreateSubscription`/monitored-item lifecycle,
//! the publish-request FIFO, and the timer-driven 4-step publish cycle
//! (spec §4.6).

pub mod manager;
pub mod monitored_item;
pub mod subscription;

pub use manager::{PublishOutcome, SubscriptionManager};
pub use monitored_item::MonitoredItem;
pub use subscription::{Subscription, SubscriptionState};
