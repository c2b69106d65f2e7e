// OPC UA server — SPDX-License-Identifier: MPL-2.0

//! [`Subscription`]: one server-side subscription, its `MonitoredItem`s, and
//! the publish cycle's retransmission queue (spec §4.6).

use std::collections::{HashMap, VecDeque};
use std::time::Instant;

use opcua_types::{
    date_time::DateTime,
    service_types::{MonitoringMode, NotificationMessage},
    status_code::StatusCode,
};

use crate::subscriptions::monitored_item::MonitoredItem;

/// Default cap on queued, unacknowledged `NotificationMessage`s a
/// subscription retains for Republish (spec §4.6 SUPPLEMENT).
pub const DEFAULT_MAX_RETRANSMIT_QUEUE: usize = 100;

/// Where a subscription sits relative to its keep-alive/lifetime counters
/// (spec §4.6 step 2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    /// Publishing is suspended (`SetPublishingMode(false)`); the lifetime
    /// counter still runs but nothing is ever sent.
    Normal,
    /// At least one keep-alive count has expired with nothing to report and
    /// a `PublishRequest` was available to carry it.
    KeepAlive,
    /// No `PublishRequest` was queued when the subscription needed to
    /// publish; every expired cycle since then bumped the lifetime counter
    /// towards expiry instead.
    Late,
    /// The lifetime counter reached zero: the subscription must be deleted
    /// and a `StatusChangeNotification` queued for whoever next polls it.
    Closed,
}

pub struct Subscription {
    id: u32,
    /// `None` once `CloseSession(delete_subscriptions=false)` orphans this
    /// subscription (spec §4.5, §4.6 SUPPLEMENT); adoptable again via
    /// TransferSubscriptions.
    owning_session: Option<opcua_types::node_id::NodeId>,
    publishing_interval: f64,
    lifetime_count: u32,
    max_lifetime_count: u32,
    keep_alive_count: u32,
    max_keep_alive_count: u32,
    max_notifications_per_publish: u32,
    publishing_enabled: bool,
    priority: u8,
    state: SubscriptionState,
    monitored_items: HashMap<u32, MonitoredItem>,
    sequence_number: u32,
    retransmit_queue: VecDeque<NotificationMessage>,
    max_retransmit_queue: usize,
    last_keep_alive_reset: Instant,
}

impl Subscription {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: u32,
        owning_session: opcua_types::node_id::NodeId,
        publishing_interval: f64,
        max_lifetime_count: u32,
        max_keep_alive_count: u32,
        max_notifications_per_publish: u32,
        publishing_enabled: bool,
        priority: u8,
    ) -> Self {
        Subscription {
            id,
            owning_session: Some(owning_session),
            publishing_interval,
            lifetime_count: 0,
            max_lifetime_count,
            keep_alive_count: 0,
            max_keep_alive_count,
            max_notifications_per_publish,
            publishing_enabled,
            priority,
            state: SubscriptionState::Normal,
            monitored_items: HashMap::new(),
            sequence_number: 1,
            retransmit_queue: VecDeque::new(),
            max_retransmit_queue: DEFAULT_MAX_RETRANSMIT_QUEUE,
            last_keep_alive_reset: Instant::now(),
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn owning_session(&self) -> Option<&opcua_types::node_id::NodeId> {
        self.owning_session.as_ref()
    }

    pub fn orphan(&mut self) {
        self.owning_session = None;
    }

    pub fn adopt(&mut self, session: opcua_types::node_id::NodeId) {
        self.owning_session = Some(session);
    }

    pub fn priority(&self) -> u8 {
        self.priority
    }

    pub fn state(&self) -> SubscriptionState {
        self.state
    }

    pub fn set_publishing_enabled(&mut self, enabled: bool) {
        self.publishing_enabled = enabled;
    }

    pub fn modify(
        &mut self,
        publishing_interval: f64,
        max_lifetime_count: u32,
        max_keep_alive_count: u32,
        max_notifications_per_publish: u32,
        priority: u8,
    ) {
        self.publishing_interval = publishing_interval;
        self.max_lifetime_count = max_lifetime_count;
        self.max_keep_alive_count = max_keep_alive_count;
        self.max_notifications_per_publish = max_notifications_per_publish;
        self.priority = priority;
        self.lifetime_count = 0;
        self.keep_alive_count = 0;
    }

    pub fn add_monitored_item(&mut self, item: MonitoredItem) {
        self.monitored_items.insert(item.id(), item);
    }

    pub fn monitored_item_mut(&mut self, id: u32) -> Option<&mut MonitoredItem> {
        self.monitored_items.get_mut(&id)
    }

    pub fn remove_monitored_item(&mut self, id: u32) -> Option<MonitoredItem> {
        self.monitored_items.remove(&id)
    }

    pub fn monitored_item_count(&self) -> usize {
        self.monitored_items.len()
    }

    pub fn monitored_item_ids(&self) -> Vec<u32> {
        self.monitored_items.keys().copied().collect()
    }

    /// Samples every due `MonitoredItem` (spec §4.6 step 1). Called once per
    /// tick of the server's publish timer, independent of whether a
    /// `PublishRequest` is available to carry the result.
    pub fn sample<F>(&mut self, now: Instant, mut read: F)
    where
        F: FnMut(&opcua_types::service_types::ReadValueId) -> opcua_types::data_value::DataValue,
    {
        for item in self.monitored_items.values_mut() {
            if item.is_due(now) {
                let value = read(item.item_to_monitor());
                item.sample(value, now);
            }
        }
    }

    fn has_pending_notifications(&self) -> bool {
        self.monitored_items.values().any(|i| i.has_pending_notifications())
    }

    /// Runs one publish-cycle tick (spec §4.6 steps 2-3): decides whether
    /// this subscription has something to report, and if so (or if its
    /// keep-alive count has expired) returns the `NotificationMessage` to
    /// hand to a parked `PublishRequest`. Returns `None` when there is
    /// nothing to send and the keep-alive count hasn't expired either.
    pub fn tick(&mut self, publish_request_available: bool) -> Option<NotificationMessage> {
        if !self.publishing_enabled {
            self.lifetime_count = 0;
            return None;
        }

        let has_data = self.has_pending_notifications();

        if !has_data {
            self.keep_alive_count += 1;
            if self.keep_alive_count < self.max_keep_alive_count {
                return None;
            }
        }

        if !publish_request_available {
            self.lifetime_count += 1;
            self.state = SubscriptionState::Late;
            if self.lifetime_count >= self.max_lifetime_count {
                self.state = SubscriptionState::Closed;
            }
            return None;
        }

        self.lifetime_count = 0;
        let message = if has_data {
            self.state = SubscriptionState::Normal;
            self.drain_notifications()
        } else {
            self.state = SubscriptionState::KeepAlive;
            self.keep_alive_count = 0;
            NotificationMessage::keep_alive(self.sequence_number, DateTime::now())
        };
        self.push_retransmit(message.clone());
        Some(message)
    }

    fn drain_notifications(&mut self) -> NotificationMessage {
        let mut data_change_items = Vec::new();
        let limit = if self.max_notifications_per_publish == 0 {
            usize::MAX
        } else {
            self.max_notifications_per_publish as usize
        };
        for item in self.monitored_items.values_mut() {
            if data_change_items.len() >= limit {
                break;
            }
            if item.monitoring_mode() == MonitoringMode::Disabled {
                continue;
            }
            data_change_items.extend(item.take_notifications());
        }
        let notification = opcua_types::service_types::DataChangeNotification {
            monitored_items: Some(data_change_items),
            diagnostic_infos: None,
        };
        let body = opcua_types::extension_object::ExtensionObject::from_binary_body(
            opcua_types::node_id::NodeId::from(
                opcua_types::object_id::ObjectId::DataChangeNotification_Encoding_DefaultBinary,
            ),
            &notification,
        );
        let message = NotificationMessage {
            sequence_number: self.sequence_number,
            publish_time: DateTime::now(),
            notification_data: Some(vec![body]),
        };
        self.sequence_number = self.sequence_number.wrapping_add(1).max(1);
        message
    }

    fn push_retransmit(&mut self, message: NotificationMessage) {
        if self.retransmit_queue.len() >= self.max_retransmit_queue {
            self.retransmit_queue.pop_front();
        }
        self.retransmit_queue.push_back(message);
    }

    /// Sequence numbers still held in the retransmission queue, reported in
    /// every `PublishResponse` (spec §4.6 step 4).
    pub fn available_sequence_numbers(&self) -> Vec<u32> {
        self.retransmit_queue.iter().map(|m| m.sequence_number).collect()
    }

    /// Drops `sequence_number` from the retransmission queue once the
    /// client has acknowledged it (spec §8 property 7).
    pub fn acknowledge(&mut self, sequence_number: u32) -> StatusCode {
        let before = self.retransmit_queue.len();
        self.retransmit_queue.retain(|m| m.sequence_number != sequence_number);
        if self.retransmit_queue.len() < before {
            StatusCode::Good
        } else {
            StatusCode::BadSequenceNumberUnknown
        }
    }

    /// Republish (spec §8 property 7): re-sends a still-queued
    /// notification by sequence number.
    pub fn republish(&self, sequence_number: u32) -> Option<NotificationMessage> {
        self.retransmit_queue
            .iter()
            .find(|m| m.sequence_number == sequence_number)
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opcua_types::{data_value::DataValue, node_id::NodeId, variant::Variant};

    fn sub() -> Subscription {
        Subscription::new(1, NodeId::new(0, 1u32), 100.0, 30, 10, 0, true, 0)
    }

    #[test]
    fn tick_with_no_data_and_no_publish_request_goes_late() {
        let mut s = sub();
        for _ in 0..5 {
            assert!(s.tick(false).is_none());
        }
        assert_eq!(s.state(), SubscriptionState::Late);
    }

    #[test]
    fn tick_sends_keep_alive_after_max_keep_alive_count() {
        let mut s = sub();
        for _ in 0..9 {
            assert!(s.tick(true).is_none());
        }
        let message = s.tick(true).expect("keep-alive due");
        assert!(message.notification_data.is_none());
        assert_eq!(s.state(), SubscriptionState::KeepAlive);
    }

    #[test]
    fn pending_data_change_is_sent_immediately() {
        let mut s = sub();
        let item = MonitoredItem::new(
            1,
            &opcua_types::service_types::MonitoredItemCreateRequest {
                item_to_monitor: opcua_types::service_types::ReadValueId {
                    node_id: NodeId::new(1, 1u32),
                    attribute_id: 13,
                    ..Default::default()
                },
                monitoring_mode: MonitoringMode::Reporting,
                requested_parameters: opcua_types::service_types::MonitoringParameters {
                    client_handle: 1,
                    queue_size: 10,
                    discard_oldest: true,
                    ..Default::default()
                },
            },
            100.0,
        );
        s.add_monitored_item(item);
        s.sample(Instant::now(), |_| DataValue::new_now(Variant::Int32(1)));
        let message = s.tick(true).expect("data change due");
        assert!(message.notification_data.is_some());
    }

    #[test]
    fn republish_returns_none_past_retention() {
        let s = sub();
        assert!(s.republish(999).is_none());
    }
}
