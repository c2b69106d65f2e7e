// OPC UA server — SPDX-License-Identifier: MPL-2.0

//! [`SubscriptionManager`]: every subscription on the server, the
//! publish-request FIFO that feeds them, and the timer-driven publish cycle
//! (spec §4.6). Owned by the single EventLoop thread (spec §5), same as
//! [`crate::session::manager::SessionManager`].

use std::collections::{HashMap, VecDeque};
use std::time::Instant;

use opcua_types::{
    node_id::NodeId,
    service_types::{
        CreateSubscriptionRequest, CreateSubscriptionResponse, ModifySubscriptionRequest,
        ModifySubscriptionResponse, MonitoredItemCreateRequest, MonitoredItemCreateResult,
        MonitoringMode, NotificationMessage, PublishRequest, RepublishRequest, RepublishResponse,
        ResponseHeader,
    },
    status_code::StatusCode,
};

use crate::config::SubscriptionLimits;
use crate::node_store::NodeStore;
use crate::subscriptions::monitored_item::MonitoredItem;
use crate::subscriptions::subscription::Subscription;

/// A `PublishRequest` parked until some subscription on its session has
/// something to report (spec §4.6 step 2).
struct ParkedPublish {
    request_id: u32,
    request_handle: u32,
    /// Outcome of acknowledging each entry in the request's
    /// `subscription_acknowledgements`, computed up front at `publish()` time.
    ack_results: Vec<StatusCode>,
}

/// Owns every `Subscription` across every session, plus each session's
/// FIFO of parked `PublishRequest`s (spec §4.6 SUPPLEMENT: default max 10,
/// `BadTooManyPublishRequests` past that).
pub struct SubscriptionManager {
    subscriptions: HashMap<u32, Subscription>,
    /// Keyed by owning session's authentication token; orphaned
    /// subscriptions (owning_session == None) are looked up by id only.
    pending_publishes: HashMap<NodeId, VecDeque<ParkedPublish>>,
    limits: SubscriptionLimits,
    next_id: std::sync::Arc<crate::info::IdGenerator>,
}

/// Outcome of one `Publish` call: either a response ready now, or the
/// request has been parked for a later tick to fill.
pub enum PublishOutcome {
    Ready {
        subscription_id: u32,
        message: NotificationMessage,
        available_sequence_numbers: Vec<u32>,
        ack_results: Vec<StatusCode>,
    },
    Parked,
}

impl SubscriptionManager {
    pub fn new(limits: SubscriptionLimits, next_id: std::sync::Arc<crate::info::IdGenerator>) -> Self {
        SubscriptionManager {
            subscriptions: HashMap::new(),
            pending_publishes: HashMap::new(),
            limits,
            next_id,
        }
    }

    pub fn subscription_count_for_session(&self, session: &NodeId) -> usize {
        self.subscriptions
            .values()
            .filter(|s| s.owning_session() == Some(session))
            .count()
    }

    pub fn create_subscription(
        &mut self,
        session: &NodeId,
        request: &CreateSubscriptionRequest,
    ) -> Result<CreateSubscriptionResponse, StatusCode> {
        if self.limits.max_subscriptions_per_session > 0
            && self.subscription_count_for_session(session) >= self.limits.max_subscriptions_per_session
        {
            return Err(StatusCode::BadTooManySubscriptions);
        }

        let revised_interval = request.requested_publishing_interval.max(self.limits.min_publishing_interval_ms);
        let revised_keep_alive = request
            .requested_max_keep_alive_count
            .clamp(1, self.limits.max_keep_alive_count);
        // Part 4 requires lifetime_count >= 3 * keep_alive_count so a
        // subscription always gets several keep-alive chances before expiry.
        let revised_lifetime = request
            .requested_lifetime_count
            .max(revised_keep_alive * 3)
            .min(self.limits.max_lifetime_count);

        let id = self.next_id.next();
        let subscription = Subscription::new(
            id,
            session.clone(),
            revised_interval,
            revised_lifetime,
            revised_keep_alive,
            request.max_notifications_per_publish,
            request.publishing_enabled,
            request.priority,
        );
        self.subscriptions.insert(id, subscription);

        Ok(CreateSubscriptionResponse::new(
            request,
            id,
            revised_interval,
            revised_lifetime,
            revised_keep_alive,
        ))
    }

    /// ModifySubscription (spec §4.6): revises a subscription's publishing
    /// parameters the same way `create_subscription` revises a new one's.
    pub fn modify_subscription(
        &mut self,
        session: &NodeId,
        request: &ModifySubscriptionRequest,
    ) -> Result<ModifySubscriptionResponse, StatusCode> {
        let subscription = match self.subscriptions.get_mut(&request.subscription_id) {
            Some(s) if s.owning_session() == Some(session) => s,
            Some(_) => return Err(StatusCode::BadUserAccessDenied),
            None => return Err(StatusCode::BadSubscriptionIdInvalid),
        };

        let revised_interval = request.requested_publishing_interval.max(self.limits.min_publishing_interval_ms);
        let revised_keep_alive = request
            .requested_max_keep_alive_count
            .clamp(1, self.limits.max_keep_alive_count);
        let revised_lifetime = request
            .requested_lifetime_count
            .max(revised_keep_alive * 3)
            .min(self.limits.max_lifetime_count);

        subscription.modify(
            revised_interval,
            revised_lifetime,
            revised_keep_alive,
            request.max_notifications_per_publish,
            request.priority,
        );

        Ok(ModifySubscriptionResponse {
            response_header: ResponseHeader::new_good(request),
            revised_publishing_interval: revised_interval,
            revised_lifetime_count: revised_lifetime,
            revised_max_keep_alive_count: revised_keep_alive,
        })
    }

    /// SetPublishingMode (spec §4.6): suspends or resumes each named
    /// subscription without affecting its monitored items or queued data.
    pub fn set_publishing_mode(
        &mut self,
        session: &NodeId,
        publishing_enabled: bool,
        ids: &[u32],
    ) -> Vec<StatusCode> {
        ids.iter()
            .map(|id| match self.subscriptions.get_mut(id) {
                Some(s) if s.owning_session() == Some(session) => {
                    s.set_publishing_enabled(publishing_enabled);
                    StatusCode::Good
                }
                Some(_) => StatusCode::BadUserAccessDenied,
                None => StatusCode::BadSubscriptionIdInvalid,
            })
            .collect()
    }

    pub fn delete_subscriptions(&mut self, session: &NodeId, ids: &[u32]) -> Vec<StatusCode> {
        ids.iter()
            .map(|id| match self.subscriptions.get(id) {
                Some(s) if s.owning_session() == Some(session) => {
                    self.subscriptions.remove(id);
                    StatusCode::Good
                }
                Some(_) => StatusCode::BadUserAccessDenied,
                None => StatusCode::BadSubscriptionIdInvalid,
            })
            .collect()
    }

    /// Removes every subscription owned by `session`, for CloseSession and
    /// expiry (spec §4.5, §4.6 SUPPLEMENT). Returns their ids.
    pub fn delete_all_for_session(&mut self, session: &NodeId) -> Vec<u32> {
        let ids: Vec<u32> = self
            .subscriptions
            .iter()
            .filter(|(_, s)| s.owning_session() == Some(session))
            .map(|(id, _)| *id)
            .collect();
        for id in &ids {
            self.subscriptions.remove(id);
        }
        self.pending_publishes.remove(session);
        ids
    }

    /// Orphans every subscription owned by `session` instead of deleting
    /// them, for CloseSession when `delete_subscriptions` is false and for
    /// session-timeout when `delete_subscriptions_on_timeout` is false (spec
    /// §4.5, §4.6 SUPPLEMENT). Orphaned subscriptions keep publishing
    /// nothing (no session can issue `PublishRequest`s for them) until
    /// `TransferSubscriptions` re-adopts them.
    pub fn orphan_all_for_session(&mut self, session: &NodeId) {
        for s in self.subscriptions.values_mut() {
            if s.owning_session() == Some(session) {
                s.orphan();
            }
        }
        self.pending_publishes.remove(session);
    }

    /// TransferSubscriptions (spec §7 session transfer, E6): moves
    /// ownership of `ids` to `session`, succeeding for both orphaned
    /// subscriptions and ones already owned by a *different* live session
    /// (the common single-client-reconnect case).
    pub fn transfer(&mut self, session: &NodeId, ids: &[u32]) -> Vec<(StatusCode, Vec<u32>)> {
        ids.iter()
            .map(|id| match self.subscriptions.get_mut(id) {
                Some(s) => {
                    s.adopt(session.clone());
                    (StatusCode::Good, s.available_sequence_numbers())
                }
                None => (StatusCode::BadSubscriptionIdInvalid, Vec::new()),
            })
            .collect()
    }

    pub fn get_monitored_item_count(&self, subscription_id: u32) -> Option<usize> {
        self.subscriptions.get(&subscription_id).map(|s| s.monitored_item_count())
    }

    /// The session currently owning `subscription_id`, for the dispatch
    /// shim to check before routing a monitored-item call to it. `None` if
    /// the subscription doesn't exist or is orphaned.
    pub fn owning_session_of(&self, subscription_id: u32) -> Option<&NodeId> {
        self.subscriptions.get(&subscription_id).and_then(|s| s.owning_session())
    }

    pub fn create_monitored_items(
        &mut self,
        subscription_id: u32,
        items: &[MonitoredItemCreateRequest],
        node_store: &dyn NodeStore,
        next_monitored_item_id: &crate::info::IdGenerator,
    ) -> Result<Vec<MonitoredItemCreateResult>, StatusCode> {
        let subscription = self
            .subscriptions
            .get_mut(&subscription_id)
            .ok_or(StatusCode::BadSubscriptionIdInvalid)?;

        let mut results = Vec::with_capacity(items.len());
        for request in items {
            if !node_store.get_node(&request.item_to_monitor.node_id) {
                results.push(MonitoredItemCreateResult {
                    status_code: StatusCode::BadNodeIdUnknown,
                    monitored_item_id: 0,
                    revised_sampling_interval: 0.0,
                    revised_queue_size: 0,
                    filter_result: Default::default(),
                });
                continue;
            }
            let revised_interval = request
                .requested_parameters
                .sampling_interval
                .max(self.limits.min_sampling_interval_ms);
            let revised_queue_size = request
                .requested_parameters
                .queue_size
                .max(1)
                .min(self.limits.max_monitored_item_queue_size as u32);
            let id = next_monitored_item_id.next();
            let item = MonitoredItem::new(id, request, revised_interval);
            subscription.add_monitored_item(item);
            results.push(MonitoredItemCreateResult {
                status_code: StatusCode::Good,
                monitored_item_id: id,
                revised_sampling_interval: revised_interval,
                revised_queue_size,
                filter_result: request.requested_parameters.filter.clone(),
            });
        }
        Ok(results)
    }

    pub fn modify_monitored_items(
        &mut self,
        subscription_id: u32,
        items: &[opcua_types::service_types::MonitoredItemModifyRequest],
    ) -> Result<Vec<opcua_types::service_types::MonitoredItemModifyResult>, StatusCode> {
        let subscription = self
            .subscriptions
            .get_mut(&subscription_id)
            .ok_or(StatusCode::BadSubscriptionIdInvalid)?;
        let min_sampling_interval_ms = self.limits.min_sampling_interval_ms;
        let max_monitored_item_queue_size = self.limits.max_monitored_item_queue_size as u32;
        Ok(items
            .iter()
            .map(|request| match subscription.monitored_item_mut(request.monitored_item_id) {
                Some(item) => {
                    let revised_interval = request.requested_parameters.sampling_interval.max(min_sampling_interval_ms);
                    let revised_queue_size = request.requested_parameters.queue_size.max(1).min(max_monitored_item_queue_size);
                    item.modify(&request.requested_parameters, revised_interval);
                    opcua_types::service_types::MonitoredItemModifyResult {
                        status_code: StatusCode::Good,
                        revised_sampling_interval: revised_interval,
                        revised_queue_size,
                        filter_result: request.requested_parameters.filter.clone(),
                    }
                }
                None => opcua_types::service_types::MonitoredItemModifyResult {
                    status_code: StatusCode::BadMonitoredItemIdInvalid,
                    revised_sampling_interval: 0.0,
                    revised_queue_size: 0,
                    filter_result: Default::default(),
                },
            })
            .collect())
    }

    pub fn delete_monitored_items(&mut self, subscription_id: u32, ids: &[u32]) -> Result<Vec<StatusCode>, StatusCode> {
        let subscription = self
            .subscriptions
            .get_mut(&subscription_id)
            .ok_or(StatusCode::BadSubscriptionIdInvalid)?;
        Ok(ids
            .iter()
            .map(|id| match subscription.remove_monitored_item(*id) {
                Some(_) => StatusCode::Good,
                None => StatusCode::BadMonitoredItemIdInvalid,
            })
            .collect())
    }

    pub fn set_monitoring_mode(
        &mut self,
        subscription_id: u32,
        mode: MonitoringMode,
        ids: &[u32],
    ) -> Result<Vec<StatusCode>, StatusCode> {
        let subscription = self
            .subscriptions
            .get_mut(&subscription_id)
            .ok_or(StatusCode::BadSubscriptionIdInvalid)?;
        Ok(ids
            .iter()
            .map(|id| match subscription.monitored_item_mut(*id) {
                Some(item) => {
                    item.set_monitoring_mode(mode);
                    StatusCode::Good
                }
                None => StatusCode::BadMonitoredItemIdInvalid,
            })
            .collect())
    }

    /// Publish (spec §4.6 step 2): acknowledges every sequence number the
    /// request carries, then parks it for the next `run_publish_cycle` tick
    /// to fill. `PublishOutcome::Ready` is reserved for a future immediate-fill
    /// path; this manager always parks, matching the teacher's timer-driven
    /// publish cycle rather than synchronous delivery.
    pub fn publish(
        &mut self,
        session: &NodeId,
        request_id: u32,
        request: &PublishRequest,
    ) -> Result<PublishOutcome, StatusCode> {
        let max_parked = self.limits.max_pending_publish_requests;
        let queue = self.pending_publishes.entry(session.clone()).or_default();
        if max_parked > 0 && queue.len() >= max_parked {
            return Err(StatusCode::BadTooManyPublishRequests);
        }

        let ack_results: Vec<StatusCode> = request
            .subscription_acknowledgements
            .iter()
            .flatten()
            .map(|ack| match self.subscriptions.get_mut(&ack.subscription_id) {
                Some(s) => s.acknowledge(ack.sequence_number),
                None => StatusCode::BadSubscriptionIdInvalid,
            })
            .collect();

        queue.push_back(ParkedPublish {
            request_id,
            request_handle: request.request_header.request_handle,
            ack_results,
        });
        Ok(PublishOutcome::Parked)
    }

    /// Republish (spec §8 property 7): returns the requested notification
    /// from the retransmission queue, or `BadMessageNotAvailable` if it has
    /// already been discarded.
    pub fn republish(&self, request: &RepublishRequest) -> RepublishResponse {
        match self
            .subscriptions
            .get(&request.subscription_id)
            .and_then(|s| s.republish(request.retransmit_sequence_number))
        {
            Some(notification_message) => RepublishResponse {
                response_header: opcua_types::service_types::ResponseHeader::new_good(request),
                notification_message,
            },
            None => RepublishResponse::not_available(request),
        }
    }

    /// One tick of the publish timer (spec §4.6 steps 1-4): samples every
    /// subscription's monitored items, then drains as many parked
    /// `PublishRequest`s as there are subscriptions ready to fill one.
    /// Returns `(request_id, request_handle, subscription_id, message,
    /// available_sequence_numbers, ack_results)` per filled request, plus
    /// the ids of subscriptions whose lifetime expired this tick.
    #[allow(clippy::type_complexity)]
    pub fn run_publish_cycle(
        &mut self,
        node_store: &dyn NodeStore,
    ) -> (Vec<(u32, u32, u32, NotificationMessage, Vec<u32>, Vec<StatusCode>)>, Vec<u32>) {
        let now = Instant::now();
        for subscription in self.subscriptions.values_mut() {
            subscription.sample(now, |item| {
                node_store
                    .read_attribute(&item.node_id, item.attribute_id)
                    .unwrap_or_else(|status| {
                        let mut dv = opcua_types::data_value::DataValue::default();
                        dv.status = Some(status);
                        dv
                    })
            });
        }

        let mut filled = Vec::new();
        let mut expired = Vec::new();
        let sessions: Vec<NodeId> = self.pending_publishes.keys().cloned().collect();
        for session in sessions {
            let mut owned_ids: Vec<u32> = self
                .subscriptions
                .iter()
                .filter(|(_, s)| s.owning_session() == Some(&session))
                .map(|(id, _)| *id)
                .collect();
            owned_ids.sort_by_key(|id| std::cmp::Reverse(self.subscriptions[id].priority()));

            for subscription_id in owned_ids {
                let Some(queue) = self.pending_publishes.get(&session) else {
                    break;
                };
                if queue.is_empty() {
                    break;
                }
                let Some(subscription) = self.subscriptions.get_mut(&subscription_id) else {
                    continue;
                };
                let Some(message) = subscription.tick(true) else {
                    if subscription.state() == crate::subscriptions::subscription::SubscriptionState::Closed {
                        expired.push(subscription_id);
                    }
                    continue;
                };
                let available = subscription.available_sequence_numbers();
                let parked = self
                    .pending_publishes
                    .get_mut(&session)
                    .and_then(|q| q.pop_front())
                    .expect("queue non-empty, just checked");
                filled.push((
                    parked.request_id,
                    parked.request_handle,
                    subscription_id,
                    message,
                    available,
                    parked.ack_results,
                ));
            }
        }
        self.pending_publishes.retain(|_, q| !q.is_empty());
        (filled, expired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node_store::NodeVisitor;

    struct NullStore;
    impl NodeStore for NullStore {
        fn get_node(&self, _id: &NodeId) -> bool {
            true
        }
        fn add_node(&self, _parent: &NodeId, _node: &NodeId) -> Result<(), StatusCode> {
            Ok(())
        }
        fn remove_node(&self, _id: &NodeId) -> Result<(), StatusCode> {
            Ok(())
        }
        fn iterate(&self, _visitor: &mut dyn NodeVisitor) {}
        fn read_attribute(&self, _id: &NodeId, _attribute_id: u32) -> Result<opcua_types::data_value::DataValue, StatusCode> {
            Ok(opcua_types::data_value::DataValue::new_now(opcua_types::variant::Variant::Int32(1)))
        }
        fn write_attribute(&self, _id: &NodeId, _attribute_id: u32, _value: opcua_types::data_value::DataValue) -> Result<(), StatusCode> {
            Ok(())
        }
    }

    fn manager() -> SubscriptionManager {
        SubscriptionManager::new(SubscriptionLimits::default(), std::sync::Arc::new(crate::info::IdGenerator::default()))
    }

    #[test]
    fn create_subscription_clamps_keep_alive_and_lifetime() {
        let mut mgr = manager();
        let session = NodeId::new(0, 1u32);
        let req = CreateSubscriptionRequest {
            request_header: opcua_types::service_types::RequestHeader::new(NodeId::null(), 1, 0),
            requested_publishing_interval: 50.0,
            requested_lifetime_count: 1,
            requested_max_keep_alive_count: 1,
            max_notifications_per_publish: 0,
            publishing_enabled: true,
            priority: 0,
        };
        let resp = mgr.create_subscription(&session, &req).unwrap();
        assert!(resp.revised_lifetime_count >= resp.revised_max_keep_alive_count * 3);
    }

    #[test]
    fn publish_without_data_parks_until_cycle_runs() {
        let mut mgr = manager();
        let session = NodeId::new(0, 1u32);
        let create = CreateSubscriptionRequest {
            request_header: opcua_types::service_types::RequestHeader::new(NodeId::null(), 1, 0),
            requested_publishing_interval: 50.0,
            requested_lifetime_count: 30,
            requested_max_keep_alive_count: 1,
            max_notifications_per_publish: 0,
            publishing_enabled: true,
            priority: 0,
        };
        let created = mgr.create_subscription(&session, &create).unwrap();
        let publish_req = PublishRequest {
            request_header: opcua_types::service_types::RequestHeader::new(NodeId::null(), 2, 0),
            subscription_acknowledgements: None,
        };
        let outcome = mgr.publish(&session, 1, &publish_req).unwrap();
        assert!(matches!(outcome, PublishOutcome::Parked));

        let store = NullStore;
        let (filled, _expired) = mgr.run_publish_cycle(&store);
        assert_eq!(filled.len(), 1);
        assert_eq!(filled[0].2, created.subscription_id);
    }

    #[test]
    fn too_many_parked_publishes_rejected() {
        let mut mgr = manager();
        mgr.limits.max_pending_publish_requests = 1;
        let session = NodeId::new(0, 1u32);
        let publish_req = PublishRequest {
            request_header: opcua_types::service_types::RequestHeader::new(NodeId::null(), 1, 0),
            subscription_acknowledgements: None,
        };
        mgr.publish(&session, 1, &publish_req).unwrap();
        let err = mgr.publish(&session, 2, &publish_req).unwrap_err();
        assert_eq!(err, StatusCode::BadTooManyPublishRequests);
    }

    fn create(mgr: &mut SubscriptionManager, session: &NodeId) -> CreateSubscriptionResponse {
        let req = CreateSubscriptionRequest {
            request_header: opcua_types::service_types::RequestHeader::new(NodeId::null(), 1, 0),
            requested_publishing_interval: 50.0,
            requested_lifetime_count: 30,
            requested_max_keep_alive_count: 10,
            max_notifications_per_publish: 0,
            publishing_enabled: true,
            priority: 0,
        };
        mgr.create_subscription(session, &req).unwrap()
    }

    #[test]
    fn modify_subscription_revises_owned_subscription() {
        let mut mgr = manager();
        let session = NodeId::new(0, 1u32);
        let created = create(&mut mgr, &session);

        let req = ModifySubscriptionRequest {
            request_header: opcua_types::service_types::RequestHeader::new(NodeId::null(), 2, 0),
            subscription_id: created.subscription_id,
            requested_publishing_interval: 200.0,
            requested_lifetime_count: 1,
            requested_max_keep_alive_count: 2,
            max_notifications_per_publish: 0,
            priority: 1,
        };
        let resp = mgr.modify_subscription(&session, &req).unwrap();
        assert_eq!(resp.revised_publishing_interval, 200.0);
        assert!(resp.revised_lifetime_count >= resp.revised_max_keep_alive_count * 3);
    }

    #[test]
    fn modify_subscription_rejects_non_owning_session() {
        let mut mgr = manager();
        let session = NodeId::new(0, 1u32);
        let other = NodeId::new(0, 2u32);
        let created = create(&mut mgr, &session);

        let req = ModifySubscriptionRequest {
            request_header: opcua_types::service_types::RequestHeader::new(NodeId::null(), 2, 0),
            subscription_id: created.subscription_id,
            requested_publishing_interval: 200.0,
            requested_lifetime_count: 1,
            requested_max_keep_alive_count: 2,
            max_notifications_per_publish: 0,
            priority: 1,
        };
        let err = mgr.modify_subscription(&other, &req).unwrap_err();
        assert_eq!(err, StatusCode::BadUserAccessDenied);
    }

    #[test]
    fn set_publishing_mode_reports_per_id_status() {
        let mut mgr = manager();
        let session = NodeId::new(0, 1u32);
        let created = create(&mut mgr, &session);

        let results = mgr.set_publishing_mode(&session, false, &[created.subscription_id, 999]);
        assert_eq!(results, vec![StatusCode::Good, StatusCode::BadSubscriptionIdInvalid]);
    }

    #[test]
    fn owning_session_of_tracks_ownership_and_orphaning() {
        let mut mgr = manager();
        let session = NodeId::new(0, 1u32);
        let created = create(&mut mgr, &session);

        assert_eq!(mgr.owning_session_of(created.subscription_id), Some(&session));
        mgr.orphan_all_for_session(&session);
        assert_eq!(mgr.owning_session_of(created.subscription_id), None);
    }

    #[test]
    fn modify_monitored_items_revises_existing_and_rejects_unknown() {
        let mut mgr = manager();
        let session = NodeId::new(0, 1u32);
        let created = create(&mut mgr, &session);
        let store = NullStore;
        let created_items = mgr
            .create_monitored_items(
                created.subscription_id,
                &[MonitoredItemCreateRequest {
                    item_to_monitor: opcua_types::service_types::ReadValueId {
                        node_id: NodeId::new(1, 1u32),
                        attribute_id: 13,
                        ..Default::default()
                    },
                    monitoring_mode: MonitoringMode::Reporting,
                    requested_parameters: opcua_types::service_types::MonitoringParameters {
                        client_handle: 7,
                        sampling_interval: 100.0,
                        queue_size: 2,
                        discard_oldest: true,
                        ..Default::default()
                    },
                }],
                &store,
                &crate::info::IdGenerator::default(),
            )
            .unwrap();
        let item_id = created_items[0].monitored_item_id;

        let results = mgr
            .modify_monitored_items(
                created.subscription_id,
                &[
                    opcua_types::service_types::MonitoredItemModifyRequest {
                        monitored_item_id: item_id,
                        requested_parameters: opcua_types::service_types::MonitoringParameters {
                            client_handle: 7,
                            sampling_interval: 500.0,
                            queue_size: 5,
                            discard_oldest: true,
                            ..Default::default()
                        },
                    },
                    opcua_types::service_types::MonitoredItemModifyRequest {
                        monitored_item_id: 9999,
                        requested_parameters: Default::default(),
                    },
                ],
            )
            .unwrap();
        assert_eq!(results[0].status_code, StatusCode::Good);
        assert_eq!(results[0].revised_sampling_interval, 500.0);
        assert_eq!(results[1].status_code, StatusCode::BadMonitoredItemIdInvalid);
    }
}
