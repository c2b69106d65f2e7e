// OPC UA binary codec core — SPDX-License-Identifier: MPL-2.0

//! CreateSubscription / ModifySubscription / SetPublishingMode /
//! DeleteSubscriptions / TransferSubscriptions messages (spec §4.6, §7).

use opcua_macros::{BinaryDecodable, BinaryEncodable};

use crate::{
    diagnostic_info::DiagnosticInfo,
    service_types::{
        request_header::{AsRequestHandle, RequestHeader},
        response_header::ResponseHeader,
    },
    status_code::StatusCode,
};

/// Creates a `Subscription` on the session the request arrives on (spec
/// §4.6 step 1).
#[derive(Debug, Clone, PartialEq, Default, BinaryEncodable, BinaryDecodable)]
pub struct CreateSubscriptionRequest {
    pub request_header: RequestHeader,
    /// Requested time between publish cycles, in milliseconds.
    pub requested_publishing_interval: f64,
    /// Number of publishing cycles with no due notification before the
    /// server sends a keep-alive `NotificationMessage`.
    pub requested_lifetime_count: u32,
    /// Number of consecutive keep-alives with no queued `PublishRequest`
    /// before the server gives up on the subscription.
    pub requested_max_keep_alive_count: u32,
    /// Maximum notifications queued before the `PublishRequest` backlog is
    /// considered exhausted and the subscription deleted.
    pub max_notifications_per_publish: u32,
    /// Whether the subscription starts in the publishing or suspended
    /// state.
    pub publishing_enabled: bool,
    /// Relative priority among a session's subscriptions when more than one
    /// has notifications ready in the same publish cycle.
    pub priority: u8,
}

impl AsRequestHandle for CreateSubscriptionRequest {
    fn request_handle(&self) -> u32 {
        self.request_header.request_handle
    }
}

#[derive(Debug, Clone, PartialEq, Default, BinaryEncodable, BinaryDecodable)]
pub struct CreateSubscriptionResponse {
    pub response_header: ResponseHeader,
    /// Server-assigned id used by every later subscription/monitored-item
    /// call.
    pub subscription_id: u32,
    pub revised_publishing_interval: f64,
    pub revised_lifetime_count: u32,
    pub revised_max_keep_alive_count: u32,
}

impl CreateSubscriptionResponse {
    pub fn new(
        request: &CreateSubscriptionRequest,
        subscription_id: u32,
        revised_publishing_interval: f64,
        revised_lifetime_count: u32,
        revised_max_keep_alive_count: u32,
    ) -> Self {
        Self {
            response_header: ResponseHeader::new_good(request),
            subscription_id,
            revised_publishing_interval,
            revised_lifetime_count,
            revised_max_keep_alive_count,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, BinaryEncodable, BinaryDecodable)]
pub struct ModifySubscriptionRequest {
    pub request_header: RequestHeader,
    pub subscription_id: u32,
    pub requested_publishing_interval: f64,
    pub requested_lifetime_count: u32,
    pub requested_max_keep_alive_count: u32,
    pub max_notifications_per_publish: u32,
    pub priority: u8,
}

impl AsRequestHandle for ModifySubscriptionRequest {
    fn request_handle(&self) -> u32 {
        self.request_header.request_handle
    }
}

#[derive(Debug, Clone, PartialEq, Default, BinaryEncodable, BinaryDecodable)]
pub struct ModifySubscriptionResponse {
    pub response_header: ResponseHeader,
    pub revised_publishing_interval: f64,
    pub revised_lifetime_count: u32,
    pub revised_max_keep_alive_count: u32,
}

/// Suspends or resumes publishing for a set of subscriptions without
/// deleting them (spec §4.6).
#[derive(Debug, Clone, PartialEq, Default, BinaryEncodable, BinaryDecodable)]
pub struct SetPublishingModeRequest {
    pub request_header: RequestHeader,
    pub publishing_enabled: bool,
    pub subscription_ids: Option<Vec<u32>>,
}

impl AsRequestHandle for SetPublishingModeRequest {
    fn request_handle(&self) -> u32 {
        self.request_header.request_handle
    }
}

#[derive(Debug, Clone, PartialEq, Default, BinaryEncodable, BinaryDecodable)]
pub struct SetPublishingModeResponse {
    pub response_header: ResponseHeader,
    /// One status per entry in `subscription_ids`, same order.
    pub results: Option<Vec<StatusCode>>,
    pub diagnostic_infos: Option<Vec<DiagnosticInfo>>,
}

#[derive(Debug, Clone, PartialEq, Default, BinaryEncodable, BinaryDecodable)]
pub struct DeleteSubscriptionsRequest {
    pub request_header: RequestHeader,
    pub subscription_ids: Option<Vec<u32>>,
}

impl AsRequestHandle for DeleteSubscriptionsRequest {
    fn request_handle(&self) -> u32 {
        self.request_header.request_handle
    }
}

#[derive(Debug, Clone, PartialEq, Default, BinaryEncodable, BinaryDecodable)]
pub struct DeleteSubscriptionsResponse {
    pub response_header: ResponseHeader,
    pub results: Option<Vec<StatusCode>>,
    pub diagnostic_infos: Option<Vec<DiagnosticInfo>>,
}

impl DeleteSubscriptionsResponse {
    pub fn new(request: &DeleteSubscriptionsRequest, results: Vec<StatusCode>) -> Self {
        Self {
            response_header: ResponseHeader::new_good(request),
            results: Some(results),
            diagnostic_infos: None,
        }
    }
}

/// Moves a set of subscriptions, created on one session, to the session
/// this request arrives on (spec §7 session transfer, E6).
#[derive(Debug, Clone, PartialEq, Default, BinaryEncodable, BinaryDecodable)]
pub struct TransferSubscriptionsRequest {
    pub request_header: RequestHeader,
    pub subscription_ids: Option<Vec<u32>>,
    /// If true, the server re-sends every queued notification the new
    /// session hasn't acknowledged; if false, only notifications queued
    /// after the transfer are sent.
    pub send_initial_values: bool,
}

impl AsRequestHandle for TransferSubscriptionsRequest {
    fn request_handle(&self) -> u32 {
        self.request_header.request_handle
    }
}

/// Per-subscription outcome of a transfer: success plus the sequence
/// numbers of any notifications still queued and unacknowledged.
#[derive(Debug, Clone, PartialEq, Default, BinaryEncodable, BinaryDecodable)]
pub struct TransferResult {
    pub status_code: StatusCode,
    pub available_sequence_numbers: Option<Vec<u32>>,
}

#[derive(Debug, Clone, PartialEq, Default, BinaryEncodable, BinaryDecodable)]
pub struct TransferSubscriptionsResponse {
    pub response_header: ResponseHeader,
    pub results: Option<Vec<TransferResult>>,
    pub diagnostic_infos: Option<Vec<DiagnosticInfo>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        encoding::{BinaryDecodable, BinaryEncodable, DecodingOptions},
        node_id::NodeId,
    };

    #[test]
    fn create_subscription_round_trip() {
        let req = CreateSubscriptionRequest {
            request_header: RequestHeader::new(NodeId::null(), 1, 0),
            requested_publishing_interval: 500.0,
            requested_lifetime_count: 60,
            requested_max_keep_alive_count: 10,
            max_notifications_per_publish: 0,
            publishing_enabled: true,
            priority: 0,
        };
        let bytes = req.encode_to_vec();
        let decoded =
            CreateSubscriptionRequest::decode(&mut bytes.as_slice(), &DecodingOptions::test())
                .unwrap();
        assert_eq!(decoded, req);
    }

    #[test]
    fn transfer_result_carries_sequence_numbers() {
        let result = TransferResult {
            status_code: StatusCode::Good,
            available_sequence_numbers: Some(vec![1, 2, 3]),
        };
        let bytes = result.encode_to_vec();
        let decoded = TransferResult::decode(&mut bytes.as_slice(), &DecodingOptions::test()).unwrap();
        assert_eq!(decoded, result);
    }
}
