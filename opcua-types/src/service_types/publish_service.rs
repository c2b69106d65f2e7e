// OPC UA binary codec core — SPDX-License-Identifier: MPL-2.0

//! Publish / Republish messages (spec §4.6, §8 property 7).

use opcua_macros::{BinaryDecodable, BinaryEncodable};

use crate::{
    diagnostic_info::DiagnosticInfo,
    service_types::{
        notification::NotificationMessage,
        request_header::{AsRequestHandle, RequestHeader},
        response_header::ResponseHeader,
        subscription_service::SubscriptionAcknowledgement,
    },
    status_code::StatusCode,
};

/// A standing request for notifications, parked by the server until a
/// subscription has something to report or its keep-alive count expires
/// (spec §4.6 step 2). Clients normally keep several of these queued per
/// session.
#[derive(Debug, Clone, PartialEq, Default, BinaryEncodable, BinaryDecodable)]
pub struct PublishRequest {
    /// Not bound to a specific subscription: the server picks whichever of
    /// the session's subscriptions is most in need of publishing.
    pub request_header: RequestHeader,
    /// Notifications the client has received and processed since its last
    /// Publish, releasing them from the server's retransmission queue.
    pub subscription_acknowledgements: Option<Vec<SubscriptionAcknowledgement>>,
}

impl AsRequestHandle for PublishRequest {
    fn request_handle(&self) -> u32 {
        self.request_header.request_handle
    }
}

#[derive(Debug, Clone, PartialEq, Default, BinaryEncodable, BinaryDecodable)]
pub struct PublishResponse {
    pub response_header: ResponseHeader,
    /// The subscription that produced `notification_message`.
    pub subscription_id: u32,
    /// Sequence numbers still in the retransmission queue after this
    /// response, for the client to Republish if any went missing.
    pub available_sequence_numbers: Option<Vec<u32>>,
    /// True if another subscription on this session already has
    /// notifications ready, so the client should keep a `PublishRequest`
    /// outstanding without waiting for its own publishing interval.
    pub more_notifications: bool,
    pub notification_message: NotificationMessage,
    /// Per-acknowledgement outcome, parallel to the request's
    /// `subscription_acknowledgements`.
    pub results: Option<Vec<StatusCode>>,
    pub diagnostic_infos: Option<Vec<DiagnosticInfo>>,
}

impl PublishResponse {
    /// Build a `Good` response carrying `notification_message` for
    /// `subscription_id`.
    pub fn new(
        request: &PublishRequest,
        subscription_id: u32,
        notification_message: NotificationMessage,
        available_sequence_numbers: Vec<u32>,
    ) -> Self {
        Self {
            response_header: ResponseHeader::new_good(request),
            subscription_id,
            available_sequence_numbers: Some(available_sequence_numbers),
            more_notifications: false,
            notification_message,
            results: None,
            diagnostic_infos: None,
        }
    }
}

/// Asks the server to re-send one notification still held in a
/// subscription's retransmission queue, after the client noticed a gap in
/// `sequence_number`s (spec §8 property 7).
#[derive(Debug, Clone, PartialEq, Default, BinaryEncodable, BinaryDecodable)]
pub struct RepublishRequest {
    pub request_header: RequestHeader,
    pub subscription_id: u32,
    pub retransmit_sequence_number: u32,
}

impl AsRequestHandle for RepublishRequest {
    fn request_handle(&self) -> u32 {
        self.request_header.request_handle
    }
}

#[derive(Debug, Clone, PartialEq, Default, BinaryEncodable, BinaryDecodable)]
pub struct RepublishResponse {
    pub response_header: ResponseHeader,
    pub notification_message: NotificationMessage,
}

impl RepublishResponse {
    /// `BadMessageNotAvailable` when the requested sequence number has
    /// already been discarded from the retransmission queue.
    pub fn not_available(request: &RepublishRequest) -> Self {
        Self {
            response_header: crate::service_types::response_header::ResponseHeader::new_service_result(
                request,
                StatusCode::BadMessageNotAvailable,
            ),
            notification_message: NotificationMessage::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        date_time::DateTime,
        encoding::{BinaryDecodable, BinaryEncodable, DecodingOptions},
        node_id::NodeId,
    };

    #[test]
    fn publish_round_trip() {
        let req = PublishRequest {
            request_header: RequestHeader::new(NodeId::null(), 1, 60_000),
            subscription_acknowledgements: Some(vec![SubscriptionAcknowledgement {
                subscription_id: 1,
                sequence_number: 3,
            }]),
        };
        let resp = PublishResponse::new(
            &req,
            1,
            NotificationMessage::keep_alive(4, DateTime::now()),
            vec![4],
        );
        let bytes = resp.encode_to_vec();
        let decoded = PublishResponse::decode(&mut bytes.as_slice(), &DecodingOptions::test()).unwrap();
        assert_eq!(decoded, resp);
    }

    #[test]
    fn republish_not_available_carries_bad_status() {
        let req = RepublishRequest {
            request_header: RequestHeader::new(NodeId::null(), 2, 0),
            subscription_id: 1,
            retransmit_sequence_number: 99,
        };
        let resp = RepublishResponse::not_available(&req);
        assert_eq!(resp.response_header.service_result, StatusCode::BadMessageNotAvailable);
    }
}
