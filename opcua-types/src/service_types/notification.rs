// OPC UA binary codec core — SPDX-License-Identifier: MPL-2.0

//! Notification payloads carried inside `PublishResponse.notification_message`
//! (spec §4.6, §8).

use opcua_macros::{BinaryDecodable, BinaryEncodable};

use crate::{
    data_value::DataValue, date_time::DateTime, extension_object::ExtensionObject,
    status_code::StatusCode, variant::Variant,
};

/// One changed value, tagged with the `client_handle` of the monitored item
/// that produced it.
#[derive(Debug, Clone, PartialEq, Default, BinaryEncodable, BinaryDecodable)]
pub struct MonitoredItemNotification {
    pub client_handle: u32,
    pub value: DataValue,
}

/// A batch of data-change notifications sharing one publish cycle.
#[derive(Debug, Clone, PartialEq, Default, BinaryEncodable, BinaryDecodable)]
pub struct DataChangeNotification {
    pub monitored_items: Option<Vec<MonitoredItemNotification>>,
    /// Per-RFC diagnostic detail, parallel to `monitored_items` when
    /// non-empty.
    pub diagnostic_infos: Option<Vec<crate::diagnostic_info::DiagnosticInfo>>,
}

/// One event occurrence, as the ordered list of field values named by the
/// originating `EventFilter.select_clauses`.
#[derive(Debug, Clone, PartialEq, Default, BinaryEncodable, BinaryDecodable)]
pub struct EventFieldList {
    pub client_handle: u32,
    pub event_fields: Option<Vec<Variant>>,
}

/// A batch of event notifications sharing one publish cycle.
#[derive(Debug, Clone, PartialEq, Default, BinaryEncodable, BinaryDecodable)]
pub struct EventNotificationList {
    pub events: Option<Vec<EventFieldList>>,
}

/// Tells the client the subscription itself changed state (e.g. it is about
/// to be deleted because its keep-alive count ran out).
#[derive(Debug, Clone, PartialEq, Default, BinaryEncodable, BinaryDecodable)]
pub struct StatusChangeNotification {
    pub status: StatusCode,
    pub diagnostic_info: crate::diagnostic_info::DiagnosticInfo,
}

/// One publish cycle's worth of notifications for a single subscription.
/// `notification_data` holds zero or more `ExtensionObject`s, each wrapping
/// a `DataChangeNotification`, `EventNotificationList`, or
/// `StatusChangeNotification` (spec §4.6 step 3; the wrapper lets one
/// message batch heterogeneous notification kinds).
#[derive(Debug, Clone, PartialEq, Default, BinaryEncodable, BinaryDecodable)]
pub struct NotificationMessage {
    /// Monotonically increasing per subscription; gaps signal a dropped
    /// notification to the client (spec §4.6 retransmission queue).
    pub sequence_number: u32,
    pub publish_time: DateTime,
    pub notification_data: Option<Vec<ExtensionObject>>,
}

impl NotificationMessage {
    /// An empty notification, used for keep-alive publishes (spec §4.6 step
    /// 2: no monitored item fired but the keep-alive count expired).
    pub fn keep_alive(sequence_number: u32, publish_time: DateTime) -> Self {
        Self {
            sequence_number,
            publish_time,
            notification_data: None,
        }
    }
}

/// Client acknowledgment of one previously delivered `NotificationMessage`,
/// releasing it from the server's retransmission queue (spec §4.6, §8
/// property 7).
#[derive(Debug, Clone, PartialEq, Default, BinaryEncodable, BinaryDecodable)]
pub struct SubscriptionAcknowledgement {
    pub subscription_id: u32,
    pub sequence_number: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::{BinaryDecodable, BinaryEncodable, DecodingOptions};

    #[test]
    fn keep_alive_has_no_notification_data() {
        let msg = NotificationMessage::keep_alive(1, DateTime::now());
        assert!(msg.notification_data.is_none());
    }

    #[test]
    fn notification_message_round_trip() {
        let data_change = DataChangeNotification {
            monitored_items: Some(vec![MonitoredItemNotification {
                client_handle: 5,
                value: DataValue::new_now(Variant::Int32(42)),
            }]),
            diagnostic_infos: None,
        };
        let wrapped =
            ExtensionObject::from_binary_body(crate::node_id::NodeId::new(0, 123u32), &data_change);
        let msg = NotificationMessage {
            sequence_number: 1,
            publish_time: DateTime::now(),
            notification_data: Some(vec![wrapped]),
        };
        let bytes = msg.encode_to_vec();
        let decoded =
            NotificationMessage::decode(&mut bytes.as_slice(), &DecodingOptions::test()).unwrap();
        assert_eq!(decoded, msg);
    }
}
