// OPC UA binary codec core — SPDX-License-Identifier: MPL-2.0

//! CreateMonitoredItems / ModifyMonitoredItems / SetMonitoringMode /
//! DeleteMonitoredItems messages (spec §4.6).

use opcua_macros::{BinaryDecodable, BinaryEncodable};

use crate::{
    diagnostic_info::DiagnosticInfo,
    extension_object::ExtensionObject,
    node_id::NodeId,
    object_id::ObjectId,
    qualified_name::QualifiedName,
    service_types::{
        enums::{DataChangeTrigger, DeadbandType, MonitoringMode, TimestampsToReturn},
        request_header::{AsRequestHandle, RequestHeader},
        response_header::ResponseHeader,
    },
    status_code::StatusCode,
};

/// Data-change notification filter (spec §4.6): a `MonitoredItem`'s
/// `MonitoringParameters.filter` decodes to this when monitoring a plain
/// data-value attribute. Carried on the wire as an `ExtensionObject`.
#[derive(Debug, Clone, Copy, PartialEq, Default, BinaryEncodable, BinaryDecodable)]
pub struct DataChangeFilter {
    pub trigger: DataChangeTrigger,
    pub deadband_type: DeadbandType,
    /// Absolute units or percent of the node's `EURange`, per `deadband_type`.
    /// Ignored when `deadband_type` is `None`.
    pub deadband_value: f64,
}

impl DataChangeFilter {
    pub fn from_extension_object(obj: &ExtensionObject) -> Result<Option<Self>, crate::encoding::Error> {
        if obj.is_null() {
            return Ok(None);
        }
        obj.decode_body::<DataChangeFilter>().map(Some)
    }

    pub fn to_extension_object(&self) -> ExtensionObject {
        ExtensionObject::from_binary_body(
            NodeId::from(ObjectId::DataChangeFilter_Encoding_DefaultBinary),
            self,
        )
    }
}

/// Filter-independent part of a monitored item's sampling configuration
/// (spec §4.6). The `filter` itself is service-specific (deadband, event
/// filter, ...) and travels opaquely as an `ExtensionObject`.
#[derive(Debug, Clone, PartialEq, Default, BinaryEncodable, BinaryDecodable)]
pub struct MonitoringParameters {
    /// Client-assigned handle returned in every notification produced by
    /// this item, so the client can route it without a node id lookup.
    pub client_handle: u32,
    /// Requested interval between samples, in milliseconds. The server may
    /// revise this, typically up to its minimum supported rate.
    pub sampling_interval: f64,
    /// Service-specific filter, e.g. a `DataChangeFilter` or `EventFilter`.
    pub filter: ExtensionObject,
    /// Notifications buffered per publish cycle before the oldest is
    /// discarded (or the newest, depending on `discard_oldest`).
    pub queue_size: u32,
    /// When the queue is full: drop the oldest entry (true) or refuse the
    /// newest (false).
    pub discard_oldest: bool,
}

/// One item to monitor, named by node/attribute/index-range, together with
/// its initial `MonitoringParameters`.
#[derive(Debug, Clone, PartialEq, Default, BinaryEncodable, BinaryDecodable)]
pub struct MonitoredItemCreateRequest {
    /// Node, attribute id, and (for array values) index range identifying
    /// the value to sample.
    pub item_to_monitor: ReadValueId,
    /// Reporting vs. sampling-only vs. disabled.
    pub monitoring_mode: MonitoringMode,
    pub requested_parameters: MonitoringParameters,
}

/// Identifies a single attribute of a single node, optionally narrowed to a
/// sub-range of an array value. Shared by Read and the monitored-item
/// services.
#[derive(Debug, Clone, PartialEq, Default, BinaryEncodable, BinaryDecodable)]
pub struct ReadValueId {
    pub node_id: NodeId,
    /// Numeric attribute id, e.g. `Value` = 13.
    pub attribute_id: u32,
    /// OPC UA index-range syntax (`"1:2"`, `"0"`, ...), empty for the whole
    /// value.
    pub index_range: crate::string::UAString,
    /// Only meaningful when `attribute_id == Value` and the node has a
    /// structured data type.
    pub data_encoding: QualifiedName,
}

#[derive(Debug, Clone, PartialEq, Default, BinaryEncodable, BinaryDecodable)]
pub struct MonitoredItemCreateResult {
    pub status_code: StatusCode,
    /// Server-assigned id referenced by later modify/delete/set-mode calls.
    pub monitored_item_id: u32,
    /// Sampling interval actually applied.
    pub revised_sampling_interval: f64,
    pub revised_queue_size: u32,
    /// Echoes the filter back, revised if the server adjusted it (e.g. a
    /// deadband clamped to a supported range).
    pub filter_result: ExtensionObject,
}

#[derive(Debug, Clone, PartialEq, Default, BinaryEncodable, BinaryDecodable)]
pub struct CreateMonitoredItemsRequest {
    pub request_header: RequestHeader,
    pub subscription_id: u32,
    pub timestamps_to_return: TimestampsToReturn,
    pub items_to_create: Option<Vec<MonitoredItemCreateRequest>>,
}

impl AsRequestHandle for CreateMonitoredItemsRequest {
    fn request_handle(&self) -> u32 {
        self.request_header.request_handle
    }
}

#[derive(Debug, Clone, PartialEq, Default, BinaryEncodable, BinaryDecodable)]
pub struct CreateMonitoredItemsResponse {
    pub response_header: ResponseHeader,
    /// One result per entry in `items_to_create`, same order.
    pub results: Option<Vec<MonitoredItemCreateResult>>,
    pub diagnostic_infos: Option<Vec<DiagnosticInfo>>,
}

impl CreateMonitoredItemsResponse {
    pub fn new(request: &CreateMonitoredItemsRequest, results: Vec<MonitoredItemCreateResult>) -> Self {
        Self {
            response_header: ResponseHeader::new_good(request),
            results: Some(results),
            diagnostic_infos: None,
        }
    }
}

/// One item's new `MonitoringParameters`, by id.
#[derive(Debug, Clone, PartialEq, Default, BinaryEncodable, BinaryDecodable)]
pub struct MonitoredItemModifyRequest {
    pub monitored_item_id: u32,
    pub requested_parameters: MonitoringParameters,
}

#[derive(Debug, Clone, PartialEq, Default, BinaryEncodable, BinaryDecodable)]
pub struct MonitoredItemModifyResult {
    pub status_code: StatusCode,
    pub revised_sampling_interval: f64,
    pub revised_queue_size: u32,
    pub filter_result: ExtensionObject,
}

#[derive(Debug, Clone, PartialEq, Default, BinaryEncodable, BinaryDecodable)]
pub struct ModifyMonitoredItemsRequest {
    pub request_header: RequestHeader,
    pub subscription_id: u32,
    pub timestamps_to_return: TimestampsToReturn,
    pub items_to_modify: Option<Vec<MonitoredItemModifyRequest>>,
}

impl AsRequestHandle for ModifyMonitoredItemsRequest {
    fn request_handle(&self) -> u32 {
        self.request_header.request_handle
    }
}

#[derive(Debug, Clone, PartialEq, Default, BinaryEncodable, BinaryDecodable)]
pub struct ModifyMonitoredItemsResponse {
    pub response_header: ResponseHeader,
    pub results: Option<Vec<MonitoredItemModifyResult>>,
    pub diagnostic_infos: Option<Vec<DiagnosticInfo>>,
}

#[derive(Debug, Clone, PartialEq, Default, BinaryEncodable, BinaryDecodable)]
pub struct SetMonitoringModeRequest {
    pub request_header: RequestHeader,
    pub subscription_id: u32,
    pub monitoring_mode: MonitoringMode,
    pub monitored_item_ids: Option<Vec<u32>>,
}

impl AsRequestHandle for SetMonitoringModeRequest {
    fn request_handle(&self) -> u32 {
        self.request_header.request_handle
    }
}

#[derive(Debug, Clone, PartialEq, Default, BinaryEncodable, BinaryDecodable)]
pub struct SetMonitoringModeResponse {
    pub response_header: ResponseHeader,
    /// One status per entry in `monitored_item_ids`, same order.
    pub results: Option<Vec<StatusCode>>,
    pub diagnostic_infos: Option<Vec<DiagnosticInfo>>,
}

#[derive(Debug, Clone, PartialEq, Default, BinaryEncodable, BinaryDecodable)]
pub struct DeleteMonitoredItemsRequest {
    pub request_header: RequestHeader,
    pub subscription_id: u32,
    pub monitored_item_ids: Option<Vec<u32>>,
}

impl AsRequestHandle for DeleteMonitoredItemsRequest {
    fn request_handle(&self) -> u32 {
        self.request_header.request_handle
    }
}

#[derive(Debug, Clone, PartialEq, Default, BinaryEncodable, BinaryDecodable)]
pub struct DeleteMonitoredItemsResponse {
    pub response_header: ResponseHeader,
    pub results: Option<Vec<StatusCode>>,
    pub diagnostic_infos: Option<Vec<DiagnosticInfo>>,
}

impl DeleteMonitoredItemsResponse {
    pub fn new(request: &DeleteMonitoredItemsRequest, results: Vec<StatusCode>) -> Self {
        Self {
            response_header: ResponseHeader::new_good(request),
            results: Some(results),
            diagnostic_infos: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::{BinaryDecodable, BinaryEncodable, DecodingOptions};

    #[test]
    fn create_monitored_items_round_trip() {
        let req = CreateMonitoredItemsRequest {
            request_header: RequestHeader::new(NodeId::null(), 1, 0),
            subscription_id: 9,
            timestamps_to_return: TimestampsToReturn::Both,
            items_to_create: Some(vec![MonitoredItemCreateRequest {
                item_to_monitor: ReadValueId {
                    node_id: NodeId::null(),
                    attribute_id: 13,
                    ..Default::default()
                },
                monitoring_mode: MonitoringMode::Reporting,
                requested_parameters: MonitoringParameters {
                    client_handle: 1,
                    sampling_interval: 100.0,
                    queue_size: 10,
                    discard_oldest: true,
                    ..Default::default()
                },
            }]),
        };
        let bytes = req.encode_to_vec();
        let decoded = CreateMonitoredItemsRequest::decode(&mut bytes.as_slice(), &DecodingOptions::test())
            .unwrap();
        assert_eq!(decoded, req);
    }

    #[test]
    fn data_change_filter_round_trips_through_extension_object() {
        let filter = DataChangeFilter {
            trigger: DataChangeTrigger::StatusValue,
            deadband_type: DeadbandType::Percent,
            deadband_value: 2.5,
        };
        let obj = filter.to_extension_object();
        let decoded = DataChangeFilter::from_extension_object(&obj).unwrap().unwrap();
        assert_eq!(decoded, filter);
    }

    #[test]
    fn null_extension_object_has_no_data_change_filter() {
        assert!(DataChangeFilter::from_extension_object(&ExtensionObject::null())
            .unwrap()
            .is_none());
    }

    #[test]
    fn delete_monitored_items_response_preserves_order() {
        let req = DeleteMonitoredItemsRequest {
            request_header: RequestHeader::new(NodeId::null(), 2, 0),
            subscription_id: 1,
            monitored_item_ids: Some(vec![1, 2, 3]),
        };
        let resp = DeleteMonitoredItemsResponse::new(
            &req,
            vec![StatusCode::Good, StatusCode::BadMonitoredItemIdInvalid, StatusCode::Good],
        );
        assert_eq!(resp.results.unwrap().len(), 3);
    }
}
