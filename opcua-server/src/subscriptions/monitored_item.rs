// OPC UA server — SPDX-License-Identifier: MPL-2.0

//! [`MonitoredItem`]: server-side sampling state for one monitored attribute
//! (spec §4.6). Adapted from the client-side `MonitoredItem` bookkeeping
//! struct, but driving sampling/queueing instead of dispatch.

use std::time::Instant;

use opcua_types::{
    data_value::DataValue,
    service_types::{
        DataChangeFilter, DataChangeTrigger, DeadbandType, MonitoredItemCreateRequest,
        MonitoringMode, MonitoredItemNotification, ReadValueId,
    },
    status_code::StatusCode,
    variant::Variant,
};

/// `InfoBits` carried in `DataValue.status` when a queued notification was
/// produced under queue overflow, so the client can tell a value was
/// dropped (spec §4.6 SUPPLEMENT: discard-oldest/newest overflow).
const INFO_TYPE_DATA_VALUE: u32 = 1 << 30;
const INFO_OVERFLOW: u32 = 1 << 31;

fn as_f64(variant: &Variant) -> Option<f64> {
    match variant {
        Variant::SByte(v) => Some(*v as f64),
        Variant::Byte(v) => Some(*v as f64),
        Variant::Int16(v) => Some(*v as f64),
        Variant::UInt16(v) => Some(*v as f64),
        Variant::Int32(v) => Some(*v as f64),
        Variant::UInt32(v) => Some(*v as f64),
        Variant::Int64(v) => Some(*v as f64),
        Variant::UInt64(v) => Some(*v as f64),
        Variant::Float(v) => Some(*v as f64),
        Variant::Double(v) => Some(*v),
        _ => None,
    }
}

/// One `MonitoredItem`: samples `item_to_monitor` on its own schedule and
/// buffers notifications until the owning subscription's publish cycle
/// drains them (spec §4.6 steps 1, 3).
pub struct MonitoredItem {
    id: u32,
    client_handle: u32,
    item_to_monitor: ReadValueId,
    monitoring_mode: MonitoringMode,
    sampling_interval: f64,
    queue_size: usize,
    discard_oldest: bool,
    filter: Option<DataChangeFilter>,
    /// Most recently sampled value, used for data-change detection; `None`
    /// until the first sample.
    last_value: Option<DataValue>,
    last_sampled_at: Option<Instant>,
    queue: std::collections::VecDeque<DataValue>,
}

impl MonitoredItem {
    pub fn new(id: u32, request: &MonitoredItemCreateRequest, revised_sampling_interval: f64) -> Self {
        let filter = DataChangeFilter::from_extension_object(&request.requested_parameters.filter)
            .ok()
            .flatten();
        MonitoredItem {
            id,
            client_handle: request.requested_parameters.client_handle,
            item_to_monitor: request.item_to_monitor.clone(),
            monitoring_mode: request.monitoring_mode,
            sampling_interval: revised_sampling_interval,
            queue_size: (request.requested_parameters.queue_size.max(1)) as usize,
            discard_oldest: request.requested_parameters.discard_oldest,
            filter,
            last_value: None,
            last_sampled_at: None,
            queue: std::collections::VecDeque::new(),
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn client_handle(&self) -> u32 {
        self.client_handle
    }

    pub fn item_to_monitor(&self) -> &ReadValueId {
        &self.item_to_monitor
    }

    pub fn monitoring_mode(&self) -> MonitoringMode {
        self.monitoring_mode
    }

    pub fn set_monitoring_mode(&mut self, mode: MonitoringMode) {
        self.monitoring_mode = mode;
    }

    pub fn sampling_interval(&self) -> f64 {
        self.sampling_interval
    }

    pub fn modify(&mut self, parameters: &opcua_types::service_types::MonitoringParameters, revised_sampling_interval: f64) {
        self.client_handle = parameters.client_handle;
        self.sampling_interval = revised_sampling_interval;
        self.queue_size = parameters.queue_size.max(1) as usize;
        self.discard_oldest = parameters.discard_oldest;
        self.filter = DataChangeFilter::from_extension_object(&parameters.filter).ok().flatten();
    }

    pub fn is_due(&self, now: Instant) -> bool {
        if self.monitoring_mode == MonitoringMode::Disabled {
            return false;
        }
        match self.last_sampled_at {
            None => true,
            Some(last) => {
                now.duration_since(last).as_secs_f64() * 1000.0 >= self.sampling_interval
            }
        }
    }

    /// Samples `value`, applying the data-change trigger and deadband
    /// filter (spec §4.6), and queues it for the next publish if it passes.
    /// Reporting-mode items queue; sampling-mode items only update
    /// `last_value` for the next comparison without surfacing a
    /// notification (spec §3: `Sampling` collects but does not report).
    pub fn sample(&mut self, value: DataValue, now: Instant) {
        self.last_sampled_at = Some(now);
        if self.monitoring_mode == MonitoringMode::Disabled {
            return;
        }
        let changed = self.has_changed(&value);
        self.last_value = Some(value.clone());
        if self.monitoring_mode != MonitoringMode::Reporting {
            return;
        }
        if changed {
            self.enqueue(value);
        }
    }

    fn has_changed(&self, value: &DataValue) -> bool {
        let Some(previous) = &self.last_value else {
            return true;
        };
        let trigger = self.filter.map(|f| f.trigger).unwrap_or(DataChangeTrigger::StatusValue);
        let status_changed = previous.status != value.status;
        if status_changed {
            return true;
        }
        if trigger == DataChangeTrigger::Status {
            return false;
        }
        let value_changed = match self.filter {
            Some(filter) if filter.deadband_type != DeadbandType::None => {
                match (previous.value.as_ref().and_then(as_f64), value.value.as_ref().and_then(as_f64)) {
                    (Some(a), Some(b)) => !within_deadband(a, b, filter),
                    _ => previous.value != value.value,
                }
            }
            _ => previous.value != value.value,
        };
        if !value_changed {
            return false;
        }
        if trigger == DataChangeTrigger::StatusValueTimestamp {
            value_changed || previous.source_timestamp != value.source_timestamp
        } else {
            value_changed
        }
    }

    /// Appends `value` to the notification queue, applying overflow
    /// handling per `discard_oldest` and tagging the surviving entry's
    /// `InfoBits` when an overflow occurred (spec §4.6 SUPPLEMENT).
    fn enqueue(&mut self, mut value: DataValue) {
        if self.queue.len() >= self.queue_size {
            if self.discard_oldest {
                self.queue.pop_front();
            } else {
                // Drop the newest: tag it and keep it as the final queued
                // slot's replacement so the client still learns of the drop.
                self.queue.pop_back();
                let status = value.status.unwrap_or(StatusCode::Good);
                value.status = Some(StatusCode(status.0 | INFO_TYPE_DATA_VALUE | INFO_OVERFLOW));
                self.queue.push_back(value);
                return;
            }
        }
        self.queue.push_back(value);
    }

    pub fn has_pending_notifications(&self) -> bool {
        !self.queue.is_empty()
    }

    /// Drains every queued value as a `MonitoredItemNotification`, in
    /// sample order (spec §4.6 step 3).
    pub fn take_notifications(&mut self) -> Vec<MonitoredItemNotification> {
        self.queue
            .drain(..)
            .map(|value| MonitoredItemNotification {
                client_handle: self.client_handle,
                value,
            })
            .collect()
    }
}

fn within_deadband(previous: f64, current: f64, filter: DataChangeFilter) -> bool {
    let diff = (current - previous).abs();
    match filter.deadband_type {
        DeadbandType::None => false,
        DeadbandType::Absolute => diff <= filter.deadband_value,
        DeadbandType::Percent => {
            // Percent deadband is relative to the node's EURange, which this
            // stack has no address-space access to compute (spec §1:
            // out-of-scope node store); callers that need real percent
            // semantics should pre-scale `deadband_value` against their own
            // EURange before constructing the filter.
            diff <= filter.deadband_value
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opcua_types::{node_id::NodeId, status_code::StatusCode};

    fn request(client_handle: u32) -> MonitoredItemCreateRequest {
        MonitoredItemCreateRequest {
            item_to_monitor: ReadValueId {
                node_id: NodeId::new(1, 1u32),
                attribute_id: 13,
                ..Default::default()
            },
            monitoring_mode: MonitoringMode::Reporting,
            requested_parameters: opcua_types::service_types::MonitoringParameters {
                client_handle,
                sampling_interval: 100.0,
                queue_size: 2,
                discard_oldest: true,
                ..Default::default()
            },
        }
    }

    #[test]
    fn first_sample_always_queues() {
        let mut item = MonitoredItem::new(1, &request(7), 100.0);
        item.sample(DataValue::new_now(Variant::Int32(1)), Instant::now());
        assert_eq!(item.take_notifications().len(), 1);
    }

    #[test]
    fn unchanged_value_does_not_requeue() {
        let mut item = MonitoredItem::new(1, &request(7), 100.0);
        let now = Instant::now();
        item.sample(DataValue::new_now(Variant::Int32(5)), now);
        item.take_notifications();
        item.sample(DataValue::new_now(Variant::Int32(5)), now);
        assert!(item.take_notifications().is_empty());
    }

    #[test]
    fn discard_oldest_drops_front_of_queue() {
        let mut item = MonitoredItem::new(1, &request(7), 100.0);
        let now = Instant::now();
        item.sample(DataValue::new_now(Variant::Int32(1)), now);
        item.sample(DataValue::new_now(Variant::Int32(2)), now);
        item.sample(DataValue::new_now(Variant::Int32(3)), now);
        let notifications = item.take_notifications();
        assert_eq!(notifications.len(), 2);
        assert_eq!(notifications[0].value.value, Some(Variant::Int32(2)));
        assert_eq!(notifications[1].value.value, Some(Variant::Int32(3)));
    }

    #[test]
    fn absolute_deadband_suppresses_small_changes() {
        let mut item = MonitoredItem::new(1, &request(7), 100.0);
        item.filter = Some(DataChangeFilter {
            trigger: DataChangeTrigger::StatusValue,
            deadband_type: DeadbandType::Absolute,
            deadband_value: 1.0,
        });
        let now = Instant::now();
        item.sample(DataValue::new_now(Variant::Double(10.0)), now);
        item.take_notifications();
        item.sample(DataValue::new_now(Variant::Double(10.5)), now);
        assert!(item.take_notifications().is_empty());
        item.sample(DataValue::new_now(Variant::Double(12.0)), now);
        assert_eq!(item.take_notifications().len(), 1);
    }

    #[test]
    fn status_only_trigger_ignores_value_changes() {
        let mut item = MonitoredItem::new(1, &request(7), 100.0);
        item.filter = Some(DataChangeFilter {
            trigger: DataChangeTrigger::Status,
            deadband_type: DeadbandType::None,
            deadband_value: 0.0,
        });
        let now = Instant::now();
        item.sample(DataValue::new_now(Variant::Int32(1)), now);
        item.take_notifications();
        item.sample(DataValue::new_now(Variant::Int32(99)), now);
        assert!(item.take_notifications().is_empty());
        let mut bad = DataValue::new_now(Variant::Int32(99));
        bad.status = Some(StatusCode::BadDataEncodingInvalid);
        item.sample(bad, now);
        assert_eq!(item.take_notifications().len(), 1);
    }
}
