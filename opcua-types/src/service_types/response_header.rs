// OPC UA binary codec core — SPDX-License-Identifier: MPL-2.0

//! `ResponseHeader`, present at the front of every service response (spec §4.5).

use opcua_macros::{BinaryDecodable, BinaryEncodable};

use crate::{
    date_time::DateTime, diagnostic_info::DiagnosticInfo, extension_object::ExtensionObject,
    status_code::StatusCode, string::UAString,
};

use super::request_header::AsRequestHandle;

/// Common envelope carried by every service response.
#[derive(Debug, Clone, PartialEq, BinaryEncodable, BinaryDecodable)]
pub struct ResponseHeader {
    /// Server clock time the response was sent.
    pub timestamp: DateTime,
    /// Echoes the request's `request_handle`.
    pub request_handle: u32,
    /// Overall outcome of the service call.
    pub service_result: StatusCode,
    /// Populated according to the request's `return_diagnostics` mask.
    pub service_diagnostics: DiagnosticInfo,
    /// String table that `service_diagnostics` (and any operation-level
    /// diagnostics returned alongside this response) index into.
    pub string_table: Option<Vec<UAString>>,
    /// Reserved extension point, unused by the core services.
    pub additional_header: ExtensionObject,
}

impl Default for ResponseHeader {
    fn default() -> Self {
        Self {
            timestamp: DateTime::now(),
            request_handle: 0,
            service_result: StatusCode::Good,
            service_diagnostics: DiagnosticInfo::default(),
            string_table: None,
            additional_header: ExtensionObject::null(),
        }
    }
}

impl ResponseHeader {
    /// A `Good` response echoing `request`'s handle, timestamped now.
    pub fn new_good(request: &impl AsRequestHandle) -> Self {
        Self {
            request_handle: request.request_handle(),
            ..Default::default()
        }
    }

    /// A response carrying `service_result` and echoing `request`'s handle,
    /// timestamped now.
    pub fn new_service_result(request: &impl AsRequestHandle, service_result: StatusCode) -> Self {
        Self {
            request_handle: request.request_handle(),
            service_result,
            ..Default::default()
        }
    }

    /// Like [`Self::new_service_result`] but with an explicit timestamp,
    /// used when assembling a response outside the normal request/response
    /// turnaround (e.g. a queued Publish response released later).
    pub fn new_timestamped_service_result(
        timestamp: DateTime,
        request: &impl AsRequestHandle,
        service_result: StatusCode,
    ) -> Self {
        Self {
            timestamp,
            request_handle: request.request_handle(),
            service_result,
            ..Default::default()
        }
    }

    /// A response with no associated request, used for service faults where
    /// even the header couldn't be decoded.
    pub fn null() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::{BinaryDecodable, BinaryEncodable, DecodingOptions};

    struct Req(u32);
    impl AsRequestHandle for Req {
        fn request_handle(&self) -> u32 {
            self.0
        }
    }

    #[test]
    fn new_good_echoes_handle() {
        let header = ResponseHeader::new_good(&Req(7));
        assert_eq!(header.request_handle, 7);
        assert_eq!(header.service_result, StatusCode::Good);
    }

    #[test]
    fn round_trip() {
        let header = ResponseHeader::new_service_result(&Req(1), StatusCode::BadTimeout);
        let bytes = header.encode_to_vec();
        let decoded =
            ResponseHeader::decode(&mut bytes.as_slice(), &DecodingOptions::test()).unwrap();
        assert_eq!(decoded, header);
    }
}
