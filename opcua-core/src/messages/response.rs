// OPC UA binary codec core — SPDX-License-Identifier: MPL-2.0

//! [`ResponseMessage`]: the union of every response type a server can send,
//! plus `ServiceFault` for requests that fail before a typed response can
//! be built (spec §4.5).

use std::io::{Read, Write};

use log::debug;
use opcua_types::{
    encoding::{BinaryDecodable, BinaryEncodable, DecodingOptions, EncodingResult, Error},
    node_id::NodeId,
    object_id::ObjectId,
    service_types::{
        response_header::ResponseHeader, ActivateSessionResponse, CloseSecureChannelResponse,
        CloseSessionResponse, CreateMonitoredItemsResponse, CreateSessionResponse,
        CreateSubscriptionResponse, DeleteMonitoredItemsResponse, DeleteSubscriptionsResponse,
        ModifyMonitoredItemsResponse, ModifySubscriptionResponse, OpenSecureChannelResponse,
        PublishResponse, RepublishResponse, SetMonitoringModeResponse, SetPublishingModeResponse,
        TransferSubscriptionsResponse,
    },
    status_code::StatusCode,
};

use super::{Message, MessageType};
use crate::comms::message_chunk::MessageChunkType;

/// Sent in place of any typed response when a request fails before the
/// server can build one (e.g. the request didn't decode, or the session
/// was unknown).
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceFault {
    pub response_header: ResponseHeader,
}

impl BinaryEncodable for ServiceFault {
    fn byte_len(&self) -> usize {
        self.response_header.byte_len()
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<usize> {
        self.response_header.encode(stream)
    }
}

impl BinaryDecodable for ServiceFault {
    fn decode<S: Read + ?Sized>(stream: &mut S, opts: &DecodingOptions) -> EncodingResult<Self> {
        Ok(ServiceFault {
            response_header: ResponseHeader::decode(stream, opts)?,
        })
    }
}

macro_rules! response_enum {
    ($($name:ident: $value:ident => $oid:ident),* $(,)?) => {
        /// Any response this stack can send or receive, boxed to keep the
        /// enum itself small regardless of the largest variant.
        #[derive(Debug, Clone, PartialEq)]
        pub enum ResponseMessage {
            ServiceFault(Box<ServiceFault>),
            $( $name(Box<$value>), )*
        }

        impl From<ServiceFault> for ResponseMessage {
            fn from(value: ServiceFault) -> Self {
                Self::ServiceFault(Box::new(value))
            }
        }

        $(
            impl From<$value> for ResponseMessage {
                fn from(value: $value) -> Self {
                    Self::$name(Box::new(value))
                }
            }
        )*

        impl BinaryEncodable for ResponseMessage {
            fn byte_len(&self) -> usize {
                match self {
                    Self::ServiceFault(v) => v.byte_len(),
                    $( Self::$name(v) => v.byte_len(), )*
                }
            }

            fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<usize> {
                match self {
                    Self::ServiceFault(v) => v.encode(stream),
                    $( Self::$name(v) => v.encode(stream), )*
                }
            }
        }

        impl ResponseMessage {
            /// The `ResponseHeader` every response carries, regardless of variant.
            pub fn response_header(&self) -> &ResponseHeader {
                match self {
                    Self::ServiceFault(v) => &v.response_header,
                    $( Self::$name(v) => &v.response_header, )*
                }
            }
        }

        impl Message for ResponseMessage {
            fn request_handle(&self) -> u32 {
                self.response_header().request_handle
            }

            fn type_id(&self) -> NodeId {
                match self {
                    // ServiceFault shares the generic Fault_Encoding_DefaultBinary id
                    // on the wire; the concrete value doesn't matter for framing,
                    // since servers never decode a ResponseMessage by object id.
                    Self::ServiceFault(_) => NodeId::null(),
                    $( Self::$name(_) => ObjectId::$oid.into(), )*
                }
            }

            fn decode_by_object_id<S: Read + ?Sized>(
                stream: &mut S,
                object_id: ObjectId,
                decoding_options: &DecodingOptions,
            ) -> EncodingResult<Self> {
                match object_id {
                    $( ObjectId::$oid => Ok($value::decode(stream, decoding_options)?.into()), )*
                    _ => {
                        debug!("decoding unsupported for object id {object_id:?}");
                        Err(Error::new(
                            StatusCode::BadDecodingError,
                            format!("Unsupported response object id {object_id:?}"),
                        ))
                    }
                }
            }
        }
    };
}

impl MessageType for ResponseMessage {
    fn message_type(&self) -> MessageChunkType {
        match self {
            Self::OpenSecureChannel(_) => MessageChunkType::OpenSecureChannel,
            Self::CloseSecureChannel(_) => MessageChunkType::CloseSecureChannel,
            _ => MessageChunkType::Message,
        }
    }
}

response_enum! {
    OpenSecureChannel: OpenSecureChannelResponse => OpenSecureChannelResponse_Encoding_DefaultBinary,
    CloseSecureChannel: CloseSecureChannelResponse => CloseSecureChannelResponse_Encoding_DefaultBinary,
    CreateSession: CreateSessionResponse => CreateSessionResponse_Encoding_DefaultBinary,
    ActivateSession: ActivateSessionResponse => ActivateSessionResponse_Encoding_DefaultBinary,
    CloseSession: CloseSessionResponse => CloseSessionResponse_Encoding_DefaultBinary,
    CreateMonitoredItems: CreateMonitoredItemsResponse => CreateMonitoredItemsResponse_Encoding_DefaultBinary,
    ModifyMonitoredItems: ModifyMonitoredItemsResponse => ModifyMonitoredItemsResponse_Encoding_DefaultBinary,
    SetMonitoringMode: SetMonitoringModeResponse => SetMonitoringModeResponse_Encoding_DefaultBinary,
    DeleteMonitoredItems: DeleteMonitoredItemsResponse => DeleteMonitoredItemsResponse_Encoding_DefaultBinary,
    CreateSubscription: CreateSubscriptionResponse => CreateSubscriptionResponse_Encoding_DefaultBinary,
    ModifySubscription: ModifySubscriptionResponse => ModifySubscriptionResponse_Encoding_DefaultBinary,
    SetPublishingMode: SetPublishingModeResponse => SetPublishingModeResponse_Encoding_DefaultBinary,
    TransferSubscriptions: TransferSubscriptionsResponse => TransferSubscriptionsResponse_Encoding_DefaultBinary,
    DeleteSubscriptions: DeleteSubscriptionsResponse => DeleteSubscriptionsResponse_Encoding_DefaultBinary,
    Publish: PublishResponse => PublishResponse_Encoding_DefaultBinary,
    Republish: RepublishResponse => RepublishResponse_Encoding_DefaultBinary,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_fault_round_trips_header_only() {
        let fault = ServiceFault {
            response_header: ResponseHeader {
                service_result: StatusCode::BadSessionIdInvalid,
                ..Default::default()
            },
        };
        let bytes = fault.encode_to_vec();
        let decoded = ServiceFault::decode(&mut bytes.as_slice(), &DecodingOptions::test()).unwrap();
        assert_eq!(decoded, fault);
    }
}
