// OPC UA binary codec core — SPDX-License-Identifier: MPL-2.0

//! [`RequestMessage`]: the union of every request type a client can send.

use std::io::{Read, Write};

use log::debug;
use opcua_types::{
    encoding::{BinaryDecodable, BinaryEncodable, DecodingOptions, EncodingResult, Error},
    node_id::NodeId,
    object_id::ObjectId,
    service_types::{
        request_header::RequestHeader, ActivateSessionRequest, CloseSecureChannelRequest,
        CloseSessionRequest, CreateMonitoredItemsRequest, CreateSessionRequest,
        CreateSubscriptionRequest, DeleteMonitoredItemsRequest, DeleteSubscriptionsRequest,
        ModifyMonitoredItemsRequest, ModifySubscriptionRequest, OpenSecureChannelRequest,
        PublishRequest, RepublishRequest, SetMonitoringModeRequest, SetPublishingModeRequest,
        TransferSubscriptionsRequest,
    },
    status_code::StatusCode,
};

use super::{Message, MessageType};
use crate::comms::message_chunk::MessageChunkType;

macro_rules! request_enum {
    ($($name:ident: $value:ident => $oid:ident),* $(,)?) => {
        /// Any request this stack can send or receive, boxed to keep the
        /// enum itself small regardless of the largest variant.
        #[derive(Debug, Clone, PartialEq)]
        pub enum RequestMessage {
            $( $name(Box<$value>), )*
        }

        $(
            impl From<$value> for RequestMessage {
                fn from(value: $value) -> Self {
                    Self::$name(Box::new(value))
                }
            }
        )*

        impl BinaryEncodable for RequestMessage {
            fn byte_len(&self) -> usize {
                match self {
                    $( Self::$name(v) => v.byte_len(), )*
                }
            }

            fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<usize> {
                match self {
                    $( Self::$name(v) => v.encode(stream), )*
                }
            }
        }

        impl RequestMessage {
            /// The `RequestHeader` every request carries, regardless of variant.
            pub fn request_header(&self) -> &RequestHeader {
                match self {
                    $( Self::$name(v) => &v.request_header, )*
                }
            }
        }

        impl Message for RequestMessage {
            fn request_handle(&self) -> u32 {
                self.request_header().request_handle
            }

            fn type_id(&self) -> NodeId {
                match self {
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
                            format!("Unsupported request object id {object_id:?}"),
                        ))
                    }
                }
            }
        }
    };
}

impl MessageType for RequestMessage {
    fn message_type(&self) -> MessageChunkType {
        match self {
            Self::OpenSecureChannel(_) => MessageChunkType::OpenSecureChannel,
            Self::CloseSecureChannel(_) => MessageChunkType::CloseSecureChannel,
            _ => MessageChunkType::Message,
        }
    }
}

request_enum! {
    OpenSecureChannel: OpenSecureChannelRequest => OpenSecureChannelRequest_Encoding_DefaultBinary,
    CloseSecureChannel: CloseSecureChannelRequest => CloseSecureChannelRequest_Encoding_DefaultBinary,
    CreateSession: CreateSessionRequest => CreateSessionRequest_Encoding_DefaultBinary,
    ActivateSession: ActivateSessionRequest => ActivateSessionRequest_Encoding_DefaultBinary,
    CloseSession: CloseSessionRequest => CloseSessionRequest_Encoding_DefaultBinary,
    CreateMonitoredItems: CreateMonitoredItemsRequest => CreateMonitoredItemsRequest_Encoding_DefaultBinary,
    ModifyMonitoredItems: ModifyMonitoredItemsRequest => ModifyMonitoredItemsRequest_Encoding_DefaultBinary,
    SetMonitoringMode: SetMonitoringModeRequest => SetMonitoringModeRequest_Encoding_DefaultBinary,
    DeleteMonitoredItems: DeleteMonitoredItemsRequest => DeleteMonitoredItemsRequest_Encoding_DefaultBinary,
    CreateSubscription: CreateSubscriptionRequest => CreateSubscriptionRequest_Encoding_DefaultBinary,
    ModifySubscription: ModifySubscriptionRequest => ModifySubscriptionRequest_Encoding_DefaultBinary,
    SetPublishingMode: SetPublishingModeRequest => SetPublishingModeRequest_Encoding_DefaultBinary,
    TransferSubscriptions: TransferSubscriptionsRequest => TransferSubscriptionsRequest_Encoding_DefaultBinary,
    DeleteSubscriptions: DeleteSubscriptionsRequest => DeleteSubscriptionsRequest_Encoding_DefaultBinary,
    Publish: PublishRequest => PublishRequest_Encoding_DefaultBinary,
    Republish: RepublishRequest => RepublishRequest_Encoding_DefaultBinary,
}

#[cfg(test)]
mod tests {
    use super::*;
    use opcua_types::service_types::RequestHeader;

    #[test]
    fn message_type_dispatch() {
        let req: RequestMessage = CloseSessionRequest {
            request_header: RequestHeader::default(),
            delete_subscriptions: true,
        }
        .into();
        assert_eq!(req.message_type(), MessageChunkType::Message);
    }
}
