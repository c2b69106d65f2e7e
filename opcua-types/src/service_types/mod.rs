// OPC UA binary codec core — SPDX-License-Identifier: MPL-2.0

//! Request/response structures for the Session and Subscription services
//! (spec §4.5, §4.6), built from the built-in types in the crate root.

pub mod application_description;
pub mod channel_security_token;
pub mod enums;
pub mod identity_token;
pub mod monitored_item_service;
pub mod notification;
pub mod publish_service;
pub mod request_header;
pub mod response_header;
pub mod secure_channel_service;
pub mod session_service;
pub mod subscription_service;

pub use application_description::{ApplicationDescription, EndpointDescription, UserTokenPolicy};
pub use channel_security_token::{ChannelSecurityToken, SignatureData};
pub use enums::{
    ApplicationType, DataChangeTrigger, DeadbandType, MessageSecurityMode, MonitoringMode,
    SecurityTokenRequestType, TimestampsToReturn,
};
pub use identity_token::{
    AnonymousIdentityToken, IdentityToken, IssuedIdentityToken, UserNameIdentityToken,
    X509IdentityToken,
};
pub use monitored_item_service::{
    CreateMonitoredItemsRequest, CreateMonitoredItemsResponse, DataChangeFilter,
    DeleteMonitoredItemsRequest, DeleteMonitoredItemsResponse, ModifyMonitoredItemsRequest,
    ModifyMonitoredItemsResponse, MonitoredItemCreateRequest, MonitoredItemCreateResult,
    MonitoredItemModifyRequest, MonitoredItemModifyResult, MonitoringParameters, ReadValueId,
    SetMonitoringModeRequest, SetMonitoringModeResponse,
};
pub use notification::{
    DataChangeNotification, EventFieldList, EventNotificationList, MonitoredItemNotification,
    NotificationMessage, StatusChangeNotification, SubscriptionAcknowledgement,
};
pub use publish_service::{PublishRequest, PublishResponse, RepublishRequest, RepublishResponse};
pub use request_header::{AsRequestHandle, RequestHeader};
pub use response_header::ResponseHeader;
pub use secure_channel_service::{
    CloseSecureChannelRequest, CloseSecureChannelResponse, OpenSecureChannelRequest,
    OpenSecureChannelResponse, SECURITY_POLICY_NONE_URI,
};
pub use session_service::{
    ActivateSessionRequest, ActivateSessionResponse, CloseSessionRequest, CloseSessionResponse,
    CreateSessionRequest, CreateSessionResponse,
};
pub use subscription_service::{
    CreateSubscriptionRequest, CreateSubscriptionResponse, DeleteSubscriptionsRequest,
    DeleteSubscriptionsResponse, ModifySubscriptionRequest, ModifySubscriptionResponse,
    SetPublishingModeRequest, SetPublishingModeResponse, TransferResult,
    TransferSubscriptionsRequest, TransferSubscriptionsResponse,
};
