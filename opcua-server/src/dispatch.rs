// OPC UA server — SPDX-License-Identifier: MPL-2.0

//! C7 service dispatch (spec §4.7): routes a decoded [`RequestMessage`]
//! arriving on an already-open SecureChannel to the session and subscription
//! engines, and assembles the matching [`ResponseMessage`] (or a
//! `ServiceFault`). OpenSecureChannel/CloseSecureChannel are handled earlier,
//! at the SecureChannel layer, and never reach this dispatcher — mirroring
//! the teacher's own session-level message handler, whose service match
//! likewise has no arm for either.

use std::sync::Arc;

use opcua_core::comms::secure_channel::SecureChannel;
use opcua_core::messages::{RequestMessage, ResponseMessage, ServiceFault};
use opcua_core::Message as _;
use opcua_types::{
    node_id::NodeId,
    service_types::{
        AsRequestHandle, CreateMonitoredItemsResponse, DeleteMonitoredItemsResponse,
        DeleteSubscriptionsResponse, ModifyMonitoredItemsResponse, ResponseHeader,
        SetMonitoringModeResponse, SetPublishingModeResponse, TransferResult,
        TransferSubscriptionsResponse,
    },
    status_code::StatusCode,
};

use crate::info::ServerInfo;
use crate::node_store::{AccessControl, CertificateVerification, Logger, NodeStore};
use crate::session::entity::SessionState;
use crate::session::manager::SessionManager;
use crate::subscriptions::manager::{PublishOutcome, SubscriptionManager};

/// What dispatching a request produced: an immediate response, or (Publish
/// only) a request parked for a later publish-cycle tick to fill.
pub enum DispatchOutcome {
    Response(ResponseMessage),
    Parked,
}

fn fault(request_handle: u32, status: StatusCode) -> ResponseMessage {
    ServiceFault {
        response_header: ResponseHeader {
            request_handle,
            service_result: status,
            ..Default::default()
        },
    }
    .into()
}

/// Owns the session and subscription engines and routes every session-level
/// service to them (spec §4.5, §4.6). One `Dispatcher` per server, run on
/// the single EventLoop thread (spec §5).
pub struct Dispatcher {
    info: Arc<ServerInfo>,
    sessions: SessionManager,
    subscriptions: SubscriptionManager,
    node_store: Arc<dyn NodeStore>,
    cert_verification: Arc<dyn CertificateVerification>,
    access_control: Arc<dyn AccessControl>,
    logger: Arc<dyn Logger>,
}

impl Dispatcher {
    pub fn new(
        info: Arc<ServerInfo>,
        node_store: Arc<dyn NodeStore>,
        cert_verification: Arc<dyn CertificateVerification>,
        access_control: Arc<dyn AccessControl>,
        logger: Arc<dyn Logger>,
    ) -> Self {
        let limits = info.config.limits.subscriptions.clone();
        Dispatcher {
            sessions: SessionManager::new(info.clone()),
            subscriptions: SubscriptionManager::new(limits, Arc::new(crate::info::IdGenerator::default())),
            info,
            node_store,
            cert_verification,
            access_control,
            logger,
        }
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Removes every session idle past its granted timeout, orphaning or
    /// deleting each one's subscriptions per
    /// `ServerConfig::delete_subscriptions_on_timeout` (spec §4.5).
    pub fn expire_sessions(&mut self) {
        for session in self.sessions.expire_sessions() {
            if self.info.config.delete_subscriptions_on_timeout {
                self.subscriptions.delete_all_for_session(&session.authentication_token);
            } else {
                self.subscriptions.orphan_all_for_session(&session.authentication_token);
            }
            self.logger.log(log::Level::Info, "session", &format!("session {} expired", session.session_name));
        }
    }

    /// One tick of the publish timer (spec §4.6 steps 1-4), to be driven by
    /// the EventLoop's periodic callback. Returns the responses ready to
    /// send, each paired with the `request_id` its `PublishRequest` arrived
    /// under.
    pub fn run_publish_cycle(&mut self) -> Vec<(u32, ResponseMessage)> {
        let (filled, expired) = self.subscriptions.run_publish_cycle(self.node_store.as_ref());
        for id in expired {
            self.logger.log(log::Level::Warn, "subscription", &format!("subscription {id} expired (lifetime exceeded)"));
        }
        filled
            .into_iter()
            .map(|(request_id, request_handle, subscription_id, message, available_sequence_numbers, ack_results)| {
                let response = opcua_types::service_types::PublishResponse {
                    response_header: ResponseHeader {
                        request_handle,
                        ..Default::default()
                    },
                    subscription_id,
                    available_sequence_numbers: Some(available_sequence_numbers),
                    more_notifications: false,
                    notification_message: message,
                    results: Some(ack_results),
                    diagnostic_infos: None,
                };
                (request_id, response.into())
            })
            .collect()
    }

    /// Verifies `token` names a session activated on `channel`, and touches
    /// its idle-timeout clock. Every session-level service but CreateSession
    /// requires this (spec §4.5).
    fn require_session(&mut self, channel: &SecureChannel, token: &NodeId) -> Result<(), StatusCode> {
        let session = self.sessions.find_by_token_mut(token).ok_or(StatusCode::BadSessionIdInvalid)?;
        if session.secure_channel_id() != channel.secure_channel_id() {
            return Err(StatusCode::BadSecureChannelIdInvalid);
        }
        if session.state() != SessionState::Activated {
            return Err(StatusCode::BadSessionNotActivated);
        }
        session.touch();
        Ok(())
    }

    /// `true` if `subscription_id` is both known and owned by `token`.
    fn owns_subscription(&self, token: &NodeId, subscription_id: u32) -> Result<(), StatusCode> {
        match self.subscriptions.owning_session_of(subscription_id) {
            Some(owner) if owner == token => Ok(()),
            Some(_) => Err(StatusCode::BadUserAccessDenied),
            None => Err(StatusCode::BadSubscriptionIdInvalid),
        }
    }

    /// Routes one decoded request to the matching service, on the session
    /// the request's `authentication_token` names. `request_id` is only
    /// used for Publish, to correlate a parked request with the response a
    /// later publish-cycle tick produces.
    pub fn dispatch(&mut self, channel: &mut SecureChannel, request_id: u32, request: RequestMessage) -> DispatchOutcome {
        match request {
            RequestMessage::CreateSession(req) => {
                match self.sessions.create_session(channel, self.cert_verification.as_ref(), &req) {
                    Ok(resp) => DispatchOutcome::Response(resp.into()),
                    Err(status) => DispatchOutcome::Response(fault(req.request_handle(), status)),
                }
            }
            RequestMessage::ActivateSession(req) => {
                match self.sessions.activate_session(channel, self.access_control.as_ref(), &req) {
                    Ok(resp) => DispatchOutcome::Response(resp.into()),
                    Err(status) => DispatchOutcome::Response(fault(req.request_handle(), status)),
                }
            }
            RequestMessage::CloseSession(req) => {
                let token = req.request_header.authentication_token.clone();
                match self.sessions.close_session(channel, &req) {
                    Ok((resp, to_delete)) => {
                        if req.delete_subscriptions {
                            self.subscriptions.delete_subscriptions(&token, &to_delete);
                        } else {
                            self.subscriptions.orphan_all_for_session(&token);
                        }
                        DispatchOutcome::Response(resp.into())
                    }
                    Err(status) => DispatchOutcome::Response(fault(req.request_handle(), status)),
                }
            }

            RequestMessage::CreateSubscription(req) => {
                let token = req.request_header.authentication_token.clone();
                if let Err(status) = self.require_session(channel, &token) {
                    return DispatchOutcome::Response(fault(req.request_handle(), status));
                }
                match self.subscriptions.create_subscription(&token, &req) {
                    Ok(resp) => {
                        if let Some(session) = self.sessions.find_by_token_mut(&token) {
                            session.owned_subscriptions.push(resp.subscription_id);
                        }
                        DispatchOutcome::Response(resp.into())
                    }
                    Err(status) => DispatchOutcome::Response(fault(req.request_handle(), status)),
                }
            }
            RequestMessage::ModifySubscription(req) => {
                let token = req.request_header.authentication_token.clone();
                if let Err(status) = self.require_session(channel, &token) {
                    return DispatchOutcome::Response(fault(req.request_handle(), status));
                }
                match self.subscriptions.modify_subscription(&token, &req) {
                    Ok(resp) => DispatchOutcome::Response(resp.into()),
                    Err(status) => DispatchOutcome::Response(fault(req.request_handle(), status)),
                }
            }
            RequestMessage::SetPublishingMode(req) => {
                let token = req.request_header.authentication_token.clone();
                if let Err(status) = self.require_session(channel, &token) {
                    return DispatchOutcome::Response(fault(req.request_handle(), status));
                }
                let ids = req.subscription_ids.clone().unwrap_or_default();
                let results = self.subscriptions.set_publishing_mode(&token, req.publishing_enabled, &ids);
                DispatchOutcome::Response(
                    SetPublishingModeResponse {
                        response_header: ResponseHeader::new_good(&req),
                        results: Some(results),
                        diagnostic_infos: None,
                    }
                    .into(),
                )
            }
            RequestMessage::DeleteSubscriptions(req) => {
                let token = req.request_header.authentication_token.clone();
                if let Err(status) = self.require_session(channel, &token) {
                    return DispatchOutcome::Response(fault(req.request_handle(), status));
                }
                let ids = req.subscription_ids.clone().unwrap_or_default();
                let results = self.subscriptions.delete_subscriptions(&token, &ids);
                if let Some(session) = self.sessions.find_by_token_mut(&token) {
                    let deleted: std::collections::HashSet<u32> = ids
                        .iter()
                        .zip(results.iter())
                        .filter(|(_, status)| **status == StatusCode::Good)
                        .map(|(id, _)| *id)
                        .collect();
                    session.owned_subscriptions.retain(|id| !deleted.contains(id));
                }
                DispatchOutcome::Response(DeleteSubscriptionsResponse::new(&req, results).into())
            }
            RequestMessage::TransferSubscriptions(req) => {
                let token = req.request_header.authentication_token.clone();
                if let Err(status) = self.require_session(channel, &token) {
                    return DispatchOutcome::Response(fault(req.request_handle(), status));
                }
                let ids = req.subscription_ids.clone().unwrap_or_default();
                let transferred = self.subscriptions.transfer(&token, &ids);
                if let Some(session) = self.sessions.find_by_token_mut(&token) {
                    for (id, (status, _)) in ids.iter().zip(transferred.iter()) {
                        if *status == StatusCode::Good && !session.owned_subscriptions.contains(id) {
                            session.owned_subscriptions.push(*id);
                        }
                    }
                }
                let results = transferred
                    .into_iter()
                    .map(|(status_code, available_sequence_numbers)| TransferResult {
                        status_code,
                        available_sequence_numbers: Some(available_sequence_numbers),
                    })
                    .collect();
                DispatchOutcome::Response(
                    TransferSubscriptionsResponse {
                        response_header: ResponseHeader::new_good(&req),
                        results: Some(results),
                        diagnostic_infos: None,
                    }
                    .into(),
                )
            }

            RequestMessage::CreateMonitoredItems(req) => {
                let token = req.request_header.authentication_token.clone();
                if let Err(status) = self.require_session(channel, &token) {
                    return DispatchOutcome::Response(fault(req.request_handle(), status));
                }
                if let Err(status) = self.owns_subscription(&token, req.subscription_id) {
                    return DispatchOutcome::Response(fault(req.request_handle(), status));
                }
                let items = req.items_to_create.clone().unwrap_or_default();
                let limits = &self.info.config.limits.subscriptions;
                let existing = self.subscriptions.get_monitored_item_count(req.subscription_id).unwrap_or(0);
                if limits.max_monitored_items_per_sub > 0 && existing + items.len() > limits.max_monitored_items_per_sub {
                    return DispatchOutcome::Response(fault(req.request_handle(), StatusCode::BadTooManyMonitoredItems));
                }
                match self.subscriptions.create_monitored_items(
                    req.subscription_id,
                    &items,
                    self.node_store.as_ref(),
                    &self.info.monitored_item_id_handle,
                ) {
                    Ok(results) => DispatchOutcome::Response(CreateMonitoredItemsResponse::new(&req, results).into()),
                    Err(status) => DispatchOutcome::Response(fault(req.request_handle(), status)),
                }
            }
            RequestMessage::ModifyMonitoredItems(req) => {
                let token = req.request_header.authentication_token.clone();
                if let Err(status) = self.require_session(channel, &token) {
                    return DispatchOutcome::Response(fault(req.request_handle(), status));
                }
                if let Err(status) = self.owns_subscription(&token, req.subscription_id) {
                    return DispatchOutcome::Response(fault(req.request_handle(), status));
                }
                let items = req.items_to_modify.clone().unwrap_or_default();
                match self.subscriptions.modify_monitored_items(req.subscription_id, &items) {
                    Ok(results) => DispatchOutcome::Response(
                        ModifyMonitoredItemsResponse {
                            response_header: ResponseHeader::new_good(&req),
                            results: Some(results),
                            diagnostic_infos: None,
                        }
                        .into(),
                    ),
                    Err(status) => DispatchOutcome::Response(fault(req.request_handle(), status)),
                }
            }
            RequestMessage::SetMonitoringMode(req) => {
                let token = req.request_header.authentication_token.clone();
                if let Err(status) = self.require_session(channel, &token) {
                    return DispatchOutcome::Response(fault(req.request_handle(), status));
                }
                if let Err(status) = self.owns_subscription(&token, req.subscription_id) {
                    return DispatchOutcome::Response(fault(req.request_handle(), status));
                }
                let ids = req.monitored_item_ids.clone().unwrap_or_default();
                match self.subscriptions.set_monitoring_mode(req.subscription_id, req.monitoring_mode, &ids) {
                    Ok(results) => DispatchOutcome::Response(
                        SetMonitoringModeResponse {
                            response_header: ResponseHeader::new_good(&req),
                            results: Some(results),
                            diagnostic_infos: None,
                        }
                        .into(),
                    ),
                    Err(status) => DispatchOutcome::Response(fault(req.request_handle(), status)),
                }
            }
            RequestMessage::DeleteMonitoredItems(req) => {
                let token = req.request_header.authentication_token.clone();
                if let Err(status) = self.require_session(channel, &token) {
                    return DispatchOutcome::Response(fault(req.request_handle(), status));
                }
                if let Err(status) = self.owns_subscription(&token, req.subscription_id) {
                    return DispatchOutcome::Response(fault(req.request_handle(), status));
                }
                let ids = req.monitored_item_ids.clone().unwrap_or_default();
                match self.subscriptions.delete_monitored_items(req.subscription_id, &ids) {
                    Ok(results) => DispatchOutcome::Response(DeleteMonitoredItemsResponse::new(&req, results).into()),
                    Err(status) => DispatchOutcome::Response(fault(req.request_handle(), status)),
                }
            }

            RequestMessage::Publish(req) => {
                let token = req.request_header.authentication_token.clone();
                if let Err(status) = self.require_session(channel, &token) {
                    return DispatchOutcome::Response(fault(req.request_handle(), status));
                }
                match self.subscriptions.publish(&token, request_id, &req) {
                    Ok(PublishOutcome::Parked) => DispatchOutcome::Parked,
                    Ok(PublishOutcome::Ready { .. }) => DispatchOutcome::Parked,
                    Err(status) => DispatchOutcome::Response(fault(req.request_handle(), status)),
                }
            }
            RequestMessage::Republish(req) => {
                let token = req.request_header.authentication_token.clone();
                if let Err(status) = self.require_session(channel, &token) {
                    return DispatchOutcome::Response(fault(req.request_handle(), status));
                }
                DispatchOutcome::Response(self.subscriptions.republish(&req).into())
            }

            // OpenSecureChannel/CloseSecureChannel belong to the SecureChannel
            // layer, which consumes them before a chunk ever reaches session
            // dispatch (spec §4.3, §4.4). Reaching this arm means something
            // upstream routed a chunk it shouldn't have.
            other => DispatchOutcome::Response(fault(other.request_handle(), StatusCode::BadNotImplemented)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fault_carries_the_request_handle_and_status() {
        match fault(42, StatusCode::BadNotImplemented) {
            ResponseMessage::ServiceFault(f) => {
                assert_eq!(f.response_header.request_handle, 42);
                assert_eq!(f.response_header.service_result, StatusCode::BadNotImplemented);
            }
            _ => panic!("expected a service fault"),
        }
    }
}
