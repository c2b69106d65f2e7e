// OPC UA binary codec core — SPDX-License-Identifier: MPL-2.0

//! Errors specific to this stack, distinct from the wire-level
//! [`opcua_types::encoding::Error`] produced by the codec itself.

use opcua_types::VariantScalarTypeId;
use thiserror::Error;

#[allow(missing_docs)]
#[derive(Error, Debug)]
pub enum OpcUaError {
    #[error("Received an unexpected variant type")]
    UnexpectedVariantType(Option<VariantScalarTypeId>),
    #[error("The requested namespace does not exist: {0}")]
    NamespaceDoesNotExist(String),
}
