// OPC UA binary codec core — SPDX-License-Identifier: MPL-2.0

//! `NamespaceTable`: maps namespace URIs to the numeric indexes used by
//! `NodeId`/`QualifiedName`, and resolves `ExpandedNodeId`s that carry a URI
//! instead of (or in addition to) an index (spec §3).

/// The standard OPC UA namespace, always index 0.
pub const OPC_UA_NAMESPACE_URI: &str = "http://opcfoundation.org/UA/";

/// An ordered list of namespace URIs; a node's namespace index is its
/// position in this table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceTable {
    uris: Vec<String>,
}

impl Default for NamespaceTable {
    fn default() -> Self {
        Self::new()
    }
}

impl NamespaceTable {
    /// A table containing only the standard namespace at index 0.
    pub fn new() -> Self {
        NamespaceTable {
            uris: vec![OPC_UA_NAMESPACE_URI.to_string()],
        }
    }

    /// Append `uri`, returning its newly assigned index. Re-adding an
    /// already-present URI returns its existing index instead of
    /// duplicating the entry.
    pub fn add_namespace(&mut self, uri: &str) -> u16 {
        if let Some(idx) = self.index_of(uri) {
            return idx;
        }
        self.uris.push(uri.to_string());
        (self.uris.len() - 1) as u16
    }

    /// The URI registered at `index`, if any.
    pub fn uri_of(&self, index: u16) -> Option<&str> {
        self.uris.get(index as usize).map(|s| s.as_str())
    }

    /// The index `uri` is registered at, if any.
    pub fn index_of(&self, uri: &str) -> Option<u16> {
        self.uris.iter().position(|u| u == uri).map(|i| i as u16)
    }

    /// Resolve an `ExpandedNodeId` to a plain `NodeId` local to this table.
    /// If the expanded id carries a namespace URI, it is looked up and
    /// substituted for the node id's namespace index; an unknown URI is an
    /// error rather than silently falling back to index 0.
    pub fn resolve(
        &self,
        expanded: &crate::expanded_node_id::ExpandedNodeId,
    ) -> Result<crate::node_id::NodeId, crate::encoding::Error> {
        if expanded.namespace_uri.is_null() {
            return Ok(expanded.node_id.clone());
        }
        let uri = expanded.namespace_uri.as_ref();
        let index = self
            .index_of(uri)
            .ok_or_else(|| crate::encoding::Error::decoding(format!("Unknown namespace URI {uri}")))?;
        let mut node_id = expanded.node_id.clone();
        node_id.namespace = index;
        Ok(node_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_zero_is_standard_namespace() {
        let table = NamespaceTable::new();
        assert_eq!(table.uri_of(0), Some(OPC_UA_NAMESPACE_URI));
    }

    #[test]
    fn add_namespace_is_idempotent() {
        let mut table = NamespaceTable::new();
        let a = table.add_namespace("urn:example:a");
        let b = table.add_namespace("urn:example:a");
        assert_eq!(a, b);
    }

    #[test]
    fn resolve_substitutes_namespace_index() {
        let mut table = NamespaceTable::new();
        let idx = table.add_namespace("urn:example:a");
        let expanded = crate::expanded_node_id::ExpandedNodeId {
            node_id: crate::node_id::NodeId::new(0, 1u32),
            namespace_uri: crate::string::UAString::from("urn:example:a"),
            server_index: 0,
        };
        let resolved = table.resolve(&expanded).unwrap();
        assert_eq!(resolved.namespace, idx);
    }

    #[test]
    fn resolve_rejects_unknown_uri() {
        let table = NamespaceTable::new();
        let expanded = crate::expanded_node_id::ExpandedNodeId {
            node_id: crate::node_id::NodeId::new(0, 1u32),
            namespace_uri: crate::string::UAString::from("urn:unknown"),
            server_index: 0,
        };
        assert!(table.resolve(&expanded).is_err());
    }
}
