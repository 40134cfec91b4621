use thiserror::Error;

use crate::model::NodeId;

/// Structural violations of a [MenuTree](crate::model::MenuTree).
///
/// These are produced by malformed or hostile remote sources. They are logged and the
/// offending operation is skipped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StructureError {
    /// The child id is already listed under this parent.
    #[error("node {1} is already a child of {0}")]
    DuplicateChild(NodeId, NodeId),
    /// No node with this id exists.
    #[error("unknown menu node {0}")]
    UnknownNode(NodeId),
    /// The node is not listed under the given parent.
    #[error("node {1} is not a child of {0}")]
    NotAChild(NodeId, NodeId),
    /// The parent node kind cannot hold children.
    #[error("node {0} cannot hold children")]
    NotAContainer(NodeId),
    /// Placing the child would make a node its own ancestor.
    #[error("node {1} is an ancestor of {0}")]
    Cycle(NodeId, NodeId),
}

/// Failures while constructing a client for a remote menu.
///
/// Every variant is recoverable: the window is treated as having no menu and resolution is
/// retried on the next focus change or window list refresh.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// The remote menu declares an unsupported protocol version.
    #[error("incompatible dbusmenu version {0}")]
    IncompatibleVersion(u32),
    /// The window does not export the properties needed to reach a menu.
    #[error("window exports no menu")]
    Missing,
    /// The remote side could not be reached.
    #[error("transport failure: {0}")]
    Transport(String),
    /// The request was cancelled before it completed.
    #[error("resolution cancelled")]
    Cancelled,
}

/// Failures of the window property probe.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProbeError {
    /// The probe process could not be started.
    #[error("failed to spawn probe: {0}")]
    Spawn(String),
    /// The probe process exited unsuccessfully.
    #[error("probe exited with status {0}")]
    Exit(i32),
    /// The probe output did not contain the required properties.
    #[error("probe output has no menu properties")]
    Parse,
    /// The probe was cancelled because its window went away.
    #[error("probe cancelled")]
    Cancelled,
}
