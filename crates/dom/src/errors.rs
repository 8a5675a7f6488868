use thiserror::Error;

use crate::document::NodeId;

#[derive(Debug, Error)]
pub enum DomError {
    #[error("unknown node: {0}")]
    UnknownNode(NodeId),
    #[error("hierarchy request rejected: {0}")]
    Hierarchy(String),
    #[error("invalid snapshot: {0}")]
    Snapshot(String),
}
