use std::collections::BTreeSet;

use serde::Serialize;

use crate::document::NodeId;

/// One structural change. Attribute and class changes are not journaled, so the
/// engine's own marker updates never feed back into its mutation stream.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MutationRecord {
    Added { parent: NodeId, node: NodeId },
    Removed { parent: NodeId, node: NodeId },
}

/// Changes accumulated between two deliveries, in the order they happened.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct MutationBatch {
    pub records: Vec<MutationRecord>,
}

impl MutationBatch {
    pub fn new(records: Vec<MutationRecord>) -> Self {
        Self { records }
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Subtree roots that were inserted, first occurrence order, duplicates removed.
    pub fn added(&self) -> Vec<NodeId> {
        self.collect(|record| match record {
            MutationRecord::Added { node, .. } => Some(*node),
            MutationRecord::Removed { .. } => None,
        })
    }

    /// Subtree roots that were detached, first occurrence order, duplicates removed.
    pub fn removed(&self) -> Vec<NodeId> {
        self.collect(|record| match record {
            MutationRecord::Removed { node, .. } => Some(*node),
            MutationRecord::Added { .. } => None,
        })
    }

    fn collect(&self, pick: impl Fn(&MutationRecord) -> Option<NodeId>) -> Vec<NodeId> {
        let mut seen = BTreeSet::new();
        self.records
            .iter()
            .filter_map(pick)
            .filter(|node| seen.insert(*node))
            .collect()
    }
}
