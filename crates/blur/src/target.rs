use serde::Serialize;
use veil_classification::Verdict;
use veil_core_types::MediaReference;
use veil_dom::NodeId;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetState {
    /// Classification still outstanding; rendered obstructed.
    Unknown,
    Safe,
    Obstructed,
}

impl TargetState {
    pub fn from_verdict(verdict: Verdict) -> Self {
        match verdict {
            Verdict::Safe => TargetState::Safe,
            Verdict::Sensitive | Verdict::Failed => TargetState::Obstructed,
            Verdict::Pending | Verdict::Unknown => TargetState::Unknown,
        }
    }

    pub fn is_obstructed(self) -> bool {
        !matches!(self, TargetState::Safe)
    }
}

/// A media node the controller has evaluated. `reference` is `None` while the node's
/// identity cannot be resolved.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct ObstructionTarget {
    pub node: NodeId,
    pub reference: Option<MediaReference>,
    pub state: TargetState,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_safe_verdicts_clear() {
        assert!(!TargetState::from_verdict(Verdict::Safe).is_obstructed());
        for verdict in [
            Verdict::Sensitive,
            Verdict::Failed,
            Verdict::Pending,
            Verdict::Unknown,
        ] {
            assert!(TargetState::from_verdict(verdict).is_obstructed(), "{verdict:?}");
        }
        assert_eq!(TargetState::from_verdict(Verdict::Pending), TargetState::Unknown);
    }
}
