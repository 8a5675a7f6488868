use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ClassificationConfig {
    /// Capacity of the update broadcast; slow subscribers beyond it observe a lag.
    pub update_capacity: usize,
}

impl Default for ClassificationConfig {
    fn default() -> Self {
        Self {
            update_capacity: 256,
        }
    }
}
