use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::{OrderId, Result, Version};

/// The latest persisted state of one aggregate.
///
/// The store never interprets `state`. It orders snapshots by version and
/// hands the document back unchanged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub aggregate_id: OrderId,

    /// Tag of the aggregate kind (e.g., "RepairOrder").
    pub aggregate_type: String,

    /// Number of events the aggregate had recorded when captured.
    pub version: Version,

    pub saved_at: DateTime<Utc>,

    /// The whole aggregate as a JSON document.
    pub state: serde_json::Value,
}

impl Snapshot {
    /// Serializes `state` as the snapshot of `aggregate_id` at `version`.
    pub fn capture<T: Serialize>(
        aggregate_id: OrderId,
        aggregate_type: &str,
        version: Version,
        state: &T,
    ) -> Result<Self> {
        Ok(Self {
            aggregate_id,
            aggregate_type: aggregate_type.to_string(),
            version,
            saved_at: Utc::now(),
            state: serde_json::to_value(state)?,
        })
    }

    /// Rebuilds the aggregate from the stored document.
    pub fn restore<T: DeserializeOwned>(self) -> Result<T> {
        Ok(serde_json::from_value(self.state)?)
    }

    /// Returns true if this snapshot may replace `stored`: same aggregate,
    /// strictly newer version.
    pub fn supersedes(&self, stored: &Snapshot) -> bool {
        self.aggregate_id == stored.aggregate_id && self.version > stored.version
    }
}
