use beacon_types::BitsLength;
use serde::{Deserialize, Serialize};

/// Per-deployment ledger settings.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Entropy bytes carried by every record.
    pub bits_len: BitsLength,
}
