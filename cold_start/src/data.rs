use crate::load::LoadTier;

/// Outcome of one round: a target app started under one load tier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrialRecord {
    pub app_name: String,
    pub tier: LoadTier,
    pub round: u16,
    pub latency_ms: Option<u64>,
}

/// Per app and load tier aggregate of the recorded rounds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryRecord {
    pub app_name: String,
    pub tier: LoadTier,
    pub trials: usize,
    /// Arithmetic mean, truncated toward zero
    pub mean_ms: u64,
}

impl TrialRecord {
    /// Whether this record belongs to the group of `app_name` and `tier`.
    #[must_use]
    pub fn in_group(&self, app_name: &str, tier: LoadTier) -> bool {
        self.app_name == app_name && self.tier == tier
    }
}
