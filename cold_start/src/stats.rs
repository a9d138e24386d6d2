use std::fmt::Display;

use average::Mean;
use human_repr::HumanDuration;

/// Aggregates latencies given in milliseconds, `None` for no values.
pub fn aggregate_latencies(latencies: impl Iterator<Item = u64>) -> Option<Stats> {
    let s: Mean = latencies.map(|ms| ms as f64).collect();
    (s.len() > 0).then(|| Stats {
        mean: s.mean(),
        len: s.len() as usize,
    })
}

/// Arithmetic mean truncated toward zero, `None` for no values.
///
/// Computed on integers so that exact means such as 200 for
/// `[100, 200, 300]` do not end up as 199 after truncation.
pub fn truncated_mean(latencies: impl IntoIterator<Item = u64>) -> Option<u64> {
    let (sum, len) = latencies
        .into_iter()
        .fold((0u128, 0u128), |(sum, len), ms| (sum + u128::from(ms), len + 1));
    (len > 0).then(|| (sum / len) as u64)
}

/// Latency statistics in milliseconds.
#[derive(Debug)]
pub struct Stats {
    pub mean: f64,
    pub len: usize,
}

impl Display for Stats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "μ: {} n: {}",
            (self.mean / 1000.0).human_duration(),
            self.len,
        )
    }
}
