//! Stage 1 — opening range from the session's first coarse bar.

use crate::data::AnnotatedBar;
use crate::domain::OpeningRange;

impl OpeningRange {
    /// High/low of the first coarse bar, or `None` if there is no bar or the
    /// band is degenerate (zero width, non-positive prices). Callers skip the
    /// session on `None`.
    pub fn locate(coarse: &[AnnotatedBar]) -> Option<OpeningRange> {
        let first = coarse.first()?;
        let range = OpeningRange {
            high: first.bar.high,
            low: first.bar.low,
            anchor: first.bar.timestamp,
        };
        range.is_valid().then_some(range)
    }
}
