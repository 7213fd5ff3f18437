//! Stage 2 — coarse-bar closes beyond the opening range.
//!
//! For each adjacent pair `(previous, current)` inside the scan window:
//! - Long: `previous.high <= OR.high` and `current.close > OR.high`
//! - Short: `previous.low >= OR.low` and `current.close < OR.low`
//!
//! A crossing is only a candidate if the breakout filter accepts it. Every
//! accepted bar yields one candidate; there is no de-duplication.

use crate::data::{AnnotatedBar, SessionBounds};
use crate::domain::{BreakoutCandidate, Direction, OpeningRange};
use serde::{Deserialize, Serialize};

/// Quality gate applied to a structural crossing.
///
/// Implementations see only the two bars involved and the range; they never
/// look ahead of `current`.
pub trait BreakoutFilter: Send + Sync {
    /// Human-readable name (e.g., "base_rules").
    fn name(&self) -> &str;

    fn accept(
        &self,
        direction: Direction,
        current: &AnnotatedBar,
        previous: &AnnotatedBar,
        range: &OpeningRange,
    ) -> bool;
}

/// Default breakout quality rules: body strength, volume and VWAP side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakoutRules {
    /// Minimum body share of the bar's range.
    pub min_body_pct: f64,
    /// Volume must be at least this multiple of the trailing average.
    pub volume_ratio: f64,
    /// Close must be on the trade side of session VWAP.
    pub require_vwap: bool,
}

impl Default for BreakoutRules {
    fn default() -> Self {
        Self {
            min_body_pct: 0.6,
            volume_ratio: 1.0,
            require_vwap: true,
        }
    }
}

impl BreakoutFilter for BreakoutRules {
    fn name(&self) -> &str {
        "base_rules"
    }

    fn accept(
        &self,
        direction: Direction,
        current: &AnnotatedBar,
        _previous: &AnnotatedBar,
        _range: &OpeningRange,
    ) -> bool {
        let bar = &current.bar;
        if bar.body_pct() < self.min_body_pct {
            return false;
        }
        if bar.volume < self.volume_ratio * current.volume_avg {
            return false;
        }
        !self.require_vwap || direction.beyond(bar.close, current.vwap)
    }
}

/// Scans coarse bars for breakout candidates.
pub struct BreakoutDetector {
    filter: Box<dyn BreakoutFilter>,
}

impl BreakoutDetector {
    pub fn new(filter: Box<dyn BreakoutFilter>) -> Self {
        Self { filter }
    }

    pub fn filter_name(&self) -> &str {
        self.filter.name()
    }

    /// All candidates in scan order. Bars outside `[open, scan_end)` are ignored.
    pub fn detect(
        &self,
        coarse: &[AnnotatedBar],
        range: &OpeningRange,
        bounds: &SessionBounds,
    ) -> Vec<BreakoutCandidate> {
        let window: Vec<&AnnotatedBar> = coarse
            .iter()
            .filter(|b| bounds.in_scan_window(b.bar.timestamp))
            .collect();

        let mut out = Vec::new();
        for pair in window.windows(2) {
            let (previous, current) = (pair[0], pair[1]);
            for direction in [Direction::Long, Direction::Short] {
                if crosses(direction, previous, current, range)
                    && self.filter.accept(direction, current, previous, range)
                {
                    out.push(BreakoutCandidate {
                        direction,
                        level: range.level(direction),
                        time: current.bar.timestamp,
                        bar: current.bar,
                        previous: previous.bar,
                    });
                }
            }
        }
        out
    }
}

impl Default for BreakoutDetector {
    fn default() -> Self {
        Self::new(Box::new(BreakoutRules::default()))
    }
}

impl std::fmt::Debug for BreakoutDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BreakoutDetector")
            .field("filter", &self.filter.name())
            .finish()
    }
}

fn crosses(
    direction: Direction,
    previous: &AnnotatedBar,
    current: &AnnotatedBar,
    range: &OpeningRange,
) -> bool {
    let level = range.level(direction);
    let previous_inside = match direction {
        Direction::Long => previous.bar.high <= level,
        Direction::Short => previous.bar.low >= level,
    };
    previous_inside && direction.beyond(current.bar.close, level)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::SessionWindow;
    use crate::domain::Bar;
    use chrono::{Duration, NaiveDate};

    fn bounds() -> SessionBounds {
        SessionWindow::default()
            .bounds(NaiveDate::from_ymd_opt(2024, 4, 2).unwrap())
            .unwrap()
    }

    fn range() -> OpeningRange {
        OpeningRange {
            high: 101.0,
            low: 99.0,
            anchor: bounds().open,
        }
    }

    fn at(i: i64, o: f64, h: f64, l: f64, c: f64, v: f64, avg: f64, vwap: f64) -> AnnotatedBar {
        AnnotatedBar {
            bar: Bar::new(bounds().open + Duration::minutes(5 * i), o, h, l, c, v),
            volume_avg: avg,
            vwap,
        }
    }

    fn opening() -> AnnotatedBar {
        at(0, 100.0, 101.0, 99.0, 100.5, 1_000.0, 1_000.0, 100.0)
    }

    #[test]
    fn long_breakout_detected() {
        let bars = [opening(), at(1, 100.8, 101.6, 100.7, 101.5, 1_500.0, 1_200.0, 100.5)];
        let found = BreakoutDetector::default().detect(&bars, &range(), &bounds());
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].direction, Direction::Long);
        assert_eq!(found[0].level, 101.0);
        assert_eq!(found[0].previous, bars[0].bar);
    }

    #[test]
    fn short_breakout_detected() {
        let bars = [opening(), at(1, 99.2, 99.3, 98.4, 98.5, 1_500.0, 1_200.0, 100.0)];
        let found = BreakoutDetector::default().detect(&bars, &range(), &bounds());
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].direction, Direction::Short);
        assert_eq!(found[0].level, 99.0);
    }

    #[test]
    fn previous_bar_already_outside_is_not_a_breakout() {
        let bars = [
            opening(),
            at(1, 100.8, 101.6, 100.7, 101.5, 1_500.0, 1_200.0, 100.5),
            at(2, 101.5, 102.4, 101.4, 102.3, 1_500.0, 1_200.0, 100.8),
        ];
        let found = BreakoutDetector::default().detect(&bars, &range(), &bounds());
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn rejects_weak_volume() {
        let bars = [opening(), at(1, 100.8, 101.6, 100.7, 101.5, 900.0, 1_200.0, 100.5)];
        assert!(BreakoutDetector::default().detect(&bars, &range(), &bounds()).is_empty());
    }

    #[test]
    fn rejects_close_below_vwap() {
        let bars = [opening(), at(1, 100.8, 101.6, 100.7, 101.5, 1_500.0, 1_200.0, 101.8)];
        assert!(BreakoutDetector::default().detect(&bars, &range(), &bounds()).is_empty());
        let lenient = BreakoutDetector::new(Box::new(BreakoutRules {
            require_vwap: false,
            ..BreakoutRules::default()
        }));
        assert_eq!(lenient.detect(&bars, &range(), &bounds()).len(), 1);
    }

    #[test]
    fn rejects_small_body() {
        // Long upper wick: body 0.2 of a 1.0 range.
        let bars = [opening(), at(1, 101.1, 102.0, 101.0, 101.3, 1_500.0, 1_200.0, 100.5)];
        assert!(BreakoutDetector::default().detect(&bars, &range(), &bounds()).is_empty());
    }

    #[test]
    fn ignores_bars_after_scan_window() {
        let mut bars = vec![opening()];
        for i in 1..18 {
            bars.push(at(i, 100.0, 100.8, 99.5, 100.2, 1_000.0, 1_000.0, 100.0));
        }
        bars.push(at(18, 100.8, 101.6, 100.7, 101.5, 1_500.0, 1_200.0, 100.5));
        assert!(BreakoutDetector::default().detect(&bars, &range(), &bounds()).is_empty());
    }

    struct AcceptAll;

    impl BreakoutFilter for AcceptAll {
        fn name(&self) -> &str {
            "accept_all"
        }

        fn accept(
            &self,
            _: Direction,
            _: &AnnotatedBar,
            _: &AnnotatedBar,
            _: &OpeningRange,
        ) -> bool {
            true
        }
    }

    #[test]
    fn custom_filter_replaces_rules() {
        let bars = [opening(), at(1, 101.1, 102.0, 101.0, 101.3, 10.0, 1_200.0, 105.0)];
        let detector = BreakoutDetector::new(Box::new(AcceptAll));
        assert_eq!(detector.filter_name(), "accept_all");
        assert_eq!(detector.detect(&bars, &range(), &bounds()).len(), 1);
    }
}
