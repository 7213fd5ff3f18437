//! Domain types for RetestLab

pub mod bar;
pub mod direction;
pub mod setup;
pub mod trade;

pub use bar::{Bar, Granularity, COARSE_BAR_MINUTES, FINE_BAR_MINUTES};
pub use direction::Direction;
pub use setup::{
    BreakoutCandidate, Candidate, IgnitionEvent, IgnitionSource, OpeningRange, RetestEvent,
    WickContact,
};
pub use trade::{ContinuationDiagnostics, Outcome, RealizedTrade};

/// Symbol type alias
pub type Symbol = String;
