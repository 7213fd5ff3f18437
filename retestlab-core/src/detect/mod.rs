//! Setup detection stages and the pipeline that chains them

pub mod breakout;
pub mod ignition;
pub mod opening_range;
pub mod pipeline;
pub mod retest;

pub use breakout::{BreakoutDetector, BreakoutFilter, BreakoutRules};
pub use ignition::{IgnitionDetector, IgnitionRules};
pub use pipeline::{Pipeline, PipelineConfig, PipelineLevel, SessionScan, StageFunnel};
pub use retest::{
    ContactMode, RetestDetector, RetestMatch, RetestPredicate, RetestRule, StrictBody,
    VwapStrictBody, WickTolerant,
};
