//! Bar sources, session alignment and the warm-start cache

pub mod align;
pub mod annotate;
pub mod provider;
pub mod session;
pub mod warm_cache;

pub use align::SessionAligner;
pub use annotate::{annotate, median_volume, AnnotatedBar, VOLUME_AVG_WINDOW};
pub use provider::{BarSource, DataError, MemoryBarSource};
pub use session::{HygieneReport, SessionBounds, SessionData, SessionWindow, SkipReason};
pub use warm_cache::{SessionKey, WarmStartCache};
