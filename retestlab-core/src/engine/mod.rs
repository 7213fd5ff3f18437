//! Trade simulation — entry timing, bracket exits and the forward walk.

pub mod exit;
pub mod simulator;

pub use exit::{check_bar, stop_hit, target_hit, ExitFill};
pub use simulator::{DropReason, SimulationConfig, Simulator};
