//! The deployment wizard core: the fixed step sequence, the per-step
//! status store, the entry gate and the derived final summary.

pub mod service;
pub mod steps;

pub use service::WizardService;
pub use steps::{StepStatus, WizardStep};
