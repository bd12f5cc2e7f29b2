use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Status of a single wizard step for one application.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum StepStatus {
    /// Not yet executed or confirmed.
    Pending,
    /// Completed successfully.
    Ok,
    /// Executed with an error.
    Failed,
}

/// One stage of the deployment wizard.
///
/// The sequence is fixed: each step may only be entered once its
/// predecessor has reached [`StepStatus::Ok`]. The order lives in a single
/// [`ORDERED`] slice and predecessors are computed by position, so the
/// variants themselves carry no linkage.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "kebab-case")]
#[sqlx(rename_all = "kebab-case")]
pub enum WizardStep {
    CodeQualityAnalysis,
    CodeQualityGitIntegration,
    RepositoryCheck,
    ImageRegistryCheck,
    DatabaseConfig,
    TargetHostCheck,
    /// Synthetic closing step. Its status is derived from the others and
    /// never confirmed directly by a user action.
    FinalSummary,
}

/// Total order of the wizard. `FinalSummary` is always last.
const ORDERED: [WizardStep; 7] = [
    WizardStep::CodeQualityAnalysis,
    WizardStep::CodeQualityGitIntegration,
    WizardStep::RepositoryCheck,
    WizardStep::ImageRegistryCheck,
    WizardStep::DatabaseConfig,
    WizardStep::TargetHostCheck,
    WizardStep::FinalSummary,
];

impl WizardStep {
    /// All steps in wizard order.
    pub fn ordered() -> &'static [WizardStep] {
        &ORDERED
    }

    /// The steps a user actually executes, excluding the derived summary.
    pub fn real_steps() -> &'static [WizardStep] {
        &ORDERED[..ORDERED.len() - 1]
    }

    /// Number of real steps, for progress displays.
    pub fn total_real() -> usize {
        Self::real_steps().len()
    }

    /// Position of this step in the wizard order.
    pub fn index(self) -> usize {
        ORDERED
            .iter()
            .position(|s| *s == self)
            .expect("every variant is in ORDERED")
    }

    /// The step immediately before this one, or `None` for the first step.
    pub fn predecessor(self) -> Option<WizardStep> {
        match self.index() {
            0 => None,
            pos => Some(ORDERED[pos - 1]),
        }
    }

    /// URL path segment for this step.
    pub fn slug(self) -> &'static str {
        match self {
            WizardStep::CodeQualityAnalysis => "code-quality-analysis",
            WizardStep::CodeQualityGitIntegration => "code-quality-git-integration",
            WizardStep::RepositoryCheck => "repository-check",
            WizardStep::ImageRegistryCheck => "image-registry-check",
            WizardStep::DatabaseConfig => "database-config",
            WizardStep::TargetHostCheck => "target-host-check",
            WizardStep::FinalSummary => "final-summary",
        }
    }

    /// Parse a step from its URL slug. Slugs arrive from outside the
    /// process, so unknown values must be rejected before reaching the
    /// store.
    pub fn from_slug(value: &str) -> Result<WizardStep> {
        ORDERED
            .iter()
            .copied()
            .find(|s| s.slug() == value)
            .ok_or_else(|| AppError::invalid_step(value))
    }
}

impl std::fmt::Display for WizardStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.slug())
    }
}
