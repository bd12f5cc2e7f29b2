use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::wizard::{StepStatus, WizardStep};

// ============================================================================
// Database Rows
// ============================================================================

/// A registered application, the owner of all wizard step records.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Application {
    pub id: i64,
    pub name: String,
    pub repository_url: Option<String>,
    pub ci_provider: Option<String>,
    pub sonar_project_key: Option<String>,
    pub image_repository: Option<String>,
    pub db_name: Option<String>,
    pub target_host: Option<String>,
    pub app_port: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Persisted outcome of one wizard step for one application.
///
/// Keyed by (application_id, step); there is never more than one row per
/// pair and no history is kept.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct StepRecord {
    pub id: i64,
    pub application_id: i64,
    pub step: WizardStep,
    pub status: StepStatus,
    pub message: Option<String>,
    pub executed_at: DateTime<Utc>,
}

// ============================================================================
// Request Models (DTOs)
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct CreateApplication {
    pub name: String,
    pub repository_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateApplication {
    pub repository_url: Option<String>,
    pub ci_provider: Option<String>,
    pub sonar_project_key: Option<String>,
    pub image_repository: Option<String>,
    pub db_name: Option<String>,
    pub target_host: Option<String>,
    pub app_port: Option<i64>,
}

/// Body of the step outcome endpoint: the verdict of a probe (or a manual
/// confirmation) to be recorded for a step.
#[derive(Debug, Clone, Deserialize)]
pub struct RecordOutcome {
    pub status: StepStatus,
    pub message: String,
}

// ============================================================================
// Response Models
// ============================================================================

/// One step as shown in the wizard overview. Steps without a stored record
/// appear as pending placeholders.
#[derive(Debug, Clone, Serialize)]
pub struct StepView {
    pub step: WizardStep,
    pub status: StepStatus,
    pub message: Option<String>,
    pub executed_at: Option<DateTime<Utc>>,
    pub can_enter: bool,
}

impl StepView {
    pub fn from_record(record: &StepRecord, can_enter: bool) -> Self {
        Self {
            step: record.step,
            status: record.status,
            message: record.message.clone(),
            executed_at: Some(record.executed_at),
            can_enter,
        }
    }

    pub fn placeholder(step: WizardStep, can_enter: bool) -> Self {
        Self {
            step,
            status: StepStatus::Pending,
            message: None,
            executed_at: None,
            can_enter,
        }
    }
}

/// Gate decision for a single step.
#[derive(Debug, Clone, Serialize)]
pub struct GateView {
    pub step: WizardStep,
    pub can_enter: bool,
    /// Where to send the user when the gate is closed. Equals `step` when
    /// the step has no predecessor.
    pub redirect_to: WizardStep,
    pub record: Option<StepRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProgressView {
    pub ok: i64,
    pub total: usize,
}
