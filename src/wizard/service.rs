use chrono::Utc;

use crate::db::{Application, DbPool, StepRecord};
use crate::error::{AppError, Result};
use crate::wizard::steps::{StepStatus, WizardStep};

/// Message written to the final summary record when every real step is Ok.
const FINAL_SUMMARY_MESSAGE: &str = "All steps completed successfully.";

/// Wizard state machine over the step record store.
///
/// All reads and writes are keyed by (application, step). The gate is
/// enforced when a step is read, not when an outcome is written: any
/// outcome can be recorded at any time, and the final summary is
/// recomputed after every write.
#[derive(Clone)]
pub struct WizardService {
    pool: DbPool,
}

impl WizardService {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    // =========================================================================
    // Applications
    // =========================================================================

    /// Fetch an application or fail with NotFound. Step records must always
    /// be anchored to a real application, so the recorder calls this before
    /// creating anything.
    pub async fn get_application(&self, application_id: i64) -> Result<Application> {
        sqlx::query_as::<_, Application>("SELECT * FROM applications WHERE id = ?")
            .bind(application_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Application not found: {application_id}")))
    }

    // =========================================================================
    // Status store
    // =========================================================================

    /// The stored record for (application, step), if any.
    pub async fn get_status(
        &self,
        application_id: i64,
        step: WizardStep,
    ) -> Result<Option<StepRecord>> {
        let record = sqlx::query_as::<_, StepRecord>(
            "SELECT * FROM step_records WHERE application_id = ? AND step = ?",
        )
        .bind(application_id)
        .bind(step)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    /// All stored records for an application, in wizard order.
    pub async fn statuses(&self, application_id: i64) -> Result<Vec<StepRecord>> {
        let mut records = sqlx::query_as::<_, StepRecord>(
            "SELECT * FROM step_records WHERE application_id = ?",
        )
        .bind(application_id)
        .fetch_all(&self.pool)
        .await?;

        records.sort_by_key(|r| r.step.index());
        Ok(records)
    }

    /// Count real-step records with the given status. The derived final
    /// summary is excluded so progress reads as "n of 6".
    pub async fn count_by_status(
        &self,
        application_id: i64,
        status: StepStatus,
    ) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM step_records
             WHERE application_id = ? AND status = ? AND step != ?",
        )
        .bind(application_id)
        .bind(status)
        .bind(WizardStep::FinalSummary)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    pub async fn count_ok(&self, application_id: i64) -> Result<i64> {
        self.count_by_status(application_id, StepStatus::Ok).await
    }

    pub fn total_steps(&self) -> usize {
        WizardStep::total_real()
    }

    /// Most recently executed record for an application.
    pub async fn latest(&self, application_id: i64) -> Result<Option<StepRecord>> {
        let record = sqlx::query_as::<_, StepRecord>(
            "SELECT * FROM step_records WHERE application_id = ?
             ORDER BY executed_at DESC, id DESC LIMIT 1",
        )
        .bind(application_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    // =========================================================================
    // Gate evaluation
    // =========================================================================

    /// Whether the wizard permits entry to `step`.
    ///
    /// True when the step has no predecessor, or when the immediate
    /// predecessor's record exists with status Ok. Only one level is
    /// inspected; a predecessor can only have reached Ok through its own
    /// gate.
    pub async fn can_enter(&self, application_id: i64, step: WizardStep) -> Result<bool> {
        let Some(predecessor) = step.predecessor() else {
            return Ok(true);
        };

        let record = self.get_status(application_id, predecessor).await?;
        Ok(matches!(
            record,
            Some(StepRecord {
                status: StepStatus::Ok,
                ..
            })
        ))
    }

    /// Where to send a caller that failed the gate: the immediate
    /// predecessor, or the step itself when it is already the earliest one.
    pub fn redirect_target(step: WizardStep) -> WizardStep {
        step.predecessor().unwrap_or(step)
    }

    // =========================================================================
    // Outcome recording
    // =========================================================================

    /// Record a step's outcome, replacing any previous record for the pair,
    /// then recompute the final summary.
    ///
    /// Fails with NotFound when the application does not exist; no record is
    /// created in that case. Store errors propagate to the caller.
    pub async fn record(
        &self,
        application_id: i64,
        step: WizardStep,
        status: StepStatus,
        message: &str,
    ) -> Result<StepRecord> {
        self.get_application(application_id).await?;

        // The gate is read-time only; an out-of-order Ok is accepted but
        // worth noticing in the logs.
        if status == StepStatus::Ok && !self.can_enter(application_id, step).await? {
            tracing::warn!(
                application_id,
                step = %step,
                "Recording Ok for a step whose predecessor is not Ok"
            );
        }

        let record = self
            .upsert(application_id, step, status, message)
            .await?;

        self.recompute_final_summary(application_id).await?;

        Ok(record)
    }

    /// Whole-row replace for the unique (application, step) record.
    async fn upsert(
        &self,
        application_id: i64,
        step: WizardStep,
        status: StepStatus,
        message: &str,
    ) -> Result<StepRecord> {
        let record = sqlx::query_as::<_, StepRecord>(
            "INSERT INTO step_records (application_id, step, status, message, executed_at)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(application_id, step) DO UPDATE SET
                 status = excluded.status,
                 message = excluded.message,
                 executed_at = excluded.executed_at
             RETURNING *",
        )
        .bind(application_id)
        .bind(step)
        .bind(status)
        .bind(message)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(record)
    }

    // =========================================================================
    // Final summary
    // =========================================================================

    /// Mark the final summary Ok once every real step is Ok. A missing
    /// record counts as not Ok. When the condition does not hold, nothing
    /// is written: a summary that already reached Ok is never regressed
    /// here.
    async fn recompute_final_summary(&self, application_id: i64) -> Result<()> {
        for step in WizardStep::real_steps() {
            let record = self.get_status(application_id, *step).await?;
            let ok = matches!(
                record,
                Some(StepRecord {
                    status: StepStatus::Ok,
                    ..
                })
            );
            if !ok {
                return Ok(());
            }
        }

        tracing::debug!(application_id, "All real steps Ok, marking final summary");
        self.upsert(
            application_id,
            WizardStep::FinalSummary,
            StepStatus::Ok,
            FINAL_SUMMARY_MESSAGE,
        )
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{create_test_app, create_test_pool};

    async fn setup() -> (WizardService, i64) {
        let pool = create_test_pool().await;
        let app = create_test_app(&pool, "billing").await;
        (WizardService::new(pool), app.id)
    }

    /// Mark every real step Ok for an application.
    async fn mark_all_real_ok(service: &WizardService, app_id: i64) {
        for step in WizardStep::real_steps() {
            service
                .record(app_id, *step, StepStatus::Ok, "done")
                .await
                .unwrap();
        }
    }

    // ==========================================================================
    // Gate evaluation
    // ==========================================================================

    #[tokio::test]
    async fn test_first_step_always_enterable() {
        let (service, app_id) = setup().await;

        assert!(service
            .can_enter(app_id, WizardStep::CodeQualityAnalysis)
            .await
            .unwrap());

        // Stays true regardless of what is stored for it.
        service
            .record(app_id, WizardStep::CodeQualityAnalysis, StepStatus::Failed, "ko")
            .await
            .unwrap();
        assert!(service
            .can_enter(app_id, WizardStep::CodeQualityAnalysis)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_gate_closed_when_predecessor_absent() {
        let (service, app_id) = setup().await;

        assert!(!service
            .can_enter(app_id, WizardStep::CodeQualityGitIntegration)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_gate_closed_when_predecessor_pending_or_failed() {
        let (service, app_id) = setup().await;

        service
            .record(app_id, WizardStep::CodeQualityAnalysis, StepStatus::Pending, "waiting")
            .await
            .unwrap();
        assert!(!service
            .can_enter(app_id, WizardStep::CodeQualityGitIntegration)
            .await
            .unwrap());

        service
            .record(app_id, WizardStep::CodeQualityAnalysis, StepStatus::Failed, "quality gate")
            .await
            .unwrap();
        assert!(!service
            .can_enter(app_id, WizardStep::CodeQualityGitIntegration)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_gate_opens_when_predecessor_ok() {
        let (service, app_id) = setup().await;

        service
            .record(app_id, WizardStep::CodeQualityAnalysis, StepStatus::Ok, "done")
            .await
            .unwrap();
        assert!(service
            .can_enter(app_id, WizardStep::CodeQualityGitIntegration)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_gate_checks_only_immediate_predecessor() {
        let (service, app_id) = setup().await;

        // Second step Ok without the first: the third step's gate still
        // opens, the write path does not re-check the chain.
        service
            .record(app_id, WizardStep::CodeQualityGitIntegration, StepStatus::Ok, "forced")
            .await
            .unwrap();
        assert!(service
            .can_enter(app_id, WizardStep::RepositoryCheck)
            .await
            .unwrap());
    }

    #[test]
    fn test_redirect_target() {
        assert_eq!(
            WizardService::redirect_target(WizardStep::CodeQualityGitIntegration),
            WizardStep::CodeQualityAnalysis
        );
        // Degenerate case: already at the earliest step.
        assert_eq!(
            WizardService::redirect_target(WizardStep::CodeQualityAnalysis),
            WizardStep::CodeQualityAnalysis
        );
    }

    // ==========================================================================
    // Outcome recording
    // ==========================================================================

    #[tokio::test]
    async fn test_record_round_trip() {
        let (service, app_id) = setup().await;
        let before = Utc::now();

        service
            .record(app_id, WizardStep::RepositoryCheck, StepStatus::Failed, "bad token")
            .await
            .unwrap();

        let record = service
            .get_status(app_id, WizardStep::RepositoryCheck)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.status, StepStatus::Failed);
        assert_eq!(record.message.as_deref(), Some("bad token"));
        assert!(record.executed_at >= before);
    }

    #[tokio::test]
    async fn test_record_is_idempotent_last_write_wins() {
        let (service, app_id) = setup().await;

        service
            .record(app_id, WizardStep::RepositoryCheck, StepStatus::Ok, "first")
            .await
            .unwrap();
        service
            .record(app_id, WizardStep::RepositoryCheck, StepStatus::Ok, "second")
            .await
            .unwrap();

        let records = service.statuses(app_id).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].message.as_deref(), Some("second"));
    }

    #[tokio::test]
    async fn test_record_unknown_application_creates_nothing() {
        let (service, _) = setup().await;

        let err = service
            .record(9999, WizardStep::RepositoryCheck, StepStatus::Ok, "done")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let records = service.statuses(9999).await.unwrap();
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn test_scenario_gate_then_record_then_enter() {
        let (service, app_id) = setup().await;

        let a = WizardStep::CodeQualityAnalysis;
        let b = WizardStep::CodeQualityGitIntegration;

        assert!(!service.can_enter(app_id, b).await.unwrap());
        assert_eq!(WizardService::redirect_target(b), a);

        service.record(app_id, a, StepStatus::Ok, "done").await.unwrap();
        assert!(service.can_enter(app_id, b).await.unwrap());
    }

    // ==========================================================================
    // Final summary aggregation
    // ==========================================================================

    #[tokio::test]
    async fn test_summary_not_promoted_while_a_step_is_missing() {
        let (service, app_id) = setup().await;

        for step in &WizardStep::real_steps()[..5] {
            service.record(app_id, *step, StepStatus::Ok, "done").await.unwrap();
        }

        let summary = service
            .get_status(app_id, WizardStep::FinalSummary)
            .await
            .unwrap();
        assert!(summary.is_none());
    }

    #[tokio::test]
    async fn test_summary_not_promoted_while_a_step_is_pending() {
        let (service, app_id) = setup().await;

        for step in &WizardStep::real_steps()[..5] {
            service.record(app_id, *step, StepStatus::Ok, "done").await.unwrap();
        }
        service
            .record(app_id, WizardStep::TargetHostCheck, StepStatus::Pending, "provisioning")
            .await
            .unwrap();

        let summary = service
            .get_status(app_id, WizardStep::FinalSummary)
            .await
            .unwrap();
        assert!(summary.is_none());
    }

    #[tokio::test]
    async fn test_summary_promoted_when_all_real_steps_ok() {
        let (service, app_id) = setup().await;

        mark_all_real_ok(&service, app_id).await;

        let summary = service
            .get_status(app_id, WizardStep::FinalSummary)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(summary.status, StepStatus::Ok);
        assert_eq!(summary.message.as_deref(), Some(FINAL_SUMMARY_MESSAGE));
    }

    #[tokio::test]
    async fn test_summary_never_regresses() {
        let (service, app_id) = setup().await;

        mark_all_real_ok(&service, app_id).await;
        service
            .record(app_id, WizardStep::RepositoryCheck, StepStatus::Failed, "revoked")
            .await
            .unwrap();

        let summary = service
            .get_status(app_id, WizardStep::FinalSummary)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(summary.status, StepStatus::Ok);
    }

    #[tokio::test]
    async fn test_summary_repromotion_is_harmless() {
        let (service, app_id) = setup().await;

        mark_all_real_ok(&service, app_id).await;
        // Another write while everything is Ok re-runs the aggregation.
        service
            .record(app_id, WizardStep::DatabaseConfig, StepStatus::Ok, "again")
            .await
            .unwrap();

        let records = service.statuses(app_id).await.unwrap();
        let summaries: Vec<_> = records
            .iter()
            .filter(|r| r.step == WizardStep::FinalSummary)
            .collect();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].status, StepStatus::Ok);
    }

    // ==========================================================================
    // Progress and listing
    // ==========================================================================

    #[tokio::test]
    async fn test_count_ok_excludes_final_summary() {
        let (service, app_id) = setup().await;

        mark_all_real_ok(&service, app_id).await;

        // 6 real steps Ok plus the derived summary row; the count stays 6.
        assert_eq!(service.count_ok(app_id).await.unwrap(), 6);
        assert_eq!(service.total_steps(), 6);
    }

    #[tokio::test]
    async fn test_count_by_status() {
        let (service, app_id) = setup().await;

        service
            .record(app_id, WizardStep::CodeQualityAnalysis, StepStatus::Ok, "done")
            .await
            .unwrap();
        service
            .record(app_id, WizardStep::CodeQualityGitIntegration, StepStatus::Failed, "ko")
            .await
            .unwrap();

        assert_eq!(
            service.count_by_status(app_id, StepStatus::Ok).await.unwrap(),
            1
        );
        assert_eq!(
            service.count_by_status(app_id, StepStatus::Failed).await.unwrap(),
            1
        );
        assert_eq!(
            service.count_by_status(app_id, StepStatus::Pending).await.unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn test_statuses_in_wizard_order() {
        let (service, app_id) = setup().await;

        // Written out of order on purpose.
        service
            .record(app_id, WizardStep::DatabaseConfig, StepStatus::Pending, "")
            .await
            .unwrap();
        service
            .record(app_id, WizardStep::CodeQualityAnalysis, StepStatus::Ok, "done")
            .await
            .unwrap();

        let records = service.statuses(app_id).await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].step, WizardStep::CodeQualityAnalysis);
        assert_eq!(records[1].step, WizardStep::DatabaseConfig);
    }

    #[tokio::test]
    async fn test_latest_returns_most_recent_write() {
        let (service, app_id) = setup().await;

        service
            .record(app_id, WizardStep::CodeQualityAnalysis, StepStatus::Ok, "done")
            .await
            .unwrap();
        service
            .record(app_id, WizardStep::CodeQualityGitIntegration, StepStatus::Failed, "ko")
            .await
            .unwrap();

        let latest = service.latest(app_id).await.unwrap().unwrap();
        assert_eq!(latest.step, WizardStep::CodeQualityGitIntegration);
    }

    #[tokio::test]
    async fn test_latest_absent_for_fresh_application() {
        let (service, app_id) = setup().await;
        assert!(service.latest(app_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_cascade_delete_removes_step_records() {
        let pool = create_test_pool().await;
        let app = create_test_app(&pool, "billing").await;
        let service = WizardService::new(pool.clone());

        service
            .record(app.id, WizardStep::CodeQualityAnalysis, StepStatus::Ok, "done")
            .await
            .unwrap();

        sqlx::query("DELETE FROM applications WHERE id = ?")
            .bind(app.id)
            .execute(&pool)
            .await
            .unwrap();

        let records = service.statuses(app.id).await.unwrap();
        assert!(records.is_empty());
    }
}
