use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};

use crate::db::{GateView, ProgressView, RecordOutcome, StepRecord, StepView};
use crate::error::{AppError, Result};
use crate::state::AppState;
use crate::wizard::{WizardService, WizardStep};

/// Create wizard routes, nested under /applications
pub fn wizard_routes(state: AppState) -> Router {
    Router::new()
        .route("/:app_id/wizard/steps", get(list_steps))
        .route("/:app_id/wizard/steps/:step", get(get_step))
        .route("/:app_id/wizard/steps/:step/outcome", post(record_outcome))
        .route("/:app_id/wizard/steps/:step/check", post(run_check))
        .route("/:app_id/wizard/progress", get(get_progress))
        .route("/:app_id/wizard/latest", get(get_latest))
        .with_state(state)
}

// ============================================================================
// Endpoint Handlers
// ============================================================================

/// Wizard overview: every step in order, with its stored record or a
/// pending placeholder, plus the gate decision for each.
async fn list_steps(
    State(state): State<AppState>,
    Path(app_id): Path<i64>,
) -> Result<Json<Vec<StepView>>> {
    let service = WizardService::new(state.pool.clone());
    service.get_application(app_id).await?;

    let records = service.statuses(app_id).await?;

    let mut views = Vec::with_capacity(WizardStep::ordered().len());
    for step in WizardStep::ordered() {
        let can_enter = service.can_enter(app_id, *step).await?;
        let view = match records.iter().find(|r| r.step == *step) {
            Some(record) => StepView::from_record(record, can_enter),
            None => StepView::placeholder(*step, can_enter),
        };
        views.push(view);
    }

    Ok(Json(views))
}

/// Gate decision and stored record for one step
async fn get_step(
    State(state): State<AppState>,
    Path((app_id, step)): Path<(i64, String)>,
) -> Result<Json<GateView>> {
    let step = WizardStep::from_slug(&step)?;
    let service = WizardService::new(state.pool.clone());
    service.get_application(app_id).await?;

    let can_enter = service.can_enter(app_id, step).await?;
    let record = service.get_status(app_id, step).await?;

    Ok(Json(GateView {
        step,
        can_enter,
        redirect_to: WizardService::redirect_target(step),
        record,
    }))
}

/// Record a step outcome (the write path of the wizard)
async fn record_outcome(
    State(state): State<AppState>,
    Path((app_id, step)): Path<(i64, String)>,
    Json(req): Json<RecordOutcome>,
) -> Result<Json<StepRecord>> {
    let step = WizardStep::from_slug(&step)?;
    if step == WizardStep::FinalSummary {
        return Err(AppError::BadRequest(
            "The final summary is derived and cannot be recorded directly".to_string(),
        ));
    }

    let service = WizardService::new(state.pool.clone());
    let record = service
        .record(app_id, step, req.status, &req.message)
        .await?;

    Ok(Json(record))
}

/// Run the step's probe and record its verdict
async fn run_check(
    State(state): State<AppState>,
    Path((app_id, step)): Path<(i64, String)>,
) -> Result<Json<StepRecord>> {
    let step = WizardStep::from_slug(&step)?;
    let probe = state
        .probes
        .for_step(step)
        .ok_or_else(|| AppError::BadRequest(format!("Step has no probe: {step}")))?;

    let service = WizardService::new(state.pool.clone());
    let app = service.get_application(app_id).await?;

    let outcome = probe.check(&app).await?;
    tracing::debug!(
        application_id = app_id,
        step = %step,
        status = ?outcome.status,
        "Probe finished"
    );

    let record = service
        .record(app_id, step, outcome.status, &outcome.message)
        .await?;

    Ok(Json(record))
}

/// Progress counters for the progress bar
async fn get_progress(
    State(state): State<AppState>,
    Path(app_id): Path<i64>,
) -> Result<Json<ProgressView>> {
    let service = WizardService::new(state.pool.clone());
    service.get_application(app_id).await?;

    Ok(Json(ProgressView {
        ok: service.count_ok(app_id).await?,
        total: service.total_steps(),
    }))
}

/// Most recently executed step record, if any
async fn get_latest(
    State(state): State<AppState>,
    Path(app_id): Path<i64>,
) -> Result<Json<Option<StepRecord>>> {
    let service = WizardService::new(state.pool.clone());
    service.get_application(app_id).await?;

    Ok(Json(service.latest(app_id).await?))
}
