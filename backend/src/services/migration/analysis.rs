use super::ServiceError;
use crate::db::{self, AppState};
use actix_web::{web, HttpResponse, Responder};
use common::model::analysis::AnalysisResult;

pub(crate) async fn process(state: web::Data<AppState>, path: web::Path<i64>) -> impl Responder {
    match get_analysis(&state, path.into_inner()) {
        Ok(analysis) => HttpResponse::Ok().json(analysis),
        Err(e) => e.response(),
    }
}

/// Returns the analysis persisted during upload; `null` when the job never
/// went through analysis (flat files, failed extraction).
fn get_analysis(state: &AppState, job_id: i64) -> Result<Option<AnalysisResult>, ServiceError> {
    let conn = state.open()?;
    let job = db::get_job(&conn, job_id)?
        .ok_or_else(|| ServiceError::NotFound("Job não encontrado".to_string()))?;
    Ok(job.analysis_result)
}
