use super::ServiceError;
use crate::db::{self, AppState};
use actix_web::{web, HttpResponse, Responder};
use common::model::job::JobDetail;

/// How many of the most recent log entries ride along with the job.
const LOG_LIMIT: i64 = 100;

pub(crate) async fn process(state: web::Data<AppState>, path: web::Path<i64>) -> impl Responder {
    match get_job_detail(&state, path.into_inner()) {
        Ok(detail) => HttpResponse::Ok().json(detail),
        Err(e) => e.response(),
    }
}

/// Fetches one job together with its mappings and its most recent log
/// entries, most recent first.
fn get_job_detail(state: &AppState, job_id: i64) -> Result<JobDetail, ServiceError> {
    let conn = state.open()?;
    let job = db::get_job(&conn, job_id)?
        .ok_or_else(|| ServiceError::NotFound("Job não encontrado".to_string()))?;
    let mappings = db::list_mappings(&conn, job_id)?;
    let logs = db::recent_logs(&conn, job_id, LOG_LIMIT)?;
    Ok(JobDetail { job, mappings, logs })
}
