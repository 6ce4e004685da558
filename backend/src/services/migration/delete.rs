use super::ServiceError;
use crate::db::{self, AppState};
use actix_web::{web, HttpResponse, Responder};
use log::info;
use rusqlite::params;
use std::fs;

pub(crate) async fn process(state: web::Data<AppState>, path: web::Path<i64>) -> impl Responder {
    match delete_job(&state, path.into_inner()) {
        Ok(()) => HttpResponse::Ok().json(serde_json::json!({ "success": true })),
        Err(e) => e.response(),
    }
}

/// Removes the job row (mappings and logs cascade with it) and reclaims the
/// job's extraction directory on disk. Irreversible.
fn delete_job(state: &AppState, job_id: i64) -> Result<(), ServiceError> {
    let conn = state.open()?;
    let job = db::get_job(&conn, job_id)?
        .ok_or_else(|| ServiceError::NotFound("Job não encontrado".to_string()))?;

    // The extraction dir is always `<upload_dir>/job-{id}`; the stored
    // extract_path may point at a nested dump directory inside it.
    let extract_dir = state.upload_dir.join(format!("job-{}", job.id));
    if extract_dir.exists() {
        fs::remove_dir_all(&extract_dir).map_err(|e| e.to_string())?;
    }

    conn.execute("DELETE FROM migration_jobs WHERE id = ?1", params![job_id])
        .map_err(|e| e.to_string())?;
    info!("deleted migration job {} and its extracted files", job_id);
    Ok(())
}
