use super::ServiceError;
use crate::analyzer;
use crate::db::{self, AppState};
use actix_web::{web, HttpResponse, Responder};
use serde::Deserialize;
use std::path::Path;

const DEFAULT_PREVIEW_LIMIT: usize = 10;

#[derive(Deserialize)]
pub struct PreviewQuery {
    pub limit: Option<usize>,
}

pub(crate) async fn process(
    state: web::Data<AppState>,
    path: web::Path<(i64, String)>,
    query: web::Query<PreviewQuery>,
) -> impl Responder {
    let (job_id, collection) = path.into_inner();
    let state = state.get_ref().clone();
    let limit = query.limit.unwrap_or(DEFAULT_PREVIEW_LIMIT);

    // full decode of the collection file; keep it off the async workers
    let outcome =
        web::block(move || preview_collection(&state, job_id, &collection, limit)).await;
    match outcome {
        Ok(Ok(body)) => HttpResponse::Ok().json(body),
        Ok(Err(e)) => e.response(),
        Err(e) => HttpResponse::InternalServerError().body(format!("Task join error: {}", e)),
    }
}

/// Decodes up to `limit` raw documents of one collection so the operator can
/// inspect real data before editing the mapping.
fn preview_collection(
    state: &AppState,
    job_id: i64,
    collection: &str,
    limit: usize,
) -> Result<serde_json::Value, ServiceError> {
    let conn = state.open()?;
    let job = db::get_job(&conn, job_id)?
        .ok_or_else(|| ServiceError::NotFound("Job não encontrado".to_string()))?;
    let config = job.import_config.ok_or_else(|| {
        ServiceError::Precondition("Job has no extracted backup to preview".to_string())
    })?;

    let docs = analyzer::collection_documents(Path::new(&config.extract_path), collection, Some(limit))
        .map_err(ServiceError::NotFound)?;

    Ok(serde_json::json!({
        "collection": collection,
        "documents": docs.iter().map(|d| d.to_json()).collect::<Vec<_>>(),
        "total": docs.len(),
    }))
}
