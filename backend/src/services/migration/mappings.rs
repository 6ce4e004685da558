use super::ServiceError;
use crate::db::{self, AppState};
use actix_web::{web, HttpResponse, Responder};
use common::model::mapping::MigrationMapping;
use common::requests::UpdateMappingsRequest;
use rusqlite::params;

pub(crate) async fn process(
    state: web::Data<AppState>,
    path: web::Path<i64>,
    payload: web::Json<UpdateMappingsRequest>,
) -> impl Responder {
    match update_mappings(&state, path.into_inner(), payload.into_inner()) {
        Ok(mappings) => HttpResponse::Ok().json(mappings),
        Err(e) => e.response(),
    }
}

/// Applies the operator's mapping edits: entries with an `id` update the
/// existing row, entries without one create a new mapping for the given
/// source collection. Echoes the job's full mapping set afterwards.
fn update_mappings(
    state: &AppState,
    job_id: i64,
    request: UpdateMappingsRequest,
) -> Result<Vec<MigrationMapping>, ServiceError> {
    let conn = state.open()?;
    db::get_job(&conn, job_id)?
        .ok_or_else(|| ServiceError::NotFound("Job não encontrado".to_string()))?;

    for edit in &request.mappings {
        let fields = serde_json::to_string(&edit.field_mappings).map_err(|e| e.to_string())?;
        let transformations = edit.transformations.as_ref().map(|t| t.to_string());

        match edit.id {
            Some(mapping_id) => {
                conn.execute(
                    "UPDATE migration_mappings
                     SET target_entity = ?1, field_mappings = ?2, is_enabled = ?3, transformations = ?4
                     WHERE id = ?5 AND job_id = ?6",
                    params![
                        edit.target_entity,
                        fields,
                        edit.is_enabled.unwrap_or(true),
                        transformations,
                        mapping_id,
                        job_id
                    ],
                )
                .map_err(|e| e.to_string())?;
            }
            None => {
                let source_entity = edit.source_entity.as_deref().ok_or_else(|| {
                    ServiceError::Precondition(
                        "New mappings need a source_entity".to_string(),
                    )
                })?;
                conn.execute(
                    "INSERT INTO migration_mappings (job_id, source_entity, target_entity,
                     field_mappings, transformations, is_enabled, record_count)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    params![
                        job_id,
                        source_entity,
                        edit.target_entity,
                        fields,
                        transformations,
                        edit.is_enabled.unwrap_or(true),
                        edit.record_count.unwrap_or(0)
                    ],
                )
                .map_err(|e| e.to_string())?;
            }
        }
    }

    Ok(db::list_mappings(&conn, job_id)?)
}
