use super::ServiceError;
use crate::db::{self, AppState};
use actix_web::{web, HttpResponse, Responder};
use common::model::template::MigrationTemplate;
use common::requests::NewTemplate;
use rusqlite::params;

pub(crate) async fn list(state: web::Data<AppState>) -> impl Responder {
    match list_templates(&state) {
        Ok(templates) => HttpResponse::Ok().json(templates),
        Err(e) => e.response(),
    }
}

pub(crate) async fn create(
    state: web::Data<AppState>,
    payload: web::Json<NewTemplate>,
) -> impl Responder {
    match create_template(&state, payload.into_inner()) {
        Ok(template) => HttpResponse::Ok().json(template),
        Err(e) => e.response(),
    }
}

/// Saved templates, most used first.
fn list_templates(state: &AppState) -> Result<Vec<MigrationTemplate>, ServiceError> {
    let conn = state.open()?;
    let mut stmt = conn
        .prepare("SELECT * FROM migration_templates ORDER BY usage_count DESC, id")
        .map_err(|e| e.to_string())?;
    let rows = stmt
        .query_map([], db::template_from_row)
        .map_err(|e| e.to_string())?;
    rows.collect::<rusqlite::Result<Vec<_>>>()
        .map_err(|e| ServiceError::Internal(e.to_string()))
}

fn create_template(
    state: &AppState,
    template: NewTemplate,
) -> Result<MigrationTemplate, ServiceError> {
    let conn = state.open()?;
    conn.execute(
        "INSERT INTO migration_templates (name, description, source_system, mappings, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            template.name,
            template.description,
            template.source_system,
            template.mappings.to_string(),
            db::now_iso()
        ],
    )
    .map_err(|e| e.to_string())?;
    let id = conn.last_insert_rowid();

    let mut stmt = conn
        .prepare("SELECT * FROM migration_templates WHERE id = ?1")
        .map_err(|e| e.to_string())?;
    stmt.query_row(params![id], db::template_from_row)
        .map_err(|e| ServiceError::Internal(e.to_string()))
}
