//! # Import Service
//!
//! `POST /api/migration/jobs/{job_id}/import` runs the whole import pass to
//! completion before responding: every enabled mapping, sequentially, one
//! document at a time. Sequential processing is deliberate — it keeps error
//! attribution exact (every failure knows its record) at the cost of
//! throughput, which the target volumes do not need.
//!
//! The state machine is enforced here: a job can only be imported from
//! `mapping` (first run), `completed` (idempotent re-run) or `failed`
//! (operator retry). Calls out of order are rejected with a precondition
//! error and never downgrade `status`.
//!
//! Failure handling follows the four-level taxonomy: per-document errors
//! are absorbed by the importer routines; an error that escapes a single
//! mapping pass (a missing dump file, say) fails only that mapping, whose
//! failure count is estimated from its known record count; only an error
//! outside the mapping loop marks the whole job `failed`.

use super::ServiceError;
use crate::analyzer;
use crate::db::{self, AppState};
use crate::importer::{self, ImportOptions};
use actix_web::{web, HttpResponse, Responder};
use common::model::import::ImportResult;
use common::model::job::{JobStatus, MigrationJob};
use common::model::log_entry::LogLevel;
use common::model::mapping::MigrationMapping;
use log::info;
use rusqlite::{params, Connection};
use std::path::Path;

/// At most this many per-record error strings are persisted with the
/// per-mapping summary log entry.
pub(crate) const LOGGED_ERROR_CAP: usize = 10;

pub(crate) async fn process(state: web::Data<AppState>, path: web::Path<i64>) -> impl Responder {
    let job_id = path.into_inner();
    let state = state.get_ref().clone();

    match web::block(move || run_import(&state, job_id)).await {
        Ok(Ok(job)) => HttpResponse::Ok().json(job),
        Ok(Err(e)) => e.response(),
        Err(e) => HttpResponse::InternalServerError().body(format!("Task join error: {}", e)),
    }
}

/// Runs the full import pass for one job and returns the updated job row.
pub(crate) fn run_import(state: &AppState, job_id: i64) -> Result<MigrationJob, ServiceError> {
    let conn = state.open()?;
    let job = db::get_job(&conn, job_id)?
        .ok_or_else(|| ServiceError::NotFound("Job não encontrado".to_string()))?;

    match job.status {
        JobStatus::Mapping | JobStatus::Completed | JobStatus::Failed => {}
        other => {
            return Err(ServiceError::Precondition(format!(
                "Import cannot run while the job is '{}'",
                other.as_str()
            )));
        }
    }

    let config = job.import_config.clone().ok_or_else(|| {
        ServiceError::Precondition("Job has no extracted backup to import".to_string())
    })?;

    conn.execute(
        "UPDATE migration_jobs SET status = 'importing', started_at = ?1, error_log = NULL
         WHERE id = ?2",
        params![db::now_iso(), job_id],
    )
    .map_err(|e| e.to_string())?;

    match import_enabled_mappings(&conn, &job, Path::new(&config.extract_path)) {
        Ok((imported, failed)) => {
            conn.execute(
                "UPDATE migration_jobs SET status = 'completed', imported_records = ?1,
                 failed_records = ?2, completed_at = ?3 WHERE id = ?4",
                params![imported, failed, db::now_iso(), job_id],
            )
            .map_err(|e| e.to_string())?;
            info!("job {} imported: {} ok, {} failed", job_id, imported, failed);
        }
        Err(e) => {
            conn.execute(
                "UPDATE migration_jobs SET status = 'failed', error_log = ?1 WHERE id = ?2",
                params![e, job_id],
            )
            .map_err(|e| e.to_string())?;
            return Err(ServiceError::Internal(e));
        }
    }

    db::get_job(&conn, job_id)?.ok_or_else(|| "Job not found after import".to_string().into())
}

/// The mapping loop. Errors escaping a single mapping pass abort only that
/// mapping; its failure count is estimated from the analysis record count.
fn import_enabled_mappings(
    conn: &Connection,
    job: &MigrationJob,
    dump_dir: &Path,
) -> Result<(i64, i64), String> {
    if !dump_dir.exists() {
        return Err(format!(
            "Extracted backup not found at {}",
            dump_dir.display()
        ));
    }

    let mappings = db::list_mappings(conn, job.id)?;
    let mut total_imported: i64 = 0;
    let mut total_failed: i64 = 0;

    for mapping in mappings.iter().filter(|m| m.is_enabled) {
        match import_mapping_pass(conn, job, mapping, dump_dir) {
            Ok(result) => {
                total_imported += result.imported;
                total_failed += result.failed;
            }
            Err(e) => {
                db::append_log(
                    conn,
                    job.id,
                    Some(mapping.id),
                    LogLevel::Error,
                    &format!("Failed to import {}: {}", mapping.source_entity, e),
                    None,
                    None,
                );
                total_failed += mapping.record_count;
            }
        }
    }

    Ok((total_imported, total_failed))
}

/// One mapping's pass: decode the collection, dispatch it to the importer,
/// record the outcome on the mapping row and in the log stream. Shared with
/// the reimport endpoint.
pub(crate) fn import_mapping_pass(
    conn: &Connection,
    job: &MigrationJob,
    mapping: &MigrationMapping,
    dump_dir: &Path,
) -> Result<ImportResult, String> {
    let docs = analyzer::collection_documents(dump_dir, &mapping.source_entity, None)?;
    let options = ImportOptions {
        tenant_id: job.tenant_id,
        store_id: job.store_id,
    };

    let result = importer::import_to_database(
        conn,
        &mapping.target_entity,
        &docs,
        &mapping.field_mappings,
        job.id,
        &options,
    );

    conn.execute(
        "UPDATE migration_mappings SET imported_count = ?1 WHERE id = ?2",
        params![result.imported, mapping.id],
    )
    .map_err(|e| e.to_string())?;

    let capped: Vec<&String> = result.errors.iter().take(LOGGED_ERROR_CAP).collect();
    db::append_log(
        conn,
        job.id,
        Some(mapping.id),
        if result.failed > 0 { LogLevel::Warning } else { LogLevel::Success },
        &format!(
            "Imported {}/{} records from {} to {}",
            result.imported,
            docs.len(),
            mapping.source_entity,
            mapping.target_entity
        ),
        None,
        Some(&serde_json::json!({
            "imported": result.imported,
            "failed": result.failed,
            "errors": capped,
        })),
    );

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::params;
    use std::fs;
    use tempfile::tempdir;

    fn state_with_schema(dir: &std::path::Path) -> AppState {
        let state = AppState::new(dir.join("test.sqlite"), dir);
        let conn = state.open().unwrap();
        db::init_schema(&conn).unwrap();
        state
    }

    fn insert_job(state: &AppState, status: &str, extract_path: Option<&str>) -> i64 {
        let conn = state.open().unwrap();
        let config = extract_path.map(|p| format!(r#"{{"extract_path":"{}"}}"#, p));
        conn.execute(
            "INSERT INTO migration_jobs (name, source_type, source_system, status, file_name,
             file_size, import_config, created_by, created_at)
             VALUES ('j', 'mongodb', 's', ?1, 'f.zip', 1, ?2, 'admin', ?3)",
            params![status, config, db::now_iso()],
        )
        .unwrap();
        conn.last_insert_rowid()
    }

    fn insert_mapping(state: &AppState, job_id: i64, source: &str, target: &str) -> i64 {
        let conn = state.open().unwrap();
        conn.execute(
            "INSERT INTO migration_mappings (job_id, source_entity, target_entity, field_mappings,
             is_enabled, record_count) VALUES (?1, ?2, ?3, '{}', 1, 4)",
            params![job_id, source, target],
        )
        .unwrap();
        conn.last_insert_rowid()
    }

    // {"_id": "...", "Entrada": f64, "Saida": f64}
    fn ledger_doc(id: &str, entrada: f64, saida: f64) -> Vec<u8> {
        let mut body = Vec::new();
        body.push(0x02);
        body.extend_from_slice(b"_id\x00");
        body.extend_from_slice(&((id.len() + 1) as i32).to_le_bytes());
        body.extend_from_slice(id.as_bytes());
        body.push(0x00);
        for (key, value) in [("Entrada", entrada), ("Saida", saida)] {
            body.push(0x01);
            body.extend_from_slice(key.as_bytes());
            body.push(0x00);
            body.extend_from_slice(&value.to_le_bytes());
        }
        let mut out = ((body.len() + 5) as i32).to_le_bytes().to_vec();
        out.extend_from_slice(&body);
        out.push(0x00);
        out
    }

    #[test]
    fn import_is_rejected_while_the_job_is_pending() {
        let dir = tempdir().unwrap();
        let state = state_with_schema(dir.path());
        let job_id = insert_job(&state, "pending", None);

        match run_import(&state, job_id) {
            Err(ServiceError::Precondition(msg)) => assert!(msg.contains("pending")),
            other => panic!("expected precondition error, got {:?}", other.map(|j| j.status)),
        }

        // status must not have been touched
        let conn = state.open().unwrap();
        let status: String = conn
            .query_row("SELECT status FROM migration_jobs WHERE id = ?1", params![job_id], |r| {
                r.get(0)
            })
            .unwrap();
        assert_eq!(status, "pending");
    }

    #[test]
    fn missing_job_is_a_not_found_error() {
        let dir = tempdir().unwrap();
        let state = state_with_schema(dir.path());
        assert!(matches!(
            run_import(&state, 42),
            Err(ServiceError::NotFound(_))
        ));
    }

    #[test]
    fn missing_extract_path_fails_the_job() {
        let dir = tempdir().unwrap();
        let state = state_with_schema(dir.path());
        let job_id = insert_job(&state, "mapping", Some("/nonexistent/dump"));
        insert_mapping(&state, job_id, "DtoLancamento", "fin_transactions");

        assert!(matches!(
            run_import(&state, job_id),
            Err(ServiceError::Internal(_))
        ));

        let conn = state.open().unwrap();
        let (status, error_log): (String, Option<String>) = conn
            .query_row(
                "SELECT status, error_log FROM migration_jobs WHERE id = ?1",
                params![job_id],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .unwrap();
        assert_eq!(status, "failed");
        assert!(error_log.unwrap().contains("not found"));
    }

    #[test]
    fn full_import_aggregates_totals_and_completes_the_job() {
        let dir = tempdir().unwrap();
        let state = state_with_schema(dir.path());
        let dump_dir = dir.path().join("dump");
        fs::create_dir(&dump_dir).unwrap();

        // 2 good ledger entries + 1 with no amounts at all
        let mut buf = ledger_doc("aaaa0001", 150.0, 0.0);
        buf.extend_from_slice(&ledger_doc("aaaa0002", 0.0, 75.5));
        buf.extend_from_slice(&ledger_doc("aaaa0003", 0.0, 0.0));
        fs::write(dump_dir.join("DtoLancamento.bson"), &buf).unwrap();

        let job_id = insert_job(&state, "mapping", Some(dump_dir.to_str().unwrap()));
        let mapping_id = insert_mapping(&state, job_id, "DtoLancamento", "fin_transactions");
        // a mapping whose dump file is missing fails alone, estimated by its record count
        insert_mapping(&state, job_id, "DtoSumida", "customers");

        let job = run_import(&state, job_id).unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.imported_records, 2);
        // 1 bad ledger entry + 4 estimated for the missing collection
        assert_eq!(job.failed_records, 5);
        assert!(job.started_at.is_some());
        assert!(job.completed_at.is_some());

        let conn = state.open().unwrap();
        let imported_count: i64 = conn
            .query_row(
                "SELECT imported_count FROM migration_mappings WHERE id = ?1",
                params![mapping_id],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(imported_count, 2);

        // second run: same totals except nothing new lands
        let job = run_import(&state, job_id).unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.imported_records, 0);
        assert_eq!(job.failed_records, 5);
    }

    #[test]
    fn disabled_mappings_are_skipped() {
        let dir = tempdir().unwrap();
        let state = state_with_schema(dir.path());
        let dump_dir = dir.path().join("dump");
        fs::create_dir(&dump_dir).unwrap();
        fs::write(
            dump_dir.join("DtoLancamento.bson"),
            ledger_doc("bbbb0001", 10.0, 0.0),
        )
        .unwrap();

        let job_id = insert_job(&state, "mapping", Some(dump_dir.to_str().unwrap()));
        let mapping_id = insert_mapping(&state, job_id, "DtoLancamento", "fin_transactions");
        let conn = state.open().unwrap();
        conn.execute(
            "UPDATE migration_mappings SET is_enabled = 0 WHERE id = ?1",
            params![mapping_id],
        )
        .unwrap();

        let job = run_import(&state, job_id).unwrap();
        assert_eq!(job.imported_records, 0);
        assert_eq!(job.failed_records, 0);
    }
}
