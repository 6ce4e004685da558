use super::import::import_mapping_pass;
use super::ServiceError;
use crate::db::{self, AppState};
use actix_web::{web, HttpResponse, Responder};
use common::model::import::ImportResult;
use std::path::Path;

pub(crate) async fn process(
    state: web::Data<AppState>,
    path: web::Path<(i64, i64)>,
) -> impl Responder {
    let (job_id, mapping_id) = path.into_inner();
    let state = state.get_ref().clone();

    match web::block(move || reimport_mapping(&state, job_id, mapping_id)).await {
        Ok(Ok(result)) => HttpResponse::Ok().json(result),
        Ok(Err(e)) => e.response(),
        Err(e) => HttpResponse::InternalServerError().body(format!("Task join error: {}", e)),
    }
}

/// Re-runs a single mapping after the operator fixed it. The job's overall
/// status is deliberately left alone — this is the incremental correction
/// path, and idempotent inserts make it safe to repeat.
fn reimport_mapping(
    state: &AppState,
    job_id: i64,
    mapping_id: i64,
) -> Result<ImportResult, ServiceError> {
    let conn = state.open()?;
    let job = db::get_job(&conn, job_id)?
        .ok_or_else(|| ServiceError::NotFound("Job não encontrado".to_string()))?;
    let mapping = db::get_mapping(&conn, mapping_id)?
        .filter(|m| m.job_id == job_id)
        .ok_or_else(|| ServiceError::NotFound("Mapeamento não encontrado".to_string()))?;
    let config = job.import_config.clone().ok_or_else(|| {
        ServiceError::Precondition("Job has no extracted backup to import".to_string())
    })?;

    let result = import_mapping_pass(&conn, &job, &mapping, Path::new(&config.extract_path))?;
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::params;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn reimport_leaves_the_job_status_alone() {
        let dir = tempdir().unwrap();
        let state = AppState::new(dir.path().join("test.sqlite"), dir.path());
        let conn = state.open().unwrap();
        db::init_schema(&conn).unwrap();

        let dump_dir = dir.path().join("dump");
        fs::create_dir(&dump_dir).unwrap();
        // {"Entrada": 20.0} with a string id
        let mut body = vec![0x02];
        body.extend_from_slice(b"_id\x00");
        body.extend_from_slice(&9i32.to_le_bytes());
        body.extend_from_slice(b"cccc0001\x00");
        body.push(0x01);
        body.extend_from_slice(b"Entrada\x00");
        body.extend_from_slice(&20.0f64.to_le_bytes());
        let mut doc = ((body.len() + 5) as i32).to_le_bytes().to_vec();
        doc.extend_from_slice(&body);
        doc.push(0x00);
        fs::write(dump_dir.join("DtoLancamento.bson"), doc).unwrap();

        conn.execute(
            "INSERT INTO migration_jobs (name, source_type, source_system, status, file_name,
             file_size, import_config, created_by, created_at)
             VALUES ('j', 'mongodb', 's', 'completed', 'f.zip', 1, ?1, 'admin', ?2)",
            params![
                format!(r#"{{"extract_path":"{}"}}"#, dump_dir.to_str().unwrap()),
                db::now_iso()
            ],
        )
        .unwrap();
        let job_id = conn.last_insert_rowid();
        conn.execute(
            "INSERT INTO migration_mappings (job_id, source_entity, target_entity, field_mappings, is_enabled)
             VALUES (?1, 'DtoLancamento', 'fin_transactions', '{}', 1)",
            params![job_id],
        )
        .unwrap();
        let mapping_id = conn.last_insert_rowid();

        let result = reimport_mapping(&state, job_id, mapping_id).unwrap();
        assert_eq!(result.imported, 1);
        assert_eq!(result.failed, 0);

        let status: String = conn
            .query_row(
                "SELECT status FROM migration_jobs WHERE id = ?1",
                params![job_id],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(status, "completed");

        // running it again is safe and inserts nothing new
        let again = reimport_mapping(&state, job_id, mapping_id).unwrap();
        assert_eq!(again.imported, 0);
        assert_eq!(again.failed, 0);
    }

    #[test]
    fn mapping_of_another_job_is_not_found() {
        let dir = tempdir().unwrap();
        let state = AppState::new(dir.path().join("test.sqlite"), dir.path());
        let conn = state.open().unwrap();
        db::init_schema(&conn).unwrap();

        for _ in 0..2 {
            conn.execute(
                "INSERT INTO migration_jobs (name, source_type, source_system, status, file_name,
                 file_size, import_config, created_by, created_at)
                 VALUES ('j', 'mongodb', 's', 'mapping', 'f.zip', 1, '{\"extract_path\":\"/tmp\"}', 'admin', ?1)",
                params![db::now_iso()],
            )
            .unwrap();
        }
        conn.execute(
            "INSERT INTO migration_mappings (job_id, source_entity, target_entity, field_mappings)
             VALUES (2, 'DtoPessoa', 'customers', '{}')",
            [],
        )
        .unwrap();
        let mapping_id = conn.last_insert_rowid();

        assert!(matches!(
            reimport_mapping(&state, 1, mapping_id),
            Err(ServiceError::NotFound(_))
        ));
    }
}
