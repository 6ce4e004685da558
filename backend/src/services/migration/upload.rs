//! # Backup Upload Service
//!
//! Receives the backup archive as a multipart request and walks the job
//! through the first half of its lifecycle in a single call.
//!
//! ## Workflow:
//!
//! 1.  **Multipart parsing**: a `json` field carries the job metadata
//!     (name, source-system label, optional tenant/store); a `file` field
//!     carries the archive itself. The file is streamed to the upload
//!     directory under a unique, sanitized name while its MD5 is computed
//!     on the fly.
//!
//! 2.  **Job creation**: a `migration_jobs` row is inserted in `pending`
//!     with the original filename, size and checksum. The source type is
//!     detected from the extension (`.zip` means a full database backup).
//!
//! 3.  **Extraction + analysis** (recognized archives only): the archive is
//!     validated against the zip-slip contract and unpacked into the job's
//!     own `job-{id}` directory, the dump directory is located, the job
//!     moves through `analyzing`, and the analysis result is persisted.
//!     Default mappings are seeded from the registry for every collection
//!     it knows. The job settles in `mapping`.
//!
//! 4.  **Failure**: any extraction/analysis error marks the job `failed`
//!     with the error stored in `error_log`; the job row is still returned
//!     so the operator can see what happened.

use crate::analyzer;
use crate::archive::{extract_archive, SystemUnzip};
use crate::db::{self, AppState};
use crate::registry::MappingRegistry;
use actix_multipart::Multipart;
use actix_web::{web, HttpResponse, Responder};
use common::model::job::{JobStatus, MigrationJob};
use common::model::log_entry::LogLevel;
use common::requests::UploadMeta;
use futures_util::StreamExt;
use log::{error, info};
use md5::Context;
use rusqlite::{params, Connection};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// What the multipart reader stored on disk.
struct StoredUpload {
    path: PathBuf,
    file_name: String,
    file_size: i64,
    checksum: String,
}

pub(crate) async fn process(state: web::Data<AppState>, payload: Multipart) -> impl Responder {
    match upload_backup(state.get_ref().clone(), payload).await {
        Ok(job) => HttpResponse::Ok().json(job),
        Err(e) => HttpResponse::BadRequest().body(format!("Error: {}", e)),
    }
}

/// Keeps only filesystem-safe characters of the client-supplied filename.
fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .take(100)
        .collect()
}

fn detect_source_type(file_name: &str) -> &'static str {
    if file_name.ends_with(".zip") {
        "mongodb"
    } else if file_name.ends_with(".json") {
        "json"
    } else if file_name.ends_with(".csv") {
        "csv"
    } else {
        "unknown"
    }
}

async fn upload_backup(state: AppState, mut payload: Multipart) -> Result<MigrationJob, String> {
    let mut meta = UploadMeta::default();
    let mut stored: Option<StoredUpload> = None;

    while let Some(item) = payload.next().await {
        let mut field = item.map_err(|e| e.to_string())?;
        let field_name = field
            .content_disposition()
            .and_then(|cd| cd.get_name().map(|n| n.to_string()));

        match field_name.as_deref() {
            Some("json") => {
                let mut bytes = Vec::new();
                while let Some(chunk) = field.next().await {
                    bytes.extend_from_slice(&chunk.map_err(|e| e.to_string())?);
                }
                meta = serde_json::from_slice(&bytes).map_err(|e| e.to_string())?;
            }

            Some("file") => {
                let original = field
                    .content_disposition()
                    .and_then(|cd| cd.get_filename().map(|f| f.to_string()))
                    .unwrap_or_default();
                if original.is_empty() {
                    return Err("Uploaded file has no filename".to_string());
                }

                let path = state
                    .upload_dir
                    .join(format!("{}-{}", Uuid::new_v4(), sanitize_filename(&original)));
                let mut file = File::create(&path).map_err(|e| e.to_string())?;
                let mut hasher = Context::new();
                let mut file_size: i64 = 0;

                while let Some(chunk) = field.next().await {
                    let chunk = chunk.map_err(|e| e.to_string())?;
                    hasher.consume(&chunk);
                    file_size += chunk.len() as i64;
                    file.write_all(&chunk).map_err(|e| e.to_string())?;
                }

                stored = Some(StoredUpload {
                    path,
                    file_name: original,
                    file_size,
                    checksum: format!("{:x}", hasher.finalize()),
                });
            }

            _ => {}
        }
    }

    let stored = stored.ok_or("Missing file")?;

    // The rest is blocking work: database writes, unzip, full decode.
    web::block(move || register_and_analyze(&state, &meta, &stored))
        .await
        .map_err(|e| format!("Task join error: {}", e))?
}

/// Creates the job row and, for recognized archives, runs extraction and
/// analysis to completion before returning the job.
fn register_and_analyze(
    state: &AppState,
    meta: &UploadMeta,
    stored: &StoredUpload,
) -> Result<MigrationJob, String> {
    let conn = state.open()?;
    let source_type = detect_source_type(&stored.file_name);
    let name = meta
        .name
        .clone()
        .unwrap_or_else(|| format!("Migração {}", &db::now_iso()[..10]));
    let source_system = meta
        .source_system
        .clone()
        .unwrap_or_else(|| "Sistema Legado".to_string());

    conn.execute(
        "INSERT INTO migration_jobs (name, source_type, source_system, status, file_name,
         file_size, checksum, tenant_id, store_id, created_by, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            name,
            source_type,
            source_system,
            JobStatus::Pending.as_str(),
            stored.file_name,
            stored.file_size,
            stored.checksum,
            meta.tenant_id,
            meta.store_id,
            "admin",
            db::now_iso()
        ],
    )
    .map_err(|e| e.to_string())?;
    let job_id = conn.last_insert_rowid();
    info!(
        "created migration job {} for {} ({} bytes)",
        job_id, stored.file_name, stored.file_size
    );

    if source_type == "mongodb" {
        if let Err(e) = analyze_archive(state, &conn, job_id, &source_system, &stored.path) {
            error!("analysis of job {} failed: {}", job_id, e);
            conn.execute(
                "UPDATE migration_jobs SET status = 'failed', error_log = ?1 WHERE id = ?2",
                params![e, job_id],
            )
            .map_err(|e| e.to_string())?;
            db::append_log(
                &conn,
                job_id,
                None,
                LogLevel::Error,
                &format!("Falha na análise do backup: {}", e),
                None,
                None,
            );
        }
    }

    db::get_job(&conn, job_id)?.ok_or_else(|| "Job not found after insert".to_string())
}

/// Extraction and analysis pass: unpack, locate the dump directory, persist
/// the analysis and seed the default mappings.
fn analyze_archive(
    state: &AppState,
    conn: &Connection,
    job_id: i64,
    source_system: &str,
    archive_path: &Path,
) -> Result<(), String> {
    let extract_dir = state.upload_dir.join(format!("job-{}", job_id));
    std::fs::create_dir_all(&extract_dir).map_err(|e| e.to_string())?;

    extract_archive(&SystemUnzip, archive_path, &extract_dir)?;
    let dump_dir = analyzer::find_dump_dir(&extract_dir);

    let config = serde_json::json!({ "extract_path": dump_dir.to_string_lossy() });
    conn.execute(
        "UPDATE migration_jobs SET status = 'analyzing', import_config = ?1 WHERE id = ?2",
        params![config.to_string(), job_id],
    )
    .map_err(|e| e.to_string())?;

    let analysis = analyzer::analyze_backup_directory(&dump_dir, source_system)?;

    conn.execute(
        "UPDATE migration_jobs SET status = 'mapping', total_records = ?1, analysis_result = ?2
         WHERE id = ?3",
        params![
            analysis.total_records,
            serde_json::to_string(&analysis).map_err(|e| e.to_string())?,
            job_id
        ],
    )
    .map_err(|e| e.to_string())?;

    let registry = MappingRegistry::builtin();
    for collection in &analysis.collections {
        if let Some(entry) = registry.lookup(&collection.name) {
            let fields = serde_json::to_string(&entry.field_mappings()).map_err(|e| e.to_string())?;
            conn.execute(
                "INSERT INTO migration_mappings (job_id, source_entity, target_entity,
                 field_mappings, is_enabled, record_count, priority)
                 VALUES (?1, ?2, ?3, ?4, 1, ?5, ?6)",
                params![job_id, collection.name, entry.target, fields, collection.count, collection.count],
            )
            .map_err(|e| e.to_string())?;
        }
    }

    db::append_log(
        conn,
        job_id,
        None,
        LogLevel::Info,
        &format!(
            "Análise concluída: {} coleções, {} registros",
            analysis.total_collections, analysis.total_records
        ),
        None,
        None,
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitizes_hostile_filenames() {
        assert_eq!(sanitize_filename("backup loja (1).zip"), "backup_loja__1_.zip");
        assert_eq!(sanitize_filename("../../evil.zip"), ".._.._evil.zip");
        let long = "a".repeat(200);
        assert_eq!(sanitize_filename(&long).len(), 100);
    }

    #[test]
    fn detects_source_type_from_the_extension() {
        assert_eq!(detect_source_type("dump.zip"), "mongodb");
        assert_eq!(detect_source_type("data.json"), "json");
        assert_eq!(detect_source_type("rows.csv"), "csv");
        assert_eq!(detect_source_type("blob.bin"), "unknown");
    }
}
