//! SQLite persistence for jobs, mappings, logs and the destination tables.
//!
//! Connections are opened per operation from the shared [`AppState`], which
//! only carries paths — that keeps every core function callable from tests
//! against a temp directory. The schema is created idempotently at startup.
//!
//! Destination tables carry UNIQUE natural keys so the importer's
//! `INSERT OR IGNORE` writes stay idempotent across reimports.

use chrono::Utc;
use common::model::analysis::AnalysisResult;
use common::model::job::{ImportConfig, JobStatus, MigrationJob};
use common::model::log_entry::{LogLevel, MigrationLogEntry};
use common::model::mapping::MigrationMapping;
use common::model::template::MigrationTemplate;
use log::error;
use rusqlite::{params, Connection, Row};
use std::path::PathBuf;

/// Shared application state: where the database lives and where uploads and
/// extracted backups are kept.
#[derive(Clone)]
pub struct AppState {
    pub db_path: PathBuf,
    pub upload_dir: PathBuf,
}

impl AppState {
    pub fn new(db_path: impl Into<PathBuf>, upload_dir: impl Into<PathBuf>) -> Self {
        AppState {
            db_path: db_path.into(),
            upload_dir: upload_dir.into(),
        }
    }

    pub fn open(&self) -> Result<Connection, String> {
        let conn = Connection::open(&self.db_path).map_err(|e| e.to_string())?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .map_err(|e| e.to_string())?;
        Ok(conn)
    }
}

pub fn now_iso() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

/// Creates every table the service needs. Safe to run on every startup.
pub fn init_schema(conn: &Connection) -> Result<(), String> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS migration_jobs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            source_type TEXT NOT NULL,
            source_system TEXT NOT NULL,
            status TEXT NOT NULL,
            file_name TEXT NOT NULL,
            file_size INTEGER NOT NULL,
            checksum TEXT,
            tenant_id INTEGER,
            store_id INTEGER,
            total_records INTEGER NOT NULL DEFAULT 0,
            imported_records INTEGER NOT NULL DEFAULT 0,
            failed_records INTEGER NOT NULL DEFAULT 0,
            analysis_result TEXT,
            import_config TEXT,
            error_log TEXT,
            created_by TEXT NOT NULL,
            created_at TEXT NOT NULL,
            started_at TEXT,
            completed_at TEXT
        );

        CREATE TABLE IF NOT EXISTS migration_mappings (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            job_id INTEGER NOT NULL REFERENCES migration_jobs(id) ON DELETE CASCADE,
            source_entity TEXT NOT NULL,
            target_entity TEXT NOT NULL,
            field_mappings TEXT NOT NULL,
            transformations TEXT,
            is_enabled INTEGER NOT NULL DEFAULT 1,
            record_count INTEGER NOT NULL DEFAULT 0,
            imported_count INTEGER NOT NULL DEFAULT 0,
            priority INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS migration_logs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            job_id INTEGER NOT NULL REFERENCES migration_jobs(id) ON DELETE CASCADE,
            mapping_id INTEGER,
            level TEXT NOT NULL,
            message TEXT NOT NULL,
            source_id TEXT,
            details TEXT,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS migration_templates (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            description TEXT,
            source_system TEXT,
            mappings TEXT NOT NULL,
            usage_count INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS customers (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            tenant_id INTEGER,
            code TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            tax_id TEXT,
            email TEXT,
            phone TEXT,
            address TEXT,
            city TEXT,
            state TEXT,
            notes TEXT
        );

        CREATE TABLE IF NOT EXISTS products (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            tenant_id INTEGER,
            code TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            description TEXT,
            category TEXT,
            unit TEXT,
            sale_price TEXT,
            cost_price TEXT,
            ncm TEXT,
            status TEXT
        );

        CREATE TABLE IF NOT EXISTS pos_sales (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            tenant_id INTEGER,
            store_id INTEGER,
            sale_number TEXT NOT NULL UNIQUE,
            subtotal TEXT,
            total_amount TEXT,
            discount_amount TEXT,
            status TEXT,
            payment_method TEXT,
            notes TEXT
        );

        CREATE TABLE IF NOT EXISTS retail_sellers (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            tenant_id INTEGER,
            code TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            email TEXT,
            phone TEXT,
            is_active INTEGER NOT NULL DEFAULT 1
        );

        CREATE TABLE IF NOT EXISTS retail_stores (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            tenant_id INTEGER,
            code TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            legal_name TEXT,
            cnpj TEXT,
            address TEXT,
            city TEXT,
            state TEXT,
            zip_code TEXT,
            email TEXT,
            phone TEXT,
            status TEXT
        );

        CREATE TABLE IF NOT EXISTS service_orders (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            tenant_id INTEGER,
            store_id INTEGER,
            order_number TEXT NOT NULL UNIQUE,
            customer_name TEXT,
            imei TEXT,
            brand TEXT,
            model TEXT,
            issue_description TEXT,
            service_type TEXT,
            status TEXT,
            labor_cost TEXT,
            parts_cost TEXT,
            total_cost TEXT
        );

        CREATE TABLE IF NOT EXISTS fin_accounts_payable (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            document_number TEXT NOT NULL UNIQUE,
            supplier_name TEXT,
            description TEXT,
            issue_date TEXT,
            due_date TEXT,
            original_amount TEXT,
            discount_amount TEXT,
            interest_amount TEXT,
            fine_amount TEXT,
            paid_amount TEXT,
            remaining_amount TEXT,
            status TEXT,
            paid_at TEXT,
            notes TEXT
        );

        CREATE TABLE IF NOT EXISTS fin_accounts_receivable (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            document_number TEXT NOT NULL UNIQUE,
            customer_name TEXT,
            description TEXT,
            issue_date TEXT,
            due_date TEXT,
            original_amount TEXT,
            discount_amount TEXT,
            interest_amount TEXT,
            fine_amount TEXT,
            received_amount TEXT,
            remaining_amount TEXT,
            status TEXT,
            received_at TEXT,
            notes TEXT
        );",
    )
    .map_err(|e| e.to_string())
}

fn conversion_err(idx: usize, msg: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        idx,
        rusqlite::types::Type::Text,
        msg.into(),
    )
}

pub fn job_from_row(row: &Row) -> rusqlite::Result<MigrationJob> {
    let status_raw: String = row.get("status")?;
    let status = JobStatus::parse(&status_raw)
        .ok_or_else(|| conversion_err(4, format!("unknown job status: {}", status_raw)))?;
    let analysis_raw: Option<String> = row.get("analysis_result")?;
    let analysis_result: Option<AnalysisResult> =
        analysis_raw.and_then(|s| serde_json::from_str(&s).ok());
    let config_raw: Option<String> = row.get("import_config")?;
    let import_config: Option<ImportConfig> = config_raw.and_then(|s| serde_json::from_str(&s).ok());

    Ok(MigrationJob {
        id: row.get("id")?,
        name: row.get("name")?,
        source_type: row.get("source_type")?,
        source_system: row.get("source_system")?,
        status,
        file_name: row.get("file_name")?,
        file_size: row.get("file_size")?,
        checksum: row.get("checksum")?,
        tenant_id: row.get("tenant_id")?,
        store_id: row.get("store_id")?,
        total_records: row.get("total_records")?,
        imported_records: row.get("imported_records")?,
        failed_records: row.get("failed_records")?,
        analysis_result,
        import_config,
        error_log: row.get("error_log")?,
        created_by: row.get("created_by")?,
        created_at: row.get("created_at")?,
        started_at: row.get("started_at")?,
        completed_at: row.get("completed_at")?,
    })
}

pub fn mapping_from_row(row: &Row) -> rusqlite::Result<MigrationMapping> {
    let fields_raw: String = row.get("field_mappings")?;
    let field_mappings = serde_json::from_str(&fields_raw)
        .map_err(|e| conversion_err(4, format!("bad field_mappings json: {}", e)))?;
    let transformations_raw: Option<String> = row.get("transformations")?;

    Ok(MigrationMapping {
        id: row.get("id")?,
        job_id: row.get("job_id")?,
        source_entity: row.get("source_entity")?,
        target_entity: row.get("target_entity")?,
        field_mappings,
        transformations: transformations_raw.and_then(|s| serde_json::from_str(&s).ok()),
        is_enabled: row.get::<_, i64>("is_enabled")? != 0,
        record_count: row.get("record_count")?,
        imported_count: row.get("imported_count")?,
        priority: row.get("priority")?,
    })
}

pub fn log_from_row(row: &Row) -> rusqlite::Result<MigrationLogEntry> {
    let level_raw: String = row.get("level")?;
    let level = LogLevel::parse(&level_raw)
        .ok_or_else(|| conversion_err(3, format!("unknown log level: {}", level_raw)))?;
    let details_raw: Option<String> = row.get("details")?;

    Ok(MigrationLogEntry {
        id: row.get("id")?,
        job_id: row.get("job_id")?,
        mapping_id: row.get("mapping_id")?,
        level,
        message: row.get("message")?,
        source_id: row.get("source_id")?,
        details: details_raw.and_then(|s| serde_json::from_str(&s).ok()),
        created_at: row.get("created_at")?,
    })
}

pub fn template_from_row(row: &Row) -> rusqlite::Result<MigrationTemplate> {
    let mappings_raw: String = row.get("mappings")?;
    Ok(MigrationTemplate {
        id: row.get("id")?,
        name: row.get("name")?,
        description: row.get("description")?,
        source_system: row.get("source_system")?,
        mappings: serde_json::from_str(&mappings_raw).unwrap_or(serde_json::Value::Null),
        usage_count: row.get("usage_count")?,
        created_at: row.get("created_at")?,
    })
}

pub fn get_job(conn: &Connection, id: i64) -> Result<Option<MigrationJob>, String> {
    let mut stmt = conn
        .prepare("SELECT * FROM migration_jobs WHERE id = ?1")
        .map_err(|e| e.to_string())?;
    match stmt.query_row(params![id], job_from_row) {
        Ok(job) => Ok(Some(job)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.to_string()),
    }
}

pub fn list_jobs(conn: &Connection) -> Result<Vec<MigrationJob>, String> {
    let mut stmt = conn
        .prepare("SELECT * FROM migration_jobs ORDER BY created_at DESC, id DESC")
        .map_err(|e| e.to_string())?;
    let rows = stmt.query_map([], job_from_row).map_err(|e| e.to_string())?;
    rows.collect::<rusqlite::Result<Vec<_>>>().map_err(|e| e.to_string())
}

pub fn list_mappings(conn: &Connection, job_id: i64) -> Result<Vec<MigrationMapping>, String> {
    let mut stmt = conn
        .prepare("SELECT * FROM migration_mappings WHERE job_id = ?1 ORDER BY priority DESC, id")
        .map_err(|e| e.to_string())?;
    let rows = stmt
        .query_map(params![job_id], mapping_from_row)
        .map_err(|e| e.to_string())?;
    rows.collect::<rusqlite::Result<Vec<_>>>().map_err(|e| e.to_string())
}

pub fn get_mapping(conn: &Connection, id: i64) -> Result<Option<MigrationMapping>, String> {
    let mut stmt = conn
        .prepare("SELECT * FROM migration_mappings WHERE id = ?1")
        .map_err(|e| e.to_string())?;
    match stmt.query_row(params![id], mapping_from_row) {
        Ok(mapping) => Ok(Some(mapping)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.to_string()),
    }
}

pub fn recent_logs(
    conn: &Connection,
    job_id: i64,
    limit: i64,
) -> Result<Vec<MigrationLogEntry>, String> {
    let mut stmt = conn
        .prepare("SELECT * FROM migration_logs WHERE job_id = ?1 ORDER BY id DESC LIMIT ?2")
        .map_err(|e| e.to_string())?;
    let rows = stmt
        .query_map(params![job_id, limit], log_from_row)
        .map_err(|e| e.to_string())?;
    rows.collect::<rusqlite::Result<Vec<_>>>().map_err(|e| e.to_string())
}

/// Appends an audit entry. Best-effort: a failed audit write is reported to
/// the process log but never aborts the import that produced it.
pub fn append_log(
    conn: &Connection,
    job_id: i64,
    mapping_id: Option<i64>,
    level: LogLevel,
    message: &str,
    source_id: Option<&str>,
    details: Option<&serde_json::Value>,
) {
    let details_text = details.map(|d| d.to_string());
    let result = conn.execute(
        "INSERT INTO migration_logs (job_id, mapping_id, level, message, source_id, details, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            job_id,
            mapping_id,
            level.as_str(),
            message,
            source_id,
            details_text,
            now_iso()
        ],
    );
    if let Err(e) = result {
        error!("failed to append migration log for job {}: {}", job_id, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn schema_init_is_idempotent() {
        let dir = tempdir().unwrap();
        let state = AppState::new(dir.path().join("test.sqlite"), dir.path());
        let conn = state.open().unwrap();
        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap();
    }

    #[test]
    fn job_roundtrip_preserves_status_and_blobs() {
        let dir = tempdir().unwrap();
        let state = AppState::new(dir.path().join("test.sqlite"), dir.path());
        let conn = state.open().unwrap();
        init_schema(&conn).unwrap();

        conn.execute(
            "INSERT INTO migration_jobs (name, source_type, source_system, status, file_name,
             file_size, import_config, created_by, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                "Migração",
                "mongodb",
                "Sistema Legado",
                "mapping",
                "backup.zip",
                1024_i64,
                r#"{"extract_path":"/tmp/migrations/job-1/dump"}"#,
                "admin",
                now_iso()
            ],
        )
        .unwrap();
        let id = conn.last_insert_rowid();

        let job = get_job(&conn, id).unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Mapping);
        assert_eq!(
            job.import_config.unwrap().extract_path,
            "/tmp/migrations/job-1/dump"
        );
        assert!(get_job(&conn, 9999).unwrap().is_none());
    }

    #[test]
    fn deleting_a_job_cascades_to_mappings_and_logs() {
        let dir = tempdir().unwrap();
        let state = AppState::new(dir.path().join("test.sqlite"), dir.path());
        let conn = state.open().unwrap();
        init_schema(&conn).unwrap();

        conn.execute(
            "INSERT INTO migration_jobs (name, source_type, source_system, status, file_name,
             file_size, created_by, created_at) VALUES ('j', 'mongodb', 's', 'mapping', 'f.zip', 1, 'admin', ?1)",
            params![now_iso()],
        )
        .unwrap();
        let job_id = conn.last_insert_rowid();
        conn.execute(
            "INSERT INTO migration_mappings (job_id, source_entity, target_entity, field_mappings)
             VALUES (?1, 'DtoPessoa', 'customers', '{}')",
            params![job_id],
        )
        .unwrap();
        append_log(&conn, job_id, None, LogLevel::Info, "hello", None, None);

        conn.execute("DELETE FROM migration_jobs WHERE id = ?1", params![job_id])
            .unwrap();
        assert!(list_mappings(&conn, job_id).unwrap().is_empty());
        assert!(recent_logs(&conn, job_id, 10).unwrap().is_empty());
    }
}
