//! # Migration Service Module
//!
//! Aggregates every API endpoint of the legacy-backup migration pipeline
//! under the `/api/migration` path. Each sub-module owns one endpoint and
//! follows the same shape: a `process` handler that converts the result of
//! a plain core function into an HTTP response.
//!
//! ## Registered routes:
//!
//! *   **`POST /upload`** — multipart upload of a backup archive plus job
//!     metadata. Recognized archives are synchronously extracted, analyzed
//!     and seeded with default mappings before the response goes out.
//! *   **`GET /jobs`** — all migration jobs, newest first.
//! *   **`GET /jobs/{job_id}`** — one job with its mappings and the most
//!     recent log entries.
//! *   **`DELETE /jobs/{job_id}`** — removes the job, its mappings and logs,
//!     and reclaims the extracted files on disk.
//! *   **`GET /jobs/{job_id}/analysis`** — the persisted per-collection
//!     analysis result.
//! *   **`GET /jobs/{job_id}/preview/{collection}`** — up to `?limit=` raw
//!     decoded documents (default 10) for inspection before mapping.
//! *   **`PUT /jobs/{job_id}/mappings`** — applies a list of mapping edits
//!     and creations, echoing the resulting mapping set.
//! *   **`POST /jobs/{job_id}/import`** — runs the full import pass over all
//!     enabled mappings and returns the updated job with totals.
//! *   **`POST /jobs/{job_id}/reimport/{mapping_id}`** — re-runs a single
//!     mapping after the operator fixed it; the job status is untouched.
//! *   **`GET /entities`** — static catalog of importable destination
//!     entities, grouped by business module.
//! *   **`GET /templates`** / **`POST /templates`** — saved mapping
//!     templates.

use actix_web::web::{self, get, post, put, scope};
use actix_web::{HttpResponse, Scope};

mod analysis;
mod delete;
mod entities;
mod get_job;
mod import;
mod list;
mod mappings;
mod preview;
mod reimport;
mod templates;
mod upload;

const API_PATH: &str = "/api/migration";

/// Outcome of a migration core function, split by the HTTP status it maps
/// to: missing resources, out-of-order state-machine calls, and everything
/// else.
#[derive(Debug)]
pub enum ServiceError {
    NotFound(String),
    Precondition(String),
    Internal(String),
}

impl ServiceError {
    pub fn response(&self) -> HttpResponse {
        match self {
            ServiceError::NotFound(msg) => HttpResponse::NotFound().body(msg.clone()),
            ServiceError::Precondition(msg) => HttpResponse::BadRequest().body(msg.clone()),
            ServiceError::Internal(msg) => HttpResponse::InternalServerError().body(msg.clone()),
        }
    }
}

impl From<String> for ServiceError {
    fn from(msg: String) -> Self {
        ServiceError::Internal(msg)
    }
}

/// Configures and returns the Actix scope for all migration routes.
pub fn configure_routes() -> Scope {
    scope(API_PATH)
        .route("/upload", post().to(upload::process))
        .route("/jobs", get().to(list::process))
        .route("/jobs/{job_id}", get().to(get_job::process))
        .route("/jobs/{job_id}", web::delete().to(delete::process))
        .route("/jobs/{job_id}/analysis", get().to(analysis::process))
        .route("/jobs/{job_id}/preview/{collection}", get().to(preview::process))
        .route("/jobs/{job_id}/mappings", put().to(mappings::process))
        .route("/jobs/{job_id}/import", post().to(import::process))
        .route("/jobs/{job_id}/reimport/{mapping_id}", post().to(reimport::process))
        .route("/entities", get().to(entities::process))
        .route("/templates", get().to(templates::list))
        .route("/templates", post().to(templates::create))
}
