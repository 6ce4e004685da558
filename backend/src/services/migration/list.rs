use crate::db::{self, AppState};
use actix_web::{web, HttpResponse, Responder};
use common::model::job::MigrationJob;

pub(crate) async fn process(state: web::Data<AppState>) -> impl Responder {
    match list_jobs(&state) {
        Ok(jobs) => HttpResponse::Ok().json(jobs),
        Err(e) => HttpResponse::InternalServerError().body(e),
    }
}

fn list_jobs(state: &AppState) -> Result<Vec<MigrationJob>, String> {
    let conn = state.open()?;
    db::list_jobs(&conn)
}
