mod analyzer;
mod archive;
mod bson;
mod db;
mod importer;
mod registry;
mod services;
mod transformer;

use crate::db::AppState;
use actix_web::{web, App, HttpServer};
use env_logger::Env;
use log::info;
use std::fs;

const DB_PATH: &str = "migrations.sqlite";
const UPLOAD_DIR: &str = "/tmp/migrations";

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init_from_env(Env::default().default_filter_or("info"));
    let host = "127.0.0.1";
    let port = 8080;

    fs::create_dir_all(UPLOAD_DIR)?;

    let state = AppState::new(DB_PATH, UPLOAD_DIR);
    {
        let conn = state
            .open()
            .map_err(|e| std::io::Error::other(format!("cannot open database: {}", e)))?;
        db::init_schema(&conn)
            .map_err(|e| std::io::Error::other(format!("cannot create schema: {}", e)))?;
    }

    info!("Migration service running at http://{}:{}", host, port);

    HttpServer::new(move || {
        App::new()
            .app_data(web::JsonConfig::default().limit(10 * 1024 * 1024)) // 10 MB
            .app_data(web::Data::new(state.clone()))
            .service(services::migration::configure_routes())
    })
    .bind((host, port))?
    .run()
    .await
}
