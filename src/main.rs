mod auth;
mod config;
mod gateway;
mod models;
mod repository;
mod routes;
mod schema;
mod store;

#[macro_use]
extern crate rocket;

use log::info;
use rocket::figment::Figment;
use rocket::http::Status;
use rocket::response::status;
use rocket::serde::json::Json;
use rocket::{Build, Request, Rocket};
use thiserror::Error;

use auth::Authenticator;
use config::{ServiceConfig, Storage};
use models::Message;
use store::{Db, MemoryStore};

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    Config(#[from] rocket::figment::Error),
    #[error("auth is enabled but `auth.secret` is not set")]
    MissingSecret,
    #[error(transparent)]
    Launch(#[from] rocket::Error),
}

#[catch(default)]
fn default_catcher(status: Status, _req: &Request) -> status::Custom<Json<Message>> {
    status::Custom(status, Json(Message::new(status.reason_lossy())))
}

/// Assembles the service. Gateway registration is attached first so it runs
/// before the database pool is set up.
pub fn build(figment: Figment) -> Result<Rocket<Build>, Error> {
    let config: ServiceConfig = figment.extract()?;

    let mut rocket = rocket::custom(figment)
        .mount("/todos", routes::routes())
        .register("/", catchers![default_catcher, auth::unauthorized]);

    if config.gateway.enabled {
        rocket = rocket.attach(gateway::fairing(config.gateway));
    }

    rocket = match config.storage {
        Storage::Postgres => rocket.attach(Db::fairing()),
        Storage::Memory => rocket.manage(MemoryStore::default()),
    };
    info!("storing todos in {:?}", config.storage);

    if config.auth.enabled {
        let secret = config.auth.secret.ok_or(Error::MissingSecret)?;
        rocket = rocket.manage(Authenticator::new(secret.as_bytes()));
        info!("bearer authentication required for writes");
    }

    Ok(rocket)
}

#[rocket::main]
async fn main() -> Result<(), Error> {
    dotenvy::dotenv().ok();

    let _rocket = build(config::figment())?.launch().await?;

    Ok(())
}
