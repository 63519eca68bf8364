#[macro_use]
extern crate rocket;

use rocket::{Build, Rocket};

pub mod access;
pub mod api;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod logging;
pub mod model;
pub mod store;

use config::{ConfigFairing, DatabaseFairing, ReconcileFairing};
use logging::LoggerFairing;

/// Assemble the server: config, database, logging and routes.
pub fn build() -> Rocket<Build> {
    rocket::build()
        .mount("/", api::routes())
        .attach(LoggerFairing)
        .attach(ConfigFairing)
        .attach(DatabaseFairing)
        .attach(ReconcileFairing)
}

/// The server wired to the given store rather than MongoDB.
#[cfg(test)]
pub(crate) fn rocket_with_store(store: store::SharedStore) -> Rocket<Build> {
    rocket::build()
        .mount("/", api::routes())
        .attach(LoggerFairing)
        .manage(config::Config::example())
        .manage(store)
}
