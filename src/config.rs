use std::sync::Arc;

use chrono::Utc;
use log::{error, info, warn};
use mongodb::Client as MongoClient;
use rocket::{
    fairing::{Fairing, Info, Kind},
    Build, Orbit, Rocket,
};
use serde::Deserialize;

use crate::lifecycle::LifecycleEngine;
use crate::model::mongodb::ensure_indexes_exist;
use crate::store::{MongoStore, SharedStore};

/// Application configuration, derived from `Rocket.toml` and `ROCKET_*`
/// environment variables. This struct becomes managed state and can be
/// inspected by any endpoint.
#[derive(Deserialize)]
pub struct Config {
    // non-secrets
    #[serde(default = "default_true")]
    reconcile_on_launch: bool,
    // secrets
    jwt_secret: String,
}

impl Config {
    /// Secret key used to verify voter session JWTs.
    pub fn jwt_secret(&self) -> &[u8] {
        self.jwt_secret.as_bytes()
    }

    /// Whether to run a reconciliation pass as soon as the server is up.
    pub fn reconcile_on_launch(&self) -> bool {
        self.reconcile_on_launch
    }
}

fn default_true() -> bool {
    true
}

/// A fairing that loads the application config and puts it in managed state.
/// This could easily be achieved using `AdHoc::config`, but is written out
/// explicitly for symmetry with the other fairings and control over error
/// messages.
pub struct ConfigFairing;

#[rocket::async_trait]
impl Fairing for ConfigFairing {
    fn info(&self) -> Info {
        Info {
            name: "Config",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        // Load the config.
        let config = match rocket.figment().extract::<Config>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load application config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };

        // Manage the state.
        rocket = rocket.manage(config);
        Ok(rocket)
    }
}

/// Configuration for the database.
#[derive(Deserialize)]
struct DbConfig {
    // non-secrets
    #[serde(default = "default_db_name")]
    db_name: String,
    /// Set to false for deployments without a replica set, where MongoDB
    /// transactions are unavailable.
    #[serde(default = "default_true")]
    db_transactions: bool,
    // secrets
    db_uri: String,
}

fn default_db_name() -> String {
    "evoting".to_string()
}

/// A fairing that loads the MongoDB config, connects to the database,
/// ensures its indexes exist, and places the resulting store into managed
/// state as a [`SharedStore`].
pub struct DatabaseFairing;

#[rocket::async_trait]
impl Fairing for DatabaseFairing {
    fn info(&self) -> Info {
        Info {
            name: "MongoDB",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        // Load the config.
        let config = match rocket.figment().extract::<DbConfig>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load database config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };
        info!("Loaded database config, connecting...");
        // Construct the connection.
        let client = match MongoClient::with_uri_str(config.db_uri).await {
            Ok(client) => client,
            Err(e) => {
                error!("Failed to connect to database: {e}");
                return Err(rocket);
            }
        };
        let db = client.database(&config.db_name);

        // Ensure the required indexes exist.
        if let Err(e) = ensure_indexes_exist(&db).await {
            error!("Failed to connect to database: {e}");
            return Err(rocket);
        }
        if !config.db_transactions {
            warn!("Database transactions disabled, reconciliation passes will be best-effort");
        }
        info!("...database connection online!");

        // Manage the state.
        let store: SharedStore = Arc::new(MongoStore::new(client, db, config.db_transactions));
        rocket = rocket.manage(store);
        Ok(rocket)
    }
}

/// A fairing that runs one reconciliation pass once the server is up, so
/// statuses that went stale while it was down are corrected before the first
/// request rather than by it.
pub struct ReconcileFairing;

#[rocket::async_trait]
impl Fairing for ReconcileFairing {
    fn info(&self) -> Info {
        Info {
            name: "Election reconciliation",
            kind: Kind::Liftoff,
        }
    }

    async fn on_liftoff(&self, rocket: &Rocket<Orbit>) {
        let enabled = rocket
            .state::<Config>()
            .map_or(false, |config| config.reconcile_on_launch());
        if !enabled {
            return;
        }
        let Some(store) = rocket.state::<SharedStore>() else {
            warn!("No store available, skipping launch reconciliation");
            return;
        };
        match LifecycleEngine::new(store.clone())
            .reconcile_statuses(Utc::now())
            .await
        {
            Ok(report) => info!(
                "Launch reconciliation done: {} activated, {} closed",
                report.activated, report.closed
            ),
            Err(e) => error!("Launch reconciliation failed: {e}"),
        }
    }
}


#[cfg(test)]
mod tests {
    use rocket::figment::{providers::Serialized, Figment};

    use super::*;

    #[test]
    fn config_defaults_apply() {
        let figment = Figment::new()
            .merge(Serialized::default("jwt_secret", "s3cret"))
            .merge(Serialized::default("db_uri", "mongodb://localhost:27017"));

        let config = figment.extract::<Config>().unwrap();
        assert_eq!(config.jwt_secret(), b"s3cret");
        assert!(config.reconcile_on_launch());

        let db = figment.extract::<DbConfig>().unwrap();
        assert_eq!(db.db_name, "evoting");
        assert!(db.db_transactions);
    }

    #[test]
    fn missing_secrets_are_errors() {
        assert!(Figment::new().extract::<Config>().is_err());
        assert!(Figment::new().extract::<DbConfig>().is_err());
    }
}
