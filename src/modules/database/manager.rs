// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use crate::modules::context::Initialize;
use crate::modules::database::META_MODELS;
use crate::modules::error::{code::ErrorCode, PipelineError, PipelineResult};
use crate::modules::settings::cli::SETTINGS;
use crate::modules::settings::dir::DATA_DIR_MANAGER;
use crate::raise_error;
use native_db::{Builder, Database};
use std::sync::{Arc, LazyLock};

pub static DB_MANAGER: LazyLock<DatabaseManager> = LazyLock::new(DatabaseManager::new);

/// Owns the single embedded audit database (accounts, runs, aggregates,
/// dedup ledger) behind an `Arc` so background tasks and request handlers
/// can share it without re-opening the file.
pub struct DatabaseManager {
    audit_db: Arc<Database<'static>>,
}

impl DatabaseManager {
    fn new() -> Self {
        let audit_db = Self::init_audit_database().expect("failed to initialize audit database");
        DatabaseManager { audit_db }
    }

    pub fn audit_db(&self) -> &Arc<Database<'static>> {
        &self.audit_db
    }

    fn init_audit_database() -> PipelineResult<Arc<Database<'static>>> {
        let mut database = Builder::new()
            .set_cache_size(
                SETTINGS
                    .cat_emails_db_cache_size
                    .unwrap_or(67108864)
                    .max(16777216),
            ) // default 64MB, floor 16MB
            .create(&META_MODELS, DATA_DIR_MANAGER.audit_db.clone())
            .map_err(Self::handle_database_error)?;
        database
            .compact()
            .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))?;
        Ok(Arc::new(database))
    }

    fn handle_database_error(error: native_db::db_type::Error) -> PipelineError {
        match error {
            native_db::db_type::Error::RedbDatabaseError(database_error) => match database_error {
                redb::DatabaseError::DatabaseAlreadyOpen => {
                    raise_error!(
                        "database is already open by another instance".into(),
                        ErrorCode::InternalError
                    )
                }
                other => {
                    raise_error!(
                        format!("database error: {:?}", other),
                        ErrorCode::InternalError
                    )
                }
            },
            other => {
                raise_error!(
                    format!("failed to create database: {:?}", other),
                    ErrorCode::InternalError
                )
            }
        }
    }
}

impl Initialize for DatabaseManager {
    async fn initialize() -> PipelineResult<()> {
        LazyLock::force(&DB_MANAGER);
        Ok(())
    }
}
