use std::path::PathBuf;
use std::sync::LazyLock;

use crate::modules::context::Initialize;
use crate::modules::error::code::ErrorCode;
use crate::modules::error::PipelineResult;
use crate::modules::settings::cli::SETTINGS;
use crate::raise_error;

pub const AUDIT_DB_FILE: &str = "audit.db";
const LOG_DIR: &str = "logs";

pub static DATA_DIR_MANAGER: LazyLock<DataDirManager> =
    LazyLock::new(|| DataDirManager::new(PathBuf::from(&SETTINGS.cat_emails_root_dir)));

#[derive(Debug)]
pub struct DataDirManager {
    pub root_dir: PathBuf,
    pub audit_db: PathBuf,
    pub log_dir: PathBuf,
}

impl Initialize for DataDirManager {
    async fn initialize() -> PipelineResult<()> {
        std::fs::create_dir_all(&DATA_DIR_MANAGER.root_dir)
            .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))?;
        std::fs::create_dir_all(&DATA_DIR_MANAGER.log_dir)
            .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))?;
        Ok(())
    }
}

impl DataDirManager {
    pub fn new(root_dir: PathBuf) -> Self {
        Self {
            audit_db: root_dir.join(AUDIT_DB_FILE),
            log_dir: root_dir.join(LOG_DIR),
            root_dir,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lays_out_audit_db_and_log_dir_under_root() {
        let manager = DataDirManager::new(PathBuf::from("/tmp/cat_emails_data"));
        assert_eq!(manager.audit_db, PathBuf::from("/tmp/cat_emails_data/audit.db"));
        assert_eq!(manager.log_dir, PathBuf::from("/tmp/cat_emails_data/logs"));
    }
}
