mod commands;
mod init;
mod status;
mod sync;

pub use commands::Commands;
pub use init::run_init;
pub use status::run_status;
pub use sync::run_sync;

use crate::config::AppConfig;
use crate::store::SqliteStore;

/// Opens the catalog database, checking `init` has been run.
pub fn init_store(config: &AppConfig) -> anyhow::Result<SqliteStore> {
    let db_path = config.db_path();

    if !db_path.exists() {
        anyhow::bail!(
            "Catalog database not found at {}. Run 'qscatalog init' first.",
            db_path.display()
        );
    }

    SqliteStore::new(&db_path).map_err(Into::into)
}
