use std::fs;
use std::path::Path;

use crate::config::AppConfig;
use crate::store::{Catalog, SqliteStore};

#[cfg(unix)]
fn set_restrictive_permissions(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    if let Err(e) = fs::set_permissions(path, fs::Permissions::from_mode(0o600)) {
        tracing::warn!("Failed to set permissions on {}: {e}", path.display());
    }
}

pub fn run_init(config_path: &Path, force: bool) -> anyhow::Result<()> {
    if config_path.exists() && !force {
        println!(
            "Configuration {} already exists, leaving it untouched (use --force to overwrite)",
            config_path.display()
        );
    } else {
        AppConfig::default().save(config_path)?;

        // The file may end up holding the remote password.
        #[cfg(unix)]
        set_restrictive_permissions(config_path);

        println!("Wrote configuration to {}", config_path.display());
    }

    let config = AppConfig::load(config_path)?;
    fs::create_dir_all(&config.data_dir)?;
    fs::create_dir_all(config.snapshot_dir())?;

    let store = SqliteStore::new(config.db_path())?;
    store.initialize()?;

    println!("Catalog database ready at {}", config.db_path().display());
    println!("Snapshots go to {}", config.snapshot_dir().display());

    if config.remote.base_url.is_empty() {
        println!();
        println!(
            "Set [remote] base_url and username in {} before running 'qscatalog sync'.",
            config_path.display()
        );
    }

    Ok(())
}
