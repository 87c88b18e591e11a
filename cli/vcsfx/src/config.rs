//! Generator configuration lookup.
//!
//! An explicit `--config` path wins; otherwise the per-user config file is
//! used when it exists. Environment overrides are applied by the library.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use tracing::debug;
use vcsfx_pkggen::GeneratorConfig;

/// Config file name inside the user config directory.
const CONFIG_FILE: &str = "config.toml";

/// Path of the per-user config file, if a home directory can be determined.
pub fn user_config_path() -> Option<PathBuf> {
    ProjectDirs::from("com", "vcsfx", "vcsfx").map(|dirs| dirs.config_dir().join(CONFIG_FILE))
}

/// Picks the config file to read.
fn resolve(explicit: Option<&Path>, user: Option<PathBuf>) -> Option<PathBuf> {
    match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => user.filter(|path| path.is_file()),
    }
}

/// Load the generator config from the resolved file and the environment.
pub fn load(explicit: Option<&Path>) -> Result<GeneratorConfig> {
    let path = resolve(explicit, user_config_path());
    debug!(config = ?path, "loading generator config");
    GeneratorConfig::load(path.as_deref()).context("failed to load generator config")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_path_wins() {
        let explicit = Path::new("/etc/vcsfx.toml");
        assert_eq!(
            resolve(Some(explicit), Some(PathBuf::from("/nonexistent/config.toml"))),
            Some(explicit.to_path_buf())
        );
    }

    #[test]
    fn test_missing_user_file_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let user = dir.path().join(CONFIG_FILE);
        assert_eq!(resolve(None, Some(user.clone())), None);

        std::fs::write(&user, "surplus = \"skip\"\n").unwrap();
        assert_eq!(resolve(None, Some(user.clone())), Some(user));
        assert_eq!(resolve(None, None), None);
    }
}
