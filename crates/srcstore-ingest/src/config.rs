use std::env;
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use srcstore_store::RepositoryConfig;
use tracing::debug;

use crate::error::{IngestError, IngestResult};

/// Name of the optional configuration file at the repository root.
pub const CONFIG_FILE: &str = "config.toml";

const ROOT_DIR_NAME: &str = "source-store";

/// Contents of `<root>/config.toml`.
///
/// ```toml
/// [store]
/// durability = "fsync"
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    pub store: RepositoryConfig,
}

impl StoreConfig {
    /// Read `<root>/config.toml`, falling back to defaults when it is absent.
    pub fn load(root: impl AsRef<Path>) -> IngestResult<Self> {
        let path = root.as_ref().join(CONFIG_FILE);
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no config file, using defaults");
                return Ok(Self::default());
            }
            Err(source) => return Err(IngestError::Read { path, source }),
        };
        toml::from_str(&text).map_err(|e| IngestError::Config {
            path,
            reason: e.message().to_string(),
        })
    }
}

/// The repository root used when none is given on the command line.
pub fn default_repository_root() -> IngestResult<PathBuf> {
    resolve_repository_root(env::var_os("XDG_CACHE_HOME"), env::var_os("HOME"))
}

/// `$XDG_CACHE_HOME/source-store`, else `$HOME/.cache/source-store`.
///
/// Empty variables count as unset.
pub fn resolve_repository_root(
    xdg_cache_home: Option<OsString>,
    home: Option<OsString>,
) -> IngestResult<PathBuf> {
    let set = |v: Option<OsString>| v.filter(|v| !v.is_empty()).map(PathBuf::from);

    if let Some(cache) = set(xdg_cache_home) {
        return Ok(cache.join(ROOT_DIR_NAME));
    }
    if let Some(home) = set(home) {
        return Ok(home.join(".cache").join(ROOT_DIR_NAME));
    }
    Err(IngestError::NoDefaultRoot)
}
