use serde::{Deserialize, Serialize};

/// When object bytes are forced to stable storage.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Durability {
    /// Rely on the page cache. After a crash recently inserted objects may
    /// be missing, but a partial object is never visible.
    #[default]
    OsDefault,
    /// `fsync` each object before publishing it and the `objects/`
    /// directory after.
    Fsync,
}

/// Tunables for an open [`Repository`](crate::Repository).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepositoryConfig {
    pub durability: Durability,
}

impl RepositoryConfig {
    /// Configuration that fsyncs every insert.
    pub fn durable() -> Self {
        Self {
            durability: Durability::Fsync,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_does_not_fsync() {
        assert_eq!(RepositoryConfig::default().durability, Durability::OsDefault);
        assert_eq!(RepositoryConfig::durable().durability, Durability::Fsync);
    }

    #[test]
    fn durability_names() {
        let json = serde_json::to_string(&Durability::OsDefault).unwrap();
        assert_eq!(json, "\"os-default\"");
        let parsed: RepositoryConfig = serde_json::from_str(r#"{"durability":"fsync"}"#).unwrap();
        assert_eq!(parsed.durability, Durability::Fsync);
        let empty: RepositoryConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(empty, RepositoryConfig::default());
    }
}
