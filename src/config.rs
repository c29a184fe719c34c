use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use crate::retry::RetryPolicy;
use crate::storage::schema::DEFAULT_DATABASE_NAME;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct StashConfig {
    pub database: DatabaseConfig,
    pub retry: RetryPolicy,
    pub events: EventsConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub name: String,
    pub path: Option<String>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_DATABASE_NAME.to_string(),
            path: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventsConfig {
    pub capacity: usize,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            capacity: crate::events::DEFAULT_CAPACITY,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    pub static_dir: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 4780,
            static_dir: None,
        }
    }
}

impl StashConfig {
    /// Configured database path, or the default location under `base`
    pub fn database_path(&self, base: &Path) -> PathBuf {
        match &self.database.path {
            Some(path) => base.join(path),
            None => default_database_path_in(base, &self.database.name),
        }
    }
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from("stashdb.toml")
}

pub fn default_database_path_in(base: &Path, name: &str) -> PathBuf {
    base.join(".stashdb").join(format!("{}.db", name))
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Option<StashConfig>> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);
    if !path.exists() {
        return Ok(None);
    }

    let contents = std::fs::read_to_string(&path)?;
    let config: StashConfig = toml::from_str(&contents)?;
    Ok(Some(config))
}

pub fn write_config(path: &Path, config: &StashConfig, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!("config already exists at {} (use --force to overwrite)", path.display());
    }

    let contents = toml::to_string_pretty(config)?;
    std::fs::write(path, contents)?;
    Ok(())
}

pub fn ensure_db_dir(db_path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

pub fn ensure_gitignore(project_root: &Path) -> anyhow::Result<()> {
    let gitignore_path = project_root.join(".gitignore");
    let entry = ".stashdb/";

    let mut content = String::new();
    if gitignore_path.exists() {
        content = std::fs::read_to_string(&gitignore_path)?;
        if content.lines().any(|line| line.trim() == entry) {
            return Ok(());
        }
        if !content.is_empty() && !content.ends_with('\n') {
            content.push('\n');
        }
    }
    content.push_str(entry);
    content.push('\n');
    std::fs::write(&gitignore_path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_config_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = load_config(Some(&dir.path().join("stashdb.toml"))).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stashdb.toml");
        std::fs::write(&path, "[retry]\nmax_retries = 5\n").unwrap();

        let config = load_config(Some(&path)).unwrap().unwrap();
        assert_eq!(config.retry.max_retries, 5);
        assert_eq!(config.retry.delay_ms, 1000);
        assert_eq!(config.database.name, "app_database");
    }

    #[test]
    fn test_write_refuses_overwrite_without_force() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stashdb.toml");
        let config = StashConfig::default();

        write_config(&path, &config, false).unwrap();
        assert!(write_config(&path, &config, false).is_err());
        write_config(&path, &config, true).unwrap();

        assert_eq!(load_config(Some(&path)).unwrap(), Some(config));
    }

    #[test]
    fn test_database_path() {
        let mut config = StashConfig::default();
        let base = Path::new("/project");
        assert_eq!(
            config.database_path(base),
            PathBuf::from("/project/.stashdb/app_database.db")
        );

        config.database.path = Some("data/app.db".into());
        assert_eq!(config.database_path(base), PathBuf::from("/project/data/app.db"));
    }

    #[test]
    fn test_gitignore_entry_added_once() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(".gitignore"), "target/").unwrap();

        ensure_gitignore(dir.path()).unwrap();
        ensure_gitignore(dir.path()).unwrap();

        let content = std::fs::read_to_string(dir.path().join(".gitignore")).unwrap();
        assert_eq!(content, "target/\n.stashdb/\n");
    }
}
