use crate::{OutputMode, emit_success};
use owo_colors::OwoColorize;
use serde_json::{Map, Value};
use stashdb::config::{self, StashConfig};
use stashdb::ui::{self, Icons, TableBuilder, banner, section, success, summary_row};
use stashdb::{Database, Document, DocumentPatch};
use std::path::{Path, PathBuf};

/// Paths given on the command line
pub struct Paths {
    pub config: Option<PathBuf>,
    pub database: Option<PathBuf>,
}

struct Resolved {
    config: StashConfig,
    config_path: PathBuf,
    database_path: PathBuf,
}

fn resolve(paths: &Paths) -> anyhow::Result<Resolved> {
    let config_path = paths.config.clone().unwrap_or_else(config::default_config_path);
    let config = config::load_config(Some(&config_path))?.unwrap_or_default();
    let base = project_root(&config_path)?;
    let database_path = paths
        .database
        .clone()
        .unwrap_or_else(|| config.database_path(&base));

    Ok(Resolved {
        config,
        config_path,
        database_path,
    })
}

fn project_root(config_path: &Path) -> anyhow::Result<PathBuf> {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => Ok(parent.to_path_buf()),
        _ => Ok(std::env::current_dir()?),
    }
}

fn open(paths: &Paths) -> anyhow::Result<(Database, Resolved)> {
    let resolved = resolve(paths)?;
    tracing::debug!("using database {}", resolved.database_path.display());
    let db = Database::open(&resolved.database_path, &resolved.config)?;
    Ok((db, resolved))
}

fn parse_object(text: &str) -> anyhow::Result<Map<String, Value>> {
    match serde_json::from_str::<Value>(text)? {
        Value::Object(map) => Ok(map),
        other => anyhow::bail!("expected a JSON object, got {}", other),
    }
}

pub async fn run_init(paths: &Paths, force: bool, output_mode: OutputMode) -> anyhow::Result<()> {
    let config_path = paths.config.clone().unwrap_or_else(config::default_config_path);
    let root = project_root(&config_path)?;
    let config = StashConfig::default();

    config::write_config(&config_path, &config, force)?;
    config::ensure_gitignore(&root)?;

    let database_path = paths
        .database
        .clone()
        .unwrap_or_else(|| config.database_path(&root));
    config::ensure_db_dir(&database_path)?;

    // opening a session creates the schema
    let db = Database::open(&database_path, &config)?;
    db.stats().await?;

    if output_mode.is_human() {
        success("Initialized stashdb");
        ui::info("Config", &config_path.display().to_string());
        ui::info("Database", &database_path.display().to_string());
    } else {
        let data = serde_json::json!({
            "config": config_path,
            "database": database_path,
        });
        emit_success(output_mode, "init", data)?;
    }
    Ok(())
}

pub async fn run_put(
    paths: &Paths,
    store: &str,
    id: &str,
    value: &str,
    output_mode: OutputMode,
) -> anyhow::Result<()> {
    let fields = parse_object(value)?;
    let (db, _) = open(paths)?;
    let coll = db.documents(store)?;

    let doc = Document::from_object(id, fields);
    coll.save(&doc).await?;

    if output_mode.is_human() {
        ui::record_saved(store, id);
    } else {
        emit_success(output_mode, "put", serde_json::to_value(&doc)?)?;
    }
    Ok(())
}

pub async fn run_get(paths: &Paths, store: &str, id: &str, output_mode: OutputMode) -> anyhow::Result<()> {
    let (db, _) = open(paths)?;
    let Some(doc) = db.documents(store)?.get(id).await? else {
        anyhow::bail!("no record '{}' in '{}'", id, store);
    };

    if output_mode.is_human() {
        println!("{}", serde_json::to_string_pretty(&doc)?);
    } else {
        emit_success(output_mode, "get", serde_json::to_value(&doc)?)?;
    }
    Ok(())
}

pub async fn run_list(paths: &Paths, store: &str, output_mode: OutputMode) -> anyhow::Result<()> {
    let (db, _) = open(paths)?;
    let records = db.documents(store)?.get_all().await?;

    if output_mode.is_human() {
        if records.is_empty() {
            println!("{} No records in '{}'.", Icons::CROSS, store);
        } else {
            section(store);
            println!("{}", ui::records_table(&records));
            summary_row("Records:", &records.len().to_string());
        }
    } else {
        emit_success(output_mode, "list", serde_json::to_value(&records)?)?;
    }
    Ok(())
}

pub async fn run_update(
    paths: &Paths,
    store: &str,
    id: &str,
    patch: &str,
    output_mode: OutputMode,
) -> anyhow::Result<()> {
    let patch = DocumentPatch::from(parse_object(patch)?);
    if patch.is_empty() {
        anyhow::bail!("patch for '{}' in '{}' has no fields", id, store);
    }
    let (db, _) = open(paths)?;
    let coll = db.documents(store)?;

    let updated = coll.update(id, patch).await?;

    if output_mode.is_human() {
        if updated {
            ui::record_saved(store, id);
        } else {
            ui::warn(&format!("No record {}, nothing updated", ui::record_path(store, id)));
        }
    } else {
        let data = serde_json::json!({ "store": store, "id": id, "updated": updated });
        emit_success(output_mode, "update", data)?;
    }
    Ok(())
}

pub async fn run_delete(paths: &Paths, store: &str, id: &str, output_mode: OutputMode) -> anyhow::Result<()> {
    let (db, _) = open(paths)?;
    db.documents(store)?.delete(id).await?;

    if output_mode.is_human() {
        ui::record_deleted(store, id);
    } else {
        let data = serde_json::json!({ "store": store, "id": id });
        emit_success(output_mode, "delete", data)?;
    }
    Ok(())
}

pub async fn run_stats(paths: &Paths, output_mode: OutputMode) -> anyhow::Result<()> {
    let (db, resolved) = open(paths)?;
    let stats = db.stats().await?;
    tracing::debug!("{}", stats);

    if output_mode.is_human() {
        banner(
            &format!("{} Stashdb Statistics", Icons::STATS),
            &resolved.database_path.display().to_string(),
        );
        if stats.stores.is_empty() {
            println!("∅ No stores yet.");
        } else {
            println!("{}", ui::stores_table(&stats));
        }

        let mut summary = TableBuilder::new();
        summary.add_row("Total records", &stats.total_records().to_string());
        summary.add_row("Schema version", &stats.schema_version.to_string());
        if let Ok(meta) = std::fs::metadata(&resolved.database_path) {
            summary.add_row("Size on disk", &ui::human_bytes(meta.len()));
        }
        println!("{}", summary.build());
    } else {
        emit_success(output_mode, "stats", serde_json::to_value(&stats)?)?;
    }
    Ok(())
}

pub async fn run_serve(paths: &Paths, port: Option<u16>, static_dir: Option<PathBuf>) -> anyhow::Result<()> {
    let (db, resolved) = open(paths)?;
    let port = port.unwrap_or(resolved.config.server.port);
    let static_dir = static_dir.or_else(|| resolved.config.server.static_dir.as_ref().map(PathBuf::from));

    tracing::debug!("config loaded from {}", resolved.config_path.display());
    stashdb::server::start_server(db, port, static_dir).await
}

pub fn run_version(output_mode: OutputMode) -> anyhow::Result<()> {
    if output_mode.is_human() {
        banner(
            &format!("{}", "Stashdb".bold().style(ui::theme().accent.clone())),
            &format!("Version {}", env!("CARGO_PKG_VERSION").bold()),
        );
    } else {
        let data = serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
        });
        emit_success(output_mode, "version", data)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_object_rejects_non_objects() {
        assert!(parse_object(r#"{"a": 1}"#).is_ok());
        assert!(parse_object("[1, 2]").is_err());
        assert!(parse_object("not json").is_err());
    }

    #[tokio::test]
    async fn test_put_then_update_through_paths() {
        let dir = tempfile::tempdir().unwrap();
        let paths = Paths {
            config: Some(dir.path().join("stashdb.toml")),
            database: None,
        };

        run_init(&paths, false, OutputMode::Json).await.unwrap();
        run_put(&paths, "posts", "1", r#"{"title": "a"}"#, OutputMode::Json)
            .await
            .unwrap();
        run_update(&paths, "posts", "1", r#"{"title": "b"}"#, OutputMode::Json)
            .await
            .unwrap();

        let (db, resolved) = open(&paths).unwrap();
        assert_eq!(
            resolved.database_path,
            dir.path().join(".stashdb").join("app_database.db")
        );
        let doc = db.documents("posts").unwrap().get("1").await.unwrap().unwrap();
        assert_eq!(doc.get("title"), Some(&serde_json::json!("b")));

        assert!(run_get(&paths, "posts", "missing", OutputMode::Json).await.is_err());
    }

    #[tokio::test]
    async fn test_empty_update_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let paths = Paths {
            config: Some(dir.path().join("stashdb.toml")),
            database: None,
        };
        run_init(&paths, false, OutputMode::Json).await.unwrap();
        run_put(&paths, "posts", "1", r#"{"title": "a"}"#, OutputMode::Json)
            .await
            .unwrap();

        let err = run_update(&paths, "posts", "1", "{}", OutputMode::Json)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no fields"));
    }
}
