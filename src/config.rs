use anyhow::Context;
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub version: u32,
    pub database: Database,
    #[serde(default)]
    pub library_source: LibrarySource,
    pub playlists: PlaylistConfig,
}

impl Config {
    pub fn load(path: &str) -> anyhow::Result<Config> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {path}"))?;
        toml::from_str(&contents).with_context(|| "Failed to parse config TOML")
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Database {
    pub in_memory: bool,
    pub path: Option<PathBuf>,
}

impl Database {
    pub fn in_memory() -> Self {
        Self {
            in_memory: true,
            path: None,
        }
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct LibrarySource {
    pub roots: Vec<PathBuf>,
    pub follow_symlinks: bool,
    #[serde(default)]
    pub ignored_dirs: Vec<PathBuf>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PlaylistConfig {
    /// where the native `.mplst` playlist files live
    pub directory: PathBuf,
    /// import files referenced by a playlist that exist on disk but not in the library
    #[serde(default = "default_true")]
    pub add_missing_to_library: bool,
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_parse_config_toml() -> anyhow::Result<()> {
        let toml_str = r#"
version = 1

[database]
in_memory = true

[library_source]
roots = ["/home/listener/Music"]
follow_symlinks = true
ignored_dirs = ['C:\Users\listener\Music\Sample pack']

[playlists]
directory = "/home/listener/.local/share/songshelf/playlists"
"#;

        let cfg: Config = toml::from_str(toml_str)?;

        assert_eq!(cfg.version, 1);
        assert!(cfg.database.in_memory);
        assert_eq!(
            cfg.library_source.roots,
            vec![PathBuf::from("/home/listener/Music")]
        );
        assert!(cfg.library_source.follow_symlinks);
        assert_eq!(cfg.library_source.ignored_dirs.len(), 1);

        // defaults to importing files a playlist refers to
        assert!(cfg.playlists.add_missing_to_library);

        Ok(())
    }

    #[test]
    fn test_parse_file_database_config() -> anyhow::Result<()> {
        let toml_str = r#"
version = 1

[database]
in_memory = false
path = "/tmp/songshelf.db"

[playlists]
directory = "/tmp/playlists"
add_missing_to_library = false
"#;

        let cfg: Config = toml::from_str(toml_str)?;

        assert!(!cfg.database.in_memory);
        assert_eq!(cfg.database.path, Some(PathBuf::from("/tmp/songshelf.db")));

        // library source is optional
        assert!(cfg.library_source.roots.is_empty());
        assert!(!cfg.playlists.add_missing_to_library);

        Ok(())
    }
}
