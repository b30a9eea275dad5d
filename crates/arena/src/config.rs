//! Configuration file loading for the arena.
//!
//! Settings live in `arena.toml`. Every field has a default, so a missing
//! file or an empty one yields a usable configuration.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur when loading or parsing configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),
    /// Failed to parse the configuration file as valid TOML.
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),
}

/// A named engine definition from `[engines.<name>]`.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct EngineConfig {
    /// Path to the engine executable.
    pub path: PathBuf,
    /// Extra command-line arguments.
    #[serde(default)]
    pub args: Vec<String>,
    /// Overrides the match think time for this engine.
    pub think_time_ms: Option<u64>,
}

/// Timing and tagging for every game of a match.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct MatchSettings {
    /// Time budget sent with each `go movetime`.
    pub think_time_ms: u64,
    /// Extra time past the think time before a search counts as timed out.
    pub grace_ms: u64,
    /// Limit for `uci` -> `uciok` and `isready` -> `readyok`.
    pub handshake_timeout_ms: u64,
    /// How long an engine gets to exit after `quit` before it is killed.
    pub quit_grace_ms: u64,
    /// Pause after each applied move.
    pub inter_move_delay_ms: u64,
    /// Search time the analyzer spends on each position.
    pub analysis_time_ms: u64,
    pub event: String,
    pub site: String,
}

impl Default for MatchSettings {
    fn default() -> Self {
        Self {
            think_time_ms: 1000,
            grace_ms: 10_000,
            handshake_timeout_ms: 15_000,
            quit_grace_ms: 3000,
            inter_move_delay_ms: 0,
            analysis_time_ms: 200,
            event: "Engine Match".to_string(),
            site: "Chess Engine Arena".to_string(),
        }
    }
}

impl MatchSettings {
    pub fn think_time(&self) -> Duration {
        Duration::from_millis(self.think_time_ms)
    }

    pub fn grace(&self) -> Duration {
        Duration::from_millis(self.grace_ms)
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }

    pub fn quit_grace(&self) -> Duration {
        Duration::from_millis(self.quit_grace_ms)
    }

    pub fn inter_move_delay(&self) -> Duration {
        Duration::from_millis(self.inter_move_delay_ms)
    }

    pub fn analysis_time(&self) -> Duration {
        Duration::from_millis(self.analysis_time_ms)
    }
}

/// Main arena configuration structure.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct ArenaConfig {
    /// SQLite file holding finished games.
    pub database: PathBuf,
    /// JSON opening book. The built-in table is used when absent.
    pub openings: Option<PathBuf>,
    /// PGN and JSON records are written below this directory, one
    /// subdirectory per day.
    pub output_dir: PathBuf,
    /// Engine that grades every move, by name or path. Analysis is off
    /// when unset.
    pub analyzer: Option<String>,
    #[serde(rename = "match")]
    pub match_settings: MatchSettings,
    /// Map of engine names to their configurations.
    pub engines: HashMap<String, EngineConfig>,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            database: PathBuf::from("arena.db"),
            openings: None,
            output_dir: PathBuf::from("games"),
            analyzer: None,
            match_settings: MatchSettings::default(),
            engines: HashMap::new(),
        }
    }
}

/// An engine ready to be launched.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSpec {
    /// Display name, used for PGN tags and statistics.
    pub name: String,
    pub path: PathBuf,
    pub args: Vec<String>,
    pub think_time: Duration,
}

impl ArenaConfig {
    /// Loads `arena.toml` from the current directory.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(Self::config_path())
    }

    /// Loads the configuration at `path`, or defaults if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ReadError`] if the file exists but cannot be read,
    /// or [`ConfigError::ParseError`] if the file contains invalid TOML.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            Ok(toml::from_str(&content)?)
        } else {
            Ok(Self::default())
        }
    }

    /// Returns the default configuration path.
    pub fn config_path() -> PathBuf {
        PathBuf::from("arena.toml")
    }

    /// Looks an engine up by name. A name that is not configured is taken
    /// to be the path of an executable, named after its file stem.
    pub fn resolve_engine(&self, name: &str) -> EngineSpec {
        let default_think = self.match_settings.think_time_ms;
        match self.engines.get(name) {
            Some(engine) => EngineSpec {
                name: name.to_string(),
                path: engine.path.clone(),
                args: engine.args.clone(),
                think_time: Duration::from_millis(engine.think_time_ms.unwrap_or(default_think)),
            },
            None => {
                let path = PathBuf::from(name);
                let display = path
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_else(|| name.to_string());
                EngineSpec {
                    name: display,
                    path,
                    args: Vec::new(),
                    think_time: Duration::from_millis(default_think),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_toml_config() {
        let toml_content = r#"
database = "results.db"
openings = "books/openings.json"
output_dir = "out"
analyzer = "stockfish"

[match]
think_time_ms = 250
analysis_time_ms = 80
grace_ms = 2000
inter_move_delay_ms = 50
event = "Friday Blitz"

[engines.stockfish]
path = "/usr/bin/stockfish"
think_time_ms = 500

[engines.lc0]
path = "/opt/lc0/lc0"
args = ["--weights", "net.pb"]
"#;

        let config: ArenaConfig = toml::from_str(toml_content).unwrap();

        assert_eq!(config.database, PathBuf::from("results.db"));
        assert_eq!(config.openings, Some(PathBuf::from("books/openings.json")));
        assert_eq!(config.output_dir, PathBuf::from("out"));
        assert_eq!(config.analyzer.as_deref(), Some("stockfish"));

        let settings = &config.match_settings;
        assert_eq!(settings.think_time(), Duration::from_millis(250));
        assert_eq!(settings.grace(), Duration::from_secs(2));
        assert_eq!(settings.inter_move_delay(), Duration::from_millis(50));
        assert_eq!(settings.analysis_time(), Duration::from_millis(80));
        assert_eq!(settings.event, "Friday Blitz");
        // Unset fields keep defaults
        assert_eq!(settings.handshake_timeout(), Duration::from_secs(15));
        assert_eq!(settings.site, "Chess Engine Arena");

        assert_eq!(config.engines.len(), 2);
        let lc0 = config.engines.get("lc0").unwrap();
        assert_eq!(lc0.args, vec!["--weights", "net.pb"]);
        assert_eq!(lc0.think_time_ms, None);
    }

    #[test]
    fn test_empty_config_defaults() {
        let config: ArenaConfig = toml::from_str("").unwrap();
        assert_eq!(config, ArenaConfig::default());
        assert_eq!(config.match_settings.think_time_ms, 1000);
        assert_eq!(config.match_settings.grace_ms, 10_000);
        assert_eq!(config.match_settings.quit_grace_ms, 3000);
        assert_eq!(config.match_settings.analysis_time_ms, 200);
        assert!(config.analyzer.is_none());
        assert!(config.engines.is_empty());
    }

    #[test]
    fn test_resolve_configured_engine() {
        let config: ArenaConfig = toml::from_str(
            r#"
[match]
think_time_ms = 300

[engines.fast]
path = "/bin/fast"
think_time_ms = 100

[engines.slow]
path = "/bin/slow"
"#,
        )
        .unwrap();

        let fast = config.resolve_engine("fast");
        assert_eq!(fast.name, "fast");
        assert_eq!(fast.path, PathBuf::from("/bin/fast"));
        assert_eq!(fast.think_time, Duration::from_millis(100));

        let slow = config.resolve_engine("slow");
        assert_eq!(slow.think_time, Duration::from_millis(300));
    }

    #[test]
    fn test_unknown_engine_is_a_path() {
        let config = ArenaConfig::default();
        let spec = config.resolve_engine("/opt/engines/komodo-14.exe");
        assert_eq!(spec.name, "komodo-14");
        assert_eq!(spec.path, PathBuf::from("/opt/engines/komodo-14.exe"));
        assert!(spec.args.is_empty());
        assert_eq!(spec.think_time, Duration::from_millis(1000));
    }

    #[test]
    fn test_load_from_file_and_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert_eq!(ArenaConfig::load_from(&missing).unwrap(), ArenaConfig::default());

        let path = dir.path().join("arena.toml");
        std::fs::write(&path, "database = \"x.db\"\n").unwrap();
        assert_eq!(
            ArenaConfig::load_from(&path).unwrap().database,
            PathBuf::from("x.db")
        );

        std::fs::write(&path, "database = [").unwrap();
        assert!(matches!(
            ArenaConfig::load_from(&path),
            Err(ConfigError::ParseError(_))
        ));
    }

    #[test]
    fn test_config_path_returns_expected_path() {
        assert_eq!(ArenaConfig::config_path(), PathBuf::from("arena.toml"));
    }

    #[test]
    fn test_engine_config_serialization_roundtrip() {
        let engine = EngineConfig {
            path: PathBuf::from("/usr/bin/stockfish"),
            args: vec!["--threads".to_string(), "2".to_string()],
            think_time_ms: Some(750),
        };

        let serialized = toml::to_string(&engine).unwrap();
        let deserialized: EngineConfig = toml::from_str(&serialized).unwrap();
        assert_eq!(deserialized, engine);
    }
}
