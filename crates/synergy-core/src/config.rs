//! Application configuration.
//!
//! Loaded from an optional TOML file, then overridden by environment
//! variables (`DATABASE_HOST`, `PG_PORT`, `PG_USER`, `PG_PASS`, `DB_NAME`,
//! `PG_USE_SSL`, `MG_HOST`, `MG_PORT`, `MG_USER`, `MG_PASS`, `GRAPH_DIALECT`,
//! `RESYNC_BATCH_SIZE`).

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{SynergyError, SynergyResult};

/// Connection settings for the canonical Postgres store.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub name: String,
    pub ssl_mode: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            user: "postgres".to_string(),
            password: String::new(),
            name: "postgres".to_string(),
            ssl_mode: "disable".to_string(),
            max_connections: 10,
        }
    }
}

/// Which Cypher dialect the graph store speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GraphDialect {
    Memgraph,
    Neo4j,
}

impl FromStr for GraphDialect {
    type Err = SynergyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "memgraph" => Ok(Self::Memgraph),
            "neo4j" => Ok(Self::Neo4j),
            other => Err(SynergyError::config(format!("unknown graph dialect '{}'", other))),
        }
    }
}

impl std::fmt::Display for GraphDialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Memgraph => write!(f, "memgraph"),
            Self::Neo4j => write!(f, "neo4j"),
        }
    }
}

/// Connection settings for the graph store.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    pub uri: String,
    pub user: String,
    pub password: String,
    /// Database name; Memgraph ignores it.
    pub database: Option<String>,
    pub dialect: GraphDialect,
    pub max_connections: usize,
    pub fetch_size: usize,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            uri: "bolt://localhost:7687".to_string(),
            user: String::new(),
            password: String::new(),
            database: None,
            dialect: GraphDialect::Memgraph,
            max_connections: 8,
            fetch_size: 200,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ResyncConfig {
    pub batch_size: u64,
    /// Upper bound on each canonical read and each batch write during a resync.
    pub batch_timeout_secs: u64,
}

impl Default for ResyncConfig {
    fn default() -> Self {
        Self {
            batch_size: 1000,
            batch_timeout_secs: 300,
        }
    }
}

impl ResyncConfig {
    pub fn batch_timeout(&self) -> Duration {
        Duration::from_secs(self.batch_timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Trigram threshold for rules-text similarity.
    pub rules_similarity: f64,
    /// Trigram threshold for name similarity.
    pub name_similarity: f64,
    pub per_query_limit: usize,
    pub name_limit: usize,
    pub max_concurrent_queries: usize,
    pub language: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            rules_similarity: 0.65,
            name_similarity: 0.3,
            per_query_limit: 50,
            name_limit: 10,
            max_concurrent_queries: 8,
            language: "en".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RecommendConfig {
    pub limit: usize,
}

impl Default for RecommendConfig {
    fn default() -> Self {
        Self { limit: 10 }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub graph: GraphConfig,
    pub resync: ResyncConfig,
    pub search: SearchConfig,
    pub recommend: RecommendConfig,
}

fn parse_var<T: FromStr>(name: &str, value: &str) -> SynergyResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| SynergyError::config(format!("{} has an invalid value '{}'", name, value)))
}

impl AppConfig {
    /// Load from an optional TOML file, then apply process environment overrides.
    pub fn load(path: Option<&Path>) -> SynergyResult<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_overrides(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> SynergyResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        toml::from_str(&raw)
            .map_err(|e| SynergyError::config(format!("failed to parse {}: {}", path.display(), e)))
    }

    /// Apply environment-style overrides from `lookup`.
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> SynergyResult<()> {
        if let Some(v) = lookup("DATABASE_HOST") {
            self.database.host = v;
        }
        if let Some(v) = lookup("PG_PORT") {
            self.database.port = parse_var("PG_PORT", &v)?;
        }
        if let Some(v) = lookup("PG_USER") {
            self.database.user = v;
        }
        if let Some(v) = lookup("PG_PASS") {
            self.database.password = v;
        }
        if let Some(v) = lookup("DB_NAME") {
            self.database.name = v;
        }
        if let Some(v) = lookup("PG_USE_SSL") {
            self.database.ssl_mode = v;
        }

        let mg_host = lookup("MG_HOST");
        let mg_port = lookup("MG_PORT");
        if mg_host.is_some() || mg_port.is_some() {
            let port: u16 = match mg_port {
                Some(p) => parse_var("MG_PORT", &p)?,
                None => 7687,
            };
            let host = mg_host.unwrap_or_else(|| "localhost".to_string());
            self.graph.uri = format!("bolt://{}:{}", host, port);
        }
        if let Some(v) = lookup("MG_USER") {
            self.graph.user = v;
        }
        if let Some(v) = lookup("MG_PASS") {
            self.graph.password = v;
        }
        if let Some(v) = lookup("GRAPH_DIALECT") {
            self.graph.dialect = v.parse()?;
        }

        if let Some(v) = lookup("RESYNC_BATCH_SIZE") {
            self.resync.batch_size = parse_var("RESYNC_BATCH_SIZE", &v)?;
        }
        if self.resync.batch_size == 0 {
            return Err(SynergyError::config("resync batch size must be positive"));
        }
        if self.resync.batch_timeout_secs == 0 {
            return Err(SynergyError::config("resync batch timeout must be positive"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.database.port, 5432);
        assert_eq!(config.graph.uri, "bolt://localhost:7687");
        assert_eq!(config.graph.dialect, GraphDialect::Memgraph);
        assert_eq!(config.resync.batch_size, 1000);
        assert_eq!(config.search.rules_similarity, 0.65);
        assert_eq!(config.recommend.limit, 10);
    }

    #[test]
    fn test_env_overrides() {
        let mut config = AppConfig::default();
        config
            .apply_overrides(env(&[
                ("DATABASE_HOST", "db.internal"),
                ("PG_PORT", "6543"),
                ("PG_USER", "cards"),
                ("MG_HOST", "graph.internal"),
                ("GRAPH_DIALECT", "Neo4j"),
            ]))
            .unwrap();
        assert_eq!(config.database.host, "db.internal");
        assert_eq!(config.database.port, 6543);
        assert_eq!(config.database.user, "cards");
        assert_eq!(config.graph.uri, "bolt://graph.internal:7687");
        assert_eq!(config.graph.dialect, GraphDialect::Neo4j);
    }

    #[test]
    fn test_invalid_port_is_an_error() {
        let mut config = AppConfig::default();
        let err = config.apply_overrides(env(&[("PG_PORT", "fifty")])).unwrap_err();
        assert!(matches!(err, SynergyError::Config(_)));
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let mut config = AppConfig::default();
        assert!(config.apply_overrides(env(&[("RESYNC_BATCH_SIZE", "0")])).is_err());
    }

    #[test]
    fn test_zero_batch_timeout_rejected() {
        let mut config = AppConfig::default();
        config.resync.batch_timeout_secs = 0;
        let err = config.apply_overrides(env(&[])).unwrap_err();
        assert!(matches!(err, SynergyError::Config(_)));
    }

    #[test]
    fn test_from_file_with_partial_sections() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[graph]\nuri = \"bolt://example:7688\"\ndialect = \"neo4j\"\n\n\
             [resync]\nbatch_size = 250"
        )
        .unwrap();

        let config = AppConfig::from_file(file.path()).unwrap();
        assert_eq!(config.graph.uri, "bolt://example:7688");
        assert_eq!(config.graph.dialect, GraphDialect::Neo4j);
        assert_eq!(config.resync.batch_size, 250);
        assert_eq!(config.resync.batch_timeout_secs, 300);
        assert_eq!(config.database.name, "postgres");
    }
}
