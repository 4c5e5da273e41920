//! Configuration layer: typed settings with layered precedence (file → env → CLI).

mod cli;

pub use cli::{CacheOverrides, CliArgs, Command, FlushCacheArgs, ServeArgs, ServeOverrides};

use std::{
    net::SocketAddr,
    num::{NonZeroU32, NonZeroU64, NonZeroUsize},
    str::FromStr,
};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

use crate::cache::CacheBackend;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "rostra";
const ENV_PREFIX: &str = "ROSTRA";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 8;
const DEFAULT_CACHE_NAMESPACE: &str = "rostra";
const DEFAULT_CACHE_MEMORY_CAPACITY: u64 = 10_000;
const DEFAULT_CACHE_TTL_SECONDS: u64 = 3600;
const DEFAULT_MAX_CAS_ATTEMPTS: u32 = 8;
const DEFAULT_STUDENT_WRITE_ATTEMPTS: u32 = 2;

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub database: DatabaseSettings,
    pub cache: CacheSettings,
    pub lending: LendingSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    pub url: Option<String>,
    pub max_connections: NonZeroU32,
    /// Run against in-process repositories; set by `serve --ephemeral`.
    pub ephemeral: bool,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub enabled: bool,
    pub backend: CacheBackend,
    pub redis_url: Option<String>,
    pub namespace: String,
    pub memory_capacity: NonZeroUsize,
    pub default_ttl_seconds: NonZeroU64,
    pub invalidate_orphaned_students: bool,
    pub invalidate_borrowed_books: bool,
}

#[derive(Debug, Clone)]
pub struct LendingSettings {
    pub max_cas_attempts: NonZeroU32,
    pub student_write_attempts: NonZeroU32,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::FlushCache(args)) => raw.apply_cache_overrides(&args.cache),
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    database: RawDatabaseSettings,
    cache: RawCacheSettings,
    lending: RawLendingSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(url) = overrides.database_url.as_ref() {
            self.database.url = Some(url.clone());
        }
        if let Some(count) = overrides.database_max_connections {
            self.database.max_connections = Some(count);
        }
        if overrides.ephemeral {
            self.database.ephemeral = Some(true);
        }
        self.apply_cache_overrides(&overrides.cache);
    }

    fn apply_cache_overrides(&mut self, overrides: &CacheOverrides) {
        if let Some(enabled) = overrides.cache_enabled {
            self.cache.enabled = Some(enabled);
        }
        if let Some(backend) = overrides.cache_backend {
            self.cache.backend = Some(backend);
        }
        if let Some(url) = overrides.cache_redis_url.as_ref() {
            self.cache.redis_url = Some(url.clone());
        }
        if let Some(seconds) = overrides.cache_ttl_seconds {
            self.cache.default_ttl_seconds = Some(seconds);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        Ok(Self {
            server: build_server_settings(raw.server)?,
            logging: build_logging_settings(raw.logging)?,
            database: build_database_settings(raw.database)?,
            cache: build_cache_settings(raw.cache)?,
            lending: build_lending_settings(raw.lending)?,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());
    let port = server.port.unwrap_or(DEFAULT_PORT);
    let addr = parse_socket_addr(&host, port).map_err(|err| LoadError::invalid("server", err))?;

    Ok(ServerSettings { addr })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_database_settings(database: RawDatabaseSettings) -> Result<DatabaseSettings, LoadError> {
    let url = non_blank(database.url);
    let max_connections = non_zero_u32(
        database
            .max_connections
            .unwrap_or(DEFAULT_DB_MAX_CONNECTIONS)
            .into(),
        "database.max_connections",
    )?;

    Ok(DatabaseSettings {
        url,
        max_connections,
        ephemeral: database.ephemeral.unwrap_or(false),
    })
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    let backend = cache.backend.unwrap_or_default();
    let redis_url = non_blank(cache.redis_url);
    let enabled = cache.enabled.unwrap_or(true);
    if enabled && backend == CacheBackend::Redis && redis_url.is_none() {
        return Err(LoadError::invalid(
            "cache.redis_url",
            "required when cache.backend is `redis`",
        ));
    }

    let namespace = non_blank(cache.namespace).unwrap_or_else(|| DEFAULT_CACHE_NAMESPACE.to_string());

    let capacity_value = cache
        .memory_capacity
        .unwrap_or(DEFAULT_CACHE_MEMORY_CAPACITY);
    let capacity: usize = capacity_value.try_into().map_err(|_| {
        LoadError::invalid(
            "cache.memory_capacity",
            "value exceeds supported range for usize",
        )
    })?;
    let memory_capacity = NonZeroUsize::new(capacity)
        .ok_or_else(|| LoadError::invalid("cache.memory_capacity", "must be greater than zero"))?;

    let default_ttl_seconds = NonZeroU64::new(
        cache
            .default_ttl_seconds
            .unwrap_or(DEFAULT_CACHE_TTL_SECONDS),
    )
    .ok_or_else(|| LoadError::invalid("cache.default_ttl_seconds", "must be greater than zero"))?;

    Ok(CacheSettings {
        enabled,
        backend,
        redis_url,
        namespace,
        memory_capacity,
        default_ttl_seconds,
        invalidate_orphaned_students: cache.invalidate_orphaned_students.unwrap_or(true),
        invalidate_borrowed_books: cache.invalidate_borrowed_books.unwrap_or(true),
    })
}

fn build_lending_settings(lending: RawLendingSettings) -> Result<LendingSettings, LoadError> {
    let max_cas_attempts = non_zero_u32(
        lending
            .max_cas_attempts
            .unwrap_or(DEFAULT_MAX_CAS_ATTEMPTS.into()),
        "lending.max_cas_attempts",
    )?;
    let student_write_attempts = non_zero_u32(
        lending
            .student_write_attempts
            .unwrap_or(DEFAULT_STUDENT_WRITE_ATTEMPTS.into()),
        "lending.student_write_attempts",
    )?;

    Ok(LendingSettings {
        max_cas_attempts,
        student_write_attempts,
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawDatabaseSettings {
    url: Option<String>,
    max_connections: Option<u32>,
    ephemeral: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    enabled: Option<bool>,
    backend: Option<CacheBackend>,
    redis_url: Option<String>,
    namespace: Option<String>,
    memory_capacity: Option<u64>,
    default_ttl_seconds: Option<u64>,
    invalidate_orphaned_students: Option<bool>,
    invalidate_borrowed_books: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLendingSettings {
    max_cas_attempts: Option<u64>,
    student_write_attempts: Option<u64>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

fn non_zero_u32(value: u64, key: &'static str) -> Result<NonZeroU32, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    let value_u32: u32 = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for u32"))?;
    NonZeroU32::new(value_u32).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[cfg(test)]
mod tests;
