use super::*;

use crate::domain::entities::EntityKind;

#[test]
fn defaults_resolve_without_any_source() {
    let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");

    assert_eq!(settings.server.addr.to_string(), "127.0.0.1:3000");
    assert_eq!(settings.logging.level, LevelFilter::INFO);
    assert!(matches!(settings.logging.format, LogFormat::Compact));
    assert_eq!(settings.database.url, None);
    assert_eq!(settings.database.max_connections.get(), 8);
    assert!(settings.cache.enabled);
    assert_eq!(settings.cache.backend, CacheBackend::Memory);
    assert_eq!(settings.cache.namespace, "rostra");
    assert_eq!(settings.cache.memory_capacity.get(), 10_000);
    assert_eq!(settings.cache.default_ttl_seconds.get(), 3600);
    assert_eq!(settings.lending.max_cas_attempts.get(), 8);
    assert_eq!(settings.lending.student_write_attempts.get(), 2);
}

#[test]
fn cli_overrides_take_highest_precedence() {
    let mut raw = RawSettings::default();
    raw.server.port = Some(4000);
    raw.logging.level = Some("info".to_string());

    let overrides = ServeOverrides {
        server_port: Some(4321),
        log_level: Some("debug".to_string()),
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert_eq!(settings.server.addr.port(), 4321);
    assert_eq!(settings.logging.level, LevelFilter::DEBUG);
}

#[test]
fn cli_json_logging_enforces_format() {
    let mut raw = RawSettings::default();
    let overrides = ServeOverrides {
        log_json: Some(true),
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert!(matches!(settings.logging.format, LogFormat::Json));
}

#[test]
fn zero_capacities_are_rejected() {
    let mut raw = RawSettings::default();
    raw.cache.memory_capacity = Some(0);

    let err = Settings::from_raw(raw).expect_err("zero capacity must fail");

    assert!(matches!(err, LoadError::Invalid { key: "cache.memory_capacity", .. }));
}

#[test]
fn zero_ttl_is_rejected() {
    let mut raw = RawSettings::default();
    raw.cache.default_ttl_seconds = Some(0);

    let err = Settings::from_raw(raw).expect_err("zero ttl must fail");

    assert!(matches!(err, LoadError::Invalid { key: "cache.default_ttl_seconds", .. }));
}

#[test]
fn zero_attempts_are_rejected() {
    let mut raw = RawSettings::default();
    raw.lending.max_cas_attempts = Some(0);

    let err = Settings::from_raw(raw).expect_err("zero attempts must fail");

    assert!(matches!(err, LoadError::Invalid { key: "lending.max_cas_attempts", .. }));
}

#[test]
fn redis_backend_requires_url() {
    let mut raw = RawSettings::default();
    raw.cache.backend = Some(CacheBackend::Redis);

    let err = Settings::from_raw(raw).expect_err("redis without url must fail");

    assert!(matches!(err, LoadError::Invalid { key: "cache.redis_url", .. }));
}

#[test]
fn blank_database_url_is_treated_as_absent() {
    let mut raw = RawSettings::default();
    raw.database.url = Some("   ".to_string());

    let settings = Settings::from_raw(raw).expect("valid settings");

    assert_eq!(settings.database.url, None);
}

#[test]
fn default_to_serve_command() {
    let args = CliArgs::parse_from(["rostra"]);
    let command = args
        .command
        .unwrap_or(Command::Serve(Box::<ServeArgs>::default()));
    assert!(matches!(command, Command::Serve(_)));
}

#[test]
fn parse_serve_overrides() {
    let args = CliArgs::parse_from([
        "rostra",
        "serve",
        "--server-host",
        "0.0.0.0",
        "--ephemeral",
        "--cache-backend",
        "redis",
        "--cache-redis-url",
        "redis://localhost",
    ]);

    match args.command.expect("serve command") {
        Command::Serve(serve) => {
            assert_eq!(serve.overrides.server_host.as_deref(), Some("0.0.0.0"));
            assert!(serve.overrides.ephemeral);
            assert_eq!(serve.overrides.cache.cache_backend, Some(CacheBackend::Redis));
            assert_eq!(
                serve.overrides.cache.cache_redis_url.as_deref(),
                Some("redis://localhost")
            );
        }
        _ => panic!("wrong command parsed"),
    }
}

#[test]
fn parse_flush_cache_arguments() {
    let args = CliArgs::parse_from(["rostra", "flush-cache", "--kind", "Book"]);

    match args.command.expect("flush-cache command") {
        Command::FlushCache(flush) => assert_eq!(flush.kind, Some(EntityKind::Book)),
        _ => panic!("wrong command parsed"),
    }
}

#[test]
fn ephemeral_flag_reaches_database_settings() {
    let mut raw = RawSettings::default();
    let overrides = ServeOverrides {
        ephemeral: true,
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert!(settings.database.ephemeral);
}
