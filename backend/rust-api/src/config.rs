use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    pub server: String,
    pub port: u16,
    pub login: String,
    pub password: String,
    pub from_name: String,
    pub from_email: String,
    pub use_tls: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub mongo_uri: String,
    pub redis_uri: String,
    pub mongo_database: String,
    pub jwt_secret: String,
    pub session_ttl_seconds: i64,
    pub port: u16,
    pub smtp: SmtpConfig,
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        // Load environment variables from root .env file (two levels up)
        // Try root .env first, then fallback to local .env
        let skip_root_env = env::var("SKIP_ROOT_ENV").is_ok();
        if skip_root_env {
            dotenvy::dotenv().ok();
        } else if dotenvy::from_path("../../.env").is_err() {
            // Fallback to current directory .env for backward compatibility
            dotenvy::dotenv().ok();
        }

        // Determine environment (defaults to dev)
        let env = env::var("APP_ENV").unwrap_or_else(|_| "dev".to_string());

        // Build configuration from config/*.toml + ENV overrides
        let config_builder = config::Config::builder()
            // Load base config from TOML file
            .add_source(
                config::File::with_name(&format!("config/{}", env)).required(false), // Allow missing config file, fallback to ENV
            )
            // Override with environment variables (prefix: APP_)
            .add_source(config::Environment::with_prefix("APP").separator("__"));

        let settings = config_builder.build()?;

        // Extract values with fallbacks to ENV or defaults
        let mongo_uri = settings
            .get_string("database.mongo_uri")
            .or_else(|_| env::var("MONGO_URI"))
            .unwrap_or_else(|_| "mongodb://localhost:27017/codeplatter".to_string());

        let redis_uri = settings
            .get_string("redis.uri")
            .or_else(|_| env::var("REDIS_URI"))
            .unwrap_or_else(|_| "redis://127.0.0.1:6379/0".to_string());

        let mongo_database = settings
            .get_string("database.mongo_database")
            .or_else(|_| env::var("MONGO_DATABASE"))
            .unwrap_or_else(|_| "codeplatter".to_string());

        let jwt_secret = settings
            .get_string("auth.jwt_secret")
            .or_else(|_| env::var("JWT_SECRET"))
            .unwrap_or_else(|_| {
                if env == "prod" {
                    panic!("FATAL: JWT_SECRET must be set in production!");
                }
                eprintln!("WARNING: Using default JWT_SECRET (dev mode only!)");
                "dev-secret-only-for-local-testing".to_string()
            });

        let session_ttl_seconds = settings
            .get_int("auth.session_ttl_seconds")
            .ok()
            .or_else(|| {
                env::var("JWT_SESSION_TTL_SECONDS")
                    .ok()
                    .and_then(|v| v.parse::<i64>().ok())
            })
            .unwrap_or(3600); // Default: 1 hour

        let port = settings
            .get_int("server.port")
            .ok()
            .or_else(|| env::var("PORT").ok().and_then(|v| v.parse::<i64>().ok()))
            .unwrap_or(8080) as u16;

        let smtp = SmtpConfig {
            server: settings
                .get_string("smtp.server")
                .or_else(|_| env::var("SMTP_SERVER"))
                .unwrap_or_else(|_| "localhost".to_string()),
            port: settings
                .get_int("smtp.port")
                .ok()
                .or_else(|| {
                    env::var("SMTP_PORT")
                        .ok()
                        .and_then(|v| v.parse::<i64>().ok())
                })
                .unwrap_or(587) as u16,
            login: settings
                .get_string("smtp.login")
                .or_else(|_| env::var("SMTP_LOGIN"))
                .unwrap_or_default(),
            password: settings
                .get_string("smtp.password")
                .or_else(|_| env::var("SMTP_PASSWORD"))
                .unwrap_or_default(),
            from_name: settings
                .get_string("smtp.from_name")
                .or_else(|_| env::var("SMTP_FROM_NAME"))
                .unwrap_or_else(|_| "CodePlatter".to_string()),
            from_email: settings
                .get_string("smtp.from_email")
                .or_else(|_| env::var("SMTP_FROM_EMAIL"))
                .unwrap_or_else(|_| "no-reply@codeplatter.dev".to_string()),
            use_tls: settings
                .get_bool("smtp.use_tls")
                .ok()
                .or_else(|| {
                    env::var("SMTP_USE_TLS")
                        .ok()
                        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                })
                .unwrap_or(true),
        };

        Ok(Config {
            mongo_uri,
            redis_uri,
            mongo_database,
            jwt_secret,
            session_ttl_seconds,
            port,
            smtp,
        })
    }
}
