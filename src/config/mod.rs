use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub store: StoreConfig,
    pub security: SecurityConfig,
    pub forms: FormsConfig,
    pub notifications: NotificationConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    pub max_connections: u32,
    pub connection_timeout: u64,
    pub run_migrations: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    /// JSON or YAML fixture loaded into the memory store at startup
    pub seed_path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub jwt_secret: String,
    pub jwt_expiry_hours: u64,
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormsConfig {
    pub max_text_length: usize,
    pub observer_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    pub max_attempts: i32,
    pub batch_size: i64,
    pub email_endpoint: Option<String>,
    pub push_endpoint: Option<String>,
    pub channel_capacity: usize,
    pub poll_interval_secs: u64,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        // Server overrides
        if let Some(port) = env::var("INFOLINE_API_PORT")
            .ok()
            .or_else(|| env::var("PORT").ok())
            .and_then(|v| v.parse().ok())
        {
            self.server.port = port;
        }

        // Database overrides
        if let Ok(v) = env::var("DATABASE_URL") {
            self.database.url = Some(v);
        }
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Ok(v) = env::var("DATABASE_CONNECTION_TIMEOUT") {
            self.database.connection_timeout = v.parse().unwrap_or(self.database.connection_timeout);
        }
        if let Ok(v) = env::var("DATABASE_RUN_MIGRATIONS") {
            self.database.run_migrations = v.parse().unwrap_or(self.database.run_migrations);
        }

        // Store overrides
        if let Ok(v) = env::var("INFOLINE_STORE") {
            match v.to_ascii_lowercase().as_str() {
                "memory" => self.store.backend = StoreBackend::Memory,
                "postgres" | "pg" => self.store.backend = StoreBackend::Postgres,
                other => tracing::warn!("Unknown INFOLINE_STORE '{}', keeping {:?}", other, self.store.backend),
            }
        }
        if let Ok(v) = env::var("INFOLINE_SEED") {
            self.store.seed_path = Some(v);
        }

        // Security overrides
        if let Ok(v) = env::var("JWT_SECRET") {
            self.security.jwt_secret = v;
        }
        if let Ok(v) = env::var("SECURITY_JWT_EXPIRY_HOURS") {
            self.security.jwt_expiry_hours = v.parse().unwrap_or(self.security.jwt_expiry_hours);
        }
        if let Ok(v) = env::var("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = v.split(',').map(|s| s.trim().to_string()).collect();
        }

        // Forms overrides
        if let Ok(v) = env::var("FORMS_MAX_TEXT_LENGTH") {
            self.forms.max_text_length = v.parse().unwrap_or(self.forms.max_text_length);
        }
        if let Ok(v) = env::var("FORMS_OBSERVER_TIMEOUT_MS") {
            self.forms.observer_timeout_ms = v.parse().unwrap_or(self.forms.observer_timeout_ms);
        }

        // Notification overrides
        if let Ok(v) = env::var("NOTIFICATIONS_MAX_ATTEMPTS") {
            self.notifications.max_attempts = v.parse().unwrap_or(self.notifications.max_attempts);
        }
        if let Ok(v) = env::var("NOTIFICATIONS_BATCH_SIZE") {
            self.notifications.batch_size = v.parse().unwrap_or(self.notifications.batch_size);
        }
        if let Ok(v) = env::var("NOTIFICATIONS_EMAIL_ENDPOINT") {
            self.notifications.email_endpoint = validated_endpoint("NOTIFICATIONS_EMAIL_ENDPOINT", v);
        }
        if let Ok(v) = env::var("NOTIFICATIONS_PUSH_ENDPOINT") {
            self.notifications.push_endpoint = validated_endpoint("NOTIFICATIONS_PUSH_ENDPOINT", v);
        }
        if let Ok(v) = env::var("NOTIFICATIONS_POLL_INTERVAL_SECS") {
            self.notifications.poll_interval_secs = v.parse().unwrap_or(self.notifications.poll_interval_secs);
        }

        self
    }

    fn development() -> Self {
        Self {
            environment: Environment::Development,
            server: ServerConfig { port: 3000 },
            database: DatabaseConfig {
                url: None,
                max_connections: 10,
                connection_timeout: 30,
                run_migrations: true,
            },
            store: StoreConfig {
                backend: StoreBackend::Postgres,
                seed_path: None,
            },
            security: SecurityConfig {
                jwt_secret: "infoline-development-secret".to_string(),
                jwt_expiry_hours: 24 * 7, // 1 week
                cors_origins: vec!["http://localhost:5173".to_string(), "http://localhost:8080".to_string()],
            },
            forms: FormsConfig {
                max_text_length: 1000,
                observer_timeout_ms: 5_000,
            },
            notifications: NotificationConfig {
                max_attempts: 3,
                batch_size: 50,
                email_endpoint: None,
                push_endpoint: None,
                channel_capacity: 256,
                poll_interval_secs: 30,
            },
        }
    }

    fn staging() -> Self {
        let mut config = Self::development();
        config.environment = Environment::Staging;
        config.database.max_connections = 20;
        config.database.connection_timeout = 10;
        config.security.jwt_secret = String::new();
        config.security.jwt_expiry_hours = 24;
        config.security.cors_origins = vec!["https://staging.infoline.edu.az".to_string()];
        config
    }

    fn production() -> Self {
        let mut config = Self::development();
        config.environment = Environment::Production;
        config.database.max_connections = 50;
        config.database.connection_timeout = 5;
        config.database.run_migrations = false;
        config.security.jwt_secret = String::new();
        config.security.jwt_expiry_hours = 4;
        config.security.cors_origins = vec!["https://infoline.edu.az".to_string()];
        config.notifications.batch_size = 200;
        config
    }
}

fn validated_endpoint(var: &str, value: String) -> Option<String> {
    match url::Url::parse(&value) {
        Ok(_) => Some(value),
        Err(e) => {
            tracing::warn!("Ignoring {}: invalid URL '{}': {}", var, value, e);
            None
        }
    }
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

// Convenience function for accessing config
pub fn config() -> &'static AppConfig {
    &CONFIG
}

#[macro_export]
macro_rules! is_production {
    () => {
        matches!($crate::config::CONFIG.environment, $crate::config::Environment::Production)
    };
}
