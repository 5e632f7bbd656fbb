//! Server configuration loaded from environment variables.
//!
//! All settings have sensible defaults so the server can start with zero
//! configuration for local development.

use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;

use symbolhub_shared::constants::DEFAULT_HTTP_PORT;

/// Server configuration.
#[derive(Clone)]
pub struct ServerConfig {
    /// Socket address for the HTTP (axum) API server.
    /// Env: `HTTP_ADDR`
    /// Default: `0.0.0.0:8080`
    pub http_addr: SocketAddr,

    /// SQLite catalog file.
    /// Env: `DATABASE_PATH`
    /// Default: `./symbolhub.db`
    pub database_path: PathBuf,

    /// Root directory of the object store (assets and previews).
    /// Env: `OBJECT_STORAGE_PATH`
    /// Default: `./objects`
    pub object_storage_path: PathBuf,

    /// Externally visible origin, used to build download and preview URLs.
    /// Env: `PUBLIC_BASE_URL`
    /// Default: `http://localhost:8080`
    pub public_base_url: String,

    /// Maximum asset size in bytes (10 MiB).
    /// Env: `MAX_UPLOAD_SIZE`
    pub max_upload_size: usize,

    /// Lifetime of a signed download URL.
    /// Env: `DOWNLOAD_URL_TTL_SECS`
    /// Default: `300`
    pub download_url_ttl_secs: u64,

    /// Lifetime of a session token.
    /// Env: `SESSION_TTL_SECS`
    /// Default: 7 days
    pub session_ttl_secs: u64,

    /// Ed25519 seed used to sign session tokens (hex, 64 chars).
    /// Env: `SESSION_SIGNING_KEY`
    /// Default: random per process, so sessions do not survive a restart.
    pub session_signing_key: [u8; 32],

    /// BLAKE3 key used to sign download URLs (hex, 64 chars).
    /// Env: `URL_SIGNING_KEY`
    /// Default: random per process.
    pub url_signing_key: [u8; 32],

    /// Whether new accounts can be created through `/auth/signup`.
    /// Env: `REGISTRATION_OPEN` (true/false)
    /// Default: `true`
    pub registration_open: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: ([0, 0, 0, 0], DEFAULT_HTTP_PORT).into(),
            database_path: PathBuf::from("./symbolhub.db"),
            object_storage_path: PathBuf::from("./objects"),
            public_base_url: format!("http://localhost:{DEFAULT_HTTP_PORT}"),
            max_upload_size: 10 * 1024 * 1024, // 10 MiB
            download_url_ttl_secs: 300,
            session_ttl_secs: 7 * 24 * 60 * 60,
            session_signing_key: rand::random(),
            url_signing_key: rand::random(),
            registration_open: true,
        }
    }
}

// Keys stay out of the startup log.
impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("http_addr", &self.http_addr)
            .field("database_path", &self.database_path)
            .field("object_storage_path", &self.object_storage_path)
            .field("public_base_url", &self.public_base_url)
            .field("max_upload_size", &self.max_upload_size)
            .field("download_url_ttl_secs", &self.download_url_ttl_secs)
            .field("session_ttl_secs", &self.session_ttl_secs)
            .field("registration_open", &self.registration_open)
            .finish_non_exhaustive()
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(addr) = lookup("HTTP_ADDR") {
            match addr.parse::<SocketAddr>() {
                Ok(parsed) => config.http_addr = parsed,
                Err(_) => tracing::warn!(value = %addr, "Invalid HTTP_ADDR, using default"),
            }
        }

        if let Some(path) = lookup("DATABASE_PATH") {
            config.database_path = PathBuf::from(path);
        }

        if let Some(path) = lookup("OBJECT_STORAGE_PATH") {
            config.object_storage_path = PathBuf::from(path);
        }

        if let Some(url) = lookup("PUBLIC_BASE_URL") {
            let url = url.trim().trim_end_matches('/');
            if url.is_empty() {
                tracing::warn!("Empty PUBLIC_BASE_URL, using default");
            } else {
                config.public_base_url = url.to_string();
            }
        }

        if let Some(n) = parse_number(&lookup, "MAX_UPLOAD_SIZE") {
            config.max_upload_size = n;
        }
        if let Some(n) = parse_number(&lookup, "DOWNLOAD_URL_TTL_SECS") {
            config.download_url_ttl_secs = n;
        }
        if let Some(n) = parse_number(&lookup, "SESSION_TTL_SECS") {
            config.session_ttl_secs = n;
        }

        if let Some(raw) = lookup("SESSION_SIGNING_KEY") {
            match parse_hex_key(&raw) {
                Ok(key) => config.session_signing_key = key,
                Err(e) => tracing::warn!(
                    error = %e,
                    "Invalid SESSION_SIGNING_KEY, using a random key"
                ),
            }
        }

        if let Some(raw) = lookup("URL_SIGNING_KEY") {
            match parse_hex_key(&raw) {
                Ok(key) => config.url_signing_key = key,
                Err(e) => tracing::warn!(
                    error = %e,
                    "Invalid URL_SIGNING_KEY, using a random key"
                ),
            }
        }

        if let Some(val) = lookup("REGISTRATION_OPEN") {
            config.registration_open = val != "false" && val != "0";
        }

        // RUST_LOG is handled directly by tracing-subscriber's EnvFilter,
        // so we do not store it here.

        config
    }
}

/// Parse a positive number, warning and returning `None` on garbage.
fn parse_number<F, T>(lookup: &F, name: &str) -> Option<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr + PartialOrd + Default,
{
    let raw = lookup(name)?;
    match raw.trim().parse::<T>() {
        Ok(n) if n > T::default() => Some(n),
        _ => {
            tracing::warn!(value = %raw, "Invalid {name}, using default");
            None
        }
    }
}

/// Parse a 64-character hex string into a 32-byte key.
fn parse_hex_key(raw: &str) -> Result<[u8; 32], String> {
    let raw = raw.trim();
    if raw.len() != 64 {
        return Err(format!("expected 64 hex chars, got {}", raw.len()));
    }
    let bytes = hex::decode(raw).map_err(|e| format!("invalid hex: {e}"))?;
    let mut key = [0u8; 32];
    key.copy_from_slice(&bytes);
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> ServerConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_default_config() {
        let config = config_from(&[]);
        assert_eq!(config.http_addr, ([0, 0, 0, 0], 8080).into());
        assert_eq!(config.database_path, PathBuf::from("./symbolhub.db"));
        assert_eq!(config.public_base_url, "http://localhost:8080");
        assert_eq!(config.download_url_ttl_secs, 300);
        assert!(config.registration_open);
    }

    #[test]
    fn test_random_keys_differ_per_config() {
        let a = ServerConfig::default();
        let b = ServerConfig::default();
        assert_ne!(a.session_signing_key, b.session_signing_key);
        assert_ne!(a.session_signing_key, a.url_signing_key);
    }

    #[test]
    fn test_overrides() {
        let key = "ab".repeat(32);
        let config = config_from(&[
            ("HTTP_ADDR", "127.0.0.1:9000"),
            ("PUBLIC_BASE_URL", "https://symbols.example/"),
            ("MAX_UPLOAD_SIZE", "2048"),
            ("SESSION_SIGNING_KEY", key.as_str()),
            ("REGISTRATION_OPEN", "false"),
        ]);
        assert_eq!(config.http_addr, ([127, 0, 0, 1], 9000).into());
        assert_eq!(config.public_base_url, "https://symbols.example");
        assert_eq!(config.max_upload_size, 2048);
        assert_eq!(config.session_signing_key, [0xab; 32]);
        assert!(!config.registration_open);
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = config_from(&[
            ("HTTP_ADDR", "not-an-address"),
            ("DOWNLOAD_URL_TTL_SECS", "-5"),
            ("SESSION_TTL_SECS", "0"),
        ]);
        assert_eq!(config.http_addr, ([0, 0, 0, 0], 8080).into());
        assert_eq!(config.download_url_ttl_secs, 300);
        assert_eq!(config.session_ttl_secs, 7 * 24 * 60 * 60);
    }

    #[test]
    fn test_parse_hex_key() {
        assert_eq!(parse_hex_key(&"0f".repeat(32)).unwrap(), [0x0f; 32]);
        assert!(parse_hex_key("abcd").is_err());
        assert!(parse_hex_key(&"zz".repeat(32)).is_err());
    }

    #[test]
    fn test_debug_hides_keys() {
        let key = "cd".repeat(32);
        let config = config_from(&[("URL_SIGNING_KEY", key.as_str())]);
        let printed = format!("{config:?}");
        assert!(!printed.contains("cdcd"));
        assert!(!printed.contains("205, 205"));
    }
}
