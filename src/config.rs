//! Process configuration.
//!
//! Everything is read from environment variables once at startup. Missing
//! variables fall back to defaults; unparsable values log a warning and fall
//! back as well, so a typo never prevents the server from starting.
//!
//! - `PORT` - listen port (default 3000)
//! - `HOST` - bind address (default 0.0.0.0)
//! - `DATA_DIR` - root for task workspaces and served artifacts (default `data`)
//! - `STATUS_DIR` - root for the status page (default `status`)
//! - `CONVERTER_BIN_DIR` - directory holding the FBX2glTF binaries (default `bin`)
//! - `CONVERTER_PATH` - explicit converter executable, bypasses platform lookup
//! - `MAX_UPLOAD_BYTES` - per-file upload limit (default 50000000)
//! - `CONVERT_TIMEOUT_SECS` - kill the converter after this many seconds (unset = wait forever)

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 50_000_000;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub data_dir: PathBuf,
    pub status_dir: PathBuf,
    pub converter_bin_dir: PathBuf,
    pub converter_path: Option<PathBuf>,
    pub max_upload_bytes: u64,
    pub convert_timeout: Option<Duration>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            data_dir: PathBuf::from("data"),
            status_dir: PathBuf::from("status"),
            converter_bin_dir: PathBuf::from("bin"),
            converter_path: None,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            convert_timeout: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Self {
            host: var("HOST").unwrap_or(defaults.host),
            port: parse_or("PORT", var("PORT"), defaults.port),
            data_dir: var("DATA_DIR").map(PathBuf::from).unwrap_or(defaults.data_dir),
            status_dir: var("STATUS_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.status_dir),
            converter_bin_dir: var("CONVERTER_BIN_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.converter_bin_dir),
            converter_path: var("CONVERTER_PATH").map(PathBuf::from),
            max_upload_bytes: parse_or(
                "MAX_UPLOAD_BYTES",
                var("MAX_UPLOAD_BYTES"),
                defaults.max_upload_bytes,
            ),
            convert_timeout: var("CONVERT_TIMEOUT_SECS").and_then(|raw| {
                match raw.trim().parse::<u64>() {
                    Ok(0) => None,
                    Ok(secs) => Some(Duration::from_secs(secs)),
                    Err(_) => {
                        warn!("Invalid CONVERT_TIMEOUT_SECS='{}', running without a timeout", raw);
                        None
                    }
                }
            }),
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or<T>(key: &str, raw: Option<String>, default: T) -> T
where
    T: FromStr + std::fmt::Display + Copy,
{
    match raw {
        Some(raw) => match raw.trim().parse::<T>() {
            Ok(parsed) => parsed,
            Err(_) => {
                warn!("Invalid {}='{}', falling back to {}", key, raw, default);
                default
            }
        },
        None => default,
    }
}
