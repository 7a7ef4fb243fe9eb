//! Configuration loading from environment variables.
//!
//! All configuration values are loaded from `DPIV_*` environment variables
//! with sensible defaults. Invalid values fall back to defaults without crashing.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |---|---|---|
//! | `DPIV_BASE_DIR` | `.` | Application root; relative paths resolve here |
//! | `DPIV_ENGINE_BINARY` | `bin/winws.exe` / `bin/nfqws` | Engine executable |
//! | `DPIV_BIN_DIR` | `bin` | Engine working dir and `%BIN%` |
//! | `DPIV_LISTS_DIR` | `lists` | `%LISTS%` and host-list files |
//! | `DPIV_PROFILES_DIR` | `profiles` | JSON profile catalog |
//! | `DPIV_REPORT_DIR` | `reports` | Report destination |
//! | `DPIV_GAME_FILTER` | false | Wide port range for `%GameFilter%` |
//! | `DPIV_FILTER_ALL_IP` | false | `%IPSET%` points at `ipset-all.txt` |
//! | `DPIV_READY_TIMEOUT_MS` | 5000 | Readiness wait |
//! | `DPIV_STOP_TIMEOUT_SECS` | 10 | Graceful stop wait |
//! | `DPIV_STOP_GRACE_SECS` | 5 | Extension before forced kill |
//! | `DPIV_SETTLE_START_MS` | 500 | Pause after readiness |
//! | `DPIV_SETTLE_STOP_MS` | 1000 | Pause after stop |
//! | `DPIV_HTTP_TIMEOUT_SECS` | 10 | HTTP/TLS probe timeout |
//! | `DPIV_PING_TIMEOUT_SECS` | 3 | Ping probe timeout |
//! | `DPIV_DPI_TIMEOUT_SECS` | 7 | DPI probe timeout |
//! | `DPIV_DPI_RANGE_BYTES` | 262144 | DPI range size |
//! | `DPIV_DPI_WARN_MIN_KB` | 14 | Block-page window lower bound |
//! | `DPIV_DPI_WARN_MAX_KB` | 22 | Block-page window upper bound |
//! | `DPIV_MAX_PARALLEL_PROBES` | 32 | Probes in flight per profile |
//! | `DPIV_LOG_FORMAT` | pretty | `pretty` or `json` |

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Serialize;

use crate::engine::{default_binary, LaunchLayout, LaunchOptions};
use crate::probe::{DpiThresholds, ProbeSettings};
use crate::telemetry::LogFormat;

/// Every variable this module reads.
pub const ENV_KEYS: &[&str] = &[
    "DPIV_BASE_DIR",
    "DPIV_ENGINE_BINARY",
    "DPIV_BIN_DIR",
    "DPIV_LISTS_DIR",
    "DPIV_PROFILES_DIR",
    "DPIV_REPORT_DIR",
    "DPIV_GAME_FILTER",
    "DPIV_FILTER_ALL_IP",
    "DPIV_READY_TIMEOUT_MS",
    "DPIV_STOP_TIMEOUT_SECS",
    "DPIV_STOP_GRACE_SECS",
    "DPIV_SETTLE_START_MS",
    "DPIV_SETTLE_STOP_MS",
    "DPIV_HTTP_TIMEOUT_SECS",
    "DPIV_PING_TIMEOUT_SECS",
    "DPIV_DPI_TIMEOUT_SECS",
    "DPIV_DPI_RANGE_BYTES",
    "DPIV_DPI_WARN_MIN_KB",
    "DPIV_DPI_WARN_MAX_KB",
    "DPIV_MAX_PARALLEL_PROBES",
    "DPIV_LOG_FORMAT",
];

/// Effective configuration summary (serializable).
#[derive(Debug, Clone, Serialize)]
pub struct EffectiveConfig {
    pub base_dir: String,
    pub engine_binary: String,
    pub bin_dir: String,
    pub lists_dir: String,
    pub profiles_dir: String,
    pub report_dir: String,
    pub game_filter: bool,
    pub filter_all_ip: bool,
    pub ready_timeout_ms: u64,
    pub stop_timeout_secs: u64,
    pub stop_grace_secs: u64,
    pub settle_start_ms: u64,
    pub settle_stop_ms: u64,
    pub http_timeout_secs: u64,
    pub ping_timeout_secs: u64,
    pub dpi_timeout_secs: u64,
    pub dpi_range_bytes: u64,
    pub dpi_warn_min_kb: u64,
    pub dpi_warn_max_kb: u64,
    pub max_parallel_probes: usize,
    pub log_format: String,
}

/// All configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct EnvConfig {
    pub base_dir: PathBuf,
    pub engine_binary: PathBuf,
    pub layout: LaunchLayout,
    pub profiles_dir: PathBuf,
    pub report_dir: PathBuf,
    pub launch: LaunchOptions,
    pub ready_timeout: Duration,
    pub stop_timeout: Duration,
    pub stop_grace: Duration,
    pub settle_after_start: Duration,
    pub settle_after_stop: Duration,
    pub probes: ProbeSettings,
    pub max_parallel_probes: usize,
    pub log_format: LogFormat,
}

/// Parse a `usize` env var, returning `default` on missing or invalid.
fn parse_usize(key: &str, default: usize) -> usize {
    match std::env::var(key) {
        Ok(val) => val.trim().parse::<usize>().unwrap_or(default),
        Err(_) => default,
    }
}

/// Parse a `u64` env var, returning `default` on missing or invalid.
fn parse_u64(key: &str, default: u64) -> u64 {
    match std::env::var(key) {
        Ok(val) => val.trim().parse::<u64>().unwrap_or(default),
        Err(_) => default,
    }
}

/// Parse a boolean env var (`1/0`, `true/false`, `yes/no`, `on/off`).
fn parse_bool(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(val) => match val.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => default,
        },
        Err(_) => default,
    }
}

/// Path env var resolved against `base` when relative.
fn parse_path(key: &str, default: &str, base: &Path) -> PathBuf {
    let raw = std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string());
    let path = PathBuf::from(raw.trim());
    if path.is_absolute() {
        path
    } else {
        base.join(path)
    }
}

fn load_probe_settings() -> ProbeSettings {
    let http = parse_u64("DPIV_HTTP_TIMEOUT_SECS", 10).clamp(1, 300);
    let ping = parse_u64("DPIV_PING_TIMEOUT_SECS", 3).clamp(1, 60);
    let dpi = parse_u64("DPIV_DPI_TIMEOUT_SECS", 7).clamp(1, 300);
    let range = parse_u64("DPIV_DPI_RANGE_BYTES", 262_144).max(1024); // floor: 1 KiB
    let warn_min = parse_u64("DPIV_DPI_WARN_MIN_KB", 14);
    let warn_max = parse_u64("DPIV_DPI_WARN_MAX_KB", 22).max(warn_min);

    ProbeSettings {
        http_timeout: Duration::from_secs(http),
        ping_timeout: Duration::from_secs(ping),
        dpi_timeout: Duration::from_secs(dpi),
        dpi_range_bytes: range,
        thresholds: DpiThresholds {
            warn_min_kb: warn_min as f64,
            warn_max_kb: warn_max as f64,
        },
    }
}

/// Load all configuration from environment variables.
///
/// Missing or invalid values fall back to safe defaults without panicking.
pub fn load() -> EnvConfig {
    let base_dir = std::env::var("DPIV_BASE_DIR")
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(|v| PathBuf::from(v.trim()))
        .unwrap_or_else(|| PathBuf::from("."));

    let layout = LaunchLayout {
        bin_dir: parse_path("DPIV_BIN_DIR", "bin", &base_dir),
        lists_dir: parse_path("DPIV_LISTS_DIR", "lists", &base_dir),
    };

    let ready_ms = parse_u64("DPIV_READY_TIMEOUT_MS", 5000).max(100);
    let stop_secs = parse_u64("DPIV_STOP_TIMEOUT_SECS", 10).max(1);
    let grace_secs = parse_u64("DPIV_STOP_GRACE_SECS", 5);
    let settle_start = parse_u64("DPIV_SETTLE_START_MS", 500);
    let settle_stop = parse_u64("DPIV_SETTLE_STOP_MS", 1000);
    let max_parallel = parse_usize("DPIV_MAX_PARALLEL_PROBES", 32).clamp(1, 1024);

    let log_format = std::env::var("DPIV_LOG_FORMAT")
        .ok()
        .and_then(|v| v.parse::<LogFormat>().ok())
        .unwrap_or_default();

    EnvConfig {
        engine_binary: parse_path("DPIV_ENGINE_BINARY", default_binary(), &base_dir),
        profiles_dir: parse_path("DPIV_PROFILES_DIR", "profiles", &base_dir),
        report_dir: parse_path("DPIV_REPORT_DIR", "reports", &base_dir),
        layout,
        launch: LaunchOptions {
            game_filter: parse_bool("DPIV_GAME_FILTER", false),
            filter_all_ip: parse_bool("DPIV_FILTER_ALL_IP", false),
        },
        ready_timeout: Duration::from_millis(ready_ms),
        stop_timeout: Duration::from_secs(stop_secs),
        stop_grace: Duration::from_secs(grace_secs),
        settle_after_start: Duration::from_millis(settle_start),
        settle_after_stop: Duration::from_millis(settle_stop),
        probes: load_probe_settings(),
        max_parallel_probes: max_parallel,
        log_format,
        base_dir,
    }
}

impl EnvConfig {
    /// Return a serializable summary of all effective values.
    pub fn effective_config(&self) -> EffectiveConfig {
        EffectiveConfig {
            base_dir: self.base_dir.display().to_string(),
            engine_binary: self.engine_binary.display().to_string(),
            bin_dir: self.layout.bin_dir.display().to_string(),
            lists_dir: self.layout.lists_dir.display().to_string(),
            profiles_dir: self.profiles_dir.display().to_string(),
            report_dir: self.report_dir.display().to_string(),
            game_filter: self.launch.game_filter,
            filter_all_ip: self.launch.filter_all_ip,
            ready_timeout_ms: self.ready_timeout.as_millis() as u64,
            stop_timeout_secs: self.stop_timeout.as_secs(),
            stop_grace_secs: self.stop_grace.as_secs(),
            settle_start_ms: self.settle_after_start.as_millis() as u64,
            settle_stop_ms: self.settle_after_stop.as_millis() as u64,
            http_timeout_secs: self.probes.http_timeout.as_secs(),
            ping_timeout_secs: self.probes.ping_timeout.as_secs(),
            dpi_timeout_secs: self.probes.dpi_timeout.as_secs(),
            dpi_range_bytes: self.probes.dpi_range_bytes,
            dpi_warn_min_kb: self.probes.thresholds.warn_min_kb as u64,
            dpi_warn_max_kb: self.probes.thresholds.warn_max_kb as u64,
            max_parallel_probes: self.max_parallel_probes,
            log_format: match self.log_format {
                LogFormat::Json => "json".to_string(),
                LogFormat::Pretty => "pretty".to_string(),
            },
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;

    // Serialize env-mutating tests to avoid cross-test pollution.
    pub(crate) static ENV_LOCK: Mutex<()> = Mutex::new(());

    pub(crate) fn clear_env_vars() {
        for k in ENV_KEYS {
            std::env::remove_var(k);
        }
    }

    #[test]
    fn test_defaults_are_sensible() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env_vars();
        let cfg = load();
        assert_eq!(cfg.base_dir, PathBuf::from("."));
        assert_eq!(cfg.engine_binary, PathBuf::from(".").join(default_binary()));
        assert_eq!(cfg.layout.lists_dir, PathBuf::from("./lists"));
        assert_eq!(cfg.ready_timeout, Duration::from_secs(5));
        assert_eq!(cfg.stop_timeout, Duration::from_secs(10));
        assert_eq!(cfg.stop_grace, Duration::from_secs(5));
        assert_eq!(cfg.settle_after_start, Duration::from_millis(500));
        assert_eq!(cfg.settle_after_stop, Duration::from_millis(1000));
        assert_eq!(cfg.probes.http_timeout, Duration::from_secs(10));
        assert_eq!(cfg.probes.ping_timeout, Duration::from_secs(3));
        assert_eq!(cfg.probes.dpi_range_bytes, 262_144);
        assert_eq!(cfg.probes.thresholds, DpiThresholds::default());
        assert_eq!(cfg.max_parallel_probes, 32);
        assert!(!cfg.launch.game_filter);
        assert_eq!(cfg.log_format, LogFormat::Pretty);
    }

    #[test]
    fn test_env_vars_override_defaults() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env_vars();
        std::env::set_var("DPIV_BASE_DIR", "/opt/zapret");
        std::env::set_var("DPIV_REPORT_DIR", "/tmp/reports");
        std::env::set_var("DPIV_GAME_FILTER", "yes");
        std::env::set_var("DPIV_READY_TIMEOUT_MS", "8000");
        std::env::set_var("DPIV_DPI_WARN_MAX_KB", "30");
        std::env::set_var("DPIV_LOG_FORMAT", "json");
        let cfg = load();
        assert_eq!(cfg.layout.bin_dir, PathBuf::from("/opt/zapret/bin"));
        assert_eq!(cfg.report_dir, PathBuf::from("/tmp/reports"));
        assert!(cfg.launch.game_filter);
        assert_eq!(cfg.ready_timeout, Duration::from_secs(8));
        assert_eq!(cfg.probes.thresholds.warn_max_kb, 30.0);
        assert_eq!(cfg.log_format, LogFormat::Json);
        clear_env_vars();
    }

    #[test]
    fn test_invalid_env_falls_back_to_default() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env_vars();
        std::env::set_var("DPIV_READY_TIMEOUT_MS", "soon");
        std::env::set_var("DPIV_GAME_FILTER", "maybe");
        std::env::set_var("DPIV_LOG_FORMAT", "xml");
        let cfg = load();
        assert_eq!(cfg.ready_timeout, Duration::from_secs(5));
        assert!(!cfg.launch.game_filter);
        assert_eq!(cfg.log_format, LogFormat::Pretty);
        clear_env_vars();
    }

    #[test]
    fn test_floors_and_window_ordering() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env_vars();
        std::env::set_var("DPIV_MAX_PARALLEL_PROBES", "0");
        std::env::set_var("DPIV_DPI_RANGE_BYTES", "10");
        std::env::set_var("DPIV_DPI_WARN_MIN_KB", "40");
        std::env::set_var("DPIV_DPI_WARN_MAX_KB", "20");
        let cfg = load();
        assert_eq!(cfg.max_parallel_probes, 1);
        assert_eq!(cfg.probes.dpi_range_bytes, 1024);
        assert!(cfg.probes.thresholds.warn_max_kb >= cfg.probes.thresholds.warn_min_kb);
        clear_env_vars();
    }

    #[test]
    fn test_effective_config_round_trips_values() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env_vars();
        let eff = load().effective_config();
        assert_eq!(eff.ready_timeout_ms, 5000);
        assert_eq!(eff.dpi_warn_min_kb, 14);
        assert_eq!(eff.dpi_warn_max_kb, 22);
        let json = serde_json::to_value(&eff).unwrap();
        assert_eq!(json["max_parallel_probes"], 32);
    }
}
