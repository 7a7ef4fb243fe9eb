// Copyright 2024-2026 dpi-verify Contributors
// SPDX-License-Identifier: Apache-2.0

//! Config CLI subcommands: show, defaults, validate.
//!
//! These commands read configuration directly from environment variables.

use crate::config::{self, EffectiveConfig};
use crate::engine::default_binary;

use super::{EXIT_FAILURE, EXIT_SUCCESS};

/// Print effective config as key-value pairs to stdout, or as JSON.
pub fn run_show(json: bool) -> i32 {
    let cfg = config::load().effective_config();
    if json {
        match serde_json::to_string_pretty(&cfg) {
            Ok(text) => println!("{text}"),
            Err(e) => {
                eprintln!("Error: {e}");
                return EXIT_FAILURE;
            }
        }
    } else {
        print_config(&cfg);
    }
    EXIT_SUCCESS
}

/// Print default config values (no env overrides) to stdout.
pub fn run_defaults() {
    println!("DPIV_BASE_DIR=.");
    println!("DPIV_ENGINE_BINARY={}", default_binary());
    println!("DPIV_BIN_DIR=bin");
    println!("DPIV_LISTS_DIR=lists");
    println!("DPIV_PROFILES_DIR=profiles");
    println!("DPIV_REPORT_DIR=reports");
    println!("DPIV_GAME_FILTER=false");
    println!("DPIV_FILTER_ALL_IP=false");
    println!("DPIV_READY_TIMEOUT_MS=5000");
    println!("DPIV_STOP_TIMEOUT_SECS=10");
    println!("DPIV_STOP_GRACE_SECS=5");
    println!("DPIV_SETTLE_START_MS=500");
    println!("DPIV_SETTLE_STOP_MS=1000");
    println!("DPIV_HTTP_TIMEOUT_SECS=10");
    println!("DPIV_PING_TIMEOUT_SECS=3");
    println!("DPIV_DPI_TIMEOUT_SECS=7");
    println!("DPIV_DPI_RANGE_BYTES=262144");
    println!("DPIV_DPI_WARN_MIN_KB=14");
    println!("DPIV_DPI_WARN_MAX_KB=22");
    println!("DPIV_MAX_PARALLEL_PROBES=32");
    println!("DPIV_LOG_FORMAT=pretty");
}

/// Validate configuration for obvious misconfigurations.
///
/// Returns 0 if valid, 1 if any warnings are found.
pub fn run_validate() -> i32 {
    let env = config::load();
    let warnings = validate(&env);
    for w in &warnings {
        eprintln!("WARNING: {w}");
    }
    if warnings.is_empty() {
        println!("Configuration is valid.");
        EXIT_SUCCESS
    } else {
        EXIT_FAILURE
    }
}

/// Problems that would make every profile fail or every run abort.
fn validate(env: &config::EnvConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    if !env.engine_binary.is_file() {
        warnings.push(format!(
            "DPIV_ENGINE_BINARY ({}) does not exist; every profile will fail to start",
            env.engine_binary.display()
        ));
    }
    if !env.layout.lists_dir.is_dir() {
        warnings.push(format!(
            "DPIV_LISTS_DIR ({}) does not exist; host-list arguments will not resolve",
            env.layout.lists_dir.display()
        ));
    }
    if !env.profiles_dir.is_dir() {
        warnings.push(format!(
            "DPIV_PROFILES_DIR ({}) does not exist; no profiles can be tested",
            env.profiles_dir.display()
        ));
    }
    if env.probes.dpi_timeout > env.probes.http_timeout * 3 {
        warnings.push(format!(
            "DPIV_DPI_TIMEOUT_SECS ({}) is far above DPIV_HTTP_TIMEOUT_SECS ({}); DPI runs will be slow",
            env.probes.dpi_timeout.as_secs(),
            env.probes.http_timeout.as_secs()
        ));
    }
    warnings
}

fn print_config(cfg: &EffectiveConfig) {
    println!("DPIV_BASE_DIR={}", cfg.base_dir);
    println!("DPIV_ENGINE_BINARY={}", cfg.engine_binary);
    println!("DPIV_BIN_DIR={}", cfg.bin_dir);
    println!("DPIV_LISTS_DIR={}", cfg.lists_dir);
    println!("DPIV_PROFILES_DIR={}", cfg.profiles_dir);
    println!("DPIV_REPORT_DIR={}", cfg.report_dir);
    println!("DPIV_GAME_FILTER={}", cfg.game_filter);
    println!("DPIV_FILTER_ALL_IP={}", cfg.filter_all_ip);
    println!("DPIV_READY_TIMEOUT_MS={}", cfg.ready_timeout_ms);
    println!("DPIV_STOP_TIMEOUT_SECS={}", cfg.stop_timeout_secs);
    println!("DPIV_STOP_GRACE_SECS={}", cfg.stop_grace_secs);
    println!("DPIV_SETTLE_START_MS={}", cfg.settle_start_ms);
    println!("DPIV_SETTLE_STOP_MS={}", cfg.settle_stop_ms);
    println!("DPIV_HTTP_TIMEOUT_SECS={}", cfg.http_timeout_secs);
    println!("DPIV_PING_TIMEOUT_SECS={}", cfg.ping_timeout_secs);
    println!("DPIV_DPI_TIMEOUT_SECS={}", cfg.dpi_timeout_secs);
    println!("DPIV_DPI_RANGE_BYTES={}", cfg.dpi_range_bytes);
    println!("DPIV_DPI_WARN_MIN_KB={}", cfg.dpi_warn_min_kb);
    println!("DPIV_DPI_WARN_MAX_KB={}", cfg.dpi_warn_max_kb);
    println!("DPIV_MAX_PARALLEL_PROBES={}", cfg.max_parallel_probes);
    println!("DPIV_LOG_FORMAT={}", cfg.log_format);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::{clear_env_vars, ENV_LOCK};

    #[test]
    fn test_validate_flags_missing_install() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env_vars();
        let dir = tempfile::tempdir().unwrap();
        std::env::set_var("DPIV_BASE_DIR", dir.path());
        let warnings = validate(&config::load());
        assert_eq!(warnings.len(), 3);
        assert!(warnings[0].starts_with("DPIV_ENGINE_BINARY"));
        assert_eq!(run_validate(), EXIT_FAILURE);
        clear_env_vars();
    }

    #[test]
    fn test_validate_passes_for_complete_install() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env_vars();
        let dir = tempfile::tempdir().unwrap();
        let engine = dir.path().join(default_binary());
        std::fs::create_dir_all(engine.parent().unwrap()).unwrap();
        std::fs::write(&engine, b"").unwrap();
        std::fs::create_dir_all(dir.path().join("lists")).unwrap();
        std::fs::create_dir_all(dir.path().join("profiles")).unwrap();
        std::env::set_var("DPIV_BASE_DIR", dir.path());
        assert!(validate(&config::load()).is_empty());
        assert_eq!(run_validate(), EXIT_SUCCESS);
        clear_env_vars();
    }

    #[test]
    fn test_validate_warns_on_slow_dpi_timeout() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env_vars();
        std::env::set_var("DPIV_HTTP_TIMEOUT_SECS", "2");
        std::env::set_var("DPIV_DPI_TIMEOUT_SECS", "60");
        let warnings = validate(&config::load());
        assert!(warnings.iter().any(|w| w.starts_with("DPIV_DPI_TIMEOUT_SECS")));
        clear_env_vars();
    }

    #[test]
    fn test_show_json_succeeds() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env_vars();
        assert_eq!(run_show(true), EXIT_SUCCESS);
        assert_eq!(run_show(false), EXIT_SUCCESS);
    }
}
