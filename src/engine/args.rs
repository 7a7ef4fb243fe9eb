//! Launch argument rendering.
//!
//! Profile arguments are stored with placeholders so the same catalog works
//! regardless of where the engine is installed.

use std::path::{Path, PathBuf};

/// Placeholder replaced by the engine's binary-resource directory.
pub const BIN_PLACEHOLDER: &str = "%BIN%";
/// Placeholder replaced by the host-list directory.
pub const LISTS_PLACEHOLDER: &str = "%LISTS%";
/// Placeholder replaced by the game-traffic port range.
pub const GAME_FILTER_PLACEHOLDER: &str = "%GameFilter%";
/// Placeholder replaced by the IP-set list path.
pub const IPSET_PLACEHOLDER: &str = "%IPSET%";

/// Port range used when game filtering is enabled.
pub const GAME_FILTER_ON: &str = "1024-65535";
/// Port value used when game filtering is disabled.
pub const GAME_FILTER_OFF: &str = "12";

/// Arguments used when a profile carries none.
pub const DEFAULT_ARGUMENTS: &[&str] = &[
    "--wf-tcp=80,443",
    "--wf-udp=443",
    "--hostlist=%LISTS%list-general.txt",
    "--hostlist-exclude=%LISTS%list-exclude.txt",
    "--ipset-exclude=%LISTS%ipset-exclude.txt",
    "--dpi-desync=multisplit",
    "--dpi-desync-split-pos=2,sniext+1",
    "--dpi-desync-split-seqovl=679",
    "--dpi-desync-split-seqovl-pattern=%BIN%tls_clienthello_www_google_com.bin",
];

/// Where the engine's resource files live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchLayout {
    pub bin_dir: PathBuf,
    pub lists_dir: PathBuf,
}

impl LaunchLayout {
    pub fn under(base: &Path) -> Self {
        Self {
            bin_dir: base.join("bin"),
            lists_dir: base.join("lists"),
        }
    }
}

/// Toggles that change placeholder expansion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LaunchOptions {
    pub game_filter: bool,
    pub filter_all_ip: bool,
}

/// Render a profile's argument list into argv entries.
///
/// Each entry becomes exactly one argument. A single pair of wrapping quotes
/// is stripped from the whole entry or from its `=value` part, since the
/// process API does its own quoting.
pub fn render_arguments(
    arguments: &[String],
    layout: &LaunchLayout,
    options: LaunchOptions,
) -> Vec<String> {
    let bin = dir_with_separator(&layout.bin_dir);
    let lists = dir_with_separator(&layout.lists_dir);
    let game = if options.game_filter { GAME_FILTER_ON } else { GAME_FILTER_OFF };
    let ipset_file = if options.filter_all_ip { "ipset-all.txt" } else { "ipset-none.txt" };
    let ipset = layout.lists_dir.join(ipset_file).display().to_string();

    let source: Vec<&str> = if arguments.is_empty() {
        DEFAULT_ARGUMENTS.to_vec()
    } else {
        arguments.iter().map(String::as_str).collect()
    };

    source
        .into_iter()
        .map(|arg| {
            let expanded = arg
                .replace(BIN_PLACEHOLDER, &bin)
                .replace(LISTS_PLACEHOLDER, &lists)
                .replace(GAME_FILTER_PLACEHOLDER, game)
                .replace(IPSET_PLACEHOLDER, &ipset);
            unquote(&expanded)
        })
        .filter(|arg| !arg.is_empty())
        .collect()
}

fn dir_with_separator(dir: &Path) -> String {
    let mut s = dir.display().to_string();
    if !s.ends_with(std::path::MAIN_SEPARATOR) && !s.ends_with('/') {
        s.push(std::path::MAIN_SEPARATOR);
    }
    s
}

fn unquote(arg: &str) -> String {
    let arg = strip_wrapping_quotes(arg);
    match arg.split_once('=') {
        Some((key, value)) => format!("{key}={}", strip_wrapping_quotes(value)),
        None => arg.to_string(),
    }
}

fn strip_wrapping_quotes(arg: &str) -> &str {
    let trimmed = arg.trim();
    if trimmed.len() >= 2 && trimmed.starts_with('"') && trimmed.ends_with('"') {
        &trimmed[1..trimmed.len() - 1]
    } else {
        trimmed
    }
}
