// Copyright 2024-2026 dpi-verify Contributors
// SPDX-License-Identifier: Apache-2.0

//! CLI module for dpi-verify commands.
//!
//! ## Usage
//!
//! ```bash
//! dpi-verify-cli run standard --domain discord.com --save
//! dpi-verify-cli run dpi --profile "ALT"
//! dpi-verify-cli profiles
//! dpi-verify-cli lists add list-general.txt example.org
//! dpi-verify-cli config validate
//! ```

pub mod config_cmd;
pub mod lists_cmd;
pub mod profiles_cmd;
pub mod run_cmd;

pub use lists_cmd::run_lists;
pub use profiles_cmd::{run_profiles, run_targets};
pub use run_cmd::{parse_run_args, run_tests, RunArgs};

/// Command completed.
pub const EXIT_SUCCESS: i32 = 0;
/// The run or command failed.
pub const EXIT_FAILURE: i32 = 1;
/// Bad arguments or configuration.
pub const EXIT_USAGE: i32 = 2;

/// Value following `args[i]`, if any.
fn flag_value<'a>(args: &'a [String], i: usize, flag: &str) -> Result<&'a str, String> {
    args.get(i + 1)
        .map(|s| s.as_str())
        .ok_or_else(|| format!("Missing value for {flag}"))
}
