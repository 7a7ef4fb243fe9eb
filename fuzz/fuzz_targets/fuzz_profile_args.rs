//! Fuzz target for profile decoding and argument rendering.

#![no_main]

use std::path::Path;

use arbitrary::Arbitrary;
use dpi_verify::engine::{render_arguments, LaunchLayout, LaunchOptions, Profile};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
struct Input {
    json: Vec<u8>,
    arguments: Vec<String>,
    game_filter: bool,
    filter_all_ip: bool,
}

fuzz_target!(|input: Input| {
    let _ = serde_json::from_slice::<Profile>(&input.json);

    let layout = LaunchLayout::under(Path::new("/opt/engine"));
    let options = LaunchOptions { game_filter: input.game_filter, filter_all_ip: input.filter_all_ip };
    let rendered = render_arguments(&input.arguments, &layout, options);
    assert!(rendered.iter().all(|arg| !arg.is_empty()));
});
