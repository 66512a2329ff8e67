// SPDX-License-Identifier: AGPL-3.0-or-later
#![no_main]

use emlc_core::{FormatRegistry, ParseConfig, Parser, RenderConfig, Renderer, SourceFormat};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(input) = std::str::from_utf8(data) else {
        return;
    };
    let registry = FormatRegistry::with_defaults();
    let parse_config = ParseConfig {
        max_depth: 64,
        ..ParseConfig::default()
    };

    for from in [SourceFormat::Eml, SourceFormat::Html] {
        let Some(parser) = registry.get(from) else {
            continue;
        };
        let outcome = parser.parse_with_anomalies(input, &parse_config);
        for to in [SourceFormat::Eml, SourceFormat::Html, SourceFormat::Xml] {
            if let Some(renderer) = registry.get(to) {
                let _ = renderer.render(&outcome.document, &RenderConfig::default());
            }
        }
    }
});
