// SPDX-License-Identifier: Apache-2.0
// SPDX-FileCopyrightText: 2026 Skyaudit Contributors

#![no_main]

use libfuzzer_sys::fuzz_target;
use skyaudit_core::ResponseCache;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data)
        && let Ok(cache) = ResponseCache::from_json_str(s)
    {
        // Loaded caches must serialize back to JSON that loads again.
        let json = serde_json::to_string(&cache).expect("cache serializes");
        ResponseCache::from_json_str(&json).expect("serialized cache reloads");
    }
});
