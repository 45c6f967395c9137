// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2026 Jonathan D.A. Jewell
#![no_main]

use gitmap::config::Config;
use gitmap::corpus::Corpus;
use gitmap::pipeline::Pipeline;
use libfuzzer_sys::fuzz_target;

// Any snapshot that decodes must run through the pipeline without panicking
fuzz_target!(|data: &[u8]| {
    let Ok(corpus) = serde_json::from_slice::<Corpus>(data) else {
        return;
    };
    if corpus.repos.len() > 32 || corpus.users.len() > 32 {
        return;
    }
    let _ = Pipeline::new(Config::default()).run(corpus);
});
