// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

//! Library surface for the `cat-emails` binary. Split out from `main.rs` so
//! the end-to-end scenarios in `tests/` can drive the processing engine
//! (Pipeline, Registry, Gate, Scheduler) the same way the binary does,
//! without spawning a separate process per test.

pub mod modules;
