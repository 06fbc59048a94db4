// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

//! The Audit Store (spec §4.A): durable, append-mostly records of what the
//! pipeline did. Backed by the same embedded database as accounts, but kept
//! in its own module since nothing outside the pipeline and the REST surface
//! writes to it.

pub mod aggregate;
pub mod dedup;
pub mod run;
