// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

//! Config & logging (spec §7 AMBIENT): the `clap`-derived settings and the
//! data-directory resolver it feeds.

pub mod cli;
pub mod dir;
