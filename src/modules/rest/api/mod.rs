// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use accounts::AccountApi;
use background::BackgroundApi;
use config::ConfigApi;
use health::HealthApi;
use poem_openapi::{OpenApiService, Tags};
use processing::ProcessingApi;

use crate::cat_emails_version;

pub mod accounts;
pub mod background;
pub mod config;
pub mod health;
pub mod processing;

#[derive(Tags)]
pub enum ApiTags {
    Health,
    Config,
    Account,
    Processing,
    Background,
}

type CatEmailsOpenApi = (
    HealthApi,
    ConfigApi,
    AccountApi,
    ProcessingApi,
    BackgroundApi,
);

pub fn create_openapi_service() -> OpenApiService<CatEmailsOpenApi, ()> {
    OpenApiService::new(
        (
            HealthApi,
            ConfigApi,
            AccountApi,
            ProcessingApi,
            BackgroundApi,
        ),
        "cat-emails",
        cat_emails_version!(),
    )
}
