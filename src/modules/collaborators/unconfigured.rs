// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

//! Default collaborator implementations wired into the composition root when
//! no concrete `MailStore`/`Classifier`/`Policy`/`TokenRefresher` has been
//! substituted (spec §6.4: "no concrete network implementation of these
//! four traits ships in this crate"). Every call fails fast with a
//! `MissingConfiguration` error rather than panicking, so a deployment that
//! forgets to wire in real collaborators gets a clear 400 on first use
//! instead of a crash deep in the pipeline.

use async_trait::async_trait;

use crate::modules::error::{code::ErrorCode, PipelineResult};
use crate::raise_error;

use super::{Classifier, ConnectCredential, MailSession, MailStore, Policy, PolicySnapshot};
use crate::modules::credential::{RefreshedToken, TokenRefresher};

fn unconfigured(what: &str) -> crate::modules::error::PipelineError {
    raise_error!(
        format!("no {what} collaborator is configured for this deployment"),
        ErrorCode::MissingConfiguration
    )
}

/// Placeholder `MailStore`. Every deployment is expected to substitute its
/// own IMAP/Gmail-API implementation at the composition root in `main.rs`.
pub struct UnconfiguredMailStore;

#[async_trait]
impl MailStore for UnconfiguredMailStore {
    async fn connect(
        &self,
        _account: &str,
        _credential: ConnectCredential,
    ) -> PipelineResult<Box<dyn MailSession>> {
        Err(unconfigured("mail provider"))
    }
}

/// Placeholder `Classifier`. The pipeline already treats classifier failure
/// as non-fatal (falls back to `Other` after retries), so leaving this
/// unconfigured still lets the rest of a run complete.
pub struct UnconfiguredClassifier;

#[async_trait]
impl Classifier for UnconfiguredClassifier {
    async fn classify(&self, _text: &str) -> PipelineResult<String> {
        Err(unconfigured("classifier"))
    }
}

/// Placeholder `Policy`. Returns the error rather than an empty snapshot so
/// a misconfigured deployment fails loudly instead of silently allowing
/// every message through unfiltered.
pub struct UnconfiguredPolicy;

#[async_trait]
impl Policy for UnconfiguredPolicy {
    async fn snapshot(&self) -> PipelineResult<PolicySnapshot> {
        Err(unconfigured("policy"))
    }
}

/// Placeholder `TokenRefresher`. Only reached for accounts whose credential
/// is OAuth, so an app-password-only deployment never touches this.
pub struct UnconfiguredTokenRefresher;

#[async_trait]
impl TokenRefresher for UnconfiguredTokenRefresher {
    async fn refresh(&self, _refresh_token: &str) -> PipelineResult<RefreshedToken> {
        Err(unconfigured("OAuth token refresher"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn every_placeholder_reports_missing_configuration() {
        let err = UnconfiguredClassifier.classify("hello").await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::MissingConfiguration);

        let err = UnconfiguredPolicy.snapshot().await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::MissingConfiguration);

        let err = UnconfiguredTokenRefresher
            .refresh("refresh-token")
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::MissingConfiguration);

        let err = UnconfiguredMailStore
            .connect(
                "u@example.com",
                ConnectCredential {
                    app_password: None,
                    access_token: None,
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::MissingConfiguration);
    }
}
