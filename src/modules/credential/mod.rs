// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

//! Credential polymorphism for a mailbox account: an app password or an OAuth
//! refresh token. The pipeline dispatches on the variant at Connect (§4.E).

use std::collections::HashMap;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use poem_openapi::Enum;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::modules::error::{code::ErrorCode, PipelineResult};
use crate::{decrypt, encrypt, raise_error, utc_now};

/// Process-wide token cache, shared by the pipeline's scheduled runs and
/// manually triggered runs alike so a refresh for one never races the other.
pub static TOKEN_CACHE: LazyLock<Arc<TokenCache>> = LazyLock::new(|| Arc::new(TokenCache::new()));

/// How an account authenticates against the mail provider. Stored alongside
/// the account so that `GET /api/accounts` can surface it without exposing
/// the underlying secret.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize, Enum)]
pub enum AuthMethod {
    AppPassword,
    OAuth,
}

/// Exactly one variant is populated per the data model's invariant.
/// Secrets are stored encrypted at rest (see `utils::encrypt`) and only
/// decrypted transiently when handed to the `MailStore`/`TokenRefresher`
/// collaborators.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum Credential {
    AppPassword { password_encrypted: String },
    OAuth { refresh_token_encrypted: String },
}

impl Credential {
    pub fn app_password(plaintext: &str) -> PipelineResult<Self> {
        Ok(Self::AppPassword {
            password_encrypted: encrypt!(plaintext)?,
        })
    }

    pub fn oauth(refresh_token_plaintext: &str) -> PipelineResult<Self> {
        Ok(Self::OAuth {
            refresh_token_encrypted: encrypt!(refresh_token_plaintext)?,
        })
    }

    pub fn auth_method(&self) -> AuthMethod {
        match self {
            Credential::AppPassword { .. } => AuthMethod::AppPassword,
            Credential::OAuth { .. } => AuthMethod::OAuth,
        }
    }

    pub fn decrypt_app_password(&self) -> PipelineResult<String> {
        match self {
            Credential::AppPassword { password_encrypted } => decrypt!(password_encrypted),
            Credential::OAuth { .. } => Err(raise_error!(
                "account does not use app-password credentials".into(),
                ErrorCode::InvalidParameter
            )),
        }
    }

    pub fn decrypt_refresh_token(&self) -> PipelineResult<String> {
        match self {
            Credential::OAuth {
                refresh_token_encrypted,
            } => decrypt!(refresh_token_encrypted),
            Credential::AppPassword { .. } => Err(raise_error!(
                "account does not use OAuth credentials".into(),
                ErrorCode::InvalidParameter
            )),
        }
    }
}

/// The external collaborator that exchanges a refresh token for a fresh
/// access token (an HTTP call to the provider's token endpoint). Out of
/// scope per spec §1 — only the narrow interface lives in this crate.
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    async fn refresh(&self, refresh_token: &str) -> PipelineResult<RefreshedToken>;
}

pub struct RefreshedToken {
    pub access_token: String,
    pub expires_in_secs: i64,
}

#[derive(Clone, Debug)]
struct CachedAccessToken {
    token: String,
    expires_at: i64,
}

/// Process-wide per-account access token cache with single-flight refresh:
/// concurrent callers for the same account block on the same refresh call
/// rather than issuing N redundant HTTP round-trips (§5 "Shared resources").
pub struct TokenCache {
    locks: DashMap<String, Arc<Mutex<Option<CachedAccessToken>>>>,
}

impl Default for TokenCache {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenCache {
    pub fn new() -> Self {
        Self {
            locks: DashMap::new(),
        }
    }

    /// Returns a usable access token for `account`, refreshing through
    /// `refresher` when the cached token is absent or within `skew` of
    /// expiry.
    pub async fn get_or_refresh(
        &self,
        account: &str,
        credential: &Credential,
        refresher: &dyn TokenRefresher,
        skew: Duration,
    ) -> PipelineResult<String> {
        let slot = self
            .locks
            .entry(account.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(None)))
            .clone();
        let mut guard = slot.lock().await;

        let now = utc_now!();
        if let Some(cached) = guard.as_ref() {
            if cached.expires_at > now + skew.as_millis() as i64 {
                return Ok(cached.token.clone());
            }
        }

        let refresh_token = credential.decrypt_refresh_token()?;
        let refreshed = refresher.refresh(&refresh_token).await?;
        let expires_at = now + refreshed.expires_in_secs.saturating_mul(1000);
        let token = refreshed.access_token.clone();
        *guard = Some(CachedAccessToken { token, expires_at });
        Ok(refreshed.access_token)
    }

    /// Drops any cached token for an account, e.g. after the account is deleted.
    pub fn evict(&self, account: &str) {
        self.locks.remove(account);
    }
}

/// A resolved set of credentials ready to hand to a `MailStore::connect` call.
pub struct ResolvedCredential {
    pub app_password: Option<String>,
    pub access_token: Option<String>,
}

pub async fn resolve(
    account: &str,
    credential: &Credential,
    token_cache: &TokenCache,
    refresher: &dyn TokenRefresher,
    skew: Duration,
) -> PipelineResult<ResolvedCredential> {
    match credential {
        Credential::AppPassword { .. } => Ok(ResolvedCredential {
            app_password: Some(credential.decrypt_app_password()?),
            access_token: None,
        }),
        Credential::OAuth { .. } => {
            let token = token_cache
                .get_or_refresh(account, credential, refresher, skew)
                .await?;
            Ok(ResolvedCredential {
                app_password: None,
                access_token: Some(token),
            })
        }
    }
}

#[cfg(test)]
struct StaticRefresher {
    responses: HashMap<String, RefreshedToken>,
}

#[cfg(test)]
#[async_trait]
impl TokenRefresher for StaticRefresher {
    async fn refresh(&self, refresh_token: &str) -> PipelineResult<RefreshedToken> {
        self.responses
            .get(refresh_token)
            .map(|r| RefreshedToken {
                access_token: r.access_token.clone(),
                expires_in_secs: r.expires_in_secs,
            })
            .ok_or_else(|| {
                raise_error!(
                    "no canned refresh response for token".into(),
                    ErrorCode::AuthInvalid
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn caches_token_until_skew_window() {
        let cache = TokenCache::new();
        let credential = Credential::oauth("refresh-1").unwrap();
        let refresher = StaticRefresher {
            responses: HashMap::from([(
                "refresh-1".to_string(),
                RefreshedToken {
                    access_token: "token-1".to_string(),
                    expires_in_secs: 3600,
                },
            )]),
        };

        let first = cache
            .get_or_refresh("u@example.com", &credential, &refresher, Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(first, "token-1");

        // Second call within the TTL must not need a new canned response.
        let refresher_empty = StaticRefresher {
            responses: HashMap::new(),
        };
        let second = cache
            .get_or_refresh(
                "u@example.com",
                &credential,
                &refresher_empty,
                Duration::from_secs(60),
            )
            .await
            .unwrap();
        assert_eq!(second, "token-1");
    }
}
