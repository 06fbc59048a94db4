// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use native_db::*;
use native_model::{native_model, Model};
use poem_openapi::Object;
use serde::{Deserialize, Serialize};

use crate::modules::credential::{AuthMethod, Credential};
use crate::modules::database::{delete_impl, find_impl, insert_impl, list_all_impl, update_impl};
use crate::modules::database::manager::DB_MANAGER;
use crate::modules::error::{code::ErrorCode, PipelineResult};
use crate::modules::utils::canonical_address;
use crate::{raise_error, utc_now};

/// A mailbox identity with credentials and runtime policy (data model §3).
/// The address is canonicalized (lowercase, trimmed) and doubles as the
/// primary key — there is exactly one account record per mailbox.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[native_model(id = 1, version = 1)]
#[native_db]
pub struct Account {
    #[primary_key]
    pub address: String,
    pub active: bool,
    pub credential: Credential,
    pub last_scan_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Account {
    pub fn new(address: &str, credential: Credential) -> Self {
        let now = utc_now!();
        Self {
            address: canonical_address(address),
            active: true,
            credential,
            last_scan_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub async fn create(self) -> PipelineResult<Account> {
        if Self::find(&self.address).await?.is_some() {
            return Err(raise_error!(
                format!("account '{}' already exists", self.address),
                ErrorCode::AlreadyExists
            ));
        }
        insert_impl(DB_MANAGER.audit_db(), self.clone()).await?;
        Ok(self)
    }

    pub async fn find(address: &str) -> PipelineResult<Option<Account>> {
        find_impl(DB_MANAGER.audit_db(), &canonical_address(address))
    }

    pub async fn get(address: &str) -> PipelineResult<Account> {
        Self::find(address).await?.ok_or_else(|| {
            raise_error!(
                format!("account '{}' not found", canonical_address(address)),
                ErrorCode::ResourceNotFound
            )
        })
    }

    pub async fn list_all() -> PipelineResult<Vec<Account>> {
        list_all_impl(DB_MANAGER.audit_db()).await
    }

    pub async fn list_active() -> PipelineResult<Vec<Account>> {
        Ok(Self::list_all()
            .await?
            .into_iter()
            .filter(|a| a.active)
            .collect())
    }

    pub async fn deactivate(address: &str) -> PipelineResult<()> {
        let address = canonical_address(address);
        update_impl(
            DB_MANAGER.audit_db(),
            {
                let address = address.clone();
                move |rw| {
                    rw.get()
                        .primary::<Account>(address.clone())
                        .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))?
                        .ok_or_else(|| {
                            raise_error!(
                                format!("account '{}' not found", address),
                                ErrorCode::ResourceNotFound
                            )
                        })
                }
            },
            |current| {
                let mut updated = current.clone();
                updated.active = false;
                updated.updated_at = utc_now!();
                Ok(updated)
            },
        )
        .await?;
        Ok(())
    }

    pub async fn record_scan(address: &str, at: i64) -> PipelineResult<()> {
        let address = canonical_address(address);
        update_impl(
            DB_MANAGER.audit_db(),
            {
                let address = address.clone();
                move |rw| {
                    rw.get()
                        .primary::<Account>(address.clone())
                        .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))?
                        .ok_or_else(|| {
                            raise_error!(
                                format!("account '{}' not found", address),
                                ErrorCode::ResourceNotFound
                            )
                        })
                }
            },
            move |current| {
                let mut updated = current.clone();
                updated.last_scan_at = Some(at);
                updated.updated_at = utc_now!();
                Ok(updated)
            },
        )
        .await?;
        Ok(())
    }

    /// Delete cascades dependent records: dedup ledger, aggregates, and the
    /// account's own audit history (§3 Account lifecycle "deleted cascades
    /// dependent records" — an explicit Open-Question resolution recorded in
    /// DESIGN.md, since the spec doesn't say whether history survives).
    pub async fn delete(address: &str) -> PipelineResult<()> {
        let address = canonical_address(address);
        delete_impl(DB_MANAGER.audit_db(), {
            let address = address.clone();
            move |rw| {
                rw.get()
                    .primary::<Account>(address.clone())
                    .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))?
                    .ok_or_else(|| {
                        raise_error!(
                            format!("account '{}' not found", address),
                            ErrorCode::ResourceNotFound
                        )
                    })
            }
        })
        .await?;

        crate::modules::audit::run::ProcessingRun::delete_for_account(&address).await?;
        crate::modules::audit::aggregate::Aggregate::delete_for_account(&address).await?;
        crate::modules::audit::dedup::DedupLedgerEntry::delete_for_account(&address).await?;
        Ok(())
    }
}

/// `GET /api/accounts` row shape: never exposes the credential secret, only
/// which variant is in use.
#[derive(Clone, Debug, Serialize, Deserialize, Object)]
pub struct AccountSummary {
    pub address: String,
    pub active: bool,
    pub auth_method: AuthMethod,
    pub last_scan_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl From<&Account> for AccountSummary {
    fn from(account: &Account) -> Self {
        Self {
            address: account.address.clone(),
            active: account.active,
            auth_method: account.credential.auth_method(),
            last_scan_at: account.last_scan_at,
            created_at: account.created_at,
            updated_at: account.updated_at,
        }
    }
}

/// `POST /api/accounts` request body. Exactly one of `app_password` /
/// `oauth_refresh_token` must be set (data model invariant: exactly one
/// credential variant populated).
#[derive(Clone, Debug, Default, Serialize, Deserialize, Object)]
pub struct AccountCreateRequest {
    #[oai(validator(custom = "crate::modules::common::validator::EmailValidator"))]
    pub address: String,
    pub app_password: Option<String>,
    pub oauth_refresh_token: Option<String>,
}

impl AccountCreateRequest {
    pub fn into_account(self) -> PipelineResult<Account> {
        let credential = match (self.app_password, self.oauth_refresh_token) {
            (Some(password), None) => Credential::app_password(&password)?,
            (None, Some(refresh_token)) => Credential::oauth(&refresh_token)?,
            (None, None) => {
                return Err(raise_error!(
                    "one of app_password or oauth_refresh_token is required".into(),
                    ErrorCode::InvalidParameter
                ))
            }
            (Some(_), Some(_)) => {
                return Err(raise_error!(
                    "exactly one of app_password or oauth_refresh_token may be set".into(),
                    ErrorCode::InvalidParameter
                ))
            }
        };
        Ok(Account::new(&self.address, credential))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonicalizes_address_on_construction() {
        let account = Account::new("  User@Example.com ", Credential::app_password("x").unwrap());
        assert_eq!(account.address, "user@example.com");
    }

    #[test]
    fn summary_never_carries_the_secret() {
        let account = Account::new("u@example.com", Credential::app_password("super-secret").unwrap());
        let summary = AccountSummary::from(&account);
        assert_eq!(summary.auth_method, AuthMethod::AppPassword);
    }
}
