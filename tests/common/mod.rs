// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

//! Shared fixtures for the end-to-end scenarios in `tests/`. Every test
//! binary under `tests/` is its own process, so `init_env` runs once per
//! binary (via `OnceCell`) before anything touches the global `SETTINGS` /
//! `DB_MANAGER` singletons, and every test within one binary shares the same
//! embedded database — tests pick a fresh account address with
//! `unique_account` rather than isolating the database per test.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;

use cat_emails::modules::account::entity::Account;
use cat_emails::modules::collaborators::{
    Classifier, ConnectCredential, MailAction, MailSession, MailStore, MessageEnvelope, Policy,
    PolicySnapshot,
};
use cat_emails::modules::context::Initialize;
use cat_emails::modules::credential::{Credential, RefreshedToken, TokenCache, TokenRefresher};
use cat_emails::modules::database::manager::DatabaseManager;
use cat_emails::modules::error::PipelineResult;
use cat_emails::modules::gate::RateGate;
use cat_emails::modules::pipeline::Pipeline;
use cat_emails::modules::publisher::Publisher;
use cat_emails::modules::registry::StatusRegistry;
use cat_emails::modules::settings::dir::DataDirManager;
use cat_emails::utc_now;

static INIT: OnceCell<()> = OnceCell::const_new();
static ACCOUNT_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Points `SETTINGS.cat_emails_root_dir` at a fresh temp directory and brings
/// up the embedded audit database, once per test binary process.
pub async fn init_env() {
    INIT.get_or_init(|| async {
        let dir = tempfile::tempdir().expect("failed to create temp data dir");
        // Leaked deliberately: the directory must outlive every test in this
        // binary, and the process exits at the end of the run anyway.
        let path = dir.keep();
        unsafe {
            std::env::set_var("CAT_EMAILS_ROOT_DIR", &path);
        }
        DataDirManager::initialize()
            .await
            .expect("failed to initialize data dir");
        DatabaseManager::initialize()
            .await
            .expect("failed to initialize audit database");
    })
    .await;
}

/// A fresh, never-before-used account address for this test binary.
pub fn unique_account(prefix: &str) -> String {
    let n = ACCOUNT_COUNTER.fetch_add(1, Ordering::SeqCst);
    format!("{prefix}-{n}@example.com")
}

/// Registers `address` with an app-password credential and returns the
/// canonicalized address.
pub async fn create_account(address: &str) -> String {
    let account = Account::new(address, Credential::app_password("a-test-password").unwrap())
        .create()
        .await
        .expect("failed to create test account");
    account.address
}

pub fn envelope(msg_id: &str, from: &str, text: &str) -> MessageEnvelope {
    MessageEnvelope {
        msg_id: msg_id.to_string(),
        from: from.to_string(),
        subject: "test subject".to_string(),
        date: utc_now!(),
        classify_text: text.to_string(),
    }
}

/// Delivers a fixed set of envelopes on the first fetch of each session, then
/// an empty page on any further fetch within the same session.
pub struct FixedMailStore {
    envelopes: Vec<MessageEnvelope>,
}

impl FixedMailStore {
    pub fn new(envelopes: Vec<MessageEnvelope>) -> Self {
        Self { envelopes }
    }
}

#[async_trait]
impl MailStore for FixedMailStore {
    async fn connect(
        &self,
        _account: &str,
        _credential: ConnectCredential,
    ) -> PipelineResult<Box<dyn MailSession>> {
        Ok(Box::new(FixedMailSession {
            envelopes: self.envelopes.clone(),
            delivered: false,
        }))
    }
}

struct FixedMailSession {
    envelopes: Vec<MessageEnvelope>,
    delivered: bool,
}

#[async_trait]
impl MailSession for FixedMailSession {
    async fn fetch_since(&mut self, _since_ms: i64) -> PipelineResult<Vec<MessageEnvelope>> {
        if self.delivered {
            return Ok(Vec::new());
        }
        self.delivered = true;
        Ok(self.envelopes.clone())
    }

    async fn label(&mut self, _msg_id: &str, _category: &str) -> PipelineResult<()> {
        Ok(())
    }

    async fn apply_action(&mut self, _msg_id: &str, _action: MailAction) -> PipelineResult<()> {
        Ok(())
    }

    async fn close(self: Box<Self>) -> PipelineResult<()> {
        Ok(())
    }
}

/// Same as `FixedMailStore`, but `fetch_since` sleeps for `delay` before
/// returning — gives a concurrently issued manual trigger time to observe the
/// account as busy (scenario S2).
pub struct SlowMailStore {
    envelopes: Vec<MessageEnvelope>,
    delay: Duration,
}

impl SlowMailStore {
    pub fn new(envelopes: Vec<MessageEnvelope>, delay: Duration) -> Self {
        Self { envelopes, delay }
    }
}

#[async_trait]
impl MailStore for SlowMailStore {
    async fn connect(
        &self,
        _account: &str,
        _credential: ConnectCredential,
    ) -> PipelineResult<Box<dyn MailSession>> {
        Ok(Box::new(SlowMailSession {
            envelopes: self.envelopes.clone(),
            delivered: false,
            delay: self.delay,
        }))
    }
}

struct SlowMailSession {
    envelopes: Vec<MessageEnvelope>,
    delivered: bool,
    delay: Duration,
}

#[async_trait]
impl MailSession for SlowMailSession {
    async fn fetch_since(&mut self, _since_ms: i64) -> PipelineResult<Vec<MessageEnvelope>> {
        tokio::time::sleep(self.delay).await;
        if self.delivered {
            return Ok(Vec::new());
        }
        self.delivered = true;
        Ok(self.envelopes.clone())
    }

    async fn label(&mut self, _msg_id: &str, _category: &str) -> PipelineResult<()> {
        Ok(())
    }

    async fn apply_action(&mut self, _msg_id: &str, _action: MailAction) -> PipelineResult<()> {
        Ok(())
    }

    async fn close(self: Box<Self>) -> PipelineResult<()> {
        Ok(())
    }
}

/// Classifies every message into one fixed category.
pub struct FixedClassifier {
    pub category: String,
}

#[async_trait]
impl Classifier for FixedClassifier {
    async fn classify(&self, _text: &str) -> PipelineResult<String> {
        Ok(self.category.clone())
    }
}

/// Always fails, exercising the classifier-outage fallback-to-`Other` path
/// (scenario S4).
pub struct FailingClassifier;

#[async_trait]
impl Classifier for FailingClassifier {
    async fn classify(&self, _text: &str) -> PipelineResult<String> {
        Err(cat_emails::modules::error::PipelineError::Classifier {
            message: "classifier unreachable".to_string(),
            location: snafu::Location::default(),
        })
    }
}

/// Classifies the first message normally, then cancels the shared token
/// before any further classifier call (scenario S5).
pub struct CancelAfterFirstClassifier {
    pub category: String,
    pub cancel: CancellationToken,
    calls: std::sync::atomic::AtomicU32,
}

impl CancelAfterFirstClassifier {
    pub fn new(category: &str, cancel: CancellationToken) -> Self {
        Self {
            category: category.to_string(),
            cancel,
            calls: std::sync::atomic::AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl Classifier for CancelAfterFirstClassifier {
    async fn classify(&self, _text: &str) -> PipelineResult<String> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call == 0 {
            self.cancel.cancel();
        }
        Ok(self.category.clone())
    }
}

/// No allow-list, block-list, or blocked categories — every message is kept.
pub struct OpenPolicy;

#[async_trait]
impl Policy for OpenPolicy {
    async fn snapshot(&self) -> PipelineResult<PolicySnapshot> {
        Ok(PolicySnapshot::default())
    }
}

/// Never exercised: every test account authenticates with an app password.
pub struct NoopRefresher;

#[async_trait]
impl TokenRefresher for NoopRefresher {
    async fn refresh(&self, _refresh_token: &str) -> PipelineResult<RefreshedToken> {
        unreachable!("no test account uses OAuth credentials")
    }
}

/// Wires a standalone `Pipeline` with its own Registry/Publisher/Gate/token
/// cache so one test's live-status and single-flight state never leaks into
/// another's — only the account/aggregate/dedup tables in the shared embedded
/// database are common across tests in the same binary.
pub fn build_pipeline(
    mail_store: Arc<dyn MailStore>,
    classifier: Arc<dyn Classifier>,
    min_interval_secs: u64,
) -> Arc<Pipeline> {
    Arc::new(Pipeline::new(
        mail_store,
        classifier,
        Arc::new(OpenPolicy),
        Arc::new(NoopRefresher),
        Arc::new(TokenCache::new()),
        Arc::new(StatusRegistry::new(50)),
        Arc::new(Publisher::new()),
        Arc::new(RateGate::new(min_interval_secs)),
        2,
        Duration::from_secs(30),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_account_never_repeats() {
        let a = unique_account("p");
        let b = unique_account("p");
        assert_ne!(a, b);
    }
}
