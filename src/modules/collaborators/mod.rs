// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

//! The external collaborators the pipeline consumes through narrow traits
//! (spec §1, §6.4): the mail provider, the classifier, and the policy
//! lookup service. No concrete network implementation lives in this crate.

pub mod unconfigured;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::modules::error::PipelineResult;

/// Minimal envelope pulled during Fetch (§4.E step 2) — message *bodies* are
/// deliberately not retained beyond classification (spec §1 Non-goals).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MessageEnvelope {
    pub msg_id: String,
    pub from: String,
    pub subject: String,
    pub date: i64,
    /// Subject + HTML-stripped body, already truncated to the classifier's
    /// text budget. Held only for the duration of one pipeline run.
    pub classify_text: String,
}

/// What the pipeline asks the mail provider to do with a message once a
/// category and action have been decided.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum MailAction {
    Keep,
    Delete,
    Archive,
}

/// Credentials resolved for one connect attempt, handed to `MailStore::connect`.
pub struct ConnectCredential {
    pub app_password: Option<String>,
    pub access_token: Option<String>,
}

/// One authenticated session against a single mailbox, scoped to the
/// lifetime of a pipeline invocation and closed on exit (§5 "Shared resources").
#[async_trait]
pub trait MailSession: Send + Sync {
    /// Pulls messages whose internal date is `>= since_ms` (epoch millis).
    async fn fetch_since(&mut self, since_ms: i64) -> PipelineResult<Vec<MessageEnvelope>>;

    /// Applies a Gmail label equal to `category`, creating it lazily if needed.
    async fn label(&mut self, msg_id: &str, category: &str) -> PipelineResult<()>;

    /// Applies the decided action (delete/archive are mutually exclusive with keep).
    async fn apply_action(&mut self, msg_id: &str, action: MailAction) -> PipelineResult<()>;

    async fn close(self: Box<Self>) -> PipelineResult<()>;
}

/// The mail provider collaborator (IMAP or Gmail API, OAuth or app-password).
#[async_trait]
pub trait MailStore: Send + Sync {
    async fn connect(
        &self,
        account: &str,
        credential: ConnectCredential,
    ) -> PipelineResult<Box<dyn MailSession>>;
}

/// The LLM invocation collaborator. Synchronous from the pipeline's point of
/// view; MAY be slow (spec §6.4) — the pipeline wraps calls in its own
/// retry/backoff and timeout.
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, text: &str) -> PipelineResult<String>;
}

/// How a blocked category is enforced. Resolves the spec's open question
/// (§9) of archive-vs-delete as per-category configuration rather than a
/// single global switch.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum BlockedAction {
    Delete,
    Archive,
}

impl From<BlockedAction> for MailAction {
    fn from(value: BlockedAction) -> Self {
        match value {
            BlockedAction::Delete => MailAction::Delete,
            BlockedAction::Archive => MailAction::Archive,
        }
    }
}

/// A cacheable snapshot of the allow-list, block-list, and blocked-category
/// configuration (§3 "Policy snapshot").
#[derive(Clone, Debug, Default)]
pub struct PolicySnapshot {
    pub allowed_domains: Vec<String>,
    pub blocked_domains: Vec<String>,
    pub blocked_categories: Vec<(String, BlockedAction)>,
}

impl PolicySnapshot {
    pub fn action_for_category(&self, category: &str) -> Option<BlockedAction> {
        self.blocked_categories
            .iter()
            .find(|(c, _)| c == category)
            .map(|(_, a)| *a)
    }
}

/// The policy lookup service collaborator (allow/block domains, blocked categories).
#[async_trait]
pub trait Policy: Send + Sync {
    async fn snapshot(&self) -> PipelineResult<PolicySnapshot>;
}
