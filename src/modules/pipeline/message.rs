// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

//! Pure helpers for the per-message loop (spec §4.E step 5): domain
//! extraction, classify-text truncation, and the category/action decision.
//! Kept free of I/O so they're trivial to unit test.

use crate::modules::collaborators::{MailAction, PolicySnapshot};

/// Category assigned to a message whose sender's domain is on the block list,
/// bypassing the classifier entirely.
pub const CATEGORY_BLOCKED_DOMAIN: &str = "Blocked-Domain";
/// Category assigned to a message whose sender's domain is on the allow list.
pub const CATEGORY_ALLOWED_DOMAIN: &str = "Allowed-Domain";
/// Fallback category when the classifier fails on every retry.
pub const CATEGORY_FALLBACK: &str = "Other";

/// Example categories a policy commonly blocks (spec §4.E step 5b) — listed
/// here only as documentation of intent; the actual blocking decision always
/// comes from the policy snapshot's `blocked_categories` map, never a
/// hardcoded name.
pub const EXAMPLE_BLOCKED_CATEGORIES: &[&str] = &["Wants-Money", "Advertising", "Marketing"];

/// Truncation budget (characters) for text handed to the classifier.
pub const CLASSIFY_TEXT_BUDGET: usize = 4000;

pub fn extract_domain(address: &str) -> String {
    address
        .rsplit_once('@')
        .map(|(_, domain)| domain.to_ascii_lowercase())
        .unwrap_or_default()
}

/// Subject + HTML-stripped body, truncated to `CLASSIFY_TEXT_BUDGET`
/// characters on a char boundary.
pub fn build_classify_text(subject: &str, stripped_body: &str) -> String {
    let mut combined = format!("{subject}\n\n{stripped_body}");
    if combined.chars().count() > CLASSIFY_TEXT_BUDGET {
        combined = combined.chars().take(CLASSIFY_TEXT_BUDGET).collect();
    }
    combined
}

/// Strips the crudest HTML markup from a body so the classifier sees mostly
/// text. Not a full parser — just enough to avoid feeding raw tags into the
/// truncated budget.
pub fn strip_html(body: &str) -> String {
    let mut out = String::with_capacity(body.len());
    let mut in_tag = false;
    for ch in body.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(ch),
            _ => {}
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Resolves category -> action purely from the policy snapshot. `category`
/// has already absorbed the domain-shortcut and heuristic considerations by
/// the time it reaches this function.
pub fn decide_action(category: &str, policy: &PolicySnapshot) -> MailAction {
    policy
        .action_for_category(category)
        .map(MailAction::from)
        .unwrap_or(MailAction::Keep)
}

pub fn category_for_domain(domain: &str, policy: &PolicySnapshot) -> Option<&'static str> {
    if policy.blocked_domains.iter().any(|d| d == domain) {
        Some(CATEGORY_BLOCKED_DOMAIN)
    } else if policy.allowed_domains.iter().any(|d| d == domain) {
        Some(CATEGORY_ALLOWED_DOMAIN)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::collaborators::BlockedAction;

    #[test]
    fn extracts_lowercased_domain() {
        assert_eq!(extract_domain("User@Example.COM"), "example.com");
        assert_eq!(extract_domain("no-at-sign"), "");
    }

    #[test]
    fn truncates_to_budget() {
        let long_body = "x".repeat(CLASSIFY_TEXT_BUDGET * 2);
        let text = build_classify_text("subject", &long_body);
        assert!(text.chars().count() <= CLASSIFY_TEXT_BUDGET);
    }

    #[test]
    fn strips_tags_but_keeps_text() {
        let stripped = strip_html("<p>Hello <b>world</b></p>");
        assert_eq!(stripped, "Hello world");
    }

    #[test]
    fn decides_delete_for_blocked_category() {
        let policy = PolicySnapshot {
            blocked_categories: vec![("Marketing".to_string(), BlockedAction::Delete)],
            ..Default::default()
        };
        assert_eq!(decide_action("Marketing", &policy), MailAction::Delete);
        assert_eq!(decide_action("Personal", &policy), MailAction::Keep);
    }

    #[test]
    fn domain_shortcut_prefers_block_list() {
        let policy = PolicySnapshot {
            blocked_domains: vec!["ads.com".to_string()],
            allowed_domains: vec!["friend.com".to_string()],
            ..Default::default()
        };
        assert_eq!(
            category_for_domain("ads.com", &policy),
            Some(CATEGORY_BLOCKED_DOMAIN)
        );
        assert_eq!(
            category_for_domain("friend.com", &policy),
            Some(CATEGORY_ALLOWED_DOMAIN)
        );
        assert_eq!(category_for_domain("unknown.com", &policy), None);
    }
}
