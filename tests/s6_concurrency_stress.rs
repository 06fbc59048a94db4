// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

//! Scenario S6: concurrency stress on the Gate's single-flight invariant.
//! Many concurrent manual triggers for the *same* account admit exactly one
//! run; concurrent runs for *distinct* accounts never contend with each
//! other.

mod common;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use cat_emails::modules::error::PipelineError;
use cat_emails::modules::gate::Source;

const CONCURRENT_TRIGGERS: usize = 10;
const DISTINCT_ACCOUNTS: usize = 5;

#[tokio::test]
async fn only_one_concurrent_manual_trigger_is_admitted_per_account() {
    common::init_env().await;
    let address = common::unique_account("s6-single");
    let account = common::create_account(&address).await;

    let mail_store = Arc::new(common::FixedMailStore::new(vec![common::envelope(
        "m1",
        "a@example.org",
        "hello",
    )]));
    let classifier = Arc::new(common::FixedClassifier {
        category: "Other".to_string(),
    });
    let pipeline = common::build_pipeline(mail_store, classifier, 300);

    let mut handles = Vec::new();
    for _ in 0..CONCURRENT_TRIGGERS {
        let pipeline = pipeline.clone();
        let account = account.clone();
        handles.push(tokio::spawn(
            async move { pipeline.trigger(&account, None).await },
        ));
    }

    let mut admitted = 0;
    for handle in handles {
        match handle.await.expect("trigger task panicked") {
            Ok(()) => admitted += 1,
            Err(PipelineError::Busy { .. }) | Err(PipelineError::TooSoon { .. }) => {}
            Err(other) => panic!("unexpected error from a concurrent trigger: {other:?}"),
        }
    }
    assert_eq!(
        admitted, 1,
        "exactly one of {CONCURRENT_TRIGGERS} concurrent triggers should be admitted"
    );

    // Let the admitted background run finish before the test process exits.
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;
}

#[tokio::test]
async fn distinct_accounts_run_concurrently_without_contention() {
    common::init_env().await;

    let mail_store = Arc::new(common::FixedMailStore::new(vec![common::envelope(
        "m1",
        "a@example.org",
        "hello",
    )]));
    let classifier = Arc::new(common::FixedClassifier {
        category: "Other".to_string(),
    });
    let pipeline = common::build_pipeline(mail_store, classifier, 300);

    let mut handles = Vec::new();
    for i in 0..DISTINCT_ACCOUNTS {
        let address = common::unique_account(&format!("s6-multi-{i}"));
        let account = common::create_account(&address).await;
        let pipeline = pipeline.clone();
        handles.push(tokio::spawn(async move {
            pipeline
                .run(&account, Source::Schedule, CancellationToken::new())
                .await
        }));
    }

    for handle in handles {
        let result = handle.await.expect("run task panicked");
        assert!(result.is_ok(), "expected every distinct account to succeed: {result:?}");
    }
}
