// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

//! Scenario S3: a manual trigger arriving right after a previous manual run
//! completed, before `min_interval_secs` elapses, is rejected as TooSoon.

mod common;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use cat_emails::modules::error::PipelineError;
use cat_emails::modules::gate::Source;

#[tokio::test]
async fn second_manual_trigger_within_min_interval_is_too_soon() {
    common::init_env().await;
    let address = common::unique_account("s3");
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

    let first = pipeline
        .run(&account, Source::Manual, CancellationToken::new())
        .await;
    assert!(first.is_ok(), "expected the first manual run to succeed");

    let second = pipeline.trigger(&account, None).await;
    match second {
        Err(PipelineError::TooSoon {
            retry_after_secs, ..
        }) => {
            assert!(retry_after_secs > 0 && retry_after_secs <= 300);
        }
        other => panic!("expected TooSoon, got {other:?}"),
    }
}
