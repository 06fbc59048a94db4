// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

//! Scenario S2: a manual trigger arriving while a scheduled run is already
//! in flight for the same account is rejected as Busy, not queued.

mod common;

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use cat_emails::modules::error::PipelineError;
use cat_emails::modules::gate::Source;

#[tokio::test]
async fn manual_trigger_is_busy_while_a_run_is_in_flight() {
    common::init_env().await;
    let address = common::unique_account("s2");
    let account = common::create_account(&address).await;

    let mail_store = Arc::new(common::SlowMailStore::new(
        vec![common::envelope("m1", "a@example.org", "hello")],
        Duration::from_millis(300),
    ));
    let classifier = Arc::new(common::FixedClassifier {
        category: "Other".to_string(),
    });
    let pipeline = common::build_pipeline(mail_store, classifier, 300);

    let running = {
        let pipeline = pipeline.clone();
        let account = account.clone();
        tokio::spawn(async move {
            pipeline
                .run(&account, Source::Schedule, CancellationToken::new())
                .await
        })
    };

    // Give the spawned run time to acquire the gate lease before probing it.
    tokio::time::sleep(Duration::from_millis(50)).await;

    let trigger_result = pipeline.trigger(&account, None).await;
    assert!(
        matches!(trigger_result, Err(PipelineError::Busy { .. })),
        "expected Busy, got {trigger_result:?}"
    );

    let run_result = running.await.expect("background run task panicked");
    assert!(run_result.is_ok(), "expected the in-flight run to succeed");
}
