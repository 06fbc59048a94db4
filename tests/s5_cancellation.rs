// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

//! Scenario S5: the run's cancellation token fires mid-run (here, right
//! after the first message is classified). The pipeline stops before
//! starting the next message and reports `Cancelled` rather than finishing.

mod common;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use cat_emails::modules::error::PipelineError;
use cat_emails::modules::gate::Source;

#[tokio::test]
async fn cancellation_mid_run_stops_before_the_next_message() {
    common::init_env().await;
    let address = common::unique_account("s5");
    let account = common::create_account(&address).await;

    let mail_store = Arc::new(common::FixedMailStore::new(vec![
        common::envelope("m1", "a@example.org", "hello"),
        common::envelope("m2", "b@example.org", "world"),
    ]));
    let cancel = CancellationToken::new();
    let classifier = Arc::new(common::CancelAfterFirstClassifier::new(
        "Other",
        cancel.clone(),
    ));
    let pipeline = common::build_pipeline(mail_store, classifier, 300);

    let result = pipeline.run(&account, Source::Schedule, cancel).await;
    assert!(
        matches!(result, Err(PipelineError::Cancelled { .. })),
        "expected Cancelled, got {result:?}"
    );
}
