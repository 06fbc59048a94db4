// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

//! Scenario S4: the classifier is completely unavailable. The run still
//! completes by falling back every message to the `Other` category instead
//! of aborting.

mod common;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use cat_emails::modules::audit::aggregate::{Aggregate, Dimension};
use cat_emails::modules::audit::run::{ProcessingRun, RunFilter};
use cat_emails::modules::gate::Source;
use cat_emails::modules::pipeline::message::CATEGORY_FALLBACK;

#[tokio::test]
async fn classifier_outage_falls_back_to_other_and_still_completes() {
    common::init_env().await;
    let address = common::unique_account("s4");
    let account = common::create_account(&address).await;

    let mail_store = Arc::new(common::FixedMailStore::new(vec![common::envelope(
        "m1",
        "a@example.org",
        "hello",
    )]));
    let classifier = Arc::new(common::FailingClassifier);
    let pipeline = common::build_pipeline(mail_store, classifier, 300);

    let result = pipeline
        .run(&account, Source::Schedule, CancellationToken::new())
        .await;
    assert!(
        result.is_ok(),
        "a classifier outage must not abort the run: {result:?}"
    );

    let top = Aggregate::top(&account, Dimension::Category, 10)
        .await
        .expect("aggregate query failed");
    let fallback = top
        .iter()
        .find(|row| row.dimension_key == CATEGORY_FALLBACK)
        .expect("fallback category bucket missing");
    assert_eq!(fallback.count, 1);

    let runs = ProcessingRun::list(RunFilter {
        account: Some(account.clone()),
        limit: Some(1),
        ..Default::default()
    })
    .await
    .expect("failed to list processing runs");
    let run = runs.first().expect("no processing run recorded");
    assert_eq!(
        run.counters.emails_errors, 1,
        "every message falling back to Other must bump the error counter"
    );
    assert_eq!(run.counters.emails_categorized, run.counters.emails_processed);
}
