// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

//! Scenario S1: a single scheduled run over a fresh account with a couple of
//! new messages completes successfully and leaves the expected aggregate
//! tallies behind.

mod common;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use cat_emails::modules::audit::aggregate::{Aggregate, Dimension};
use cat_emails::modules::gate::Source;

#[tokio::test]
async fn happy_path_run_tallies_category_aggregate() {
    common::init_env().await;
    let address = common::unique_account("s1");
    let account = common::create_account(&address).await;

    let mail_store = Arc::new(common::FixedMailStore::new(vec![
        common::envelope("m1", "news@example.org", "today's newsletter"),
        common::envelope("m2", "news@example.org", "another newsletter"),
    ]));
    let classifier = Arc::new(common::FixedClassifier {
        category: "Newsletter".to_string(),
    });
    let pipeline = common::build_pipeline(mail_store, classifier, 300);

    let result = pipeline
        .run(&account, Source::Schedule, CancellationToken::new())
        .await;
    assert!(result.is_ok(), "expected a clean run, got {result:?}");

    let top = Aggregate::top(&account, Dimension::Category, 10)
        .await
        .expect("aggregate query failed");
    let newsletter = top
        .iter()
        .find(|row| row.dimension_key == "Newsletter")
        .expect("newsletter category bucket missing");
    assert_eq!(newsletter.count, 2);
}
