//! Property-based tests for fingerprint determinism and failure classification

use genrelay::error::FailureKind;
use genrelay::provider::{classify, TransportOutcome};
use genrelay::types::GenerationRequest;
use proptest::prelude::*;

fn request_strategy() -> impl Strategy<Value = GenerationRequest> {
    (
        "[a-zA-Z0-9 ]{1,24}",
        "[a-z]{2}",
        "[A-Z]{2}",
        prop_oneof![Just("24h"), Just("7d"), Just("30d")],
        1u32..=20,
    )
        .prop_map(|(keyword, language, country, time_range, max_items)| {
            let mut request = GenerationRequest::new(keyword).with_max_items(max_items);
            request.language = language;
            request.country = country;
            request.time_range = time_range.to_string();
            request
        })
}

/// Equal requests always share a fingerprint
#[test]
fn test_fingerprint_determinism_property() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(&request_strategy(), |request| {
            let copy = request.clone();
            assert_eq!(request.fingerprint(), copy.fingerprint());
            assert_eq!(request.fingerprint().as_str().len(), 64);
            Ok(())
        })
        .unwrap();
}

/// Changing any single parameter changes the fingerprint
#[test]
fn test_fingerprint_distinguishes_parameters_property() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(&(request_strategy(), 1u32..=20), |(request, max_items)| {
            prop_assume!(max_items != request.max_items);
            let changed = request.clone().with_max_items(max_items);
            assert_ne!(request.fingerprint(), changed.fingerprint());

            let mut keyword = request.clone();
            keyword.keyword.push('x');
            assert_ne!(request.fingerprint(), keyword.fingerprint());
            Ok(())
        })
        .unwrap();
}

/// Every HTTP status maps to exactly the kind its range dictates
#[test]
fn test_status_classification_property() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(&any::<u16>(), |status| {
            let kind = classify(TransportOutcome::Status(status));
            let expected = match status {
                429 => FailureKind::RateLimited,
                500..=599 => FailureKind::UpstreamServerError,
                _ => FailureKind::Unknown,
            };
            assert_eq!(kind, expected);
            Ok(())
        })
        .unwrap();
}
