//! Integration tests for the fallback chain over fake adapters

use super::test_utils::FakeAdapter;
use genrelay::chain::FallbackChain;
use genrelay::error::{FailureKind, ProviderFailure};
use genrelay::provider::{CallContext, ProviderAdapter, StubGenerator};
use genrelay::types::GenerationRequest;
use std::sync::Arc;

#[tokio::test]
async fn test_timeout_then_success_returns_second_provider() {
    let a = FakeAdapter::failing("provider-a", ProviderFailure::timeout("read timed out"));
    let b = FakeAdapter::succeeding("provider-b", 1);
    let chain = FallbackChain::builder()
        .primary(a.clone())
        .primary(b.clone())
        .stand_in(Arc::new(StubGenerator::new()))
        .allow_stand_in(true)
        .build();

    let request = GenerationRequest::new("AI").with_max_items(5);
    let result = chain
        .generate(&request, &CallContext::new("trace-ai"))
        .await
        .unwrap();

    assert_eq!(result.items.len(), 1);
    assert_eq!(result.usage.provider_calls, 1);
    assert_eq!(result.provider, "provider-b");
    assert!(!result.degraded);
    assert_eq!((a.calls(), b.calls()), (1, 1));
}

#[tokio::test]
async fn test_each_candidate_tried_once_before_stand_in() {
    let a = FakeAdapter::failing("a", ProviderFailure::upstream("503 Service Unavailable"));
    let b = FakeAdapter::failing("b", ProviderFailure::schema("no items"));
    let chain = FallbackChain::builder()
        .primary(a.clone())
        .primary(b.clone())
        .stand_in(Arc::new(StubGenerator::new()))
        .allow_stand_in(true)
        .build();

    let result = chain
        .generate(&GenerationRequest::new("AI"), &CallContext::new("t"))
        .await
        .unwrap();
    assert!(result.degraded);
    assert_eq!((a.calls(), b.calls()), (1, 1));
}

#[tokio::test]
async fn test_disabled_fallback_surfaces_first_failure_unwrapped() {
    let a = FakeAdapter::failing("a", ProviderFailure::unknown("400 Bad Request"));
    let b = FakeAdapter::failing("b", ProviderFailure::rate_limited("429"));
    let chain = FallbackChain::builder()
        .primary(a)
        .primary(b)
        .allow_stand_in(false)
        .build();

    let err = chain
        .generate(&GenerationRequest::new("AI"), &CallContext::new("t"))
        .await
        .unwrap_err();
    assert_eq!(err.kind, FailureKind::Unknown);
    assert_eq!(err.message, "400 Bad Request");
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_chains_nest() {
    let inner = FallbackChain::builder()
        .primary(FakeAdapter::failing("inner-a", ProviderFailure::timeout("slow")))
        .build();
    let outer = FallbackChain::builder()
        .primary(Arc::new(inner))
        .primary(FakeAdapter::succeeding("outer-b", 2))
        .build();

    let result = outer
        .generate(&GenerationRequest::new("AI"), &CallContext::new("t"))
        .await
        .unwrap();
    assert_eq!(result.provider, "outer-b");
    assert_eq!(result.items.len(), 2);
}
