//! Integration tests for the upstream HTTP clients against a mock server

mod common;

use std::sync::Arc;
use std::time::Duration;
use suggest_api::services::broader::RelationshipLookup;
use suggest_api::services::concordance::ConcordanceError;
use suggest_api::services::denylist::{DenylistError, DenylistSource};
use suggest_api::services::http::build_client;
use suggest_api::services::provider::ProviderError;
use suggest_api::services::{
    AuthorsProvider, ConcordanceResolver, ConcordanceService, HealthCheck, HttpDenylistSource,
    SuggestionProvider, ThingsRelationshipLookup, TmeProvider,
};
use suggest_api::types::{RequestContext, Source, SourceFlags};

use common::{spawn_upstream, MockUpstream, ABOUT};

async fn setup() -> (Arc<MockUpstream>, String, reqwest::Client) {
    let mock = MockUpstream::new();
    let base_url = spawn_upstream(Arc::clone(&mock)).await;
    let client = build_client(Duration::from_secs(5)).expect("Should build client");
    (mock, base_url, client)
}

fn ctx(tid: &str) -> RequestContext {
    RequestContext::new(tid, SourceFlags::new([Source::Tme, Source::Authors], Some("dbg".to_string())))
}

#[tokio::test]
async fn test_provider_tags_suggestions_and_forwards_headers() {
    let (mock, base_url, client) = setup().await;
    mock.set_authors(200, &[(ABOUT, "a1"), (ABOUT, "a2")]);
    let provider = AuthorsProvider::new(&base_url, "/authors", client);

    let suggestions = provider
        .get_suggestions(br#"{"bodyXML": "text"}"#, &ctx("tid_provider"))
        .await
        .unwrap();

    assert_eq!(suggestions.len(), 2);
    assert!(suggestions.iter().all(|s| s.source == Some(Source::Authors)));
    assert_eq!(suggestions[0].concept.base_id(), "a1");

    let calls = mock.calls_to("/authors");
    assert_eq!(calls[0].request_id.as_deref(), Some("tid_provider"));
    assert_eq!(calls[0].debug.as_deref(), Some("dbg"));
}

#[tokio::test]
async fn test_provider_status_mapping() {
    let (mock, base_url, client) = setup().await;
    let provider = TmeProvider::new(&base_url, "/tme", client);
    let payload = br#"{"bodyXML": "text"}"#;

    mock.set_tme(204, &[]);
    let err = provider.get_suggestions(payload, &ctx("tid_1")).await.unwrap_err();
    assert!(matches!(err, ProviderError::NoContent(_)));
    assert!(err.is_expected());

    mock.set_tme(400, &[]);
    let err = provider.get_suggestions(payload, &ctx("tid_2")).await.unwrap_err();
    assert!(matches!(err, ProviderError::BadRequest(_)));

    mock.set_tme(502, &[]);
    let err = provider.get_suggestions(payload, &ctx("tid_3")).await.unwrap_err();
    assert!(matches!(err, ProviderError::UnexpectedStatus(_, 502)));
    assert!(!err.is_expected());
}

#[tokio::test]
async fn test_unreachable_provider_is_network_error() {
    let client = build_client(Duration::from_secs(2)).unwrap();
    let provider = TmeProvider::new("http://127.0.0.1:1", "/tme", client);

    let err = provider
        .get_suggestions(b"{}", &ctx("tid_down"))
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::Network(_, _)));
}

#[tokio::test]
async fn test_cancelled_request_aborts_provider_call() {
    let (_mock, base_url, client) = setup().await;
    let provider = TmeProvider::new(&base_url, "/tme", client);
    let ctx = ctx("tid_cancel");
    ctx.cancel.cancel();

    let err = provider.get_suggestions(b"{}", &ctx).await.unwrap_err();
    assert!(matches!(err, ProviderError::Cancelled(_)));
}

#[tokio::test]
async fn test_concordance_query_and_partial_resolution() {
    let (mock, base_url, client) = setup().await;
    mock.add_concept("known", "http://www.ft.com/ontology/Topic");
    let service = ConcordanceService::new(&base_url, "/concordances", client);

    let ids = vec!["known".to_string(), "missing".to_string(), "known".to_string()];
    let resolved = service.resolve(&ids, &ctx("tid_conc")).await.unwrap();

    assert_eq!(resolved.len(), 1);
    assert_eq!(resolved["known"].pref_label, "Label known");

    let calls = mock.calls_to("/concordances");
    assert_eq!(calls.len(), 1);
    assert_eq!(
        calls[0].query,
        vec![
            ("ids".to_string(), "known".to_string()),
            ("ids".to_string(), "missing".to_string()),
            ("include_deprecated".to_string(), "false".to_string()),
        ]
    );
    assert_eq!(calls[0].request_id.as_deref(), Some("tid_conc"));
}

#[tokio::test]
async fn test_concordance_unexpected_status() {
    let (mock, base_url, client) = setup().await;
    *mock.concordance_status.lock() = Some(500);
    let service = ConcordanceService::new(&base_url, "/concordances", client);

    let err = service
        .resolve(&["x".to_string()], &ctx("tid_conc"))
        .await
        .unwrap_err();
    assert!(matches!(err, ConcordanceError::UnexpectedStatus(500)));
}

#[tokio::test]
async fn test_denylist_source_reads_uuids() {
    let (mock, base_url, client) = setup().await;
    mock.denylist.lock().1 = vec!["a".to_string(), "b".to_string()];
    let source = HttpDenylistSource::new(&base_url, "/denylist", client);

    let ids = source.fetch("tid_deny").await.unwrap();
    assert_eq!(ids, vec!["a", "b"]);

    let calls = mock.calls_to("/denylist");
    assert_eq!(calls[0].query, vec![("refresh".to_string(), "true".to_string())]);

    mock.denylist.lock().0 = 500;
    let err = source.fetch("tid_deny").await.unwrap_err();
    assert!(matches!(err, DenylistError::UnexpectedStatus(500)));
}

#[tokio::test]
async fn test_things_lookup_query_and_parse() {
    let (mock, base_url, client) = setup().await;
    *mock.things.lock() = serde_json::json!({
        "things": {
            "france": { "broaderConcepts": [{ "id": "http://api.ft.com/things/europe" }] }
        }
    });
    let lookup = ThingsRelationshipLookup::new(&base_url, "/things", client);

    let ids = vec!["france".to_string(), "europe".to_string()];
    let relations = lookup.broader_concepts(&ids, &ctx("tid_things")).await.unwrap();

    assert_eq!(relations["france"].len(), 1);
    assert_eq!(relations["france"][0].id, "http://api.ft.com/things/europe");
    assert_eq!(
        relations["france"][0].predicate,
        suggest_api::services::broader::SKOS_BROADER
    );

    let query = &mock.calls_to("/things")[0].query;
    assert!(query.contains(&("uuid".to_string(), "france".to_string())));
    assert!(query.contains(&("showRelationship".to_string(), "broader".to_string())));
}

#[tokio::test]
async fn test_upstream_health_check_outcomes() {
    let (mock, base_url, client) = setup().await;
    let check = ConcordanceService::new(&base_url, "/concordances", client.clone()).health_check();

    assert!(check.check().await.is_ok());
    assert_eq!(check.descriptor().severity, 1);

    *mock.gtg_status.lock() = Some(500);
    let reason = check.check().await.unwrap_err();
    assert!(reason.contains("500"));

    let dead = TmeProvider::new("http://127.0.0.1:1", "/tme", client).health_check();
    assert!(dead.check().await.is_err());
}
