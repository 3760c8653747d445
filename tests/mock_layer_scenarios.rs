// tests/mock_layer_scenarios.rs
//! End-to-end scenarios: a page session backed by the hub routes, talking
//! to an installed interceptor.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use futures::future::{join_all, BoxFuture};
use hub_mock_engine::interception::{
    ClientRegistry, FetchResponse, InterceptedRequest, Interceptor, LifecycleState, Upstream,
};
use hub_mock_engine::mock::{Idea, IdeaStatus, Project, ProjectStatus, SyntheticDataset};
use hub_mock_engine::utils::config::InterceptorSettings;
use hub_mock_engine::{hub_routes, MockSession};
use hyper::{HeaderMap, StatusCode};
use serde_json::{json, Value};

const API: &str = "http://localhost:3000";

/// Real network stand-in counting how often it was reached
#[derive(Default)]
struct CountingUpstream {
    hits: AtomicUsize,
}

impl Upstream for CountingUpstream {
    fn fetch(&self, _request: InterceptedRequest) -> BoxFuture<'_, hub_mock_engine::Result<FetchResponse>> {
        self.hits.fetch_add(1, Ordering::SeqCst);
        Box::pin(async {
            Ok(FetchResponse::new(
                StatusCode::OK,
                HeaderMap::new(),
                Bytes::from_static(b"from network"),
            ))
        })
    }
}

struct Hub {
    interceptor: Arc<Interceptor>,
    upstream: Arc<CountingUpstream>,
    dataset: Arc<SyntheticDataset>,
    session: MockSession,
}

impl Hub {
    async fn start() -> Self {
        let settings = InterceptorSettings::default();
        let upstream = Arc::new(CountingUpstream::default());
        let interceptor = Arc::new(
            Interceptor::new(&settings, Arc::new(ClientRegistry::new()), upstream.clone()).unwrap(),
        );
        interceptor.install();

        let dataset = Arc::new(SyntheticDataset::seeded());
        let routes = Arc::new(hub_routes(Arc::clone(&dataset)).unwrap());
        let session = MockSession::connect(Arc::clone(&interceptor), settings.session_url, routes);
        session.start().await.unwrap();

        Self {
            interceptor,
            upstream,
            dataset,
            session,
        }
    }

    async fn get(&self, path: &str) -> FetchResponse {
        self.session
            .fetch(InterceptedRequest::get(format!("{}{}", API, path)))
            .await
            .unwrap()
    }

    async fn post(&self, path: &str, body: Value) -> FetchResponse {
        self.session
            .fetch(
                InterceptedRequest::post(format!("{}{}", API, path))
                    .with_json(&body)
                    .unwrap(),
            )
            .await
            .unwrap()
    }

    fn network_hits(&self) -> usize {
        self.upstream.hits.load(Ordering::SeqCst)
    }
}

#[tokio::test]
async fn activated_session_serves_seeded_ideas() {
    let hub = Hub::start().await;

    let response = hub.get("/ideas").await;
    assert_eq!(response.status, StatusCode::OK);
    let ideas: Vec<Idea> = response.json().unwrap();
    assert!(!ideas.is_empty());
    assert_eq!(hub.network_hits(), 0);
}

#[tokio::test]
async fn liking_unknown_idea_is_not_found() {
    let hub = Hub::start().await;

    let response = hub.post("/ideas/999/like", Value::Null).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    let body: Value = response.json().unwrap();
    assert_eq!(body, json!({ "error": "Idea not found" }));
}

#[tokio::test]
async fn submitted_idea_is_listed_first_once() {
    let hub = Hub::start().await;

    let response = hub
        .post("/ideas", json!({ "title": "X", "description": "Y", "impact": "Z" }))
        .await;
    assert_eq!(response.status, StatusCode::OK);

    let created: Idea = response.json().unwrap();
    assert!(!created.id.is_empty());
    assert_eq!(created.status, IdeaStatus::Submitted);
    assert_eq!(created.likes, 0);
    assert!(chrono::DateTime::parse_from_rfc3339(&created.created_at).is_ok());

    let ideas: Vec<Idea> = hub.get("/ideas").await.json().unwrap();
    assert_eq!(ideas[0], created);
    assert_eq!(ideas.iter().filter(|idea| idea.id == created.id && idea.title == "X").count(), 1);
}

#[tokio::test]
async fn repeated_likes_increase_the_count() {
    let hub = Hub::start().await;

    let first: Value = hub.post("/ideas/1/like", Value::Null).await.json().unwrap();
    let second: Value = hub.post("/ideas/1/like", Value::Null).await.json().unwrap();
    let first = first["likes"].as_u64().unwrap();
    let second = second["likes"].as_u64().unwrap();
    assert_eq!(second, first + 1);
}

#[tokio::test]
async fn concurrent_likes_are_all_applied() {
    let hub = Hub::start().await;
    let before = hub.dataset.ideas().iter().find(|idea| idea.id == "2").unwrap().likes;

    let responses = join_all((0..20).map(|_| hub.post("/ideas/2/like", Value::Null))).await;
    let counts: BTreeSet<u64> = responses
        .iter()
        .map(|response| response.json::<Value>().unwrap()["likes"].as_u64().unwrap())
        .collect();

    // Every reply saw a distinct count
    assert_eq!(counts.len(), 20);
    let after = hub.dataset.ideas().iter().find(|idea| idea.id == "2").unwrap().likes;
    assert_eq!(after, before + 20);
}

#[tokio::test]
async fn separate_hubs_do_not_share_state() {
    let a = Hub::start().await;
    let b = Hub::start().await;

    a.post("/projects", json!({ "title": "Só no A", "owner": "Ana" })).await;

    let in_a: Vec<Project> = a.get("/projects").await.json().unwrap();
    let in_b: Vec<Project> = b.get("/projects").await.json().unwrap();
    assert_eq!(in_a.len(), in_b.len() + 1);

    let created = in_a.last().unwrap();
    assert_eq!(created.title, "Só no A");
    assert_eq!(created.status, ProjectStatus::Piloto);
    assert_eq!(created.economy, 0);
}

#[tokio::test]
async fn unknown_project_is_not_found() {
    let hub = Hub::start().await;

    let response = hub.get("/projects/999").await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(response.text(), r#"{"error":"Project not found"}"#);
}

#[tokio::test]
async fn invalid_body_is_rejected_without_mutation() {
    let hub = Hub::start().await;
    let before = hub.dataset.ideas().len();

    let response = hub.post("/ideas", json!({ "title": "only a title" })).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(hub.dataset.ideas().len(), before);
}

#[tokio::test]
async fn bypass_header_and_unmatched_routes_reach_the_network() {
    let hub = Hub::start().await;

    let bypassed = hub
        .session
        .fetch(
            InterceptedRequest::get(format!("{}/ideas", API))
                .with_header("x-msw-bypass", "true")
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(bypassed.text(), "from network");

    let unmatched = hub.get("/health").await;
    assert_eq!(unmatched.text(), "from network");
    assert_eq!(hub.network_hits(), 2);
}

#[tokio::test]
async fn closing_the_only_session_unregisters() {
    let hub = Hub::start().await;
    let interceptor = Arc::clone(&hub.interceptor);
    let Hub { session, .. } = hub;

    session.close();
    assert_eq!(interceptor.state(), LifecycleState::Redundant);

    let response = interceptor
        .fetch(InterceptedRequest::get(format!("{}/ideas", API)))
        .await
        .unwrap();
    assert_eq!(response.text(), "from network");
}

#[tokio::test]
async fn assistant_and_insights_answer() {
    let hub = Hub::start().await;

    let reply: Value = hub
        .post("/aurora/chat", json!({ "message": "Como usar o mapa?" }))
        .await
        .json()
        .unwrap();
    assert!(reply["message"].as_str().unwrap().contains("mapa"));

    let insights: Vec<Value> = hub.get("/aurora/insights").await.json().unwrap();
    assert_eq!(insights.len(), hub.dataset.insights().len());
}
