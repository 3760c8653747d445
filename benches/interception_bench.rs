// benches/interception_bench.rs
//! Route matching and full request pipeline benchmarks

use std::sync::Arc;

use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use futures::future::BoxFuture;
use hub_mock_engine::bridge::RequestPayload;
use hub_mock_engine::interception::{
    ClientRegistry, CorrelationId, FetchResponse, InterceptedRequest, Interceptor, Upstream,
};
use hub_mock_engine::mock::{hub_routes, SyntheticDataset};
use hub_mock_engine::utils::config::InterceptorSettings;
use hub_mock_engine::MockSession;
use hyper::{HeaderMap, StatusCode};

const API: &str = "http://localhost:3000";

struct NullUpstream;

impl Upstream for NullUpstream {
    fn fetch(&self, _request: InterceptedRequest) -> BoxFuture<'_, hub_mock_engine::Result<FetchResponse>> {
        Box::pin(async { Ok(FetchResponse::new(StatusCode::OK, HeaderMap::new(), Bytes::new())) })
    }
}

fn bench_route_resolve(c: &mut Criterion) {
    let routes = hub_routes(Arc::new(SyntheticDataset::seeded())).unwrap();
    let id = CorrelationId::generate();

    let first = RequestPayload::from_request(&id, &InterceptedRequest::get(format!("{}/auth/login", API)));
    let param = RequestPayload::from_request(&id, &InterceptedRequest::get(format!("{}/projects/2", API)));
    let miss = RequestPayload::from_request(&id, &InterceptedRequest::get(format!("{}/assets/app.js", API)));

    c.bench_function("route_resolve_param", |b| {
        b.iter(|| routes.resolve(black_box(&param)).unwrap())
    });
    c.bench_function("route_resolve_method_mismatch", |b| {
        b.iter(|| routes.resolve(black_box(&first)).unwrap())
    });
    c.bench_function("route_resolve_miss", |b| {
        b.iter(|| routes.resolve(black_box(&miss)).unwrap())
    });
}

fn bench_fetch_pipeline(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    let session = rt.block_on(async {
        let settings = InterceptorSettings::default();
        let interceptor = Interceptor::new(
            &settings,
            Arc::new(ClientRegistry::new()),
            Arc::new(NullUpstream),
        )
        .unwrap();
        interceptor.install();

        let routes = hub_routes(Arc::new(SyntheticDataset::seeded())).unwrap();
        let session = MockSession::connect(Arc::new(interceptor), settings.session_url, Arc::new(routes));
        session.start().await.unwrap();
        session
    });

    c.bench_function("fetch_mocked_projects", |b| {
        b.iter(|| {
            rt.block_on(session.fetch(InterceptedRequest::get(format!("{}/projects", API))))
                .unwrap()
        })
    });
    c.bench_function("fetch_passthrough", |b| {
        b.iter(|| {
            rt.block_on(session.fetch(InterceptedRequest::get(format!("{}/assets/app.js", API))))
                .unwrap()
        })
    });
}

criterion_group!(benches, bench_route_resolve, bench_fetch_pipeline);
criterion_main!(benches);
