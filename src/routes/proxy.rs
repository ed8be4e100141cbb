//! Reverse proxy for the Jaeger query UI mounted under `/jaeger`.

use std::convert::Infallible;

use bytes::Bytes;
use serde_json::json;
use tracing::{debug, error};
use warp::filters::path::Tail;
use warp::filters::BoxedFilter;
use warp::http::header::{HeaderMap, HeaderName, HeaderValue};
use warp::http::{Method, StatusCode};
use warp::{Filter, Reply};

use super::{with_state, AppState};

const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    "host",
    "content-length",
];

fn forwardable(name: &str) -> bool {
    !HOP_BY_HOP.contains(&name)
}

fn upstream_url(base: &str, tail: &str, query: &str) -> String {
    let mut url = format!("{}/jaeger/{}", base.trim_end_matches('/'), tail);
    if !query.is_empty() {
        url.push('?');
        url.push_str(query);
    }
    url
}

fn unavailable() -> warp::reply::Response {
    warp::reply::with_status(
        warp::reply::json(&json!({ "error": "Jaeger dashboard not available" })),
        StatusCode::BAD_GATEWAY,
    )
    .into_response()
}

async fn forward(
    tail: Tail,
    query: String,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
    state: AppState,
) -> Result<warp::reply::Response, Infallible> {
    let url = upstream_url(&state.config.jaeger_url, tail.as_str(), &query);
    let Ok(method) = reqwest::Method::from_bytes(method.as_str().as_bytes()) else {
        return Ok(unavailable());
    };
    debug!(%method, %url, "proxying to jaeger");

    let mut req = state.http.request(method, &url);
    for (name, value) in headers.iter() {
        if forwardable(name.as_str()) {
            req = req.header(name.as_str(), value.as_bytes());
        }
    }

    let upstream = match req.body(body).send().await {
        Ok(resp) => resp,
        Err(e) => {
            error!("jaeger proxy error: {}", e);
            return Ok(unavailable());
        }
    };

    let status = StatusCode::from_u16(upstream.status().as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
    let mut relayed = HeaderMap::new();
    for (name, value) in upstream.headers() {
        if !forwardable(name.as_str()) {
            continue;
        }
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_str().as_bytes()),
            HeaderValue::from_bytes(value.as_bytes()),
        ) {
            relayed.append(name, value);
        }
    }
    let body = match upstream.bytes().await {
        Ok(body) => body,
        Err(e) => {
            error!("jaeger proxy error reading body: {}", e);
            return Ok(unavailable());
        }
    };

    let mut response = warp::reply::Response::new(warp::hyper::Body::from(body));
    *response.status_mut() = status;
    *response.headers_mut() = relayed;
    Ok(response)
}

pub fn routes(state: AppState) -> BoxedFilter<(impl Reply,)> {
    let query = warp::query::raw()
        .or(warp::any().map(String::new))
        .unify();

    warp::path("jaeger")
        .and(warp::path::tail())
        .and(query)
        .and(warp::method())
        .and(warp::header::headers_cloned())
        .and(warp::body::bytes())
        .and(with_state(state))
        .and_then(forward)
        .boxed()
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;

    use super::*;
    use crate::routes::test_support::{body, config, state_with};

    async fn fake_jaeger() -> SocketAddr {
        let services = warp::path!("jaeger" / "api" / "services")
            .and(warp::query::raw())
            .map(|q: String| {
                warp::reply::with_header(
                    warp::reply::json(&json!({ "data": ["garden"], "query": q })),
                    "x-jaeger",
                    "yes",
                )
            });
        let (addr, server) = warp::serve(services).bind_ephemeral(([127, 0, 0, 1], 0));
        tokio::spawn(server);
        addr
    }

    #[test]
    fn upstream_url_keeps_query() {
        assert_eq!(
            upstream_url("http://jaeger:16686/", "api/traces", "service=x"),
            "http://jaeger:16686/jaeger/api/traces?service=x"
        );
        assert_eq!(upstream_url("http://j", "", ""), "http://j/jaeger/");
    }

    #[tokio::test]
    async fn relays_status_headers_and_body() {
        let addr = fake_jaeger().await;
        let jaeger = format!("http://{}", addr);
        let api = routes(state_with(config(&["--jaeger-url", &jaeger])));

        let resp = warp::test::request()
            .path("/jaeger/api/services?lookback=1h")
            .reply(&api)
            .await;

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()["x-jaeger"], "yes");
        let body = body(&resp);
        assert_eq!(body["data"][0], "garden");
        assert_eq!(body["query"], "lookback=1h");
    }

    #[tokio::test]
    async fn dead_upstream_is_a_502() {
        let api = routes(state_with(config(&["--jaeger-url", "http://127.0.0.1:9"])));
        let resp = warp::test::request().path("/jaeger/search").reply(&api).await;

        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(body(&resp)["error"], "Jaeger dashboard not available");
    }
}
