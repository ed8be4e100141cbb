//! HTTP surface: REST API, upload, probes, proxy, terminal and static files.

mod auth;
mod gardens;
mod health;
mod layouts;
mod plants;
mod proxy;
mod system;
mod upload;

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use warp::filters::BoxedFilter;
use warp::http::header::{HeaderMap, HeaderValue};
use warp::{Filter, Rejection, Reply};

use crate::config::Config;
use crate::db::Db;
use crate::error::{handle_rejection, ApiError};
use crate::terminal::{self, ShellSettings, Terminals};

/// Everything a handler may need, cheap to clone into each filter.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Db>,
    pub config: Arc<Config>,
    pub terminals: Arc<Terminals>,
    pub http: reqwest::Client,
    pub started: Instant,
}

impl AppState {
    pub fn new(config: Config, db: Arc<Db>, terminals: Arc<Terminals>) -> anyhow::Result<Self> {
        Ok(AppState {
            db,
            config: Arc::new(config),
            terminals,
            http: reqwest::Client::builder().build()?,
            started: Instant::now(),
        })
    }
}

pub fn with_state(state: AppState) -> impl Filter<Extract = (AppState,), Error = Infallible> + Clone {
    warp::any().map(move || state.clone())
}

pub fn with_db(db: Arc<Db>) -> impl Filter<Extract = (Arc<Db>,), Error = Infallible> + Clone {
    warp::any().map(move || db.clone())
}

/// Largest JSON body accepted, matching express.json's default.
const JSON_BODY_LIMIT: u64 = 100 * 1024;

fn body_too_large() -> Rejection {
    warp::reject::custom(ApiError::PayloadTooLarge("Request body too large".to_owned()))
}

/// Request body capped at `JSON_BODY_LIMIT`. A declared length over the cap is
/// refused before reading; bodies without a content-length are checked after.
fn limited_body() -> impl Filter<Extract = (Bytes,), Error = Rejection> + Clone {
    warp::header::optional::<u64>("content-length")
        .and_then(|len: Option<u64>| async move {
            match len {
                Some(len) if len > JSON_BODY_LIMIT => Err(body_too_large()),
                _ => Ok(()),
            }
        })
        .untuple_one()
        .and(warp::body::bytes())
        .and_then(|body: Bytes| async move {
            if body.len() as u64 > JSON_BODY_LIMIT {
                return Err(body_too_large());
            }
            Ok(body)
        })
}

/// JSON body that tolerates an empty payload by falling back to `T::default()`.
pub fn json_body<T>() -> impl Filter<Extract = (T,), Error = Rejection> + Clone
where
    T: DeserializeOwned + Default + Send + 'static,
{
    limited_body().and_then(|body: Bytes| async move {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(T::default());
        }
        serde_json::from_slice(&body).map_err(|e| {
            Rejection::from(ApiError::BadRequest {
                message: "Invalid request body".to_owned(),
                detail: Some(e.to_string()),
            })
        })
    })
}

/// Token from an `Authorization: Bearer <token>` header, if any.
pub fn bearer_token() -> impl Filter<Extract = (Option<String>,), Error = Rejection> + Clone {
    warp::header::optional::<String>("authorization").map(|value: Option<String>| {
        value
            .map(|v| v.strip_prefix("Bearer ").unwrap_or(&v).trim().to_owned())
            .filter(|t| !t.is_empty())
    })
}

#[derive(Debug, Deserialize)]
struct TerminalQuery {
    token: Option<String>,
}

fn terminal_route(state: AppState) -> BoxedFilter<(impl Reply,)> {
    warp::path!("terminal")
        .and(warp::ws())
        .and(warp::query::<TerminalQuery>())
        .and(with_state(state))
        .and_then(|ws: warp::ws::Ws, query: TerminalQuery, state: AppState| async move {
            let token = query.token.unwrap_or_default();
            if state.db.read().await.verify(&token).is_none() {
                return Err(Rejection::from(ApiError::Unauthorized(
                    "Terminal requires a valid session".to_owned(),
                )));
            }
            let settings = ShellSettings {
                shell: state.config.terminal_shell.clone(),
                kubeconfig: state.config.kubeconfig.clone(),
            };
            let terminals = state.terminals.clone();
            Ok(ws.on_upgrade(move |socket| terminal::run_session(socket, settings, terminals)))
        })
        .boxed()
}

fn static_files(config: &Config) -> BoxedFilter<(impl Reply,)> {
    let uploads = warp::path("uploads").and(warp::fs::dir(config.upload_dir.clone()));
    let public = warp::fs::dir(config.public_dir.clone());
    warp::get().and(uploads.or(public)).boxed()
}

fn security_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert("x-content-type-options", HeaderValue::from_static("nosniff"));
    headers.insert("x-frame-options", HeaderValue::from_static("SAMEORIGIN"));
    headers.insert("referrer-policy", HeaderValue::from_static("no-referrer"));
    headers.insert("x-dns-prefetch-control", HeaderValue::from_static("off"));
    headers
}

/// Full application filter, including error recovery and response decoration.
pub fn routes(state: AppState) -> BoxedFilter<(impl Reply,)> {
    let api = plants::routes(state.db.clone())
        .or(gardens::routes(state.db.clone()))
        .or(layouts::routes(state.db.clone()))
        .or(auth::routes(state.db.clone()))
        .or(upload::routes(state.clone()))
        .or(system::routes(state.clone()))
        .or(health::routes(state.clone()))
        .or(proxy::routes(state.clone()))
        .or(terminal_route(state.clone()))
        .or(static_files(&state.config));

    let cors = warp::cors()
        .allow_any_origin()
        .allow_methods(vec!["GET", "POST", "PUT", "PATCH", "DELETE", "OPTIONS"])
        .allow_headers(vec!["content-type", "authorization"]);

    api.recover(handle_rejection)
        .with(warp::reply::with::headers(security_headers()))
        .with(cors)
        .with(warp::trace::request())
        .boxed()
}


#[cfg(test)]
mod tests {
    use warp::http::StatusCode;

    use super::test_support::*;
    use super::*;

    #[tokio::test]
    async fn unknown_route_gets_json_404() {
        let api = routes(state());
        let resp = warp::test::request().path("/api/nothing-here").reply(&api).await;

        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let body = body(&resp);
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "Route not found");
    }

    #[tokio::test]
    async fn responses_carry_security_headers() {
        let api = routes(state());
        let resp = warp::test::request().path("/health/live").reply(&api).await;

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()["x-content-type-options"], "nosniff");
    }

    #[tokio::test]
    async fn terminal_requires_session_token() {
        let api = routes(state());
        let res = warp::test::ws()
            .path("/terminal?token=sess_bogus")
            .handshake(api)
            .await;
        assert!(res.is_err());
    }

    #[tokio::test]
    async fn malformed_json_is_a_400() {
        let api = routes(state());
        let resp = warp::test::request()
            .method("POST")
            .path("/api/plants")
            .header("content-type", "application/json")
            .body("{\"name\":")
            .reply(&api)
            .await;

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body(&resp)["message"], "Invalid request body");
    }

    #[tokio::test]
    async fn oversized_json_is_a_413() {
        let api = routes(state());
        let notes = "a".repeat(JSON_BODY_LIMIT as usize);
        let resp = warp::test::request()
            .method("POST")
            .path("/api/plants")
            .json(&serde_json::json!({ "name": "Big", "careNotes": notes }))
            .reply(&api)
            .await;

        assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(body(&resp)["message"], "Request body too large");
    }

    #[tokio::test]
    async fn empty_body_still_allowed() {
        let api = routes(state());
        let resp = warp::test::request().path("/api/plants?limit=1").reply(&api).await;
        let id = body(&resp)["data"][0]["_id"].as_str().unwrap().to_owned();

        let resp = warp::test::request()
            .method("PATCH")
            .path(&format!("/api/plants/{}/water", id))
            .reply(&api)
            .await;
        assert_eq!(resp.status(), StatusCode::OK);
    }
}
