//! Disk usage, quote proxies and the rendered changelog.

use std::convert::Infallible;
use std::path::{Path, PathBuf};
use std::time::Duration;

use pulldown_cmark::{html, Options, Parser};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, warn};
use warp::filters::BoxedFilter;
use warp::http::StatusCode;
use warp::{Filter, Reply};

use super::{with_state, AppState};

const UPSTREAM_TIMEOUT: Duration = Duration::from_secs(5);

/// Free and total bytes on the volume holding `path`.
#[cfg(unix)]
fn disk_usage(path: &Path) -> Option<(u64, u64)> {
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;

    let c_path = CString::new(path.as_os_str().as_bytes()).ok()?;
    let mut stat: libc::statvfs = unsafe { std::mem::zeroed() };
    if unsafe { libc::statvfs(c_path.as_ptr(), &mut stat) } != 0 {
        return None;
    }
    let block = stat.f_frsize as u64;
    Some((stat.f_bavail as u64 * block, stat.f_blocks as u64 * block))
}

#[cfg(not(unix))]
fn disk_usage(_path: &Path) -> Option<(u64, u64)> {
    None
}

async fn disk(state: AppState) -> Result<impl Reply, Infallible> {
    let dir: PathBuf = if state.config.upload_dir.exists() {
        state.config.upload_dir.clone()
    } else {
        PathBuf::from(".")
    };
    let (free, total) = tokio::task::spawn_blocking(move || disk_usage(&dir))
        .await
        .ok()
        .flatten()
        .unwrap_or_else(|| {
            warn!("disk usage unavailable");
            (0, 0)
        });
    Ok(warp::reply::json(&json!({ "free": free, "total": total })))
}

#[derive(Debug, Deserialize)]
struct AdviceResponse {
    slip: Option<Slip>,
}

#[derive(Debug, Deserialize)]
struct Slip {
    id: Option<u64>,
    advice: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ZenQuote {
    q: Option<String>,
    a: Option<String>,
}

fn upstream_message(err: &reqwest::Error) -> String {
    if err.is_timeout() {
        "Request timeout".to_owned()
    } else if err.is_decode() {
        "Failed to parse response".to_owned()
    } else {
        err.to_string()
    }
}

async fn fetch<T: serde::de::DeserializeOwned>(
    client: &reqwest::Client,
    url: &str,
) -> Result<T, reqwest::Error> {
    client
        .get(url)
        .timeout(UPSTREAM_TIMEOUT)
        .send()
        .await?
        .json::<T>()
        .await
}

async fn quote(state: AppState) -> Result<impl Reply, Infallible> {
    let reply = match fetch::<AdviceResponse>(&state.http, &state.config.advice_url).await {
        Ok(body) => {
            let slip = body.slip;
            let advice = slip
                .as_ref()
                .and_then(|s| s.advice.clone())
                .unwrap_or_else(|| "No advice available".to_owned());
            let id = slip.and_then(|s| s.id);
            warp::reply::with_status(
                warp::reply::json(&json!({ "advice": advice, "id": id })),
                StatusCode::OK,
            )
        }
        Err(e) => {
            error!("advice API error: {}", e);
            warp::reply::with_status(
                warp::reply::json(&json!({
                    "error": upstream_message(&e),
                    "advice": null,
                    "id": null,
                })),
                StatusCode::SERVICE_UNAVAILABLE,
            )
        }
    };
    Ok(reply)
}

async fn zenquote(state: AppState) -> Result<impl Reply, Infallible> {
    let reply = match fetch::<Vec<ZenQuote>>(&state.http, &state.config.zenquote_url).await {
        Ok(quotes) => {
            let first = quotes.into_iter().next();
            let quote = first
                .as_ref()
                .and_then(|q| q.q.clone())
                .unwrap_or_else(|| "No quote available".to_owned());
            let author = first
                .and_then(|q| q.a)
                .unwrap_or_else(|| "Unknown".to_owned());
            warp::reply::with_status(
                warp::reply::json(&json!({ "quote": quote, "author": author })),
                StatusCode::OK,
            )
        }
        Err(e) => {
            error!("ZenQuotes API error: {}", e);
            warp::reply::with_status(
                warp::reply::json(&json!({
                    "error": upstream_message(&e),
                    "quote": null,
                    "author": null,
                })),
                StatusCode::SERVICE_UNAVAILABLE,
            )
        }
    };
    Ok(reply)
}

fn render_markdown(text: &str) -> String {
    let parser = Parser::new_ext(text, Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH);
    let mut out = String::with_capacity(text.len() * 3 / 2);
    html::push_html(&mut out, parser);
    out
}

fn page(title: &str, content: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <title>{title}</title>\n</head>\n\
         <body>\n<main class=\"changelog\">\n{content}</main>\n</body>\n</html>\n"
    )
}

async fn changelog(state: AppState) -> Result<impl Reply, Infallible> {
    let content = match tokio::fs::read_to_string(&state.config.changelog).await {
        Ok(text) => render_markdown(&text),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            "<p>Changelog not found.</p>\n".to_owned()
        }
        Err(e) => {
            error!("error serving changelog: {}", e);
            "<p>Error loading changelog.</p>\n".to_owned()
        }
    };
    Ok(warp::reply::html(page("Changelog", &content)))
}

pub fn routes(state: AppState) -> BoxedFilter<(impl Reply,)> {
    let disk = warp::path!("api" / "system" / "disk")
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(disk);

    let quote = warp::path!("api" / "quote")
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(quote);

    let zenquote = warp::path!("api" / "zenquote")
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(zenquote);

    let changelog = warp::path!("changelog")
        .and(warp::get())
        .and(with_state(state))
        .and_then(changelog);

    disk.or(quote).or(zenquote).or(changelog).boxed()
}
