use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use tracing::info;
use warp::filters::BoxedFilter;
use warp::{Filter, Rejection, Reply};

use super::{bearer_token, json_body, with_db};
use crate::db::Db;
use crate::error::ApiError;
use crate::models::Credentials;

async fn login(creds: Credentials, db: Arc<Db>) -> Result<impl Reply, Rejection> {
    if creds.username.is_empty() || creds.password.is_empty() {
        return Err(ApiError::bad_request("Username and password are required").into());
    }
    let (token, user, sessions) = db
        .write_volatile(|s| {
            s.login(&creds.username, &creds.password, Utc::now())
                .map(|(token, user)| (token, user, s.session_count()))
        })
        .await
        .ok_or_else(|| ApiError::Unauthorized("Invalid username or password".to_owned()))?;
    info!(user = %user.username, sessions, "login");
    Ok(warp::reply::json(&json!({
        "success": true,
        "message": "Login successful",
        "token": token,
        "user": user,
    })))
}

async fn logout(token: Option<String>, db: Arc<Db>) -> Result<impl Reply, Rejection> {
    if let Some(token) = token {
        db.write_volatile(|s| s.logout(&token)).await;
    }
    Ok(warp::reply::json(&json!({
        "success": true,
        "message": "Logged out successfully",
    })))
}

async fn verify(token: Option<String>, db: Arc<Db>) -> Result<impl Reply, Rejection> {
    let token = token.ok_or_else(|| ApiError::Unauthorized("No token provided".to_owned()))?;
    let user = db
        .read()
        .await
        .verify(&token)
        .ok_or_else(|| ApiError::Unauthorized("Invalid or expired token".to_owned()))?;
    Ok(warp::reply::json(&json!({ "success": true, "user": user })))
}

/// `/api/auth`: single-admin session tokens.
pub fn routes(db: Arc<Db>) -> BoxedFilter<(impl Reply,)> {
    let login = warp::path!("api" / "auth" / "login")
        .and(warp::post())
        .and(json_body::<Credentials>())
        .and(with_db(db.clone()))
        .and_then(login);

    let logout = warp::path!("api" / "auth" / "logout")
        .and(warp::post())
        .and(bearer_token())
        .and(with_db(db.clone()))
        .and_then(logout);

    let verify = warp::path!("api" / "auth" / "verify")
        .and(warp::get())
        .and(bearer_token())
        .and(with_db(db))
        .and_then(verify);

    login.or(logout).or(verify).boxed()
}
