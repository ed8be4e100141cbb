use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use warp::filters::BoxedFilter;
use warp::{Filter, Reply};

use super::{with_db, AppState};
use crate::db::Db;

/// Liveness and readiness probes for the cluster.
pub fn routes(state: AppState) -> BoxedFilter<(impl Reply,)> {
    let db = state.db.clone();
    let health = warp::path!("health").and(warp::get()).map(move || {
        warp::reply::json(&json!({
            "status": "healthy",
            "timestamp": Utc::now(),
            "uptime": state.started.elapsed().as_secs_f64(),
            "environment": state.config.environment,
            "version": env!("CARGO_PKG_VERSION"),
        }))
    });

    let live = warp::path!("health" / "live").and(warp::get()).map(|| {
        warp::reply::json(&json!({ "status": "alive", "timestamp": Utc::now() }))
    });

    // the store lives in memory, so once we serve requests it is loaded
    let ready = warp::path!("health" / "ready")
        .and(warp::get())
        .and(with_db(db))
        .then(|db: Arc<Db>| async move {
            let plants = db.read().await.plant_count();
            warp::reply::json(&json!({
                "status": "ready",
                "timestamp": Utc::now(),
                "checks": { "store": { "status": "loaded", "healthy": true, "plants": plants } },
            }))
        });

    health.or(live).or(ready).boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::test_support::{body, config, state_with};

    #[tokio::test]
    async fn health_reports_environment_and_version() {
        let api = routes(state_with(config(&["--environment", "production"])));
        let resp = warp::test::request().path("/health").reply(&api).await;

        let body = body(&resp);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["environment"], "production");
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
        assert!(body["uptime"].as_f64().unwrap() >= 0.0);
    }

    #[tokio::test]
    async fn readiness_lists_store_check() {
        let api = routes(state_with(config(&[])));
        let resp = warp::test::request().path("/health/ready").reply(&api).await;

        assert_eq!(resp.status(), 200);
        let body = body(&resp);
        assert_eq!(body["checks"]["store"]["healthy"], true);
        assert_eq!(body["checks"]["store"]["plants"], 6);
    }
}
