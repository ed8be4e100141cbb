use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use warp::filters::BoxedFilter;
use warp::http::StatusCode;
use warp::{Filter, Rejection, Reply};

use super::{json_body, with_db};
use crate::db::Db;
use crate::error::ApiError;
use crate::models::{LayoutPatch, NewLayout};

async fn list(db: Arc<Db>) -> Result<impl Reply, Rejection> {
    let layouts = db.read().await.active_layouts();
    Ok(warp::reply::json(&json!({
        "success": true,
        "count": layouts.len(),
        "data": layouts,
    })))
}

async fn get(id: String, db: Arc<Db>) -> Result<impl Reply, Rejection> {
    let store = db.read().await;
    let layout = store
        .find_layout(&id)
        .map_err(ApiError::store("Error fetching layout"))?;
    Ok(warp::reply::json(&json!({ "success": true, "data": layout })))
}

async fn create(new: NewLayout, db: Arc<Db>) -> Result<impl Reply, Rejection> {
    let layout = db
        .write(|s| s.insert_layout(new, Utc::now()))
        .await
        .map_err(ApiError::store("Error creating layout"))?;
    Ok(warp::reply::with_status(
        warp::reply::json(&json!({
            "success": true,
            "message": "Layout created successfully",
            "data": layout,
        })),
        StatusCode::CREATED,
    ))
}

async fn update(id: String, patch: LayoutPatch, db: Arc<Db>) -> Result<impl Reply, Rejection> {
    let layout = db
        .write(|s| s.update_layout(&id, patch, Utc::now()))
        .await
        .map_err(ApiError::store("Error updating layout"))?;
    Ok(warp::reply::json(&json!({
        "success": true,
        "message": "Layout updated successfully",
        "data": layout,
    })))
}

async fn delete(id: String, db: Arc<Db>) -> Result<impl Reply, Rejection> {
    let layout = db
        .write(|s| s.delete_layout(&id))
        .await
        .map_err(ApiError::store("Error deleting layout"))?;
    Ok(warp::reply::json(&json!({
        "success": true,
        "message": "Layout deleted successfully",
        "data": layout,
    })))
}

/// `/api/layouts` resource.
pub fn routes(db: Arc<Db>) -> BoxedFilter<(impl Reply,)> {
    let list = warp::path!("api" / "layouts")
        .and(warp::get())
        .and(with_db(db.clone()))
        .and_then(list);

    let create = warp::path!("api" / "layouts")
        .and(warp::post())
        .and(json_body::<NewLayout>())
        .and(with_db(db.clone()))
        .and_then(create);

    let get = warp::path!("api" / "layouts" / String)
        .and(warp::get())
        .and(with_db(db.clone()))
        .and_then(get);

    let update = warp::path!("api" / "layouts" / String)
        .and(warp::put())
        .and(json_body::<LayoutPatch>())
        .and(with_db(db.clone()))
        .and_then(update);

    let delete = warp::path!("api" / "layouts" / String)
        .and(warp::delete())
        .and(with_db(db))
        .and_then(delete);

    list.or(create).or(get).or(update).or(delete).boxed()
}

#[cfg(test)]
mod tests {
    use warp::http::StatusCode;

    use super::*;
    use crate::routes::test_support::{body, state};

    #[tokio::test]
    async fn new_layout_goes_last() {
        let api = crate::routes::routes(state());
        let resp = warp::test::request()
            .method("POST")
            .path("/api/layouts")
            .json(&json!({ "name": "Window Box", "cropType": "herbs" }))
            .reply(&api)
            .await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        assert_eq!(body(&resp)["data"]["position"], 4);

        let resp = warp::test::request().path("/api/layouts").reply(&api).await;
        let body = body(&resp);
        assert_eq!(body["count"], 4);
        assert_eq!(body["data"][3]["name"], "Window Box");
    }

    #[tokio::test]
    async fn deactivated_layout_drops_out_of_list() {
        let api = crate::routes::routes(state());
        let resp = warp::test::request().path("/api/layouts").reply(&api).await;
        let id = body(&resp)["data"][0]["_id"].as_str().unwrap().to_owned();

        let resp = warp::test::request()
            .method("PUT")
            .path(&format!("/api/layouts/{}", id))
            .json(&json!({ "isActive": false }))
            .reply(&api)
            .await;
        assert_eq!(body(&resp)["message"], "Layout updated successfully");

        let resp = warp::test::request().path("/api/layouts").reply(&api).await;
        assert_eq!(body(&resp)["count"], 2);

        // still reachable directly
        let resp = warp::test::request()
            .path(&format!("/api/layouts/{}", id))
            .reply(&api)
            .await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn delete_echoes_the_removed_layout() {
        let api = crate::routes::routes(state());
        let resp = warp::test::request().path("/api/layouts").reply(&api).await;
        let first = body(&resp)["data"][0].clone();
        let id = first["_id"].as_str().unwrap();

        let resp = warp::test::request()
            .method("DELETE")
            .path(&format!("/api/layouts/{}", id))
            .reply(&api)
            .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let deleted = body(&resp);
        assert_eq!(deleted["message"], "Layout deleted successfully");
        assert_eq!(deleted["data"]["_id"], id);
        assert_eq!(deleted["data"]["name"], first["name"]);

        let resp = warp::test::request()
            .path(&format!("/api/layouts/{}", id))
            .reply(&api)
            .await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn unknown_layout_is_a_404() {
        let api = crate::routes::routes(state());
        let resp = warp::test::request()
            .method("DELETE")
            .path("/api/layouts/layouts_0_0")
            .reply(&api)
            .await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(body(&resp)["message"], "Layout not found");
    }
}
