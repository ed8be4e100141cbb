use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use warp::filters::BoxedFilter;
use warp::http::StatusCode;
use warp::{Filter, Rejection, Reply};

use super::{json_body, with_db};
use crate::db::{Db, PlantQuery};
use crate::error::ApiError;
use crate::models::{AdvanceNotes, MediaKind, NewPlant, PlantPatch, Stage, StagePatch};

const INVALID_VERSION: &str = "Invalid version. Use v1, v2, v3, or v4";

fn stage_param(version: &str, message: &'static str) -> Result<Stage, Rejection> {
    Stage::parse(&version.to_ascii_lowercase())
        .ok_or_else(|| ApiError::bad_request(message).into())
}

/// 404s before any path parameter is validated.
async fn ensure_plant(db: &Db, id: &str, context: &'static str) -> Result<(), Rejection> {
    db.read()
        .await
        .find_plant(id)
        .map_err(ApiError::store(context))?;
    Ok(())
}

async fn list(query: PlantQuery, db: Arc<Db>) -> Result<impl Reply, Rejection> {
    let page = db.read().await.list_plants(&query);
    Ok(warp::reply::json(&json!({
        "success": true,
        "count": page.items.len(),
        "total": page.total,
        "page": page.page,
        "pages": page.pages,
        "data": page.items,
    })))
}

async fn get(id: String, db: Arc<Db>) -> Result<impl Reply, Rejection> {
    let store = db.read().await;
    let plant = store.find_plant(&id).map_err(ApiError::store("Error fetching plant"))?;
    Ok(warp::reply::json(&json!({ "success": true, "data": plant })))
}

async fn create(new: NewPlant, db: Arc<Db>) -> Result<impl Reply, Rejection> {
    let plant = db
        .write(|s| s.insert_plant(new, Utc::now()))
        .await
        .map_err(ApiError::store("Error creating plant"))?;
    Ok(warp::reply::with_status(
        warp::reply::json(&json!({
            "success": true,
            "message": "Plant created successfully",
            "data": plant,
        })),
        StatusCode::CREATED,
    ))
}

async fn update(id: String, patch: PlantPatch, db: Arc<Db>) -> Result<impl Reply, Rejection> {
    let plant = db
        .write(|s| s.update_plant(&id, patch, Utc::now()))
        .await
        .map_err(ApiError::store("Error updating plant"))?;
    Ok(warp::reply::json(&json!({
        "success": true,
        "message": "Plant updated successfully",
        "data": plant,
    })))
}

async fn update_version(
    id: String,
    version: String,
    patch: StagePatch,
    db: Arc<Db>,
) -> Result<impl Reply, Rejection> {
    ensure_plant(&db, &id, "Error updating version").await?;
    let stage = stage_param(&version, INVALID_VERSION)?;
    let plant = db
        .write(|s| s.update_stage(&id, stage, patch, Utc::now()))
        .await
        .map_err(ApiError::store("Error updating version"))?;
    Ok(warp::reply::json(&json!({
        "success": true,
        "message": format!("Version {} updated successfully", stage),
        "data": plant,
    })))
}

async fn delete_media(
    id: String,
    version: String,
    media: String,
    db: Arc<Db>,
) -> Result<impl Reply, Rejection> {
    ensure_plant(&db, &id, "Error deleting media").await?;
    let stage = stage_param(&version, "Invalid version")?;
    let kind = MediaKind::parse(&media.to_ascii_lowercase()).ok_or_else(|| {
        ApiError::bad_request("Invalid media type. Use image, video, or file")
    })?;
    let plant = db
        .write(|s| s.clear_stage_media(&id, stage, kind, Utc::now()))
        .await
        .map_err(ApiError::store("Error deleting media"))?;
    Ok(warp::reply::json(&json!({
        "success": true,
        "message": format!("{} deleted successfully", kind.label()),
        "data": plant,
    })))
}

async fn advance(id: String, body: AdvanceNotes, db: Arc<Db>) -> Result<impl Reply, Rejection> {
    let plant = db
        .write(|s| s.advance_plant(&id, body.notes, Utc::now()))
        .await
        .map_err(ApiError::store("Error advancing plant"))?;
    Ok(warp::reply::json(&json!({
        "success": true,
        "message": format!("Plant advanced to {}", plant.current_version),
        "data": plant,
    })))
}

async fn water(id: String, db: Arc<Db>) -> Result<impl Reply, Rejection> {
    let plant = db
        .write(|s| s.water_plant(&id, Utc::now()))
        .await
        .map_err(ApiError::store("Error watering plant"))?;
    Ok(warp::reply::json(&json!({
        "success": true,
        "message": "Plant watered successfully",
        "data": plant,
    })))
}

async fn delete(id: String, db: Arc<Db>) -> Result<impl Reply, Rejection> {
    let plant = db
        .write(|s| s.delete_plant(&id))
        .await
        .map_err(ApiError::store("Error deleting plant"))?;
    Ok(warp::reply::json(&json!({
        "success": true,
        "message": "Plant deleted successfully",
        "data": plant,
    })))
}

async fn by_version(version: String, db: Arc<Db>) -> Result<impl Reply, Rejection> {
    let plants = db.read().await.plants_at_stage(&version.to_ascii_lowercase());
    Ok(warp::reply::json(&json!({
        "success": true,
        "count": plants.len(),
        "data": plants,
    })))
}

async fn needs_water(db: Arc<Db>) -> Result<impl Reply, Rejection> {
    let plants = db.read().await.plants_needing_water(Utc::now());
    Ok(warp::reply::json(&json!({
        "success": true,
        "count": plants.len(),
        "data": plants,
    })))
}

/// `/api/plants` resource.
pub fn routes(db: Arc<Db>) -> BoxedFilter<(impl Reply,)> {
    let list = warp::path!("api" / "plants")
        .and(warp::get())
        .and(warp::query::<PlantQuery>())
        .and(with_db(db.clone()))
        .and_then(list);

    let create = warp::path!("api" / "plants")
        .and(warp::post())
        .and(json_body::<NewPlant>())
        .and(with_db(db.clone()))
        .and_then(create);

    let by_version = warp::path!("api" / "plants" / "filter" / "by-version" / String)
        .and(warp::get())
        .and(with_db(db.clone()))
        .and_then(by_version);

    let needs_water = warp::path!("api" / "plants" / "status" / "needs-water")
        .and(warp::get())
        .and(with_db(db.clone()))
        .and_then(needs_water);

    let get = warp::path!("api" / "plants" / String)
        .and(warp::get())
        .and(with_db(db.clone()))
        .and_then(get);

    let update = warp::path!("api" / "plants" / String)
        .and(warp::put())
        .and(json_body::<PlantPatch>())
        .and(with_db(db.clone()))
        .and_then(update);

    let delete = warp::path!("api" / "plants" / String)
        .and(warp::delete())
        .and(with_db(db.clone()))
        .and_then(delete);

    let update_version = warp::path!("api" / "plants" / String / "version" / String)
        .and(warp::patch())
        .and(json_body::<StagePatch>())
        .and(with_db(db.clone()))
        .and_then(update_version);

    let delete_media =
        warp::path!("api" / "plants" / String / "version" / String / "media" / String)
            .and(warp::delete())
            .and(with_db(db.clone()))
            .and_then(delete_media);

    let advance = warp::path!("api" / "plants" / String / "advance")
        .and(warp::patch())
        .and(json_body::<AdvanceNotes>())
        .and(with_db(db.clone()))
        .and_then(advance);

    let water = warp::path!("api" / "plants" / String / "water")
        .and(warp::patch())
        .and(with_db(db))
        .and_then(water);

    list.or(create)
        .or(by_version)
        .or(needs_water)
        .or(get)
        .or(update)
        .or(delete)
        .or(update_version)
        .or(delete_media)
        .or(advance)
        .or(water)
        .boxed()
}

#[cfg(test)]
mod tests {
    use serde_json::Value;
    use warp::http::StatusCode;

    use super::*;
    use crate::routes::test_support::{body, state};

    fn api() -> BoxedFilter<(impl Reply,)> {
        crate::routes::routes(state())
    }

    async fn create_plant<F>(api: &F, payload: Value) -> Value
    where
        F: Filter + 'static,
        F::Extract: Reply + Send,
    {
        let resp = warp::test::request()
            .method("POST")
            .path("/api/plants")
            .json(&payload)
            .reply(api)
            .await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        body(&resp)["data"].clone()
    }

    #[tokio::test]
    async fn list_returns_seeded_plants_with_paging() {
        let api = api();
        let resp = warp::test::request()
            .path("/api/plants?limit=4&page=2")
            .reply(&api)
            .await;

        assert_eq!(resp.status(), StatusCode::OK);
        let body = body(&resp);
        assert_eq!(body["total"], 6);
        assert_eq!(body["pages"], 2);
        assert_eq!(body["count"], 2);
    }

    #[tokio::test]
    async fn bad_enum_in_query_is_rejected() {
        let api = api();
        let resp = warp::test::request()
            .path("/api/plants?location=moon")
            .reply(&api)
            .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn create_then_fetch() {
        let api = api();
        let plant = create_plant(&api, json!({ "name": "Arugula", "location": "balcony" })).await;
        let id = plant["_id"].as_str().unwrap();
        assert!(id.starts_with("plants_"));

        let resp = warp::test::request()
            .path(&format!("/api/plants/{}", id))
            .reply(&api)
            .await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body(&resp)["data"]["location"], "balcony");
    }

    #[tokio::test]
    async fn create_without_name_is_a_400() {
        let api = api();
        let resp = warp::test::request()
            .method("POST")
            .path("/api/plants")
            .json(&json!({ "species": "Nope" }))
            .reply(&api)
            .await;

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body = body(&resp);
        assert_eq!(body["message"], "Error creating plant");
        assert_eq!(body["error"], "Plant name is required");
    }

    #[tokio::test]
    async fn missing_plant_is_a_404() {
        let api = api();
        let resp = warp::test::request()
            .path("/api/plants/plants_0_0")
            .reply(&api)
            .await;

        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(body(&resp)["message"], "Plant not found");
    }

    #[tokio::test]
    async fn advance_until_fully_grown() {
        let api = api();
        let plant = create_plant(&api, json!({ "name": "Kale", "currentVersion": "v3" })).await;
        let path = format!("/api/plants/{}/advance", plant["_id"].as_str().unwrap());

        let resp = warp::test::request()
            .method("PATCH")
            .path(&path)
            .reply(&api)
            .await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body(&resp)["message"], "Plant advanced to V4");

        let resp = warp::test::request()
            .method("PATCH")
            .path(&path)
            .reply(&api)
            .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body(&resp)["message"], "Plant is already at V4 (fully grown)");
    }

    #[tokio::test]
    async fn version_routes_validate_params() {
        let api = api();
        let plant = create_plant(&api, json!({ "name": "Chard" })).await;
        let id = plant["_id"].as_str().unwrap();

        let resp = warp::test::request()
            .method("PATCH")
            .path(&format!("/api/plants/{}/version/v9", id))
            .json(&json!({ "notes": "x" }))
            .reply(&api)
            .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body(&resp)["message"], INVALID_VERSION);

        let resp = warp::test::request()
            .method("PATCH")
            .path(&format!("/api/plants/{}/version/v2", id))
            .json(&json!({ "image": "/uploads/sprout.jpg" }))
            .reply(&api)
            .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body_v2 = body(&resp);
        assert_eq!(body_v2["message"], "Version V2 updated successfully");
        assert_eq!(body_v2["data"]["currentVersion"], "v2");

        let resp = warp::test::request()
            .method("DELETE")
            .path(&format!("/api/plants/{}/version/v2/media/sound", id))
            .reply(&api)
            .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = warp::test::request()
            .method("DELETE")
            .path(&format!("/api/plants/{}/version/v9/media/image", id))
            .reply(&api)
            .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body(&resp)["message"], "Invalid version");

        let resp = warp::test::request()
            .method("DELETE")
            .path(&format!("/api/plants/{}/version/v2/media/image", id))
            .reply(&api)
            .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let cleared = body(&resp);
        assert_eq!(cleared["message"], "Image deleted successfully");
        assert!(cleared["data"]["versions"]["v2"]["image"].is_null());
    }

    #[tokio::test]
    async fn unknown_plant_wins_over_bad_version() {
        let api = api();
        let resp = warp::test::request()
            .method("PATCH")
            .path("/api/plants/plants_0_0/version/v9")
            .json(&json!({ "notes": "x" }))
            .reply(&api)
            .await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(body(&resp)["message"], "Plant not found");

        let resp = warp::test::request()
            .method("DELETE")
            .path("/api/plants/plants_0_0/version/v9/media/image")
            .reply(&api)
            .await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn water_then_delete() {
        let api = api();
        let plant = create_plant(&api, json!({ "name": "Sorrel" })).await;
        let id = plant["_id"].as_str().unwrap();

        let resp = warp::test::request()
            .method("PATCH")
            .path(&format!("/api/plants/{}/water", id))
            .reply(&api)
            .await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(body(&resp)["data"]["nextWatering"].is_string());

        let resp = warp::test::request()
            .method("DELETE")
            .path(&format!("/api/plants/{}", id))
            .reply(&api)
            .await;
        let deleted = body(&resp);
        assert_eq!(deleted["message"], "Plant deleted successfully");
        assert_eq!(deleted["data"]["_id"], id);
        assert_eq!(deleted["data"]["name"], "Sorrel");

        let resp = warp::test::request()
            .method("DELETE")
            .path(&format!("/api/plants/{}", id))
            .reply(&api)
            .await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn filter_by_version_counts_matches() {
        let api = api();
        let resp = warp::test::request()
            .path("/api/plants/filter/by-version/v4")
            .reply(&api)
            .await;

        let body = body(&resp);
        assert_eq!(body["count"], 2);
        assert!(body["data"]
            .as_array()
            .unwrap()
            .iter()
            .all(|p| p["currentVersion"] == "v4"));
    }

    #[tokio::test]
    async fn needs_water_is_empty_for_fresh_seed() {
        let api = api();
        let resp = warp::test::request()
            .path("/api/plants/status/needs-water")
            .reply(&api)
            .await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body(&resp)["count"], 0);
    }
}
