use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use warp::filters::BoxedFilter;
use warp::http::StatusCode;
use warp::{Filter, Rejection, Reply};

use super::{json_body, with_db};
use crate::db::{Db, GardenQuery};
use crate::error::ApiError;
use crate::models::{GardenPatch, NewGarden};

async fn list(query: GardenQuery, db: Arc<Db>) -> Result<impl Reply, Rejection> {
    let page = db.read().await.list_gardens(&query);
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
    let garden = db
        .read()
        .await
        .find_garden(&id)
        .map_err(ApiError::store("Error fetching garden"))?;
    Ok(warp::reply::json(&json!({ "success": true, "data": garden })))
}

async fn create(new: NewGarden, db: Arc<Db>) -> Result<impl Reply, Rejection> {
    let garden = db
        .write(|s| s.insert_garden(new, Utc::now()))
        .await
        .map_err(ApiError::store("Error creating garden"))?;
    Ok(warp::reply::with_status(
        warp::reply::json(&json!({
            "success": true,
            "message": "Garden created successfully",
            "data": garden,
        })),
        StatusCode::CREATED,
    ))
}

async fn update(id: String, patch: GardenPatch, db: Arc<Db>) -> Result<impl Reply, Rejection> {
    let garden = db
        .write(|s| s.update_garden(&id, patch, Utc::now()))
        .await
        .map_err(ApiError::store("Error updating garden"))?;
    Ok(warp::reply::json(&json!({
        "success": true,
        "message": "Garden updated successfully",
        "data": garden,
    })))
}

async fn add_plant(id: String, plant_id: String, db: Arc<Db>) -> Result<impl Reply, Rejection> {
    let garden = db
        .write(|s| s.add_plant_to_garden(&id, &plant_id, Utc::now()))
        .await
        .map_err(ApiError::store("Error adding plant to garden"))?;
    Ok(warp::reply::json(&json!({
        "success": true,
        "message": "Plant added to garden successfully",
        "data": garden,
    })))
}

async fn remove_plant(
    id: String,
    plant_id: String,
    db: Arc<Db>,
) -> Result<impl Reply, Rejection> {
    let garden = db
        .write(|s| s.remove_plant_from_garden(&id, &plant_id, Utc::now()))
        .await
        .map_err(ApiError::store("Error removing plant from garden"))?;
    Ok(warp::reply::json(&json!({
        "success": true,
        "message": "Plant removed from garden successfully",
        "data": garden,
    })))
}

async fn delete(id: String, db: Arc<Db>) -> Result<impl Reply, Rejection> {
    let garden = db
        .write(|s| s.delete_garden(&id))
        .await
        .map_err(ApiError::store("Error deleting garden"))?;
    Ok(warp::reply::json(&json!({
        "success": true,
        "message": "Garden deleted successfully",
        "data": garden,
    })))
}

/// `/api/gardens` resource.
pub fn routes(db: Arc<Db>) -> BoxedFilter<(impl Reply,)> {
    let list = warp::path!("api" / "gardens")
        .and(warp::get())
        .and(warp::query::<GardenQuery>())
        .and(with_db(db.clone()))
        .and_then(list);

    let create = warp::path!("api" / "gardens")
        .and(warp::post())
        .and(json_body::<NewGarden>())
        .and(with_db(db.clone()))
        .and_then(create);

    let get = warp::path!("api" / "gardens" / String)
        .and(warp::get())
        .and(with_db(db.clone()))
        .and_then(get);

    let update = warp::path!("api" / "gardens" / String)
        .and(warp::put())
        .and(json_body::<GardenPatch>())
        .and(with_db(db.clone()))
        .and_then(update);

    let delete = warp::path!("api" / "gardens" / String)
        .and(warp::delete())
        .and(with_db(db.clone()))
        .and_then(delete);

    let add_plant = warp::path!("api" / "gardens" / String / "plants" / String)
        .and(warp::post())
        .and(with_db(db.clone()))
        .and_then(add_plant);

    let remove_plant = warp::path!("api" / "gardens" / String / "plants" / String)
        .and(warp::delete())
        .and(with_db(db))
        .and_then(remove_plant);

    list.or(create)
        .or(get)
        .or(update)
        .or(delete)
        .or(add_plant)
        .or(remove_plant)
        .boxed()
}

#[cfg(test)]
mod tests {
    use serde_json::Value;
    use warp::http::StatusCode;

    use super::*;
    use crate::routes::test_support::{body, state};

    async fn first_id<F>(api: &F, path: &str) -> String
    where
        F: Filter + 'static,
        F::Extract: Reply + Send,
    {
        let resp = warp::test::request().path(path).reply(api).await;
        body(&resp)["data"][0]["_id"].as_str().unwrap().to_owned()
    }

    #[tokio::test]
    async fn list_is_populated_and_filterable() {
        let api = crate::routes::routes(state());
        let resp = warp::test::request()
            .path("/api/gardens?gardenType=herb")
            .reply(&api)
            .await;

        let body = body(&resp);
        assert_eq!(body["count"], 1);
        let herbs = &body["data"][0];
        assert_eq!(herbs["name"], "Herb Corner");
        assert_eq!(herbs["plantCount"], 2);
        assert!(herbs["plants"][0]["name"].is_string());
    }

    #[tokio::test]
    async fn create_update_delete() {
        let api = crate::routes::routes(state());
        let resp = warp::test::request()
            .method("POST")
            .path("/api/gardens")
            .json(&json!({ "name": "Roof Pots", "location": "rooftop" }))
            .reply(&api)
            .await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let created: Value = body(&resp)["data"].clone();
        let id = created["_id"].as_str().unwrap();
        assert_eq!(created["plantCount"], 0);

        let resp = warp::test::request()
            .method("PUT")
            .path(&format!("/api/gardens/{}", id))
            .json(&json!({ "isActive": false }))
            .reply(&api)
            .await;
        assert_eq!(body(&resp)["data"]["isActive"], false);

        let resp = warp::test::request()
            .method("DELETE")
            .path(&format!("/api/gardens/{}", id))
            .reply(&api)
            .await;
        let deleted = body(&resp);
        assert_eq!(deleted["message"], "Garden deleted successfully");
        assert_eq!(deleted["data"]["_id"], id);
        assert_eq!(deleted["data"]["plantCount"], 0);

        let resp = warp::test::request()
            .path(&format!("/api/gardens/{}", id))
            .reply(&api)
            .await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(body(&resp)["message"], "Garden not found");
    }

    #[tokio::test]
    async fn plants_are_added_once_and_removed() {
        let api = crate::routes::routes(state());
        let garden = first_id(&api, "/api/gardens?gardenType=herb").await;
        let plant = first_id(&api, "/api/plants?search=spinach").await;
        let path = format!("/api/gardens/{}/plants/{}", garden, plant);

        for _ in 0..2 {
            let resp = warp::test::request()
                .method("POST")
                .path(&path)
                .reply(&api)
                .await;
            assert_eq!(resp.status(), StatusCode::OK);
            assert_eq!(body(&resp)["data"]["plantCount"], 3);
        }

        let resp = warp::test::request()
            .method("DELETE")
            .path(&path)
            .reply(&api)
            .await;
        let body = body(&resp);
        assert_eq!(body["message"], "Plant removed from garden successfully");
        assert_eq!(body["data"]["plantCount"], 2);
    }

    #[tokio::test]
    async fn adding_unknown_plant_is_a_404() {
        let api = crate::routes::routes(state());
        let garden = first_id(&api, "/api/gardens").await;
        let resp = warp::test::request()
            .method("POST")
            .path(&format!("/api/gardens/{}/plants/plants_0_0", garden))
            .reply(&api)
            .await;

        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(body(&resp)["message"], "Plant not found");
    }
}
