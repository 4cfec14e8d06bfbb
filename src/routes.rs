use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
};
use sea_orm::TransactionTrait;
use serde_json::{Value, json};
use tracing::debug;

use crate::{
    AppState, catalog,
    error::{AppError, AppResult},
    models::{MovieCreate, MovieDetail, MovieList, MoviePatch},
    pagination::{Pagination, PaginationParams},
};

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/movies/", get(list_movies).post(create_movie))
        .route("/movies/{id}/", get(get_movie).patch(update_movie).delete(delete_movie))
}

pub async fn list_movies(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PaginationParams>,
) -> AppResult<Json<MovieList>> {
    let page = Pagination::from(params);
    debug!(page = page.page, per_page = page.per_page, "listing movies");

    let txn = state.db.begin().await?;
    let movies = catalog::list_movies(&txn, page).await?;
    let total = catalog::count_movies(&txn).await?;
    txn.commit().await?;

    let base = format!("{}/movies/", state.config.api_prefix);
    Ok(Json(MovieList {
        movies,
        total_items: total,
        total_pages: page.page_count(total),
        prev_page: page.prev_link(&base),
        next_page: page.next_link(&base, total),
    }))
}

pub async fn get_movie(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> AppResult<Json<MovieDetail>> {
    let txn = state.db.begin().await?;
    let movie =
        catalog::get_movie_by_id(&txn, id).await?.ok_or_else(AppError::movie_not_found)?;
    txn.commit().await?;
    Ok(Json(movie))
}

pub async fn create_movie(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<MovieCreate>,
) -> AppResult<(StatusCode, Json<MovieDetail>)> {
    let payload = payload.validate()?;
    let txn = state.db.begin().await?;
    let movie = catalog::create_movie(txn, payload).await?;
    Ok((StatusCode::CREATED, Json(movie)))
}

pub async fn update_movie(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
    Json(patch): Json<MoviePatch>,
) -> AppResult<Json<Value>> {
    let fields = patch.into_fields()?;
    let txn = state.db.begin().await?;
    catalog::update_movie(txn, id, fields).await?.ok_or_else(AppError::movie_not_found)?;
    Ok(Json(json!({ "detail": "Movie updated successfully." })))
}

pub async fn delete_movie(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> AppResult<StatusCode> {
    let txn = state.db.begin().await?;
    catalog::delete_movie(txn, id).await?.ok_or_else(AppError::movie_not_found)?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{Body, to_bytes},
        http::{Method, Request},
    };
    use tower::ServiceExt;

    use super::*;
    use crate::{config::Config, db};

    async fn app_with_prefix(api_prefix: &str) -> Router {
        let config = Config {
            addr: "127.0.0.1:0".parse().unwrap(),
            database_url: "sqlite::memory:".to_string(),
            api_prefix: api_prefix.to_string(),
        };
        let state = Arc::new(AppState { config: Arc::new(config), db: db::memory().await });
        crate::app(state)
    }

    async fn app() -> Router {
        app_with_prefix("").await
    }

    async fn send(
        app: &Router,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(json) => {
                request = request.header("content-type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        let response = app.clone().oneshot(request.body(body).unwrap()).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json =
            if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
        (status, json)
    }

    fn dune() -> Value {
        json!({
            "name": "Dune",
            "date": "2021-10-22",
            "score": 80,
            "overview": "Paul Atreides travels to Arrakis.",
            "status": "Released",
            "budget": 165000000,
            "revenue": 402000000,
            "country": "US",
            "genres": ["Sci-Fi"],
            "actors": ["Timothée Chalamet"],
            "languages": ["English"]
        })
    }

    fn titled(name: &str) -> Value {
        let mut movie = dune();
        movie["name"] = json!(name);
        movie
    }

    #[tokio::test]
    async fn dune_round_trip() {
        let app = app().await;

        let (status, created) = send(&app, Method::POST, "/movies/", Some(dune())).await;
        assert_eq!(status, StatusCode::CREATED);
        let id = created["id"].as_i64().unwrap();
        assert_eq!(created["name"], "Dune");
        assert_eq!(created["date"], "2021-10-22");
        assert_eq!(created["status"], "Released");
        assert_eq!(created["country"]["code"], "US");
        assert_eq!(created["genres"][0]["name"], "Sci-Fi");
        assert!(created["genres"][0]["id"].is_i64());

        let (status, fetched) = send(&app, Method::GET, &format!("/movies/{id}/"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched, created);
    }

    #[tokio::test]
    async fn alpha3_country_code_is_stored_upper_cased() {
        let app = app().await;
        let mut movie = dune();
        movie["country"] = json!("gbr");

        let (status, created) = send(&app, Method::POST, "/movies/", Some(movie)).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["country"]["code"], "GBR");

        let mut movie = titled("Arrival");
        movie["country"] = json!("GBRX");
        let (status, body) = send(&app, Method::POST, "/movies/", Some(movie)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["detail"], "country must be a 2- or 3-letter code, got 'GBRX'");
    }

    #[tokio::test]
    async fn patch_changes_only_score() {
        let app = app().await;
        let (_, created) = send(&app, Method::POST, "/movies/", Some(dune())).await;
        let uri = format!("/movies/{}/", created["id"]);

        let (status, body) = send(&app, Method::PATCH, &uri, Some(json!({ "score": 85 }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["detail"], "Movie updated successfully.");

        let (_, fetched) = send(&app, Method::GET, &uri, None).await;
        assert_eq!(fetched["score"], 85.0);
        assert_eq!(fetched["budget"], created["budget"]);
        assert_eq!(fetched["revenue"], created["revenue"]);
        assert_eq!(fetched["actors"], created["actors"]);
    }

    #[tokio::test]
    async fn delete_then_absent() {
        let app = app().await;
        let (_, created) = send(&app, Method::POST, "/movies/", Some(dune())).await;
        let uri = format!("/movies/{}/", created["id"]);

        let (status, body) = send(&app, Method::DELETE, &uri, None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert_eq!(body, Value::Null);

        let (status, body) = send(&app, Method::DELETE, &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["detail"], "Movie with the given ID was not found.");

        let (status, _) = send(&app, Method::GET, &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn missing_movie_is_404_everywhere() {
        let app = app().await;
        for method in [Method::GET, Method::DELETE] {
            let (status, _) = send(&app, method, "/movies/999/", None).await;
            assert_eq!(status, StatusCode::NOT_FOUND);
        }
        let (status, _) =
            send(&app, Method::PATCH, "/movies/999/", Some(json!({ "score": 1 }))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn duplicate_create_is_409() {
        let app = app().await;
        send(&app, Method::POST, "/movies/", Some(dune())).await;

        let (status, body) = send(&app, Method::POST, "/movies/", Some(dune())).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(
            body["detail"],
            "A movie with the name 'Dune' and release date '2021-10-22' already exists."
        );
    }

    #[tokio::test]
    async fn invalid_payloads_are_rejected() {
        let app = app().await;

        let mut movie = dune();
        movie["score"] = json!(101);
        let (status, _) = send(&app, Method::POST, "/movies/", Some(movie)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        let mut movie = dune();
        movie["status"] = json!("Cancelled");
        let (status, _) = send(&app, Method::POST, "/movies/", Some(movie)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        let mut movie = dune();
        movie["budget"] = json!(-1);
        let (status, body) = send(&app, Method::POST, "/movies/", Some(movie)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["detail"], "budget must be a non-negative number");

        let (status, _) = send(&app, Method::GET, "/movies/?page=1&per_page=10", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "nothing was created");
    }

    #[tokio::test]
    async fn patch_into_duplicate_is_400() {
        let app = app().await;
        send(&app, Method::POST, "/movies/", Some(dune())).await;
        let (_, other) = send(&app, Method::POST, "/movies/", Some(titled("Arrival"))).await;

        let uri = format!("/movies/{}/", other["id"]);
        let (status, body) =
            send(&app, Method::PATCH, &uri, Some(json!({ "name": "Dune" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["detail"], "Invalid input data.");
    }

    #[tokio::test]
    async fn empty_list_is_404() {
        let app = app().await;
        let (status, body) = send(&app, Method::GET, "/movies/", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["detail"], "No movies found.");
    }

    #[tokio::test]
    async fn list_paginates_with_links() {
        let app = app().await;
        for name in ["First", "Second", "Third"] {
            let (status, _) = send(&app, Method::POST, "/movies/", Some(titled(name))).await;
            assert_eq!(status, StatusCode::CREATED);
        }

        let (status, page1) = send(&app, Method::GET, "/movies/?page=1&per_page=2", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(page1["total_items"], 3);
        assert_eq!(page1["total_pages"], 2);
        assert_eq!(page1["prev_page"], Value::Null);
        assert_eq!(page1["next_page"], "/movies/?page=2&per_page=2");
        let names: Vec<_> =
            page1["movies"].as_array().unwrap().iter().map(|m| m["name"].clone()).collect();
        assert_eq!(names, vec![json!("Third"), json!("Second")]);
        assert!(page1["movies"][0].get("status").is_none());

        let (_, page2) = send(&app, Method::GET, "/movies/?page=2&per_page=2", None).await;
        assert_eq!(page2["movies"].as_array().unwrap().len(), 1);
        assert_eq!(page2["movies"][0]["name"], "First");
        assert_eq!(page2["prev_page"], "/movies/?page=1&per_page=2");
        assert_eq!(page2["next_page"], Value::Null);

        let (status, _) = send(&app, Method::GET, "/movies/?page=3&per_page=2", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (_, clamped) = send(&app, Method::GET, "/movies/?per_page=500", None).await;
        assert_eq!(clamped["total_pages"], 1);
        assert_eq!(clamped["movies"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn prefix_applies_to_routes_and_links() {
        let app = app_with_prefix("/theater").await;
        for name in ["First", "Second"] {
            send(&app, Method::POST, "/theater/movies/", Some(titled(name))).await;
        }

        let (status, page) =
            send(&app, Method::GET, "/theater/movies/?page=1&per_page=1", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(page["next_page"], "/theater/movies/?page=2&per_page=1");

        let (status, _) = send(&app, Method::GET, "/movies/", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
