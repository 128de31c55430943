use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{
    error::AppResult,
    middleware::request_id::RequestId,
    models::{MovieDetails, PopularMovie, SimilarMoviesResponse, SimilarityResponse},
};

use super::AppState;

// Query types

#[derive(Debug, Deserialize)]
pub struct SimilarQuery {
    pub k: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct PopularQuery {
    #[serde(default = "default_popular_k")]
    pub k: usize,
    #[serde(default = "default_min_avg_rating")]
    pub min_avg_rating: f64,
    #[serde(default = "default_min_rating_count")]
    pub min_rating_count: usize,
}

fn default_popular_k() -> usize {
    10
}

fn default_min_avg_rating() -> f64 {
    3.5
}

fn default_min_rating_count() -> usize {
    100
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub title: String,
}

#[derive(Debug, Deserialize)]
pub struct SimilarityQuery {
    pub a: i64,
    pub b: i64,
}

// Handlers

/// Health check endpoint, also reporting whether the engine is built
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    (
        StatusCode::OK,
        Json(json!({ "status": "healthy", "ready": state.is_ready() })),
    )
}

/// Catalog entry and rating statistics for one movie
pub async fn get_movie(
    State(state): State<AppState>,
    Path(item_id): Path<i64>,
) -> AppResult<Json<MovieDetails>> {
    let recommender = state.recommender().await?;
    Ok(Json(recommender.details(item_id)?))
}

/// Exact title lookup
pub async fn search_movies(
    State(state): State<AppState>,
    Query(params): Query<SearchQuery>,
) -> AppResult<Json<MovieDetails>> {
    let recommender = state.recommender().await?;
    let movie = recommender.find_by_title(&params.title)?;
    Ok(Json(recommender.details(movie.item_id)?))
}

/// Movies most similar to a seed movie
pub async fn similar_movies(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Path(item_id): Path<i64>,
    Query(params): Query<SimilarQuery>,
) -> AppResult<Json<SimilarMoviesResponse>> {
    let k = params.k.unwrap_or(state.config().default_top_k);

    tracing::info!(
        request_id = %request_id,
        item_id,
        k,
        "Processing similar movies request"
    );

    let recommender = state.recommender().await?;
    let seed = recommender.movie(item_id)?.clone();
    let recommendations = recommender.top_k_similar_scored(item_id, k)?;

    tracing::info!(
        request_id = %request_id,
        returned = recommendations.len(),
        "Similar movies ranked"
    );

    Ok(Json(SimilarMoviesResponse {
        seed,
        recommendations,
    }))
}

/// Best-rated movies above the popularity thresholds
pub async fn popular_movies(
    State(state): State<AppState>,
    Query(params): Query<PopularQuery>,
) -> AppResult<Json<Vec<PopularMovie>>> {
    let recommender = state.recommender().await?;
    let popular =
        recommender.popular_movies(params.k, params.min_avg_rating, params.min_rating_count)?;
    Ok(Json(popular))
}

/// Direct similarity between two movies
pub async fn similarity(
    State(state): State<AppState>,
    Query(params): Query<SimilarityQuery>,
) -> AppResult<Json<SimilarityResponse>> {
    let recommender = state.recommender().await?;
    let similarity = recommender.similarity(params.a, params.b)?;
    Ok(Json(SimilarityResponse {
        a: params.a,
        b: params.b,
        similarity,
    }))
}
