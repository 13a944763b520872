use axum::extract::{Query, State};
use axum::response::Response;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::models::Event;
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::response::view;

pub const CAROUSEL_SIZE: usize = 3;

#[derive(Debug, Default, Deserialize)]
pub struct CatalogQuery {
    pub genre: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
}

#[derive(Serialize)]
struct CatalogView {
    selected_genre: Option<String>,
    genres: Vec<String>,
    carousel: Vec<Event>,
    events: Vec<Event>,
}

#[derive(Serialize)]
struct SearchView {
    query: String,
    results: Vec<Event>,
}

fn pick_carousel(events: &[Event]) -> Vec<Event> {
    events
        .choose_multiple(&mut rand::thread_rng(), CAROUSEL_SIZE)
        .cloned()
        .collect()
}

pub async fn list_events(
    State(state): State<AppState>,
    Query(query): Query<CatalogQuery>,
) -> Result<Response, AppError> {
    let genre = query
        .genre
        .map(|g| g.trim().to_string())
        .filter(|g| !g.is_empty());

    let events = state.store.list_events(genre.as_deref()).await?;
    // The carousel always samples the whole catalog.
    let carousel = match genre {
        Some(_) => pick_carousel(&state.store.list_events(None).await?),
        None => pick_carousel(&events),
    };
    let genres = state.store.list_genres().await?;

    tracing::debug!(genre = ?genre, count = events.len(), "Listing events");

    Ok(view(CatalogView {
        selected_genre: genre,
        genres,
        carousel,
        events,
    }))
}

/// An empty query returns no results rather than the whole catalog.
pub async fn search_events(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Response, AppError> {
    let q = query.q.unwrap_or_default().trim().to_string();
    let results = if q.is_empty() {
        Vec::new()
    } else {
        state.store.search_events(&q).await?
    };

    tracing::debug!(query = %q, count = results.len(), "Searched events");

    Ok(view(SearchView { query: q, results }))
}
