//! Movie catalog lookups.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use common::MovieId;
use serde::{Deserialize, Serialize};

use crate::error::ReservationError;

/// A movie as described by the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Movie {
    pub id: MovieId,
    pub name: String,
}

impl Movie {
    pub fn new(id: MovieId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

/// Read access to movie details.
#[async_trait]
pub trait Catalog: Send + Sync {
    async fn movie(&self, movie_id: MovieId) -> Result<Option<Movie>, ReservationError>;
}

#[derive(Debug, Default)]
struct CatalogState {
    movies: HashMap<MovieId, Movie>,
    fail_on_lookup: bool,
}

/// In-memory catalog for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    state: Arc<RwLock<CatalogState>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a movie.
    pub fn add_movie(&self, movie: Movie) {
        super::write(&self.state).movies.insert(movie.id, movie);
    }

    /// Configures the catalog to fail on the next lookups.
    pub fn set_fail_on_lookup(&self, fail: bool) {
        super::write(&self.state).fail_on_lookup = fail;
    }

    pub fn movie_count(&self) -> usize {
        super::read(&self.state).movies.len()
    }
}

#[async_trait]
impl Catalog for InMemoryCatalog {
    async fn movie(&self, movie_id: MovieId) -> Result<Option<Movie>, ReservationError> {
        let state = super::read(&self.state);
        if state.fail_on_lookup {
            return Err(ReservationError::Catalog(format!(
                "lookup of movie {movie_id} failed"
            )));
        }
        Ok(state.movies.get(&movie_id).cloned())
    }
}
