//! Movie catalog contract
//!
//! The catalog is an external collaborator; the engine only needs to turn
//! a movie id into metadata. Implementations must answer from memory -
//! `resolve` is called on the playback path and must not block on I/O.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::models::Movie;

pub trait MovieCatalog: Send + Sync {
    /// Resolve a movie id to its metadata, `None` when unknown
    fn resolve(&self, movie_id: &str) -> Option<Movie>;
}

/// In-memory catalog, seeded at startup (or by tests).
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    movies: RwLock<HashMap<String, Movie>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a movie
    pub fn register(&self, movie: Movie) {
        let mut movies = self.movies.write().unwrap_or_else(|e| e.into_inner());
        movies.insert(movie.id.clone(), movie);
    }

    pub fn len(&self) -> usize {
        self.movies
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl MovieCatalog for InMemoryCatalog {
    fn resolve(&self, movie_id: &str) -> Option<Movie> {
        let movies = self.movies.read().unwrap_or_else(|e| e.into_inner());
        movies.get(movie_id).cloned()
    }
}
