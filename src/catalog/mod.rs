//! Movie Catalog
//!
//! Read-only accessor over the set of playable movies. Filters by genre and
//! draws a movie uniformly at random. Holds no timing or round state.
//!
//! ## Module Structure
//!
//! - `movie`: Movie records, frame offsets, validation
//! - `genre`: Genre selector (`"Random"` or a tag)

pub mod movie;
pub mod genre;

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use crate::core::rng::DeterministicRng;

pub use genre::GenreFilter;
pub use movie::{Movie, MovieId, MovieRecord, FrameOffset};

/// Catalog bundled with the server.
const BUILTIN_CATALOG: &str = include_str!("builtin.json");

/// Catalog loading errors.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// Catalog file could not be read.
    #[error("Failed to read catalog {path}: {source}")]
    Io {
        /// File that failed
        path: String,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Catalog file is not valid JSON or has the wrong shape.
    #[error("Invalid catalog JSON: {0}")]
    Parse(#[from] serde_json::Error),

    /// A movie record breaks an invariant.
    #[error("Invalid movie {id}: {reason}")]
    InvalidMovie {
        /// Offending movie id
        id: String,
        /// What is wrong with it
        reason: String,
    },

    /// Two records share an id.
    #[error("Duplicate movie id {0}")]
    DuplicateId(String),
}

impl CatalogError {
    pub(crate) fn invalid(id: &str, reason: impl Into<String>) -> Self {
        CatalogError::InvalidMovie {
            id: id.to_string(),
            reason: reason.into(),
        }
    }
}

/// The full set of available movies, in insertion order.
#[derive(Clone, Debug, Default)]
pub struct Catalog {
    movies: Vec<Arc<Movie>>,
}

impl Catalog {
    /// Build a catalog from validated movies.
    pub fn new(movies: Vec<Movie>) -> Result<Self, CatalogError> {
        let mut seen = BTreeSet::new();
        for movie in &movies {
            if !seen.insert(movie.id.clone()) {
                return Err(CatalogError::DuplicateId(movie.id.0.clone()));
            }
        }

        Ok(Self {
            movies: movies.into_iter().map(Arc::new).collect(),
        })
    }

    /// Parse a catalog from a JSON array of movie records.
    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let records: Vec<MovieRecord> = serde_json::from_str(json)?;
        let movies = records
            .into_iter()
            .map(Movie::from_record)
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(movies)
    }

    /// Load a catalog file from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&json)
    }

    /// The bundled six-movie catalog.
    pub fn builtin() -> Result<Self, CatalogError> {
        Self::from_json(BUILTIN_CATALOG)
    }

    /// Number of movies.
    pub fn len(&self) -> usize {
        self.movies.len()
    }

    /// Whether the catalog has no movies.
    pub fn is_empty(&self) -> bool {
        self.movies.is_empty()
    }

    /// All movies, unfiltered.
    pub fn movies(&self) -> &[Arc<Movie>] {
        &self.movies
    }

    /// Distinct genre tags in first-seen order.
    pub fn genres(&self) -> Vec<String> {
        let mut seen = BTreeSet::new();
        self.movies
            .iter()
            .filter(|m| seen.insert(m.genre.as_str()))
            .map(|m| m.genre.clone())
            .collect()
    }

    /// Movies eligible under `genre`: exact tag match, or everything for `Random`.
    pub fn list_by_genre(&self, genre: &GenreFilter) -> Vec<Arc<Movie>> {
        self.movies
            .iter()
            .filter(|m| genre.accepts(&m.genre))
            .cloned()
            .collect()
    }

    /// Draw one eligible movie uniformly at random.
    ///
    /// Returns `None` when no movie matches `genre`.
    pub fn pick_random(&self, genre: &GenreFilter, rng: &mut DeterministicRng) -> Option<Arc<Movie>> {
        let eligible = self.list_by_genre(genre);
        rng.choose(&eligible).cloned()
    }
}

// =============================================================================
// TESTS
// =============================================================================
