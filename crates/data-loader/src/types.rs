//! Core domain types for the MovieLens dataset.
//!
//! This module defines the tables the case base is built from:
//! - Type aliases for domain clarity (UserId, MovieId)
//! - Users, movies and ratings as plain structs
//! - The closed genre vocabulary as an enum with a stable index
//! - `DataIndex`, the in-memory table with per-user and per-movie rating lookups

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// =============================================================================
// Type Aliases
// =============================================================================
// These make the domain clearer and prevent mixing up user IDs with movie IDs

/// Unique identifier for a user (1-6040 in MovieLens 1M)
pub type UserId = u32;

/// Unique identifier for a movie (varies in MovieLens 1M)
pub type MovieId = u32;

/// Lowest rating value accepted in the dataset
pub const MIN_RATING: f32 = 1.0;

/// Highest rating value accepted in the dataset
pub const MAX_RATING: f32 = 5.0;

// =============================================================================
// User-related Types
// =============================================================================

/// Represents a user in the MovieLens dataset.
///
/// The demographic fields are parsed and kept for display; the
/// recommender itself only uses the identifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub gender: Gender,
    pub age: AgeGroup,
    pub occupation: Occupation,
    pub zipcode: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Gender {
    Male,
    Female,
}

/// Age groups from the MovieLens dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AgeGroup {
    Under18,
    Age18To24,
    Age25To34,
    Age35To44,
    Age45To49,
    Age50To55,
    Age56Plus,
}

/// Occupation categories from MovieLens
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Occupation {
    Other,
    Academic,
    Artist,
    Clerical,
    CollegeStudent,
    CustomerService,
    Doctor,
    Executive,
    Farmer,
    Homemaker,
    K12Student,
    Lawyer,
    Programmer,
    Retired,
    Sales,
    Scientist,
    SelfEmployed,
    Technician,
    Tradesman,
    Unemployed,
    Writer,
}

// =============================================================================
// Movie-related Types
// =============================================================================

/// Represents a movie in the dataset
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Movie {
    pub id: MovieId,
    pub title: String,
    /// Year extracted from title (e.g., "Toy Story (1995)")
    pub year: Option<u16>,
    /// Genre tags, possibly empty
    pub genres: Vec<Genre>,
}

/// Movie genres from MovieLens.
///
/// This is the closed vocabulary used for genre similarity and for
/// indexing per-user willingness vectors (see [`Genre::index`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Genre {
    Action,
    Adventure,
    Animation,
    Children,
    Comedy,
    Crime,
    Documentary,
    Drama,
    Fantasy,
    FilmNoir,
    Horror,
    Musical,
    Mystery,
    Romance,
    SciFi,
    Thriller,
    War,
    Western,
}

impl Genre {
    /// Size of the vocabulary
    pub const COUNT: usize = 18;

    /// Every genre, ordered by [`Genre::index`]
    pub const ALL: [Genre; Genre::COUNT] = [
        Genre::Action,
        Genre::Adventure,
        Genre::Animation,
        Genre::Children,
        Genre::Comedy,
        Genre::Crime,
        Genre::Documentary,
        Genre::Drama,
        Genre::Fantasy,
        Genre::FilmNoir,
        Genre::Horror,
        Genre::Musical,
        Genre::Mystery,
        Genre::Romance,
        Genre::SciFi,
        Genre::Thriller,
        Genre::War,
        Genre::Western,
    ];

    /// Position of this genre in [`Genre::ALL`]
    pub fn index(self) -> usize {
        self as usize
    }

    /// The tag as written in `movies.dat`
    pub fn label(self) -> &'static str {
        match self {
            Genre::Action => "Action",
            Genre::Adventure => "Adventure",
            Genre::Animation => "Animation",
            Genre::Children => "Children's",
            Genre::Comedy => "Comedy",
            Genre::Crime => "Crime",
            Genre::Documentary => "Documentary",
            Genre::Drama => "Drama",
            Genre::Fantasy => "Fantasy",
            Genre::FilmNoir => "Film-Noir",
            Genre::Horror => "Horror",
            Genre::Musical => "Musical",
            Genre::Mystery => "Mystery",
            Genre::Romance => "Romance",
            Genre::SciFi => "Sci-Fi",
            Genre::Thriller => "Thriller",
            Genre::War => "War",
            Genre::Western => "Western",
        }
    }
}

// =============================================================================
// Rating Type
// =============================================================================

/// A single rating from a user for a movie.
///
/// In the recommender every rating is a "case": training ratings seed the
/// statistics, test ratings are replayed one at a time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rating {
    pub user_id: UserId,
    pub movie_id: MovieId,
    /// Rating value from 1.0 to 5.0
    pub rating: f32,
    /// Unix timestamp when rating was made
    pub timestamp: i64,
}

// =============================================================================
// Dataset - the three raw tables
// =============================================================================

/// The three MovieLens tables as parsed from disk, before any indexing.
///
/// The case base partitions `ratings` into training and test cases and only
/// indexes the training part.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub users: Vec<User>,
    pub movies: Vec<Movie>,
    pub ratings: Vec<Rating>,
}

// =============================================================================
// DataIndex - The Core In-Memory Table
// =============================================================================

/// Holds users, movies and the ratings currently in the case base.
///
/// Provides O(1) lookups for users, movies, and ratings through HashMap
/// indices. After construction the only mutation is
/// [`DataIndex::append_ratings`].
#[derive(Debug, Clone)]
pub struct DataIndex {
    // Primary data stores
    pub(crate) users: HashMap<UserId, User>,
    pub(crate) movies: HashMap<MovieId, Movie>,

    // Rating indices for fast lookups
    /// All ratings made by each user
    pub(crate) user_ratings: HashMap<UserId, Vec<Rating>>,
    /// All ratings received by each movie
    pub(crate) movie_ratings: HashMap<MovieId, Vec<Rating>>,

    pub(crate) rating_count: usize,
}

impl DataIndex {
    /// Creates a new, empty DataIndex
    pub fn new() -> Self {
        Self {
            users: HashMap::new(),
            movies: HashMap::new(),
            user_ratings: HashMap::new(),
            movie_ratings: HashMap::new(),
            rating_count: 0,
        }
    }

    /// Get a user by ID
    pub fn get_user(&self, id: UserId) -> Option<&User> {
        self.users.get(&id)
    }

    /// Get a movie by ID
    pub fn get_movie(&self, id: MovieId) -> Option<&Movie> {
        self.movies.get(&id)
    }

    /// Get all ratings made by a user
    ///
    /// Returns an empty slice if user has no ratings
    pub fn get_user_ratings(&self, user_id: UserId) -> &[Rating] {
        self.user_ratings
            .get(&user_id)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Get all ratings for a movie
    pub fn get_movie_ratings(&self, movie_id: MovieId) -> &[Rating] {
        self.movie_ratings
            .get(&movie_id)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Whether `user_id` has rated `movie_id`
    pub fn has_rated(&self, user_id: UserId, movie_id: MovieId) -> bool {
        self.get_user_ratings(user_id)
            .iter()
            .any(|r| r.movie_id == movie_id)
    }

    /// All user IDs, sorted
    pub fn user_ids(&self) -> Vec<UserId> {
        let mut ids: Vec<UserId> = self.users.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// All movie IDs, sorted
    pub fn movie_ids(&self) -> Vec<MovieId> {
        let mut ids: Vec<MovieId> = self.movies.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Number of indexed ratings
    pub fn rating_count(&self) -> usize {
        self.rating_count
    }

    /// Insert a user into the index
    pub fn insert_user(&mut self, user: User) {
        self.users.insert(user.id, user);
    }

    /// Insert a movie into the index
    pub fn insert_movie(&mut self, movie: Movie) {
        self.movies.insert(movie.id, movie);
    }

    /// Insert a rating and update indices
    pub fn insert_rating(&mut self, rating: Rating) {
        self.user_ratings
            .entry(rating.user_id)
            .or_default()
            .push(rating);

        self.movie_ratings
            .entry(rating.movie_id)
            .or_default()
            .push(rating);

        self.rating_count += 1;
    }

    /// Get counts for debugging/validation
    pub fn counts(&self) -> (usize, usize, usize) {
        (self.users.len(), self.movies.len(), self.rating_count)
    }
}

impl Default for DataIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_genre_position_matches_all() {
        for (i, genre) in Genre::ALL.iter().enumerate() {
            assert_eq!(genre.index(), i);
        }
        assert_eq!(Genre::ALL.len(), Genre::COUNT);
    }

    #[test]
    fn test_has_rated() {
        let mut index = DataIndex::new();
        index.insert_rating(Rating {
            user_id: 1,
            movie_id: 10,
            rating: 4.0,
            timestamp: 0,
        });

        assert!(index.has_rated(1, 10));
        assert!(!index.has_rated(1, 11));
        assert!(!index.has_rated(2, 10));
    }
}
