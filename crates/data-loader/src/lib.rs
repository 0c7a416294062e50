//! # Data Loader Crate
//!
//! Loads and indexes the MovieLens 1M dataset that the case base is built on.
//!
//! ## Main Components
//!
//! - **types**: Core domain types (User, Movie, Rating, Genre, Dataset, DataIndex)
//! - **parser**: Parse .dat files into Rust structs
//! - **index**: Validation, index construction and the append path
//! - **error**: Error types for data loading
//!
//! ## Example Usage
//!
//! ```ignore
//! use data_loader::{Dataset, DataIndex};
//! use std::path::Path;
//!
//! let dataset = Dataset::load_from_dir(Path::new("data/ml-1m"))?;
//! let index = DataIndex::from_parts(dataset.users, dataset.movies, dataset.ratings);
//!
//! let ratings = index.get_user_ratings(1);
//! println!("User 1 rated {} movies", ratings.len());
//! ```

pub mod error;
pub mod types;
pub mod parser;
pub mod index;

// Re-export commonly used types for convenience
pub use error::{DataLoadError, Result};
pub use types::{
    // Type aliases
    UserId,
    MovieId,
    // Core types
    User,
    Movie,
    Rating,
    Dataset,
    DataIndex,
    // Enums
    Gender,
    AgeGroup,
    Occupation,
    Genre,
    // Rating bounds
    MIN_RATING,
    MAX_RATING,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_index_creation() {
        let index = DataIndex::new();
        let (users, movies, ratings) = index.counts();

        assert_eq!(users, 0);
        assert_eq!(movies, 0);
        assert_eq!(ratings, 0);
    }

    #[test]
    fn test_insert_movie() {
        let mut index = DataIndex::new();

        index.insert_movie(Movie {
            id: 1,
            title: "Toy Story (1995)".to_string(),
            year: Some(1995),
            genres: vec![Genre::Animation, Genre::Children, Genre::Comedy],
        });

        let retrieved = index.get_movie(1).unwrap();
        assert_eq!(retrieved.year, Some(1995));
        assert_eq!(retrieved.genres.len(), 3);
    }

    #[test]
    fn test_insert_rating() {
        let mut index = DataIndex::new();

        index.insert_rating(Rating {
            user_id: 1,
            movie_id: 1193,
            rating: 5.0,
            timestamp: 978300760,
        });

        let user_ratings = index.get_user_ratings(1);
        assert_eq!(user_ratings.len(), 1);
        assert_eq!(user_ratings[0].rating, 5.0);
        assert_eq!(index.get_movie_ratings(1193).len(), 1);
        assert_eq!(index.rating_count(), 1);
    }

    #[test]
    fn test_empty_queries() {
        let index = DataIndex::new();

        assert!(index.get_user(999).is_none());
        assert!(index.get_movie(999).is_none());
        assert!(index.get_user_ratings(999).is_empty());
        assert!(index.get_movie_ratings(999).is_empty());
    }
}
