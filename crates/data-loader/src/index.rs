//! Loading, validation and DataIndex construction.
//!
//! - `Dataset::load_from_dir` parses and validates the three tables
//! - `DataIndex::from_parts` builds the lookup indices over a subset of ratings
//! - `DataIndex::append_ratings` is the single growth path used by the case base

use crate::error::{DataLoadError, Result};
use crate::parser;
use crate::types::*;
use rayon::prelude::*;
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info};

impl Dataset {
    /// Load the MovieLens dataset from a directory
    ///
    /// Expects `users.dat`, `movies.dat` and `ratings.dat` in `data_dir`.
    /// The three files are parsed in parallel, then validated.
    pub fn load_from_dir(data_dir: &Path) -> Result<Self> {
        info!("Loading MovieLens dataset from {:?}", data_dir);

        let users_path = data_dir.join("users.dat");
        let movies_path = data_dir.join("movies.dat");
        let ratings_path = data_dir.join("ratings.dat");

        // Nested joins give three-way parallelism
        let ((users, movies), ratings) = rayon::join(
            || {
                rayon::join(
                    || parser::parse_users(&users_path),
                    || parser::parse_movies(&movies_path),
                )
            },
            || parser::parse_ratings(&ratings_path),
        );

        let dataset = Dataset {
            users: users?,
            movies: movies?,
            ratings: ratings?,
        };

        info!(
            "Loaded {} users, {} movies, {} ratings",
            dataset.users.len(),
            dataset.movies.len(),
            dataset.ratings.len()
        );

        dataset.validate()?;
        Ok(dataset)
    }

    /// Validate data integrity
    ///
    /// Checks that:
    /// - no table is empty
    /// - every rating references a known user and a known movie
    /// - every rating value lies in [MIN_RATING, MAX_RATING]
    pub fn validate(&self) -> Result<()> {
        if self.users.is_empty() {
            return Err(DataLoadError::EmptyTable("users".to_string()));
        }
        if self.movies.is_empty() {
            return Err(DataLoadError::EmptyTable("movies".to_string()));
        }
        if self.ratings.is_empty() {
            return Err(DataLoadError::EmptyTable("ratings".to_string()));
        }

        let user_ids: HashSet<UserId> = self.users.iter().map(|u| u.id).collect();
        let movie_ids: HashSet<MovieId> = self.movies.iter().map(|m| m.id).collect();

        for rating in &self.ratings {
            if !user_ids.contains(&rating.user_id) {
                return Err(DataLoadError::MissingReference {
                    entity: "User".to_string(),
                    id: rating.user_id,
                });
            }
            if !movie_ids.contains(&rating.movie_id) {
                return Err(DataLoadError::MissingReference {
                    entity: "Movie".to_string(),
                    id: rating.movie_id,
                });
            }
            if !(MIN_RATING..=MAX_RATING).contains(&rating.rating) {
                return Err(DataLoadError::InvalidValue {
                    field: "rating".to_string(),
                    value: rating.rating.to_string(),
                });
            }
        }

        debug!("Dataset validated");
        Ok(())
    }
}

impl DataIndex {
    /// Build an index over every user and movie but only the given ratings
    pub fn from_parts(
        users: impl IntoIterator<Item = User>,
        movies: impl IntoIterator<Item = Movie>,
        ratings: impl IntoIterator<Item = Rating>,
    ) -> Self {
        let mut index = DataIndex::new();

        for user in users {
            index.insert_user(user);
        }
        for movie in movies {
            index.insert_movie(movie);
        }
        for rating in ratings {
            index.insert_rating(rating);
        }

        index
    }

    /// Append a batch of ratings to the index.
    ///
    /// Rejects the whole batch if any rating is out of range or references
    /// an unknown user or movie, so a failed append leaves the index as it was.
    pub fn append_ratings(&mut self, ratings: &[Rating]) -> Result<()> {
        for rating in ratings {
            if !self.users.contains_key(&rating.user_id) {
                return Err(DataLoadError::MissingReference {
                    entity: "User".to_string(),
                    id: rating.user_id,
                });
            }
            if !self.movies.contains_key(&rating.movie_id) {
                return Err(DataLoadError::MissingReference {
                    entity: "Movie".to_string(),
                    id: rating.movie_id,
                });
            }
            if !(MIN_RATING..=MAX_RATING).contains(&rating.rating) {
                return Err(DataLoadError::InvalidValue {
                    field: "rating".to_string(),
                    value: rating.rating.to_string(),
                });
            }
        }

        for rating in ratings {
            self.insert_rating(*rating);
        }
        debug!("Appended {} ratings (total {})", ratings.len(), self.rating_count);
        Ok(())
    }

    /// Parallel view of the ratings grouped by movie
    pub fn par_movie_rating_groups(&self) -> impl ParallelIterator<Item = (MovieId, &[Rating])> {
        self.movie_ratings
            .par_iter()
            .map(|(&id, v)| (id, v.as_slice()))
    }

    /// Parallel view of the ratings grouped by user
    pub fn par_user_rating_groups(&self) -> impl ParallelIterator<Item = (UserId, &[Rating])> {
        self.user_ratings
            .par_iter()
            .map(|(&id, v)| (id, v.as_slice()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_dataset() -> Dataset {
        Dataset {
            users: vec![User {
                id: 1,
                gender: Gender::Female,
                age: AgeGroup::Under18,
                occupation: Occupation::K12Student,
                zipcode: "48067".to_string(),
            }],
            movies: vec![Movie {
                id: 1,
                title: "Toy Story (1995)".to_string(),
                year: Some(1995),
                genres: vec![Genre::Animation, Genre::Comedy],
            }],
            ratings: vec![Rating {
                user_id: 1,
                movie_id: 1,
                rating: 5.0,
                timestamp: 978300760,
            }],
        }
    }

    #[test]
    fn test_validate_ok() {
        assert!(small_dataset().validate().is_ok());
    }

    #[test]
    fn test_validate_missing_movie() {
        let mut dataset = small_dataset();
        dataset.ratings[0].movie_id = 42;
        assert!(matches!(
            dataset.validate(),
            Err(DataLoadError::MissingReference { id: 42, .. })
        ));
    }

    #[test]
    fn test_validate_rating_range() {
        let mut dataset = small_dataset();
        dataset.ratings[0].rating = 6.0;
        assert!(matches!(dataset.validate(), Err(DataLoadError::InvalidValue { .. })));
    }

    #[test]
    fn test_validate_empty_table() {
        let mut dataset = small_dataset();
        dataset.ratings.clear();
        assert!(matches!(dataset.validate(), Err(DataLoadError::EmptyTable(_))));
    }

    #[test]
    fn test_from_parts_indexes_every_table() {
        let dataset = small_dataset();
        let index = DataIndex::from_parts(dataset.users, dataset.movies, dataset.ratings);

        assert_eq!(index.counts(), (1, 1, 1));
        assert_eq!(index.movie_ids(), vec![1]);
        assert_eq!(
            index.get_movie(1).map(|m| m.genres.clone()),
            Some(vec![Genre::Animation, Genre::Comedy])
        );
        assert_eq!(index.get_movie_ratings(1).len(), 1);
    }

    #[test]
    fn test_append_ratings_is_all_or_nothing() {
        let dataset = small_dataset();
        let mut index = DataIndex::from_parts(dataset.users, dataset.movies, Vec::new());

        let good = Rating {
            user_id: 1,
            movie_id: 1,
            rating: 4.0,
            timestamp: 1,
        };
        let bad = Rating { movie_id: 99, ..good };

        assert!(index.append_ratings(&[good, bad]).is_err());
        assert_eq!(index.rating_count(), 0);

        index.append_ratings(&[good]).unwrap();
        assert_eq!(index.rating_count(), 1);
        assert_eq!(index.get_user_ratings(1).len(), 1);
    }

    #[test]
    fn test_load_dataset() {
        // Requires the real dataset under data/ml-1m at the workspace root
        let data_dir = Path::new("../../data/ml-1m");

        if data_dir.exists() {
            let dataset = Dataset::load_from_dir(data_dir).unwrap();
            assert_eq!(dataset.users.len(), 6040);
            assert_eq!(dataset.movies.len(), 3883);
            assert_eq!(dataset.ratings.len(), 1000209);
        }
    }
}
