//! Statistics Store: derived and adaptive per-user / per-movie state.
//!
//! Two kinds of state live here:
//! - **Derived statistics** (popularity, mean ratings, genre profiles) that
//!   are fully recomputed from the training partition on every case base
//!   commit.
//! - **Adaptive state** (genre willingness, affinity) that starts at a
//!   configured constant for every user and is nudged after each review.
//!
//! The store never reads the index on its own; every recompute receives the
//! index explicitly, so it only changes when the case base commits.

use crate::candidate::Feedback;
use data_loader::{DataIndex, Genre, MovieId, Rating, UserId};
use rayon::prelude::*;
use std::collections::HashMap;
use tracing::debug;

/// One weight per genre, indexed by [`Genre::index`]
pub type GenreVector = [f32; Genre::COUNT];

/// Value NEUTRAL feedback regresses willingness and affinity toward
pub const NEUTRAL_POINT: f32 = 0.5;

/// Move `value` toward the target implied by `feedback`.
///
/// GOOD targets 1.0 and BAD targets 0.0 at the full rate; NEUTRAL drifts
/// toward [`NEUTRAL_POINT`] at half the rate. Values starting in [0, 1]
/// stay in [0, 1] for any rate in [0, 1].
pub fn adapt(value: f32, feedback: Feedback, rate: f32) -> f32 {
    match feedback {
        Feedback::Good => value + rate * (1.0 - value),
        Feedback::Bad => value + rate * (0.0 - value),
        Feedback::Neutral => value + 0.5 * rate * (NEUTRAL_POINT - value),
    }
}

fn mean(ratings: &[Rating]) -> Option<f32> {
    if ratings.is_empty() {
        return None;
    }
    Some(ratings.iter().map(|r| r.rating).sum::<f32>() / ratings.len() as f32)
}

fn global_mean(index: &DataIndex) -> f32 {
    let (sum, count) = index
        .par_movie_rating_groups()
        .map(|(_, ratings)| (ratings.iter().map(|r| r.rating as f64).sum::<f64>(), ratings.len()))
        .reduce(|| (0.0, 0), |a, b| (a.0 + b.0, a.1 + b.1));

    if count == 0 {
        0.0
    } else {
        (sum / count as f64) as f32
    }
}

/// Mean-centred rating of `user_mean`'s owner per genre; 0 for unrated genres
fn genre_profile(index: &DataIndex, ratings: &[Rating], user_mean: f32) -> GenreVector {
    let mut sums = [0.0f32; Genre::COUNT];
    let mut counts = [0u32; Genre::COUNT];

    for rating in ratings {
        if let Some(movie) = index.get_movie(rating.movie_id) {
            for genre in &movie.genres {
                sums[genre.index()] += rating.rating - user_mean;
                counts[genre.index()] += 1;
            }
        }
    }

    let mut profile = [0.0f32; Genre::COUNT];
    for i in 0..Genre::COUNT {
        if counts[i] > 0 {
            profile[i] = sums[i] / counts[i] as f32;
        }
    }
    profile
}

#[derive(Debug, Clone)]
pub struct StatisticsStore {
    popularity: HashMap<MovieId, f32>,
    movie_means: HashMap<MovieId, f32>,
    user_means: HashMap<UserId, f32>,
    genre_profiles: HashMap<UserId, GenreVector>,
    /// Mean over every training rating; fallback for unrated users and movies
    global_mean: f32,

    initial_affinity: f32,
    willingness: HashMap<UserId, GenreVector>,
    affinity: HashMap<UserId, f32>,
}

impl StatisticsStore {
    /// Compute every statistic from `index` and seed the adaptive state of
    /// each user in it with `initial_affinity`.
    pub fn new(index: &DataIndex, initial_affinity: f32) -> Self {
        let user_ids = index.user_ids();
        let willingness = user_ids
            .iter()
            .map(|&id| (id, [initial_affinity; Genre::COUNT]))
            .collect();
        let affinity = user_ids.iter().map(|&id| (id, initial_affinity)).collect();

        let mut store = Self {
            popularity: HashMap::new(),
            movie_means: HashMap::new(),
            user_means: HashMap::new(),
            genre_profiles: HashMap::new(),
            global_mean: 0.0,
            initial_affinity,
            willingness,
            affinity,
        };
        store.recompute_popularity(index);
        store.recompute_movie_means(index);
        store.recompute_user_means(index);
        store
    }

    // =========================================================================
    // Recomputation (commit time only)
    // =========================================================================

    /// Popularity = rating count of a movie divided by the count of the most
    /// rated movie, so the most popular movie scores 1.0.
    pub fn recompute_popularity(&mut self, index: &DataIndex) {
        let counts: Vec<(MovieId, usize)> = index
            .par_movie_rating_groups()
            .map(|(id, ratings)| (id, ratings.len()))
            .collect();

        let max = counts.iter().map(|&(_, c)| c).max().unwrap_or(0);
        self.popularity = if max == 0 {
            HashMap::new()
        } else {
            counts
                .into_iter()
                .map(|(id, c)| (id, c as f32 / max as f32))
                .collect()
        };
        debug!("Recomputed popularity for {} movies", self.popularity.len());
    }

    pub fn recompute_movie_means(&mut self, index: &DataIndex) {
        self.global_mean = global_mean(index);
        self.movie_means = index
            .par_movie_rating_groups()
            .filter_map(|(id, ratings)| mean(ratings).map(|m| (id, m)))
            .collect();
        debug!("Recomputed mean rating for {} movies", self.movie_means.len());
    }

    /// Recompute user means and the genre profiles centred on them
    pub fn recompute_user_means(&mut self, index: &DataIndex) {
        self.global_mean = global_mean(index);
        let per_user: Vec<(UserId, f32, GenreVector)> = index
            .par_user_rating_groups()
            .filter_map(|(id, ratings)| {
                let m = mean(ratings)?;
                Some((id, m, genre_profile(index, ratings, m)))
            })
            .collect();

        self.user_means.clear();
        self.genre_profiles.clear();
        for (id, m, profile) in per_user {
            self.user_means.insert(id, m);
            self.genre_profiles.insert(id, profile);
        }
        debug!("Recomputed mean rating for {} users", self.user_means.len());
    }

    // =========================================================================
    // Lookups
    // =========================================================================

    /// Normalized popularity in [0, 1]; 0 for movies without ratings
    pub fn popularity(&self, movie_id: MovieId) -> f32 {
        self.popularity.get(&movie_id).copied().unwrap_or(0.0)
    }

    /// Mean rating of a movie, or the global mean if it has no ratings
    pub fn mean_movie_rating(&self, movie_id: MovieId) -> f32 {
        self.movie_means
            .get(&movie_id)
            .copied()
            .unwrap_or(self.global_mean)
    }

    /// Mean rating given by a user, or the global mean if they have no ratings
    pub fn mean_user_rating(&self, user_id: UserId) -> f32 {
        self.user_means
            .get(&user_id)
            .copied()
            .unwrap_or(self.global_mean)
    }

    /// Mean-centred per-genre rating of a user (all zeros without ratings)
    pub fn genre_profile(&self, user_id: UserId) -> GenreVector {
        self.genre_profiles
            .get(&user_id)
            .copied()
            .unwrap_or([0.0; Genre::COUNT])
    }

    /// Genre willingness vector of a user
    pub fn willingness(&self, user_id: UserId) -> GenreVector {
        self.willingness
            .get(&user_id)
            .copied()
            .unwrap_or([self.initial_affinity; Genre::COUNT])
    }

    /// Mean willingness of a user over `genres`; 0 for an empty genre set
    pub fn genre_willingness(&self, user_id: UserId, genres: &[Genre]) -> f32 {
        if genres.is_empty() {
            return 0.0;
        }
        let weights = self.willingness(user_id);
        genres.iter().map(|g| weights[g.index()]).sum::<f32>() / genres.len() as f32
    }

    pub fn affinity(&self, user_id: UserId) -> f32 {
        self.affinity
            .get(&user_id)
            .copied()
            .unwrap_or(self.initial_affinity)
    }

    // =========================================================================
    // Adaptive updates (after every review)
    // =========================================================================

    /// Nudge the willingness of `user_id` for each of `genres`
    pub fn adapt_willingness(
        &mut self,
        user_id: UserId,
        genres: &[Genre],
        feedback: Feedback,
        rate: f32,
    ) {
        let weights = self
            .willingness
            .entry(user_id)
            .or_insert([self.initial_affinity; Genre::COUNT]);
        for genre in genres {
            let w = &mut weights[genre.index()];
            *w = adapt(*w, feedback, rate);
        }
    }

    pub fn adapt_affinity(&mut self, user_id: UserId, feedback: Feedback, rate: f32) {
        let value = self
            .affinity
            .entry(user_id)
            .or_insert(self.initial_affinity);
        *value = adapt(*value, feedback, rate);
    }
}
