//! The Case Base: training cases, test cursor and every query of the CBR cycle.
//!
//! ## Lifecycle
//! 1. `initialize` partitions the dataset with a seeded permutation and
//!    builds the training index and the statistics store
//! 2. `next_test_case` hands out test cases one at a time, never rewinding
//! 3. Queries (`get_user_candidates`, `get_movie_candidate`, ...) read the
//!    training index and the statistics as of the last commit
//! 4. `update_case_base` followed by the three `update_*` recomputes is the
//!    only way the training partition grows (see `commit_batch`)

use crate::candidate::CandidateInfo;
use crate::config::CbrConfig;
use crate::error::{CaseBaseError, Result};
use crate::similarity::{jaccard_similarity, pearson_correlation};
use crate::stats::{GenreVector, StatisticsStore};
use data_loader::{DataIndex, Dataset, Genre, MovieId, Rating, UserId};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rayon::prelude::*;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, instrument};

/// Neighbor candidates kept per requested neighbor
pub const NEIGHBOR_POOL_FACTOR: usize = 10;

/// Shuffle `ratings` with `seed`, keep `ratings_ratio` of them and split the
/// rest into (training, test) by `train_ratio`.
pub fn partition(
    mut ratings: Vec<Rating>,
    ratings_ratio: f32,
    train_ratio: f32,
    seed: u64,
) -> (Vec<Rating>, Vec<Rating>) {
    let mut rng = StdRng::seed_from_u64(seed);
    ratings.shuffle(&mut rng);

    let sample_len = scaled_len(ratings.len(), ratings_ratio);
    ratings.truncate(sample_len);

    let train_len = scaled_len(sample_len, train_ratio);
    let test = ratings.split_off(train_len);
    (ratings, test)
}

/// `floor(len * ratio)` in `f32`, so 100 cases at 0.7 give 70
fn scaled_len(len: usize, ratio: f32) -> usize {
    ((len as f32 * ratio).floor() as usize).min(len)
}

#[derive(Debug)]
pub struct CaseBase {
    config: CbrConfig,
    index: DataIndex,
    stats: StatisticsStore,
    test_cases: Vec<Rating>,
    cursor: usize,
}

impl CaseBase {
    /// Build the case base from a loaded dataset.
    ///
    /// Fails on an invalid configuration, a malformed dataset, or ratios
    /// that leave the training partition empty.
    pub fn initialize(dataset: Dataset, config: CbrConfig) -> Result<Self> {
        config.validate()?;
        dataset.validate()?;

        let total = dataset.ratings.len();
        let (train, test) = partition(
            dataset.ratings,
            config.ratings_ratio,
            config.train_ratio,
            config.seed,
        );
        if train.is_empty() {
            return Err(CaseBaseError::EmptyTrainingSet {
                ratings: total,
                ratings_ratio: config.ratings_ratio,
                train_ratio: config.train_ratio,
            });
        }

        info!(
            "Partitioned {} ratings into {} training and {} test cases (seed {})",
            total,
            train.len(),
            test.len(),
            config.seed
        );

        let index = DataIndex::from_parts(dataset.users, dataset.movies, train);
        let stats = StatisticsStore::new(&index, config.initial_affinity);

        let (users, movies, ratings) = index.counts();
        info!(
            "Case base initialized: {} users, {} movies, {} training cases, {} genres",
            users,
            movies,
            ratings,
            Genre::COUNT
        );

        Ok(Self {
            config,
            index,
            stats,
            test_cases: test,
            cursor: 0,
        })
    }

    // =========================================================================
    // Partition and cursor
    // =========================================================================

    /// Next unseen test case, or `None` once the test partition is exhausted
    pub fn next_test_case(&mut self) -> Option<Rating> {
        let case = self.test_cases.get(self.cursor).copied()?;
        self.cursor += 1;
        Some(case)
    }

    /// The case `next_test_case` would return, without consuming it
    pub fn peek_test_case(&self) -> Option<&Rating> {
        self.test_cases.get(self.cursor)
    }

    pub fn remaining_test_cases(&self) -> usize {
        self.test_cases.len() - self.cursor
    }

    /// Number of cases in the training partition
    pub fn training_size(&self) -> usize {
        self.index.rating_count()
    }

    pub fn config(&self) -> &CbrConfig {
        &self.config
    }

    pub fn index(&self) -> &DataIndex {
        &self.index
    }

    pub fn contains_user(&self, user_id: UserId) -> bool {
        self.index.get_user(user_id).is_some()
    }

    /// Genres of a movie; empty for unknown movies
    pub fn genres_of(&self, movie_id: MovieId) -> &[Genre] {
        self.index
            .get_movie(movie_id)
            .map(|m| m.genres.as_slice())
            .unwrap_or(&[])
    }

    pub fn movie_name(&self, movie_id: MovieId) -> &str {
        self.index
            .get_movie(movie_id)
            .map(|m| m.title.as_str())
            .unwrap_or("<unknown>")
    }

    fn rated_movies(&self, user_id: UserId) -> HashSet<MovieId> {
        self.index
            .get_user_ratings(user_id)
            .iter()
            .map(|r| r.movie_id)
            .collect()
    }

    // =========================================================================
    // Neighbor queries
    // =========================================================================

    /// Users that share enough of `user_id`'s top-rated movies with close ratings.
    ///
    /// ## Algorithm
    /// 1. Take the user's `num_movies` highest ratings
    /// 2. For every other user who rated one of those movies, count the
    ///    shared movies and sum the absolute rating distances
    /// 3. Accept users with `min_k <= shared <= max_k` and mean distance
    ///    `<= sim_thresh`
    /// 4. Keep at most `num_neighs * NEIGHBOR_POOL_FACTOR`, most shared and
    ///    closest first
    ///
    /// The result is not ranked by similarity; that is the retrieve phase's job.
    #[instrument(skip(self))]
    pub fn get_user_candidates(
        &self,
        user_id: UserId,
        num_movies: usize,
        num_neighs: usize,
        max_k: usize,
        min_k: usize,
        sim_thresh: f32,
    ) -> Vec<UserId> {
        let mut top: Vec<Rating> = self.index.get_user_ratings(user_id).to_vec();
        top.sort_by(|a, b| {
            b.rating
                .total_cmp(&a.rating)
                .then_with(|| a.movie_id.cmp(&b.movie_id))
        });
        top.truncate(num_movies);

        let shared: HashMap<UserId, (usize, f32)> = top
            .par_iter()
            .fold(HashMap::new, |mut acc: HashMap<UserId, (usize, f32)>, own| {
                for other in self.index.get_movie_ratings(own.movie_id) {
                    if other.user_id != user_id {
                        let entry = acc.entry(other.user_id).or_insert((0, 0.0));
                        entry.0 += 1;
                        entry.1 += (other.rating - own.rating).abs();
                    }
                }
                acc
            })
            .reduce(HashMap::new, |mut acc, local| {
                for (id, (count, dist)) in local {
                    let entry = acc.entry(id).or_insert((0, 0.0));
                    entry.0 += count;
                    entry.1 += dist;
                }
                acc
            });

        let mut accepted: Vec<(UserId, usize, f32)> = shared
            .into_iter()
            .filter_map(|(id, (count, dist))| {
                let mean_dist = dist / count as f32;
                (count >= min_k && count <= max_k && mean_dist <= sim_thresh)
                    .then_some((id, count, mean_dist))
            })
            .collect();

        accepted.sort_by(|a, b| {
            b.1.cmp(&a.1)
                .then_with(|| a.2.total_cmp(&b.2))
                .then_with(|| a.0.cmp(&b.0))
        });
        accepted.truncate(num_neighs.saturating_mul(NEIGHBOR_POOL_FACTOR));

        debug!(
            "User {} has {} neighbor candidates from {} top movies",
            user_id,
            accepted.len(),
            top.len()
        );
        accepted.into_iter().map(|(id, _, _)| id).collect()
    }

    /// Pearson correlation of two users over the movies both rated.
    ///
    /// Symmetric; 0.0 with fewer than two co-rated movies or zero variance.
    pub fn get_user_similarity(&self, u: UserId, v: UserId) -> f32 {
        let v_ratings: HashMap<MovieId, f32> = self
            .index
            .get_user_ratings(v)
            .iter()
            .map(|r| (r.movie_id, r.rating))
            .collect();

        let mut pairs: Vec<(MovieId, f32, f32)> = self
            .index
            .get_user_ratings(u)
            .iter()
            .filter_map(|r| v_ratings.get(&r.movie_id).map(|&rv| (r.movie_id, r.rating, rv)))
            .collect();
        // Fixed summation order keeps the result exactly symmetric
        pairs.sort_unstable_by_key(|p| p.0);

        let xs: Vec<f32> = pairs.iter().map(|p| p.1).collect();
        let ys: Vec<f32> = pairs.iter().map(|p| p.2).collect();
        pearson_correlation(&xs, &ys)
    }

    // =========================================================================
    // Candidate generation
    // =========================================================================

    /// Up to `limit` movies unseen by `user_id`, most popular first, scored
    /// without a neighbor.
    pub fn get_popular_candidates(&self, user_id: UserId, limit: usize) -> Vec<CandidateInfo> {
        let seen = self.rated_movies(user_id);

        let mut unseen: Vec<MovieId> = self
            .index
            .movie_ids()
            .into_iter()
            .filter(|id| !seen.contains(id))
            .collect();
        unseen.sort_by(|a, b| {
            self.stats
                .popularity(*b)
                .total_cmp(&self.stats.popularity(*a))
                .then_with(|| a.cmp(b))
        });
        unseen.truncate(limit);

        unseen
            .into_iter()
            .map(|movie_id| self.get_movie_candidate(movie_id, user_id, None))
            .collect()
    }

    /// The neighbor's `k` highest-rated movies that `user_id` has not rated
    pub fn get_suggestions(&self, user_id: UserId, neighbor: UserId, k: usize) -> Vec<MovieId> {
        let seen = self.rated_movies(user_id);

        let mut ratings: Vec<&Rating> = self
            .index
            .get_user_ratings(neighbor)
            .iter()
            .filter(|r| !seen.contains(&r.movie_id))
            .collect();
        ratings.sort_by(|a, b| {
            b.rating
                .total_cmp(&a.rating)
                .then_with(|| a.movie_id.cmp(&b.movie_id))
        });

        ratings.into_iter().take(k).map(|r| r.movie_id).collect()
    }

    /// Build and score a candidate.
    ///
    /// score = alpha * corr(user, neighbor)
    ///       + beta  * popularity(movie)
    ///       + gamma * preference_correlation(user, movie)
    ///       + theta * willingness(user, genres(movie))
    ///       + omega * affinity(user)
    ///
    /// Without a neighbor the correlation term is 0.
    pub fn get_movie_candidate(
        &self,
        movie_id: MovieId,
        user_id: UserId,
        neighbor: Option<UserId>,
    ) -> CandidateInfo {
        let genres = self.genres_of(movie_id).to_vec();
        let c = &self.config;

        let correlation = neighbor
            .map(|n| self.get_user_similarity(user_id, n))
            .unwrap_or(0.0);
        let score = c.alpha * correlation
            + c.beta * self.stats.popularity(movie_id)
            + c.gamma * self.preference_correlation(user_id, &genres)
            + c.theta * self.stats.genre_willingness(user_id, &genres)
            + c.omega * self.stats.affinity(user_id);

        CandidateInfo {
            movie_id,
            name: self.movie_name(movie_id).to_string(),
            genres,
            user_id,
            neighbor,
            score,
            feedback: None,
        }
    }

    /// Pearson correlation between the user's genre profile and the genre
    /// indicator vector of a movie.
    pub fn preference_correlation(&self, user_id: UserId, genres: &[Genre]) -> f32 {
        let profile = self.stats.genre_profile(user_id);
        let mut indicator = [0.0f32; Genre::COUNT];
        for genre in genres {
            indicator[genre.index()] = 1.0;
        }
        pearson_correlation(&profile, &indicator)
    }

    /// Genre willingness vector of a user, indexed by [`Genre::index`]
    pub fn get_user_preferences(&self, user_id: UserId) -> GenreVector {
        self.stats.willingness(user_id)
    }

    pub fn get_user_affinity(&self, user_id: UserId) -> f32 {
        self.stats.affinity(user_id)
    }

    /// Jaccard similarity of two movies' genre sets.
    ///
    /// The ids are not used; two movies are compared purely by genre.
    pub fn get_movie_similarity(
        &self,
        _movie_a: MovieId,
        genres_a: &[Genre],
        _movie_b: MovieId,
        genres_b: &[Genre],
    ) -> f32 {
        jaccard_similarity(genres_a, genres_b)
    }

    pub fn get_mean_user_rating(&self, user_id: UserId) -> f32 {
        self.stats.mean_user_rating(user_id)
    }

    pub fn get_mean_movie_rating(&self, movie_id: MovieId) -> f32 {
        self.stats.mean_movie_rating(movie_id)
    }

    pub fn get_popularity(&self, movie_id: MovieId) -> f32 {
        self.stats.popularity(movie_id)
    }

    // =========================================================================
    // Mutation
    // =========================================================================

    /// Append a batch of cases to the training partition.
    ///
    /// The four slices are parallel columns and must have equal length.
    /// Statistics are NOT refreshed here; callers follow up with the three
    /// `update_*` recomputes, or use [`CaseBase::commit_batch`].
    pub fn update_case_base(
        &mut self,
        users: &[UserId],
        movies: &[MovieId],
        ratings: &[f32],
        timestamps: &[i64],
    ) -> Result<()> {
        let n = users.len();
        if movies.len() != n || ratings.len() != n || timestamps.len() != n {
            return Err(CaseBaseError::BatchLengthMismatch {
                users: users.len(),
                movies: movies.len(),
                ratings: ratings.len(),
                timestamps: timestamps.len(),
            });
        }

        let batch: Vec<Rating> = (0..n)
            .map(|i| Rating {
                user_id: users[i],
                movie_id: movies[i],
                rating: ratings[i],
                timestamp: timestamps[i],
            })
            .collect();
        self.index.append_ratings(&batch)?;
        Ok(())
    }

    pub fn update_popularity(&mut self) {
        self.stats.recompute_popularity(&self.index);
    }

    pub fn update_mean_movie_rating(&mut self) {
        self.stats.recompute_movie_means(&self.index);
    }

    pub fn update_mean_user_rating(&mut self) {
        self.stats.recompute_user_means(&self.index);
    }

    /// Append `cases` and refresh every derived statistic in one step.
    ///
    /// If the append fails nothing is recomputed and the case base is unchanged.
    #[instrument(skip(self, cases), fields(batch = cases.len()))]
    pub fn commit_batch(&mut self, cases: &[Rating]) -> Result<()> {
        let users: Vec<UserId> = cases.iter().map(|c| c.user_id).collect();
        let movies: Vec<MovieId> = cases.iter().map(|c| c.movie_id).collect();
        let ratings: Vec<f32> = cases.iter().map(|c| c.rating).collect();
        let timestamps: Vec<i64> = cases.iter().map(|c| c.timestamp).collect();

        self.update_case_base(&users, &movies, &ratings, &timestamps)?;
        self.update_popularity();
        self.update_mean_movie_rating();
        self.update_mean_user_rating();

        info!(
            "Committed {} retained cases (training size {})",
            cases.len(),
            self.training_size()
        );
        Ok(())
    }

    /// Move the willingness of `user_id` for the candidate's genres according
    /// to its feedback. Unreviewed candidates are ignored.
    pub fn update_genre_willigness(&mut self, user_id: UserId, candidate: &CandidateInfo) {
        if let Some(feedback) = candidate.feedback {
            self.stats.adapt_willingness(
                user_id,
                &candidate.genres,
                feedback,
                self.config.update_rate,
            );
        }
    }

    /// Move the affinity of `user_id` according to the candidate's feedback
    pub fn update_user_affinity(&mut self, user_id: UserId, candidate: &CandidateInfo) {
        if let Some(feedback) = candidate.feedback {
            self.stats
                .adapt_affinity(user_id, feedback, self.config.update_rate);
        }
    }
}
