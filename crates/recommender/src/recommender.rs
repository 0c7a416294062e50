//! # Movie Recommender
//!
//! Drives the CBR cycle over the test stream of a [`CaseBase`]:
//! 1. Retrieve: neighbor candidates ranked by Pearson similarity
//! 2. Reuse: score the neighbors' unseen favourites (or popular movies)
//! 3. Review: label each candidate against the observed rating
//! 4. Retain: buffer novel cases, commit in batches, adapt user state

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::time::Instant;

use tracing::{debug, info, instrument, warn};

use case_base::{CandidateInfo, CaseBase, CbrConfig, Neighbor};
use data_loader::{Dataset, MovieId, Rating, UserId};

use crate::error::{CbrError, Result};
use crate::evaluation::Evaluation;
use crate::retain::RetainBuffer;
use crate::review::{classify, should_retain};
use crate::traits::{CbrCycle, CycleReport, ReviewOutcome};

/// Sort candidates by score (highest first), then by movie id
fn rank_candidates(candidates: &mut [CandidateInfo]) {
    candidates.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.movie_id.cmp(&b.movie_id))
    });
}

/// The CBR controller. Owns the case base and the retain buffer.
#[derive(Debug)]
pub struct MovieRecommender {
    case_base: CaseBase,
    buffer: RetainBuffer,
}

impl MovieRecommender {
    /// Wrap an initialized case base
    pub fn new(case_base: CaseBase) -> Self {
        let buffer = RetainBuffer::new(case_base.config().update_value);
        Self { case_base, buffer }
    }

    /// Build the case base from `dataset` and wrap it
    pub fn from_dataset(dataset: Dataset, config: CbrConfig) -> Result<Self> {
        Ok(Self::new(CaseBase::initialize(dataset, config)?))
    }

    pub fn case_base(&self) -> &CaseBase {
        &self.case_base
    }

    pub fn config(&self) -> &CbrConfig {
        self.case_base.config()
    }

    /// Retained cases waiting for the next commit
    pub fn pending_retained(&self) -> usize {
        self.buffer.len()
    }

    /// Recommendations for a user without consuming a test case
    pub fn recommend(&self, user_id: UserId) -> Result<Vec<CandidateInfo>> {
        let neighbors = self.retrieve(user_id)?;
        Ok(self.reuse(user_id, &neighbors))
    }

    /// Run one cycle on the next test case; `Ok(None)` once exhausted
    pub fn process_next_case(&mut self) -> Result<Option<CycleReport>> {
        match self.case_base.next_test_case() {
            Some(rated) => self.run_cycle(rated).map(Some),
            None => Ok(None),
        }
    }

    /// Replay up to `budget` test cases through the cycle.
    ///
    /// Stops early when the test stream runs out. The returned score and
    /// similarity sequences have one entry per consumed case.
    pub fn evaluate(&mut self, budget: usize) -> Result<Evaluation> {
        if budget == 0 {
            return Err(CbrError::InvalidBudget);
        }
        info!(
            "Testing CBR on up to {} cases ({} available)",
            budget,
            self.case_base.remaining_test_cases()
        );

        let start = Instant::now();
        let mut evaluation = Evaluation::default();
        while evaluation.len() < budget {
            let Some(report) = self.process_next_case()? else {
                warn!("Test cases exhausted after {} iterations", evaluation.len());
                break;
            };
            info!(
                "Test iteration {}: user {} movie {} score {:.4} similarity {:.4}",
                evaluation.len() + 1,
                report.case.user_id,
                report.case.movie_id,
                report.mean_score,
                report.mean_similarity
            );
            evaluation.record(&report);
        }

        info!(
            "Evaluated {} cases in {:.2?}: mean score {:.4}, mean similarity {:.4}, {} retained, {} commits",
            evaluation.len(),
            start.elapsed(),
            evaluation.mean_score(),
            evaluation.mean_similarity(),
            evaluation.retained,
            evaluation.commits
        );
        if !self.buffer.is_empty() {
            info!("{} retained cases wait for the next commit", self.buffer.len());
        }
        Ok(evaluation)
    }
}

impl CbrCycle for MovieRecommender {
    #[instrument(skip(self))]
    fn retrieve(&self, user_id: UserId) -> Result<Vec<Neighbor>> {
        if !self.case_base.contains_user(user_id) {
            return Err(CbrError::UnknownUser(user_id));
        }
        let config = self.config();

        let candidates = self.case_base.get_user_candidates(
            user_id,
            config.shared_movies,
            config.max_neighbors,
            config.max_shared,
            config.min_shared,
            config.max_sim_threshold,
        );
        debug!("Computing user similarities for {} users", candidates.len());

        let mut neighbors: Vec<Neighbor> = candidates
            .into_iter()
            .map(|id| Neighbor {
                user_id: id,
                similarity: self.case_base.get_user_similarity(user_id, id),
            })
            .collect();
        neighbors.sort_by(|a, b| {
            b.similarity
                .total_cmp(&a.similarity)
                .then_with(|| a.user_id.cmp(&b.user_id))
        });
        neighbors.truncate(config.max_neighbors);

        info!("Retrieved {} neighbors for user {}", neighbors.len(), user_id);
        Ok(neighbors)
    }

    #[instrument(skip(self, neighbors), fields(neighbors = neighbors.len()))]
    fn reuse(&self, user_id: UserId, neighbors: &[Neighbor]) -> Vec<CandidateInfo> {
        let config = self.config();

        // Highest score wins; on equal scores the earlier (more similar)
        // neighbor keeps the movie
        let mut unique: HashMap<MovieId, CandidateInfo> = HashMap::new();
        for neighbor in neighbors {
            let suggestions =
                self.case_base
                    .get_suggestions(user_id, neighbor.user_id, config.movies_per_neighbor);
            for movie_id in suggestions {
                let candidate =
                    self.case_base
                        .get_movie_candidate(movie_id, user_id, Some(neighbor.user_id));
                match unique.entry(movie_id) {
                    Entry::Occupied(mut existing) => {
                        if candidate.score > existing.get().score {
                            existing.insert(candidate);
                        }
                    }
                    Entry::Vacant(slot) => {
                        slot.insert(candidate);
                    }
                }
            }
        }

        let mut candidates: Vec<CandidateInfo> = if unique.is_empty() {
            if !neighbors.is_empty() {
                debug!("Neighbors of user {} had nothing unseen to suggest", user_id);
            }
            info!("Falling back to popular movies for user {}", user_id);
            self.case_base
                .get_popular_candidates(user_id, config.rec_movies)
        } else {
            unique.into_values().collect()
        };

        rank_candidates(&mut candidates);
        candidates.truncate(config.rec_movies);

        debug!(
            "Reuse produced {:?}",
            candidates.iter().map(|c| c.movie_id).collect::<Vec<_>>()
        );
        candidates
    }

    #[instrument(skip(self, rated, recommended), fields(user_id = rated.user_id, movie_id = rated.movie_id))]
    fn review(&self, rated: &Rating, recommended: Vec<CandidateInfo>) -> Result<ReviewOutcome> {
        if recommended.is_empty() {
            return Err(CbrError::EmptyCandidateSet {
                user_id: rated.user_id,
                movie_id: rated.movie_id,
            });
        }
        let config = self.config();
        let rated_genres = self.case_base.genres_of(rated.movie_id);
        let mean_movie_rating = self.case_base.get_mean_movie_rating(rated.movie_id);

        info!(
            "Rated movie {}({}) with {}, movie mean {:.3}",
            self.case_base.movie_name(rated.movie_id),
            rated.movie_id,
            rated.rating,
            mean_movie_rating
        );

        let mut sum_similarity = 0.0;
        let mut reviewed = recommended;
        for candidate in &mut reviewed {
            let similarity = self.case_base.get_movie_similarity(
                candidate.movie_id,
                &candidate.genres,
                rated.movie_id,
                rated_genres,
            );
            sum_similarity += similarity;

            let reference_mean = self
                .case_base
                .get_mean_user_rating(candidate.reference_user());
            let feedback = classify(
                candidate.movie_id == rated.movie_id,
                similarity,
                config.movie_threshold,
                rated.rating,
                reference_mean,
            );
            candidate.feedback = Some(feedback);

            debug!(
                "Recommended movie {}({}) has similarity {:.3} with rated one. Feedback: {}",
                candidate.name, candidate.movie_id, similarity, feedback
            );
        }

        let mean_similarity = sum_similarity / reviewed.len() as f32;
        let retain_rated_case =
            should_retain(rated.rating, mean_movie_rating, mean_similarity, config);

        info!(
            "Mean similarity of recommended and rated movies is {:.4}; retain: {}",
            mean_similarity, retain_rated_case
        );
        Ok(ReviewOutcome {
            reviewed,
            retain_rated_case,
            mean_similarity,
        })
    }

    fn retain(
        &mut self,
        rated: Rating,
        feedback: &[CandidateInfo],
        retain_rated_case: bool,
    ) -> Result<bool> {
        debug!("Updating user and genre willingness for user {}", rated.user_id);
        for candidate in feedback {
            self.case_base.update_genre_willigness(rated.user_id, candidate);
            self.case_base.update_user_affinity(rated.user_id, candidate);
        }

        if !retain_rated_case {
            debug!("Case not retained");
            return Ok(false);
        }

        info!("Case added for retaining");
        if !self.buffer.push(rated) {
            return Ok(false);
        }

        // The batch leaves the buffer before the commit; a rejected batch is
        // dropped, never retried
        let batch = self.buffer.take();
        info!("Updating case base with {} retained cases", batch.len());
        self.case_base.commit_batch(&batch)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use case_base::Feedback;
    use data_loader::{AgeGroup, Gender, Genre, Movie, Occupation, User};

    const U: UserId = 1;
    const N: UserId = 2;
    const M: UserId = 3;

    fn user(id: UserId) -> User {
        User {
            id,
            gender: Gender::Male,
            age: AgeGroup::Age35To44,
            occupation: Occupation::Scientist,
            zipcode: "02139".to_string(),
        }
    }

    fn movie(id: MovieId, genres: Vec<Genre>) -> Movie {
        Movie {
            id,
            title: format!("Movie {}", id),
            year: Some(1999),
            genres,
        }
    }

    fn rating(user_id: UserId, movie_id: MovieId, rating: f32) -> Rating {
        Rating {
            user_id,
            movie_id,
            rating,
            timestamp: 0,
        }
    }

    /// N correlates perfectly with U over movies 1 and 2; M also rated
    /// movie 3 and correlates only weakly. Both neighbors suggest movie 4.
    fn create_recommender(config: CbrConfig) -> MovieRecommender {
        let dataset = Dataset {
            users: vec![user(U), user(N), user(M)],
            movies: vec![
                movie(1, vec![Genre::Action, Genre::Adventure]),
                movie(2, vec![Genre::Drama]),
                movie(3, vec![Genre::Action, Genre::SciFi]),
                movie(4, vec![Genre::Action]),
                movie(5, vec![Genre::Comedy]),
                movie(6, vec![Genre::Action, Genre::Thriller]),
            ],
            ratings: vec![
                rating(U, 1, 5.0),
                rating(U, 2, 2.0),
                rating(U, 3, 4.0),
                rating(N, 1, 4.0),
                rating(N, 2, 1.0),
                rating(N, 4, 5.0),
                rating(N, 5, 3.0),
                rating(M, 1, 4.0),
                rating(M, 2, 3.0),
                rating(M, 3, 2.0),
                rating(M, 4, 4.0),
                rating(M, 6, 5.0),
            ],
        };
        MovieRecommender::from_dataset(dataset, config).unwrap()
    }

    fn test_config() -> CbrConfig {
        CbrConfig {
            min_shared: 1,
            ..CbrConfig::default()
        }
        .with_train_ratio(1.0)
    }

    #[test]
    fn test_retrieve_sorted_and_bounded() {
        let rec = create_recommender(test_config());
        let neighbors = rec.retrieve(U).unwrap();

        assert_eq!(neighbors.len(), 2);
        assert_eq!(neighbors[0].user_id, N);
        assert!((neighbors[0].similarity - 1.0).abs() < 1e-6);
        assert_eq!(neighbors[1].user_id, M);
        assert!(neighbors[0].similarity > neighbors[1].similarity);

        let one = create_recommender(CbrConfig {
            max_neighbors: 1,
            ..test_config()
        });
        assert_eq!(one.retrieve(U).unwrap().len(), 1);
    }

    #[test]
    fn test_retrieve_unknown_user() {
        let rec = create_recommender(test_config());
        assert!(matches!(rec.retrieve(42), Err(CbrError::UnknownUser(42))));
    }

    #[test]
    fn test_reuse_deduplicates_keeping_best_score() {
        let rec = create_recommender(test_config());
        let neighbors = rec.retrieve(U).unwrap();
        let candidates = rec.reuse(U, &neighbors);

        let mut ids: Vec<MovieId> = candidates.iter().map(|c| c.movie_id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), candidates.len());

        // Movie 4 comes from both neighbors; N's copy scores higher
        let m4 = candidates.iter().find(|c| c.movie_id == 4).unwrap();
        assert_eq!(m4.neighbor, Some(N));

        for pair in candidates.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    /// A and B rated exactly like each other, so they are equally similar
    /// to U and produce identical scores for movie 4.
    fn create_twin_recommender() -> MovieRecommender {
        const A: UserId = 2;
        const B: UserId = 3;
        let dataset = Dataset {
            users: vec![user(U), user(A), user(B)],
            movies: vec![
                movie(1, vec![Genre::Action]),
                movie(2, vec![Genre::Drama]),
                movie(4, vec![Genre::Action, Genre::Thriller]),
            ],
            ratings: vec![
                rating(U, 1, 5.0),
                rating(U, 2, 2.0),
                rating(A, 1, 4.0),
                rating(A, 2, 1.0),
                rating(A, 4, 5.0),
                rating(B, 1, 4.0),
                rating(B, 2, 1.0),
                rating(B, 4, 5.0),
            ],
        };
        MovieRecommender::from_dataset(dataset, test_config()).unwrap()
    }

    #[test]
    fn test_reuse_equal_scores_keep_earlier_neighbor() {
        let rec = create_twin_recommender();
        let neighbors = rec.retrieve(U).unwrap();

        let ids: Vec<UserId> = neighbors.iter().map(|n| n.user_id).collect();
        assert_eq!(ids, vec![2, 3]);
        assert_eq!(neighbors[0].similarity, neighbors[1].similarity);

        let candidates = rec.reuse(U, &neighbors);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].movie_id, 4);
        assert_eq!(candidates[0].neighbor, Some(2));

        // Order decides, not the id
        let reversed: Vec<Neighbor> = neighbors.iter().rev().cloned().collect();
        let candidates = rec.reuse(U, &reversed);
        assert_eq!(candidates[0].neighbor, Some(3));
    }

    #[test]
    fn test_reuse_respects_rec_movies() {
        let rec = create_recommender(CbrConfig {
            rec_movies: 2,
            ..test_config()
        });
        let neighbors = rec.retrieve(U).unwrap();
        assert!(rec.reuse(U, &neighbors).len() <= 2);
    }

    #[test]
    fn test_reuse_falls_back_to_popular() {
        let rec = create_recommender(test_config());
        let candidates = rec.reuse(U, &[]);

        assert!(!candidates.is_empty());
        assert!(candidates.iter().all(|c| c.neighbor.is_none()));
        // Never recommends a movie U already rated
        assert!(candidates.iter().all(|c| ![1, 2, 3].contains(&c.movie_id)));
    }

    #[test]
    fn test_review_same_movie_good() {
        let rec = create_recommender(test_config());
        // N's mean rating is (4 + 1 + 5 + 3) / 4 = 3.25 < 5
        let candidate = rec.case_base().get_movie_candidate(4, U, Some(N));
        let rated = rating(U, 4, 5.0);

        let outcome = rec.review(&rated, vec![candidate]).unwrap();
        assert_eq!(outcome.reviewed[0].feedback, Some(Feedback::Good));
        assert_eq!(outcome.mean_similarity, 1.0);
    }

    #[test]
    fn test_review_same_movie_bad() {
        let rec = create_recommender(test_config());
        let candidate = rec.case_base().get_movie_candidate(4, U, Some(N));
        let rated = rating(U, 4, 3.0);

        let outcome = rec.review(&rated, vec![candidate]).unwrap();
        assert_eq!(outcome.reviewed[0].feedback, Some(Feedback::Bad));
    }

    #[test]
    fn test_review_dissimilar_movie() {
        let rec = create_recommender(test_config());
        // M5 is Comedy, the rated M6 is Action/Thriller: similarity 0
        let candidate = rec.case_base().get_movie_candidate(5, U, Some(N));

        let liked = rec.review(&rating(U, 6, 5.0), vec![candidate.clone()]).unwrap();
        assert_eq!(liked.reviewed[0].feedback, Some(Feedback::Bad));

        let disliked = rec.review(&rating(U, 6, 1.0), vec![candidate]).unwrap();
        assert_eq!(disliked.reviewed[0].feedback, Some(Feedback::Neutral));
        assert_eq!(disliked.mean_similarity, 0.0);
    }

    #[test]
    fn test_review_empty_is_an_error() {
        let rec = create_recommender(test_config());
        let result = rec.review(&rating(U, 4, 5.0), Vec::new());
        assert!(matches!(result, Err(CbrError::EmptyCandidateSet { .. })));
    }

    #[test]
    fn test_retain_buffers_until_update_value() {
        let mut rec = create_recommender(test_config().with_update_value(2));
        let size = rec.case_base().training_size();

        assert!(!rec.retain(rating(U, 4, 5.0), &[], true).unwrap());
        assert_eq!(rec.pending_retained(), 1);
        assert_eq!(rec.case_base().training_size(), size);

        // Not retained: buffer untouched
        assert!(!rec.retain(rating(U, 5, 1.0), &[], false).unwrap());
        assert_eq!(rec.pending_retained(), 1);

        assert!(rec.retain(rating(U, 6, 5.0), &[], true).unwrap());
        assert_eq!(rec.pending_retained(), 0);
        assert_eq!(rec.case_base().training_size(), size + 2);
    }

    #[test]
    fn test_rejected_commit_empties_buffer_and_still_adapts() {
        let mut rec = create_recommender(test_config());
        let size = rec.case_base().training_size();
        let mut candidate = rec.case_base().get_movie_candidate(4, U, Some(N));
        candidate.feedback = Some(Feedback::Good);

        // Movie 99 does not exist, so the commit is rejected
        let result = rec.retain(rating(U, 99, 5.0), &[candidate], true);
        assert!(matches!(result, Err(CbrError::CaseBase(_))));
        assert_eq!(rec.pending_retained(), 0);
        assert_eq!(rec.case_base().training_size(), size);
        assert!(rec.case_base().get_user_affinity(U) > 0.5);

        // The next retained case commits on its own
        assert!(rec.retain(rating(U, 4, 5.0), &[], true).unwrap());
        assert_eq!(rec.case_base().training_size(), size + 1);
    }

    #[test]
    fn test_retain_adapts_user_state() {
        let mut rec = create_recommender(test_config());
        let mut candidate = rec.case_base().get_movie_candidate(4, U, Some(N));
        candidate.feedback = Some(Feedback::Good);

        rec.retain(rating(U, 4, 5.0), &[candidate], false).unwrap();

        let cb = rec.case_base();
        assert!(cb.get_user_affinity(U) > 0.5);
        assert!(cb.get_user_preferences(U)[Genre::Action.index()] > 0.5);
        // Only the rating user adapts
        assert_eq!(cb.get_user_affinity(N), 0.5);
    }

    #[test]
    fn test_evaluate_rejects_zero_budget() {
        let mut rec = create_recommender(test_config());
        assert!(matches!(rec.evaluate(0), Err(CbrError::InvalidBudget)));
    }

    #[test]
    fn test_recommend_does_not_consume_cases() {
        let rec = create_recommender(test_config().with_train_ratio(0.5));
        let remaining = rec.case_base().remaining_test_cases();
        let _ = rec.recommend(U).unwrap();
        assert_eq!(rec.case_base().remaining_test_cases(), remaining);
    }
}
