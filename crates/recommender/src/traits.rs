//! The four-phase CBR cycle as a trait.
//!
//! Each phase consumes only the previous phase's output. `run_cycle`
//! chains them for one observed rating.

use crate::error::{CbrError, Result};
use case_base::{CandidateInfo, Neighbor};
use data_loader::{Rating, UserId};

/// Output of the review phase
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewOutcome {
    /// The recommended candidates, each with its feedback set
    pub reviewed: Vec<CandidateInfo>,
    /// Whether the rated case is novel enough to enter the case base
    pub retain_rated_case: bool,
    /// Mean genre similarity between the rated movie and the candidates
    pub mean_similarity: f32,
}

/// What one pass through the cycle produced
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    pub case: Rating,
    pub neighbors: usize,
    /// Mean score of the reused candidates
    pub mean_score: f32,
    pub mean_similarity: f32,
    pub retained: bool,
    /// Whether retaining this case triggered a case base commit
    pub committed: bool,
}

/// Retrieve → Reuse → Review → Retain.
///
/// Only `retain` takes `&mut self`: it is the single phase allowed to
/// change adaptive state or the case base.
pub trait CbrCycle {
    /// Ranked neighbors of `user_id`, most similar first
    fn retrieve(&self, user_id: UserId) -> Result<Vec<Neighbor>>;

    /// Ranked, deduplicated candidate movies for `user_id`
    fn reuse(&self, user_id: UserId, neighbors: &[Neighbor]) -> Vec<CandidateInfo>;

    /// Compare the recommendations against the observed rating
    fn review(&self, rated: &Rating, recommended: Vec<CandidateInfo>) -> Result<ReviewOutcome>;

    /// Buffer / commit the case and adapt willingness and affinity.
    ///
    /// Returns whether a case base commit happened.
    fn retain(
        &mut self,
        rated: Rating,
        feedback: &[CandidateInfo],
        retain_rated_case: bool,
    ) -> Result<bool>;

    /// Run the whole cycle for one observed rating
    fn run_cycle(&mut self, rated: Rating) -> Result<CycleReport> {
        let neighbors = self.retrieve(rated.user_id)?;
        let recommended = self.reuse(rated.user_id, &neighbors);

        if recommended.is_empty() {
            return Err(CbrError::EmptyCandidateSet {
                user_id: rated.user_id,
                movie_id: rated.movie_id,
            });
        }
        let mean_score =
            recommended.iter().map(|c| c.score).sum::<f32>() / recommended.len() as f32;

        let outcome = self.review(&rated, recommended)?;
        let committed = self.retain(rated, &outcome.reviewed, outcome.retain_rated_case)?;

        Ok(CycleReport {
            case: rated,
            neighbors: neighbors.len(),
            mean_score,
            mean_similarity: outcome.mean_similarity,
            retained: outcome.retain_rated_case,
            committed,
        })
    }
}
