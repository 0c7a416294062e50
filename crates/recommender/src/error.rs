//! Error types for the CBR cycle.

use case_base::CaseBaseError;
use data_loader::{MovieId, UserId};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CbrError {
    /// Initialization or commit failure inside the case base
    #[error(transparent)]
    CaseBase(#[from] CaseBaseError),

    /// The query user is not part of the dataset
    #[error("User {0} is not in the case base")]
    UnknownUser(UserId),

    /// Review received no candidates; the reuse phase broke its contract
    #[error("No candidates to review for user {user_id} (rated movie {movie_id})")]
    EmptyCandidateSet { user_id: UserId, movie_id: MovieId },

    /// Evaluation was asked to consume zero cases
    #[error("Evaluation budget must be at least 1")]
    InvalidBudget,
}

pub type Result<T> = std::result::Result<T, CbrError>;
