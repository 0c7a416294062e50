//! Error types for the case-base crate.

use crate::config::ConfigError;
use data_loader::DataLoadError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CaseBaseError {
    /// Invalid parameters; fatal at initialization
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Malformed dataset, or a batch that references unknown rows
    #[error(transparent)]
    Data(#[from] DataLoadError),

    /// The parallel arrays of a retain batch differ in length
    #[error(
        "Batch arrays differ in length: users={users}, movies={movies}, ratings={ratings}, timestamps={timestamps}"
    )]
    BatchLengthMismatch {
        users: usize,
        movies: usize,
        ratings: usize,
        timestamps: usize,
    },

    /// The configured ratios leave no training cases
    #[error("No training cases: {ratings} ratings with ratings_ratio={ratings_ratio} and train_ratio={train_ratio}")]
    EmptyTrainingSet {
        ratings: usize,
        ratings_ratio: f32,
        train_ratio: f32,
    },
}

pub type Result<T> = std::result::Result<T, CaseBaseError>;
