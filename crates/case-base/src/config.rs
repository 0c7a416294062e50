//! Configuration of the case base and the CBR cycle.
//!
//! A flat set of named numeric parameters. Defaults reproduce the reference
//! setup; any subset can be overridden from a JSON file:
//!
//! ```json
//! {
//!   "rec_movies": 10,
//!   "train_ratio": 0.9,
//!   "seed": 7
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Invalid configuration. Always fatal at initialization.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Parameter {name} must be in interval [0, 1] but is {value}")]
    RatioOutOfRange { name: &'static str, value: f32 },

    #[error("Parameter {name} must be in interval (0, 1] but is {value}")]
    FractionOutOfRange { name: &'static str, value: f32 },

    #[error("Parameter {name} must be a non-negative number but is {value}")]
    Negative { name: &'static str, value: f32 },

    #[error("Parameter {name} must be at least 1")]
    ZeroCount { name: &'static str },

    #[error("Scoring weights are degenerate: {0}")]
    DegenerateWeights(String),

    #[error("min_shared ({min}) is greater than max_shared ({max})")]
    SharedRange { min: usize, max: usize },

    #[error("low_similarity_threshold ({low}) is greater than high_similarity_threshold ({high})")]
    SimilarityBand { low: f32, high: f32 },

    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config file: {0}")]
    Parse(#[from] serde_json::Error),
}

/// All tunable parameters of the recommender.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CbrConfig {
    // Reuse
    /// Suggestions taken from each neighbor
    pub movies_per_neighbor: usize,
    /// Candidates returned per query
    pub rec_movies: usize,

    // Adaptive state
    /// Starting value of every willingness weight and affinity
    pub initial_affinity: f32,
    /// Step size of the willingness / affinity moving average
    pub update_rate: f32,

    // Scoring weights
    /// Weight of the user-neighbor correlation
    pub alpha: f32,
    /// Weight of the movie popularity
    pub beta: f32,
    /// Weight of the user genre-profile / movie correlation
    pub gamma: f32,
    /// Weight of the genre willingness
    pub theta: f32,
    /// Weight of the user affinity
    pub omega: f32,

    // Partition
    /// Fraction of cases that seed the training partition
    pub train_ratio: f32,
    /// Fraction of the dataset ratings that enter the system at all
    pub ratings_ratio: f32,
    /// Seed of the partition permutation
    pub seed: u64,

    // Retrieve
    /// Top-rated movies of the query user used to find neighbors
    pub shared_movies: usize,
    pub max_neighbors: usize,
    pub max_shared: usize,
    pub min_shared: usize,
    /// Largest mean rating distance on shared movies for a neighbor
    pub max_sim_threshold: f32,

    // Review
    /// Rating deviation from the movie mean above which a case is novel
    pub threshold_keep_movie: f32,
    /// Genre similarity above which two movies count as similar
    pub movie_threshold: f32,
    pub high_similarity_threshold: f32,
    pub low_similarity_threshold: f32,

    // Retain
    /// Retained cases buffered before a case base commit
    pub update_value: usize,
}

impl Default for CbrConfig {
    fn default() -> Self {
        Self {
            movies_per_neighbor: 3,
            rec_movies: 5,
            initial_affinity: 0.5,
            update_rate: 0.1,
            alpha: 0.25,
            beta: 0.05,
            gamma: 0.55,
            theta: 0.15,
            omega: 0.15,
            train_ratio: 0.8,
            ratings_ratio: 1.0,
            seed: 42,
            shared_movies: 8,
            max_neighbors: 5,
            max_shared: 6,
            min_shared: 3,
            max_sim_threshold: 1.5,
            threshold_keep_movie: 1.0,
            movie_threshold: 0.4,
            high_similarity_threshold: 0.55,
            low_similarity_threshold: 0.40,
            update_value: 1,
        }
    }
}

fn check_ratio(name: &'static str, value: f32) -> Result<(), ConfigError> {
    if !(0.0..=1.0).contains(&value) {
        return Err(ConfigError::RatioOutOfRange { name, value });
    }
    Ok(())
}

fn check_fraction(name: &'static str, value: f32) -> Result<(), ConfigError> {
    if !(value > 0.0 && value <= 1.0) {
        return Err(ConfigError::FractionOutOfRange { name, value });
    }
    Ok(())
}

fn check_non_negative(name: &'static str, value: f32) -> Result<(), ConfigError> {
    if !(value >= 0.0 && value.is_finite()) {
        return Err(ConfigError::Negative { name, value });
    }
    Ok(())
}

fn check_count(name: &'static str, value: usize) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::ZeroCount { name });
    }
    Ok(())
}

impl CbrConfig {
    /// Load a configuration from a JSON file and validate it.
    ///
    /// Missing keys keep their default value; unknown keys are rejected.
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    /// Parse a configuration from JSON text and validate it.
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let config: CbrConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Set the partition seed (builder pattern)
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set the training fraction (builder pattern)
    pub fn with_train_ratio(mut self, train_ratio: f32) -> Self {
        self.train_ratio = train_ratio;
        self
    }

    /// Set the retain batch size (builder pattern)
    pub fn with_update_value(mut self, update_value: usize) -> Self {
        self.update_value = update_value;
        self
    }

    /// The five scoring weights in formula order
    pub fn weights(&self) -> [f32; 5] {
        [self.alpha, self.beta, self.gamma, self.theta, self.omega]
    }

    /// Check every parameter against its domain.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_ratio("initial_affinity", self.initial_affinity)?;
        check_ratio("update_rate", self.update_rate)?;
        check_ratio("movie_threshold", self.movie_threshold)?;
        check_ratio("high_similarity_threshold", self.high_similarity_threshold)?;
        check_ratio("low_similarity_threshold", self.low_similarity_threshold)?;
        check_fraction("train_ratio", self.train_ratio)?;
        check_fraction("ratings_ratio", self.ratings_ratio)?;

        check_non_negative("max_sim_threshold", self.max_sim_threshold)?;
        check_non_negative("threshold_keep_movie", self.threshold_keep_movie)?;

        check_count("movies_per_neighbor", self.movies_per_neighbor)?;
        check_count("rec_movies", self.rec_movies)?;
        check_count("shared_movies", self.shared_movies)?;
        check_count("max_neighbors", self.max_neighbors)?;
        check_count("max_shared", self.max_shared)?;
        check_count("update_value", self.update_value)?;

        if self.min_shared > self.max_shared {
            return Err(ConfigError::SharedRange {
                min: self.min_shared,
                max: self.max_shared,
            });
        }
        if self.low_similarity_threshold > self.high_similarity_threshold {
            return Err(ConfigError::SimilarityBand {
                low: self.low_similarity_threshold,
                high: self.high_similarity_threshold,
            });
        }

        let names = ["alpha", "beta", "gamma", "theta", "omega"];
        for (name, weight) in names.into_iter().zip(self.weights()) {
            check_non_negative(name, weight)?;
        }
        if self.weights().iter().sum::<f32>() <= 0.0 {
            return Err(ConfigError::DegenerateWeights(
                "all scoring weights are zero".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(CbrConfig::default().validate().is_ok());
    }

    #[test]
    fn test_ratio_out_of_range() {
        let config = CbrConfig {
            update_rate: 1.5,
            ..CbrConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::RatioOutOfRange { name: "update_rate", .. })
        ));
    }

    #[test]
    fn test_train_ratio_must_be_positive() {
        let config = CbrConfig::default().with_train_ratio(0.0);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::FractionOutOfRange { name: "train_ratio", .. })
        ));

        assert!(CbrConfig::default().with_train_ratio(1.0).validate().is_ok());
    }

    #[test]
    fn test_nan_is_rejected() {
        let config = CbrConfig {
            movie_threshold: f32::NAN,
            ..CbrConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_degenerate_weights() {
        let config = CbrConfig {
            alpha: 0.0,
            beta: 0.0,
            gamma: 0.0,
            theta: 0.0,
            omega: 0.0,
            ..CbrConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::DegenerateWeights(_))));

        let negative = CbrConfig {
            beta: -0.1,
            ..CbrConfig::default()
        };
        assert!(matches!(negative.validate(), Err(ConfigError::Negative { name: "beta", .. })));
    }

    #[test]
    fn test_inverted_ranges() {
        let shared = CbrConfig {
            min_shared: 7,
            max_shared: 6,
            ..CbrConfig::default()
        };
        assert!(matches!(shared.validate(), Err(ConfigError::SharedRange { .. })));

        let band = CbrConfig {
            low_similarity_threshold: 0.6,
            ..CbrConfig::default()
        };
        assert!(matches!(band.validate(), Err(ConfigError::SimilarityBand { .. })));
    }

    #[test]
    fn test_zero_update_value() {
        let config = CbrConfig::default().with_update_value(0);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ZeroCount { name: "update_value" })
        ));
    }

    #[test]
    fn test_from_json_partial() {
        let config = CbrConfig::from_json_str(r#"{ "rec_movies": 10, "seed": 7 }"#).unwrap();
        assert_eq!(config.rec_movies, 10);
        assert_eq!(config.seed, 7);
        assert_eq!(config.max_neighbors, CbrConfig::default().max_neighbors);
    }

    #[test]
    fn test_from_json_rejects_invalid() {
        assert!(matches!(
            CbrConfig::from_json_str(r#"{ "train_ratio": 2.0 }"#),
            Err(ConfigError::FractionOutOfRange { .. })
        ));
        assert!(matches!(
            CbrConfig::from_json_str(r#"{ "not_a_parameter": 1 }"#),
            Err(ConfigError::Parse(_))
        ));
    }
}
