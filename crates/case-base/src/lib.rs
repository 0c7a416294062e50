//! # Case Base Crate
//!
//! The evolving repository of rating cases and everything derived from it.
//!
//! ## Components
//!
//! ### Case Base
//! Owns the training / test partition and answers the queries of the CBR
//! cycle:
//! - Neighbor search over shared top-rated movies
//! - Pearson user similarity and Jaccard genre similarity
//! - Candidate generation (neighbor suggestions, popularity fallback)
//! - Composite candidate scoring
//!
//! ### Statistics Store
//! Popularity, mean ratings and genre profiles (recomputed on commit) plus
//! the adaptive per-user willingness and affinity (updated after review).
//!
//! ## Example Usage
//!
//! ```ignore
//! use case_base::{CaseBase, CbrConfig};
//! use data_loader::Dataset;
//!
//! let dataset = Dataset::load_from_dir(Path::new("data/ml-1m"))?;
//! let mut cb = CaseBase::initialize(dataset, CbrConfig::default())?;
//!
//! let case = cb.next_test_case().unwrap();
//! let neighbors = cb.get_user_candidates(case.user_id, 8, 5, 6, 3, 1.5);
//! ```

pub mod candidate;
pub mod case_base;
pub mod config;
pub mod error;
pub mod similarity;
pub mod stats;

// Re-export commonly used types
pub use candidate::{CandidateInfo, Feedback, Neighbor};
pub use case_base::{CaseBase, NEIGHBOR_POOL_FACTOR};
pub use config::{CbrConfig, ConfigError};
pub use error::{CaseBaseError, Result};
pub use stats::{GenreVector, StatisticsStore};
