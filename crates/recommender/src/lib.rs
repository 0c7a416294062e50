//! The adaptive CBR recommendation cycle.
//!
//! This crate provides:
//! - The `CbrCycle` trait (Retrieve, Reuse, Review, Retain)
//! - `MovieRecommender`, the controller that runs the cycle over the
//!   case base's test stream
//! - Review rules and the retain buffer used for batched commits
//! - `Evaluation`, the per-iteration score and similarity sequences
//!
//! ## Architecture
//! For each test case (user u rated movie m with r):
//! 1. Retrieve ranks u's neighbors by Pearson similarity
//! 2. Reuse turns the neighbors' favourites into scored candidates
//! 3. Review labels each candidate GOOD / BAD / NEUTRAL against (m, r)
//! 4. Retain buffers novel cases, commits every `update_value` of them and
//!    adapts u's genre willingness and affinity
//!
//! ## Example Usage
//! ```ignore
//! use recommender::MovieRecommender;
//! use case_base::CbrConfig;
//!
//! let dataset = Dataset::load_from_dir(Path::new("data/ml-1m"))?;
//! let mut recommender = MovieRecommender::from_dataset(dataset, CbrConfig::default())?;
//!
//! let evaluation = recommender.evaluate(100)?;
//! println!("mean score {:.3}", evaluation.mean_score());
//! ```

pub mod error;
pub mod evaluation;
pub mod recommender;
pub mod retain;
pub mod review;
pub mod traits;

// Re-export main types
pub use error::{CbrError, Result};
pub use evaluation::Evaluation;
pub use recommender::MovieRecommender;
pub use retain::RetainBuffer;
pub use review::{classify, should_retain};
pub use traits::{CbrCycle, CycleReport, ReviewOutcome};
