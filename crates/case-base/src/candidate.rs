//! Types exchanged between the case base and the CBR cycle.

use data_loader::{Genre, MovieId, UserId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome of reviewing one recommended movie against the observed rating
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Feedback {
    Good,
    Bad,
    Neutral,
}

impl fmt::Display for Feedback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Feedback::Good => "GOOD",
            Feedback::Bad => "BAD",
            Feedback::Neutral => "NEUTRAL",
        };
        f.write_str(label)
    }
}

/// A retrieved neighbor of a query user. Recomputed on every query.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Neighbor {
    pub user_id: UserId,
    pub similarity: f32,
}

/// A scored movie proposed to `user_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateInfo {
    pub movie_id: MovieId,
    pub name: String,
    pub genres: Vec<Genre>,
    /// Query user the movie is recommended to
    pub user_id: UserId,
    /// Neighbor that suggested the movie; `None` for popularity fallbacks
    pub neighbor: Option<UserId>,
    pub score: f32,
    /// Set by the review phase
    pub feedback: Option<Feedback>,
}

impl CandidateInfo {
    /// User whose mean rating the review compares against.
    ///
    /// The contributing neighbor, or the query user itself for popularity
    /// fallbacks that have no neighbor.
    pub fn reference_user(&self) -> UserId {
        self.neighbor.unwrap_or(self.user_id)
    }
}
