//! Per-iteration metrics collected by an evaluation run.

use crate::traits::CycleReport;
use serde::Serialize;

/// One entry per consumed test case, in consumption order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Evaluation {
    /// Mean candidate score of each iteration
    pub scores: Vec<f32>,
    /// Mean review similarity of each iteration
    pub similarities: Vec<f32>,
    /// Cases that entered the retain buffer
    pub retained: usize,
    /// Case base commits triggered
    pub commits: usize,
}

impl Evaluation {
    pub fn record(&mut self, report: &CycleReport) {
        self.scores.push(report.mean_score);
        self.similarities.push(report.mean_similarity);
        if report.retained {
            self.retained += 1;
        }
        if report.committed {
            self.commits += 1;
        }
    }

    /// Number of iterations recorded
    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    pub fn mean_score(&self) -> f32 {
        mean(&self.scores)
    }

    pub fn mean_similarity(&self) -> f32 {
        mean(&self.similarities)
    }
}

fn mean(values: &[f32]) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f32>() / values.len() as f32
}
