//! Decision rules of the review phase.

use case_base::{CbrConfig, Feedback};

/// Feedback for one recommended movie.
///
/// `liked` means the observed rating beats the reference user's mean.
///
/// | same movie | similar genres | liked | feedback |
/// |------------|----------------|-------|----------|
/// | yes        | -              | yes   | GOOD     |
/// | yes        | -              | no    | BAD      |
/// | no         | yes            | yes   | GOOD     |
/// | no         | yes            | no    | BAD      |
/// | no         | no             | yes   | BAD      |
/// | no         | no             | no    | NEUTRAL  |
pub fn classify(
    same_movie: bool,
    similarity: f32,
    movie_threshold: f32,
    rating: f32,
    reference_mean: f32,
) -> Feedback {
    let similar = similarity > movie_threshold;
    let liked = rating > reference_mean;

    match (same_movie, similar, liked) {
        (true, _, true) => Feedback::Good,
        (true, _, false) => Feedback::Bad,
        (false, true, true) => Feedback::Good,
        (false, true, false) => Feedback::Bad,
        (false, false, true) => Feedback::Bad,
        (false, false, false) => Feedback::Neutral,
    }
}

/// A case is retained when its rating deviates from the movie mean AND the
/// recommendations were either clearly similar or clearly dissimilar.
pub fn should_retain(
    rating: f32,
    mean_movie_rating: f32,
    mean_similarity: f32,
    config: &CbrConfig,
) -> bool {
    let deviates = (rating - mean_movie_rating).abs() > config.threshold_keep_movie;
    let non_redundant = mean_similarity > config.high_similarity_threshold
        || mean_similarity < config.low_similarity_threshold;
    deviates && non_redundant
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_movie() {
        // Rated 5 against a neighbor mean of 3.0
        assert_eq!(classify(true, 1.0, 0.4, 5.0, 3.0), Feedback::Good);
        assert_eq!(classify(true, 1.0, 0.4, 3.0, 3.0), Feedback::Bad);
        // Genre similarity is irrelevant for the same movie
        assert_eq!(classify(true, 0.0, 0.4, 5.0, 3.0), Feedback::Good);
    }

    #[test]
    fn test_similar_movie() {
        assert_eq!(classify(false, 0.5, 0.4, 4.0, 3.0), Feedback::Good);
        assert_eq!(classify(false, 0.5, 0.4, 2.0, 3.0), Feedback::Bad);
    }

    #[test]
    fn test_dissimilar_movie() {
        assert_eq!(classify(false, 0.2, 0.4, 4.0, 3.0), Feedback::Bad);
        assert_eq!(classify(false, 0.2, 0.4, 2.0, 3.0), Feedback::Neutral);
        // Threshold itself is not "similar"
        assert_eq!(classify(false, 0.4, 0.4, 2.0, 3.0), Feedback::Neutral);
    }

    #[test]
    fn test_retain_requires_both_conditions() {
        let config = CbrConfig::default();

        // Deviation 2 > 1 but 0.5 sits inside the [0.40, 0.55] band
        assert!(!should_retain(5.0, 3.0, 0.5, &config));
        // Same deviation with dissimilar recommendations
        assert!(should_retain(5.0, 3.0, 0.1, &config));
        // Same deviation with very similar recommendations
        assert!(should_retain(5.0, 3.0, 0.9, &config));
        // No deviation
        assert!(!should_retain(3.5, 3.0, 0.1, &config));
    }
}
