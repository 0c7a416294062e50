//! Similarity measures used by the case base.
//!
//! Both measures are total: degenerate inputs (no variance, empty genre
//! sets) yield 0.0 instead of NaN.

use data_loader::Genre;
use std::collections::HashSet;

/// Pearson correlation of two equally long samples, centred on their own means.
///
/// Returns 0.0 when fewer than two pairs are given or either sample has
/// zero variance. The result is clamped to [-1, 1] to absorb rounding.
pub fn pearson_correlation(xs: &[f32], ys: &[f32]) -> f32 {
    let n = xs.len().min(ys.len());
    if n < 2 {
        return 0.0;
    }
    let (xs, ys) = (&xs[..n], &ys[..n]);

    let mean_x = xs.iter().sum::<f32>() / n as f32;
    let mean_y = ys.iter().sum::<f32>() / n as f32;

    let mut num = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (x, y) in xs.iter().zip(ys) {
        let dx = x - mean_x;
        let dy = y - mean_y;
        num += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    let den = var_x.sqrt() * var_y.sqrt();
    if den == 0.0 {
        return 0.0;
    }
    (num / den).clamp(-1.0, 1.0)
}

/// Jaccard index between two genre sets.
///
/// Two genre-less movies share no information, so an empty union is 0.0.
pub fn jaccard_similarity(a: &[Genre], b: &[Genre]) -> f32 {
    let set_a: HashSet<Genre> = a.iter().copied().collect();
    let set_b: HashSet<Genre> = b.iter().copied().collect();

    let union = set_a.union(&set_b).count();
    if union == 0 {
        return 0.0;
    }
    set_a.intersection(&set_b).count() as f32 / union as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pearson_perfect_positive() {
        let r = pearson_correlation(&[5.0, 2.0], &[4.0, 1.0]);
        assert!((r - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_pearson_perfect_negative() {
        let r = pearson_correlation(&[1.0, 2.0, 3.0], &[3.0, 2.0, 1.0]);
        assert!((r + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_pearson_degenerate() {
        // Zero variance on one side
        assert_eq!(pearson_correlation(&[3.0, 3.0, 3.0], &[1.0, 4.0, 5.0]), 0.0);
        // Not enough pairs
        assert_eq!(pearson_correlation(&[3.0], &[1.0]), 0.0);
        assert_eq!(pearson_correlation(&[], &[]), 0.0);
    }

    #[test]
    fn test_pearson_symmetric() {
        let a = [4.0, 1.0, 3.0, 5.0, 2.0];
        let b = [3.0, 2.0, 2.0, 5.0, 1.0];
        assert_eq!(pearson_correlation(&a, &b), pearson_correlation(&b, &a));
    }

    #[test]
    fn test_jaccard() {
        let a = [Genre::Action, Genre::Adventure];
        let b = [Genre::Action, Genre::SciFi, Genre::Thriller];

        assert!((jaccard_similarity(&a, &b) - 0.25).abs() < 1e-6);
        assert_eq!(jaccard_similarity(&a, &a), 1.0);
        assert_eq!(jaccard_similarity(&a, &[Genre::Drama]), 0.0);
    }

    #[test]
    fn test_jaccard_empty_union() {
        assert_eq!(jaccard_similarity(&[], &[]), 0.0);
        assert_eq!(jaccard_similarity(&[Genre::Drama], &[]), 0.0);
    }

    #[test]
    fn test_jaccard_bounded() {
        let pool = Genre::ALL;
        for i in 0..pool.len() {
            for j in i..pool.len() {
                let a = &pool[..=i];
                let b = &pool[j..];
                let s = jaccard_similarity(a, b);
                assert!((0.0..=1.0).contains(&s));
            }
        }
    }
}
