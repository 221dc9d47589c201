//! Item-item Pearson similarity over co-rated users

use ratings_core::RatingMatrix;

/// Fewest jointly observed ratings for a correlation to be computed
const MIN_CO_RATED: usize = 2;

/// Pearson correlation of two equally long samples.
///
/// Returns 0.0 when the correlation is undefined (fewer than two points or
/// zero variance in either sample).
pub fn pearson(xs: &[f64], ys: &[f64]) -> f64 {
    let n = xs.len().min(ys.len());
    if n < 2 {
        return 0.0;
    }

    let mean_x = xs[..n].iter().sum::<f64>() / n as f64;
    let mean_y = ys[..n].iter().sum::<f64>() / n as f64;

    let mut covariance = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (x, y) in xs[..n].iter().zip(&ys[..n]) {
        let dx = x - mean_x;
        let dy = y - mean_y;
        covariance += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    let denominator = (var_x * var_y).sqrt();
    if denominator == 0.0 || !denominator.is_finite() {
        return 0.0;
    }

    let r = covariance / denominator;
    if r.is_nan() {
        0.0
    } else {
        r.clamp(-1.0, 1.0)
    }
}

/// Similarity of `target_item` to every other item rated by `target_user`.
///
/// Correlations use only the users who rated both items; candidates with
/// fewer than two such users are left out. Entries follow item order.
pub fn item_similarities(
    matrix: &RatingMatrix,
    target_item: usize,
    target_user: usize,
) -> Vec<(usize, f64)> {
    let target = matrix.item_row(target_item);
    let mut similarities = Vec::new();
    let mut xs = Vec::with_capacity(matrix.n_users());
    let mut ys = Vec::with_capacity(matrix.n_users());

    for candidate in 0..matrix.n_items() {
        if candidate == target_item || matrix.get(candidate, target_user).is_none() {
            continue;
        }

        xs.clear();
        ys.clear();
        for (a, b) in target.iter().zip(matrix.item_row(candidate).iter()) {
            if let (Some(a), Some(b)) = (a, b) {
                xs.push(*a);
                ys.push(*b);
            }
        }

        if xs.len() < MIN_CO_RATED {
            continue;
        }

        similarities.push((candidate, pearson(&xs, &ys)));
    }

    similarities
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scenario() -> RatingMatrix {
        RatingMatrix::from_rows(&[
            vec![Some(4.0), Some(3.0), Some(5.0)],
            vec![Some(2.0), None, Some(4.0)],
            vec![Some(3.0), Some(5.0), Some(1.0)],
        ])
        .unwrap()
    }

    #[test]
    fn test_pearson_perfect_correlation() {
        assert!((pearson(&[1.0, 2.0, 3.0], &[2.0, 4.0, 6.0]) - 1.0).abs() < 1e-12);
        assert!((pearson(&[1.0, 2.0, 3.0], &[3.0, 2.0, 1.0]) + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_pearson_zero_variance_is_zero() {
        assert_eq!(pearson(&[3.0, 3.0, 3.0], &[1.0, 2.0, 5.0]), 0.0);
        assert_eq!(pearson(&[1.0], &[2.0]), 0.0);
    }

    #[test]
    fn test_pearson_known_value() {
        // cov = 1, var_x = var_y = 2
        let r = pearson(&[1.0, 2.0, 3.0], &[1.0, 3.0, 2.0]);
        assert!((r - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_scenario_similarities() {
        let sims = item_similarities(&scenario(), 1, 1);
        assert_eq!(sims.len(), 2);
        assert_eq!(sims[0].0, 0);
        assert!((sims[0].1 - 1.0).abs() < 1e-12);
        assert_eq!(sims[1].0, 2);
        assert!((sims[1].1 + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_never_self_similar() {
        let matrix = scenario();
        for item in 0..3 {
            for user in 0..3 {
                let sims = item_similarities(&matrix, item, user);
                assert!(sims.iter().all(|(candidate, _)| *candidate != item));
            }
        }
    }

    #[test]
    fn test_candidates_need_two_co_rated_users() {
        let matrix = RatingMatrix::from_rows(&[
            vec![Some(4.0), None, Some(2.0)],
            vec![Some(5.0), Some(1.0), None],
            vec![Some(3.0), Some(2.0), Some(4.0)],
        ])
        .unwrap();

        // Item 1 shares only user 0 with item 0
        let sims = item_similarities(&matrix, 0, 1);
        assert_eq!(sims.len(), 1);
        assert_eq!(sims[0].0, 2);
    }

    #[test]
    fn test_candidates_must_rate_target_user() {
        let sims = item_similarities(&scenario(), 0, 1);
        assert!(sims.iter().all(|(candidate, _)| *candidate != 1));
    }
}
