//! End-to-end checks on a hand-computed 3x3 rating matrix
//!
//! Items are rows, users are columns:
//!
//! ```text
//!          u0  u1  u2
//!   i0      4   3   5
//!   i1      2   -   4
//!   i2      3   5   1
//! ```

use ndarray::Array2;
use ratings_core::{RatingMatrix, RatingRecord, RatingsError};
use ratings_engine::{
    compute_biases, global_average, item_similarities, rmse, Biases, FactorParams, FactorTrainer,
    NeighborhoodPredictor, ParallelDispatcher, PredictionRequest,
};

const TOLERANCE: f64 = 1e-9;

fn train_records() -> Vec<RatingRecord> {
    let rows = [
        (1, 1, 4.0),
        (2, 1, 3.0),
        (3, 1, 5.0),
        (1, 2, 2.0),
        (3, 2, 4.0),
        (1, 3, 3.0),
        (2, 3, 5.0),
        (3, 3, 1.0),
    ];
    rows.iter()
        .map(|&(user, item, rating)| RatingRecord::new(user, item, rating, 0))
        .collect()
}

fn scenario() -> (RatingMatrix, f64, Biases) {
    let records = train_records();
    let matrix = RatingMatrix::from_records(&records, 3, 3).unwrap();
    let g = global_average(&records);
    let biases = compute_biases(&matrix, g);
    (matrix, g, biases)
}

fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < TOLERANCE,
        "expected {}, got {}",
        expected,
        actual
    );
}

#[test]
fn test_baseline_statistics() {
    let (_, g, biases) = scenario();

    assert_close(g, 3.375);
    for (actual, expected) in biases.item.iter().zip([0.625, -0.375, -0.375]) {
        assert_close(*actual, expected);
    }
    for (actual, expected) in biases.user.iter().zip([-0.375, 0.625, -0.041666666666666667]) {
        assert_close(*actual, expected);
    }
}

#[test]
fn test_similarities_for_missing_cell() {
    let (matrix, _, _) = scenario();

    let similarities = item_similarities(&matrix, 1, 1);
    assert_eq!(similarities.len(), 2);
    assert_eq!(similarities[0].0, 0);
    assert_close(similarities[0].1, 1.0);
    assert_eq!(similarities[1].0, 2);
    assert_close(similarities[1].1, -1.0);
}

#[test]
fn test_neighborhood_prediction() {
    let (matrix, g, biases) = scenario();
    let predictor = NeighborhoodPredictor::new(&matrix, &biases, g);

    assert_close(predictor.predict(1, 1, 1), 2.0);
}

#[test]
fn test_dispatched_prediction_matches_direct() {
    let (matrix, g, biases) = scenario();
    let predictor = NeighborhoodPredictor::new(&matrix, &biases, g);
    let test = vec![RatingRecord::new(2, 2, 2.0, 0)];
    let requests = PredictionRequest::from_records(&test, &matrix).unwrap();

    let dispatcher = ParallelDispatcher::new(2).unwrap();
    let predictions = dispatcher.predict_batch(&predictor, &requests, 1).unwrap();

    assert_eq!(predictions.len(), 1);
    assert_close(predictions[0], 2.0);
    assert_close(rmse(&predictions, &[2.0]).unwrap(), 0.0);
}

#[test]
fn test_one_sgd_epoch() {
    let (matrix, g, biases) = scenario();
    let trainer = FactorTrainer::new(&matrix, g);
    let params = FactorParams {
        latent_factors: 1,
        epochs: 1,
        alpha: 0.01,
        lambda: 0.1,
    };

    let model = trainer
        .train_from(
            &params,
            Array2::from_elem((3, 1), 0.5),
            Array2::from_elem((1, 3), 0.5),
            biases,
        )
        .unwrap();

    let item_bias = [
        0.6137892669791667,
        -0.37508288144051455,
        -0.3835168905071533,
    ];
    let user_bias = [
        -0.3800454693492351,
        0.6164868348486257,
        -0.04792960442373223,
    ];
    let q = [0.49383269580208333, 0.4986110980866018, 0.49340714346396924];
    let p = [0.4954599827444593, 0.49561206818030107, 0.49539437286175547];

    for i in 0..3 {
        assert_close(model.biases.item[i], item_bias[i]);
        assert_close(model.biases.user[i], user_bias[i]);
        assert_close(model.q[[i, 0]], q[i]);
        assert_close(model.p[[0, i]], p[i]);
    }
}

#[test]
fn test_rmse_contract() {
    assert_eq!(rmse(&[4.25], &[4.25]).unwrap(), 0.0);
    assert!(matches!(
        rmse(&[1.0, 2.0, 3.0], &[1.0, 2.0]),
        Err(RatingsError::ShapeMismatch { .. })
    ));
}
