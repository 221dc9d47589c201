//! Domain models for rating data

pub mod matrix;
pub mod rating;

pub use matrix::RatingMatrix;
pub use rating::{ratings_of, RatingRecord};
