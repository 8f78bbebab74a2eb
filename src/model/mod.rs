//! Model seam: classifier capability trait and the default implementation.

pub mod classifier;
pub mod logistic;

pub use classifier::{test_matrix, training_matrix, Classifier};
pub use logistic::LogisticModel;
