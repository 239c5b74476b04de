pub mod error;
pub mod similarity;

pub use error::PassportError;
pub use similarity::{is_similar, levenshtein_distance};
