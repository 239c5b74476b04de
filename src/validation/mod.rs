pub mod format;
pub mod iin;
pub mod mrz;

pub use format::FormatValidator;
pub use iin::IinValidator;
pub use mrz::{CheckDigitStatus, MrzValidator};
