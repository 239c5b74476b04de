pub mod config;
pub mod models;
pub mod passport_parser;
pub mod processing;
pub mod utils;
pub mod validation;

pub use config::ParserConfig;
pub use models::{DocumentRecord, Sex};
pub use passport_parser::{LogObserver, NoopObserver, ParseObserver, PassportParser};
pub use utils::PassportError;
