pub mod error;
pub mod options;
pub mod runtime;
pub mod summary;
