mod error;
mod integrity;
mod models;
mod ordering;
mod repository;
mod schema;
mod schema_store;
mod store;
mod validation;

pub use error::{LibraryError, LibraryResult};
pub use models::*;
pub use schema::LIBRARY_VERSIONED_SCHEMAS;
pub use store::Library;
pub use validation::ValidationError;
