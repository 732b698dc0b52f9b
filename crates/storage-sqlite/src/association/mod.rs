//! SQLite persistence for the entrepreneur–municipality association table.

mod model;
mod repository;

pub use model::AssociationDB;
pub use repository::AssociationStore;
