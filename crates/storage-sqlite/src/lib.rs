//! SQLite implementation of the local store.
//!
//! Three tables back the directory cache: municipalities, entrepreneurs, and
//! the entrepreneur–municipality association rows. Writes funnel through a
//! dedicated writer thread (one transaction per batch); reads come straight
//! off the r2d2 pool. Every committed write publishes a table-change event,
//! which powers the push-based `watch_*` live queries.

pub mod association;
pub mod db;
pub mod entrepreneur;
pub mod errors;
pub mod municipality;
pub mod schema;
pub mod session;

pub use association::AssociationStore;
pub use db::{create_pool, get_connection, init, run_migrations, ChangeBus, LiveQuery, TableChange};
pub use db::write_actor::{spawn_writer, WriteHandle};
pub use entrepreneur::EntrepreneurStore;
pub use errors::StorageError;
pub use municipality::MunicipalityStore;
pub use session::PrefsSessionStore;
