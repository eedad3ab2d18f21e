pub mod error;
pub mod query;
pub mod store;
pub mod testing;

pub use error::StoreError;
pub use query::{ActionPage, ActionQuery};
pub use store::RemediationStore;
