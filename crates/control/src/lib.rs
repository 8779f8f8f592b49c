pub mod cache;
pub mod concurrency;
pub mod log_store;
pub mod resolver;
pub mod sqlite_store;

pub use cache::ResolverCache;
pub use concurrency::{ConcurrencyManager, TokenGuard};
pub use log_store::SqliteLogStore;
pub use resolver::{check_invocable, FunctionResolver};
pub use sqlite_store::SqliteMetadataStore;
