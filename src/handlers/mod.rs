/// HTTP request handlers
pub mod hooks;
pub mod query;
pub mod repos;
pub mod sync;

pub use hooks::repo_hook;
pub use query::feature_set_query;
