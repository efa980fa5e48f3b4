pub mod context;
pub mod error;
pub mod test_macros;

pub use context::{Actor, TenantContext, TenantCtxExtractor};
pub use error::SecurityError;
