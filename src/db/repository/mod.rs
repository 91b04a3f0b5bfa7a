pub mod analysis_cache;
pub mod pending_sync;

pub use analysis_cache::*;
pub use pending_sync::*;
