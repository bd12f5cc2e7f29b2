pub mod models;
pub mod pool;

pub use models::*;
pub use pool::*;
