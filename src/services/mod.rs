pub mod probes;

pub use probes::*;
