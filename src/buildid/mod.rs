pub mod config;
pub mod digest;
pub mod preimage;
pub mod probe;
pub mod warn;
