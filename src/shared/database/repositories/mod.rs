// All repositories module
pub mod billing;

// Re-export all repositories for convenience
pub use billing::*;
