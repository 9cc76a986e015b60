//! IO modules - side effects (network, filesystem)

#[cfg(feature = "network")]
pub mod download;
pub mod resolve;
