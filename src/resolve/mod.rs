//! Resolve module
//!
//! Out-of-band resolution of the `current` page key.

mod client;

pub use client::{RpcResolver, RpcResolverConfig};

#[cfg(test)]
mod tests;
