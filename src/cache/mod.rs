//! Cache module - The on-disk tag cache and the policy that fills it
//!
//! Provides:
//! - Cache storage (a flat name -> tags JSON object)
//! - Tag resolution with negative caching

pub mod resolver;
pub mod store;
