//! Invocation context and mutation merging.
//!
//! This module provides:
//! - Thread-safe field bags for the request and response data steps mutate
//! - Shallow merge patches, the static step kind
//! - The per-invocation context threaded through every step

mod bag;
mod invocation;
mod merge;

pub use bag::FieldBag;
pub use invocation::InvocationContext;
pub use merge::MergePatch;
