//! Consolidated test modules.
//!
//! This module contains end-to-end tests that sweep a real [`MemoryStore`]
//! through configuration-built collectors and processors.
//!
//! [`MemoryStore`]: crate::store::MemoryStore
