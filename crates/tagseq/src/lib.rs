#![doc = include_str!("../README.md")]

pub mod allocator;
pub mod committer;
mod error;
pub mod format;
mod model;
mod mutex;
pub mod policy;
pub mod store;
pub mod workflow;

pub use crate::allocator::*;
pub use crate::committer::*;
pub use crate::error::*;
pub use crate::format::*;
pub use crate::model::*;
pub use crate::store::*;
