//! Domain model for projects, boards, lists, tasks, and their ordering.
//!
//! # Invariants
//! - Every entity is identified by a stable UUID.
//! - Positions are 1-based and dense within their container at rest.

pub mod board;
pub mod comment;
pub mod placement;
pub mod task;
pub mod text;
