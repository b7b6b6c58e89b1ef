//! Three-way conflict detection and diff application.
//!
//! [`detect_conflicts`] compares a common base against two diverged branches
//! and reports the overlapping changes; [`apply_diff`] replays a diff onto a
//! deck to produce the merged result.

pub mod detector;
pub mod merger;

pub use detector::detect_conflicts;
pub use merger::apply_diff;
