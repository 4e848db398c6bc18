//! Repository acquisition: git plumbing and the mirror cache.

pub mod git;
pub mod mirror;

pub use git::GitTimeouts;
pub use mirror::{MirrorCache, MirrorState, MIRROR_STATE_BASENAME};
