//! Recording session tokens

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);

/// Identifies one dependency-recording session.
///
/// Tokens come from a process-wide counter and are never reused, so a stale
/// token can never address a newer session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordToken(u64);

impl RecordToken {
	pub(crate) fn next() -> Self {
		Self(NEXT_TOKEN.fetch_add(1, Ordering::Relaxed))
	}

	pub fn as_u64(&self) -> u64 {
		self.0
	}
}

impl fmt::Display for RecordToken {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "#{}", self.0)
	}
}
