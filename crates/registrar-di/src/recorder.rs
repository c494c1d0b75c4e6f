//! Dependency recording sessions
//!
//! A recorder keeps an explicit stack of active accumulators plus a side table
//! of paused ones. Every successful resolution appends its qualified name to
//! each active accumulator.
//!
//! The resolver wraps each factory call in a *frame*: all active accumulators
//! are paused, a fresh internal accumulator is pushed, and when the factory
//! returns the internal accumulator is popped and the paused ones resumed.
//! Because of this, nested constructions never leak into the frame that
//! triggered them:
//!
//! ```text
//! resolve(A)            frame(A) active
//!   resolve(B)          frame(A) paused, frame(B) active
//!     resolve(C)        frame(B) paused, frame(C) active  -> C records nothing
//!     record(C)         frame(B) = [C]
//!   record(B)           frame(A) = [B]
//! ```
//!
//! Each registry keeps one recorder per thread, so sessions and frames never
//! see resolutions made on another thread.

use std::collections::HashMap;

use registrar_conf::RecordingPolicy;

use crate::error::{DiError, DiResult};
use crate::name::QualifiedName;
use crate::token::RecordToken;

#[derive(Debug)]
struct Accumulator {
	token: RecordToken,
	names: Vec<QualifiedName>,
	handed_out_handles: bool,
}

impl Accumulator {
	fn new(token: RecordToken) -> Self {
		Self {
			token,
			names: Vec::new(),
			handed_out_handles: false,
		}
	}
}

/// An internal recording session opened around one factory invocation.
#[derive(Debug)]
#[must_use = "a frame must be closed with `exit_frame`"]
pub(crate) struct RecordingFrame {
	token: RecordToken,
	suspended: Vec<RecordToken>,
}

/// What one factory invocation consulted.
#[derive(Debug, Default, PartialEq)]
pub(crate) struct FrameRecord {
	pub(crate) dependencies: Vec<QualifiedName>,
	/// A [`Lazy`](crate::Lazy) or [`Factory`](crate::Factory) bound to the
	/// resolving registry was created during the invocation.
	pub(crate) handed_out_handles: bool,
}

/// Session bookkeeping for one registry value.
#[derive(Debug)]
pub struct DependencyRecorder {
	policy: RecordingPolicy,
	active: Vec<Accumulator>,
	paused: HashMap<RecordToken, Accumulator>,
}

impl DependencyRecorder {
	pub fn new(policy: RecordingPolicy) -> Self {
		Self {
			policy,
			active: Vec::new(),
			paused: HashMap::new(),
		}
	}

	pub fn policy(&self) -> RecordingPolicy {
		self.policy
	}

	/// Opens an empty, active accumulator.
	pub fn start(&mut self) -> RecordToken {
		let token = RecordToken::next();
		self.active.push(Accumulator::new(token));
		token
	}

	/// Moves an active accumulator to the paused table.
	pub fn pause(&mut self, token: RecordToken) -> DiResult<()> {
		let position = self
			.active
			.iter()
			.position(|acc| acc.token == token)
			.ok_or_else(|| DiError::invalid_token(token, "not an active session"))?;
		let accumulator = self.active.remove(position);
		self.paused.insert(token, accumulator);
		Ok(())
	}

	/// Moves a paused accumulator back onto the active stack.
	pub fn resume(&mut self, token: RecordToken) -> DiResult<()> {
		let accumulator = self
			.paused
			.remove(&token)
			.ok_or_else(|| DiError::invalid_token(token, "not a paused session"))?;
		self.active.push(accumulator);
		Ok(())
	}

	/// Closes a session, active or paused, and returns what it recorded.
	pub fn stop(&mut self, token: RecordToken) -> DiResult<Vec<QualifiedName>> {
		self.take(token).map(|acc| acc.names)
	}

	fn take(&mut self, token: RecordToken) -> DiResult<Accumulator> {
		if let Some(position) = self.active.iter().position(|acc| acc.token == token) {
			return Ok(self.active.remove(position));
		}
		self.paused
			.remove(&token)
			.ok_or_else(|| DiError::invalid_token(token, "unknown or already stopped"))
	}

	/// Appends `name` to every active accumulator.
	pub fn record(&mut self, name: &QualifiedName) {
		for accumulator in &mut self.active {
			if self.policy == RecordingPolicy::Deduplicate && accumulator.names.contains(name) {
				continue;
			}
			accumulator.names.push(name.clone());
		}
	}

	/// Flags every active accumulator as having handed out a registry-bound
	/// handle.
	pub(crate) fn mark_handle(&mut self) {
		for accumulator in &mut self.active {
			accumulator.handed_out_handles = true;
		}
	}

	pub fn is_active(&self, token: RecordToken) -> bool {
		self.active.iter().any(|acc| acc.token == token)
	}

	pub fn is_paused(&self, token: RecordToken) -> bool {
		self.paused.contains_key(&token)
	}

	/// Number of open sessions, active and paused.
	pub fn open_sessions(&self) -> usize {
		self.active.len() + self.paused.len()
	}

	pub(crate) fn enter_frame(&mut self) -> RecordingFrame {
		let suspended: Vec<RecordToken> = self.active.iter().map(|acc| acc.token).collect();
		for accumulator in self.active.drain(..) {
			self.paused.insert(accumulator.token, accumulator);
		}
		RecordingFrame {
			token: self.start(),
			suspended,
		}
	}

	/// Closes the frame's accumulator and resumes the sessions it suspended.
	///
	/// Suspended sessions that were stopped or resumed while the frame was
	/// open are left alone.
	pub(crate) fn exit_frame(&mut self, frame: RecordingFrame) -> DiResult<FrameRecord> {
		let recorded = self.take(frame.token);
		for token in frame.suspended {
			if let Some(accumulator) = self.paused.remove(&token) {
				self.active.push(accumulator);
			}
		}
		recorded.map(|acc| FrameRecord {
			dependencies: acc.names,
			handed_out_handles: acc.handed_out_handles,
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	fn svc(name: &str) -> QualifiedName {
		QualifiedName::service(name)
	}

	#[rstest]
	fn test_record_reaches_only_active_sessions() {
		// Arrange
		let mut recorder = DependencyRecorder::new(RecordingPolicy::Deduplicate);
		let first = recorder.start();
		let second = recorder.start();
		recorder.pause(second).unwrap();

		// Act
		recorder.record(&svc("a"));
		recorder.resume(second).unwrap();
		recorder.record(&svc("b"));

		// Assert
		assert_eq!(recorder.stop(first).unwrap(), vec![svc("a"), svc("b")]);
		assert_eq!(recorder.stop(second).unwrap(), vec![svc("b")]);
		assert_eq!(recorder.open_sessions(), 0);
	}

	#[rstest]
	#[case(RecordingPolicy::Deduplicate, vec!["a", "b"])]
	#[case(RecordingPolicy::EveryResolution, vec!["a", "b", "a"])]
	fn test_recording_policy(#[case] policy: RecordingPolicy, #[case] expected: Vec<&str>) {
		// Arrange
		let mut recorder = DependencyRecorder::new(policy);
		let token = recorder.start();

		// Act
		recorder.record(&svc("a"));
		recorder.record(&svc("b"));
		recorder.record(&svc("a"));

		// Assert
		let expected: Vec<_> = expected.into_iter().map(svc).collect();
		assert_eq!(recorder.stop(token).unwrap(), expected);
	}

	#[rstest]
	fn test_token_misuse_is_an_error() {
		// Arrange
		let mut recorder = DependencyRecorder::new(RecordingPolicy::Deduplicate);
		let token = recorder.start();

		// Act & Assert
		assert!(matches!(
			recorder.resume(token),
			Err(DiError::InvalidRecordToken { .. })
		));
		recorder.stop(token).unwrap();
		assert!(matches!(
			recorder.stop(token),
			Err(DiError::InvalidRecordToken { .. })
		));
		assert!(matches!(
			recorder.pause(token),
			Err(DiError::InvalidRecordToken { .. })
		));
	}

	#[rstest]
	fn test_frames_record_direct_names_only() {
		// Arrange
		let mut recorder = DependencyRecorder::new(RecordingPolicy::Deduplicate);
		let outer = recorder.start();

		// Act: A -> B -> C
		let frame_a = recorder.enter_frame();
		let frame_b = recorder.enter_frame();
		let frame_c = recorder.enter_frame();
		let deps_c = recorder.exit_frame(frame_c).unwrap().dependencies;
		recorder.record(&svc("c"));
		let deps_b = recorder.exit_frame(frame_b).unwrap().dependencies;
		recorder.record(&svc("b"));
		let deps_a = recorder.exit_frame(frame_a).unwrap().dependencies;
		recorder.record(&svc("a"));

		// Assert
		assert!(deps_c.is_empty());
		assert_eq!(deps_b, vec![svc("c")]);
		assert_eq!(deps_a, vec![svc("b")]);
		assert_eq!(recorder.stop(outer).unwrap(), vec![svc("a")]);
	}

	#[rstest]
	fn test_exit_frame_restores_suspended_sessions() {
		// Arrange
		let mut recorder = DependencyRecorder::new(RecordingPolicy::Deduplicate);
		let outer = recorder.start();
		let frame = recorder.enter_frame();
		assert!(recorder.is_paused(outer));

		// Act
		recorder.exit_frame(frame).unwrap();

		// Assert
		assert!(recorder.is_active(outer));
		assert_eq!(recorder.open_sessions(), 1);
	}

	#[rstest]
	fn test_handle_flag_stays_with_innermost_frame() {
		// Arrange
		let mut recorder = DependencyRecorder::new(RecordingPolicy::Deduplicate);
		let outer = recorder.enter_frame();
		let inner = recorder.enter_frame();

		// Act
		recorder.mark_handle();
		let inner_record = recorder.exit_frame(inner).unwrap();
		recorder.record(&svc("inner"));
		let outer_record = recorder.exit_frame(outer).unwrap();

		// Assert
		assert!(inner_record.handed_out_handles);
		assert_eq!(
			outer_record,
			FrameRecord {
				dependencies: vec![svc("inner")],
				handed_out_handles: false,
			}
		);
	}
}
