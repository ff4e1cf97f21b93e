/// Raised by a write that the atom does not accept.
///
/// A failed write leaves the atom untouched.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WriteError {
	#[error("unsupported mutation: {kind} atoms are read-only")]
	Unsupported { kind: &'static str },
}

impl WriteError {
	pub(crate) fn unsupported(kind: &'static str) -> Self {
		WriteError::Unsupported { kind }
	}
}
