use std::error::Error;
use std::fmt::{Debug, Display};
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

use futures::future::{LocalBoxFuture, Shared};

/// Outcome of reading an atom.
///
/// Base atoms are always `Ready`. Async atoms (and anything derived
/// from them) may ask the caller to wait with `Suspend`, or re-surface
/// a settled failure with `Failed`.
pub enum Read<T> {
	Ready(T),
	Suspend(Suspense),
	Failed(Failure),
}

impl<T> Read<T> {
	pub fn into_result(self) -> Result<T, Fault> {
		match self {
			Read::Ready(value) => Ok(value),
			Read::Suspend(suspense) => Err(Fault::Suspend(suspense)),
			Read::Failed(failure) => Err(Fault::Failed(failure)),
		}
	}

	pub fn ready(self) -> Option<T> {
		match self {
			Read::Ready(value) => Some(value),
			_ => None,
		}
	}

	pub fn is_ready(&self) -> bool {
		matches!(self, Read::Ready(_))
	}

	pub fn is_suspended(&self) -> bool {
		matches!(self, Read::Suspend(_))
	}

	pub fn is_failed(&self) -> bool {
		matches!(self, Read::Failed(_))
	}

	pub fn map<R>(self, func: impl FnOnce(T) -> R) -> Read<R> {
		match self {
			Read::Ready(value) => Read::Ready(func(value)),
			Read::Suspend(suspense) => Read::Suspend(suspense),
			Read::Failed(failure) => Read::Failed(failure),
		}
	}
}

impl<T> From<Result<T, Fault>> for Read<T> {
	fn from(result: Result<T, Fault>) -> Self {
		match result {
			Ok(value) => Read::Ready(value),
			Err(Fault::Suspend(suspense)) => Read::Suspend(suspense),
			Err(Fault::Failed(failure)) => Read::Failed(failure),
		}
	}
}

impl<T: Debug> Debug for Read<T> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Read::Ready(value) => f.debug_tuple("Ready").field(value).finish(),
			Read::Suspend(suspense) => f.debug_tuple("Suspend").field(suspense).finish(),
			Read::Failed(failure) => f.debug_tuple("Failed").field(failure).finish(),
		}
	}
}

/// The non-ready half of [`Read`], usable with `?` inside computations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Fault {
	#[error("value is not settled yet")]
	Suspend(Suspense),
	#[error(transparent)]
	Failed(Failure),
}

impl From<Failure> for Fault {
	fn from(failure: Failure) -> Self {
		Fault::Failed(failure)
	}
}

/// Awaitable handle to an unsettled computation.
///
/// Resolves once the computation has either fulfilled or rejected;
/// read the atom again afterwards to observe the outcome.
#[derive(Clone)]
pub struct Suspense {
	settled: Shared<LocalBoxFuture<'static, ()>>,
}

impl Suspense {
	pub(crate) fn new(settled: Shared<LocalBoxFuture<'static, ()>>) -> Self {
		Suspense { settled }
	}
}

impl Future for Suspense {
	type Output = ();

	fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
		Pin::new(&mut self.settled).poll(cx)
	}
}

impl Debug for Suspense {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Suspense").finish_non_exhaustive()
	}
}

/// A settled failure, shared by every read that re-surfaces it.
#[derive(Clone)]
pub struct Failure {
	error: Rc<dyn Error>,
}

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
struct Message(String);

impl Failure {
	pub fn new(error: impl Error + 'static) -> Self {
		Failure {
			error: Rc::new(error),
		}
	}

	pub fn msg(message: impl Display) -> Self {
		Failure::new(Message(message.to_string()))
	}

	pub fn downcast_ref<E: Error + 'static>(&self) -> Option<&E> {
		self.error.downcast_ref::<E>()
	}

	/// Two failures are the same when they share the original error.
	pub fn ptr_eq(&self, other: &Failure) -> bool {
		Rc::ptr_eq(&self.error, &other.error)
	}
}

impl Debug for Failure {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		Debug::fmt(&self.error, f)
	}
}

impl Display for Failure {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		Display::fmt(&self.error, f)
	}
}

impl Error for Failure {
	fn source(&self) -> Option<&(dyn Error + 'static)> {
		self.error.source()
	}
}

/// Settlement state of an async atom.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
	Pending,
	Fulfilled,
	Rejected,
}
