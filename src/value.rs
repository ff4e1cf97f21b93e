use std::rc::Rc;

use crate::listeners::{Listener, Subscription};
use crate::{Read, WriteError};

/// Untyped side of an atom, used to keep track of dependencies.
pub(crate) trait Source: 'static {
	/// Registers `callback` to run on every flush of this atom.
	fn watch(&self, callback: Rc<dyn Fn()>) -> Subscription;
}

/// The capability every atom variant provides.
pub(crate) trait Access<T>: Source {
	fn read(&self) -> Read<T>;
	fn write(&self, value: T) -> Result<(), WriteError>;
	fn subscribe(&self, listener: Listener<T>) -> Subscription;
	fn listener_count(&self) -> usize;
	fn source(self: Rc<Self>) -> Rc<dyn Source>;
}

/// Anything that can be viewed as an [`Atom`].
pub trait Observable<T> {
	fn atom(&self) -> Atom<T>;
}

/// Type-erased atom: a base, derived or async atom behind one handle.
///
/// Clones share the same underlying atom.
pub struct Atom<T> {
	access: Rc<dyn Access<T>>,
}

impl<T> Clone for Atom<T> {
	fn clone(&self) -> Self {
		Atom {
			access: self.access.clone(),
		}
	}
}

impl<T> Atom<T>
where
	T: 'static,
{
	pub(crate) fn new(access: Rc<dyn Access<T>>) -> Self {
		Atom { access }
	}

	#[inline]
	pub fn read(&self) -> Read<T> {
		self.access.read()
	}

	/// Fails with [`WriteError::Unsupported`] for derived and async atoms.
	#[inline]
	pub fn write(&self, value: T) -> Result<(), WriteError> {
		self.access.write(value)
	}

	pub fn subscribe(&self, func: impl Fn(&T) + 'static) -> Subscription {
		self.access.subscribe(Rc::new(func))
	}

	/// Registers a shared listener.
	///
	/// The same `Rc` registered twice is a single registration: unsubscribing
	/// through either handle removes it, and the other handle does nothing.
	pub fn subscribe_listener(&self, listener: Listener<T>) -> Subscription {
		self.access.subscribe(listener)
	}

	pub fn listener_count(&self) -> usize {
		self.access.listener_count()
	}

	/// Whether both handles point to the same atom.
	pub fn ptr_eq(&self, other: &Atom<T>) -> bool {
		Rc::as_ptr(&self.access) as *const () == Rc::as_ptr(&other.access) as *const ()
	}

	pub(crate) fn source(&self) -> Rc<dyn Source> {
		self.access.clone().source()
	}
}

impl<T> Observable<T> for Atom<T> {
	fn atom(&self) -> Atom<T> {
		self.clone()
	}
}

impl<T: 'static> std::fmt::Debug for Atom<T> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Atom")
			.field("listeners", &self.listener_count())
			.finish_non_exhaustive()
	}
}
