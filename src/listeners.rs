use std::cell::Cell;
use std::rc::{Rc, Weak};

use fxhash::FxBuildHasher;
use indexmap::IndexMap;
use smallvec::SmallVec;

/// Change callback, invoked with the atom's value at flush time.
///
/// Registrations are keyed by the `Rc` allocation: subscribing the same
/// listener twice keeps a single registration.
pub type Listener<T> = Rc<dyn Fn(&T)>;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub(crate) struct ListenerKey(usize);

impl ListenerKey {
	// A live `Weak` keeps the allocation reserved, so the address can
	// not be handed to another listener while a subscription refers to it.
	pub fn of<T>(listener: &Weak<dyn Fn(&T)>) -> Self {
		ListenerKey(Weak::as_ptr(listener) as *const () as usize)
	}
}

pub(crate) struct Listeners<T> {
	set: IndexMap<ListenerKey, Listener<T>, FxBuildHasher>,
}

impl<T> Default for Listeners<T> {
	fn default() -> Self {
		Listeners {
			set: IndexMap::default(),
		}
	}
}

impl<T> Listeners<T> {
	pub fn new() -> Self {
		Self::default()
	}

	/// Returns the weak handle used to remove this registration later.
	pub fn insert(&mut self, listener: Listener<T>) -> Weak<dyn Fn(&T)> {
		let weak = Rc::downgrade(&listener);
		self.set.entry(ListenerKey::of(&weak)).or_insert(listener);
		weak
	}

	pub fn remove(&mut self, listener: &Weak<dyn Fn(&T)>) -> bool {
		self.set.shift_remove(&ListenerKey::of(listener)).is_some()
	}

	pub fn len(&self) -> usize {
		self.set.len()
	}

	pub fn is_empty(&self) -> bool {
		self.set.is_empty()
	}

	/// Copies the current registrations so callbacks can run without
	/// the registry being borrowed.
	pub fn snapshot(&self) -> SmallVec<[Listener<T>; 4]> {
		self.set.values().cloned().collect()
	}
}

pub(crate) fn fan_out<T>(listeners: SmallVec<[Listener<T>; 4]>, value: &T) {
	for listener in listeners {
		listener(value);
	}
}

/// Handle returned by `subscribe`.
///
/// Calling [`Subscription::unsubscribe`] removes exactly the registration
/// it came from; further calls do nothing. Dropping the handle keeps the
/// listener registered.
#[must_use = "keep the subscription to be able to unsubscribe"]
pub struct Subscription {
	cancel: Cell<Option<Box<dyn FnOnce()>>>,
}

impl Subscription {
	pub(crate) fn new(cancel: impl FnOnce() + 'static) -> Self {
		Subscription {
			cancel: Cell::new(Some(Box::new(cancel))),
		}
	}

	pub fn unsubscribe(&self) {
		if let Some(cancel) = self.cancel.take() {
			cancel();
		}
	}

	pub fn is_active(&self) -> bool {
		let cancel = self.cancel.take();
		let active = cancel.is_some();
		self.cancel.set(cancel);
		active
	}
}

impl std::fmt::Debug for Subscription {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Subscription")
			.field("active", &self.is_active())
			.finish()
	}
}
