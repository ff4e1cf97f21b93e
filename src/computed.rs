use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::dependencies::Dependencies;
use crate::listeners::{fan_out, Listener, Listeners, Subscription};
use crate::scheduler::{Reactive, Scheduler};
use crate::tracker::Tracker;
use crate::value::{Access, Observable, Source};
use crate::{Atom, Fault, Identity, Read, WriteError};

type Compute<T> = Box<dyn Fn(&Tracker) -> Result<T, Fault>>;

/// Derived atom: a read-only projection of other atoms.
///
/// Reading always runs the computation. While at least one listener is
/// subscribed, the atom also subscribes to exactly the atoms the last
/// computation read, and recomputes in a flush whenever one of them
/// changes. Listeners are only notified when the recomputed value is not
/// [`Identity::is_same`] as the value they last observed.
///
/// An unobserved derived atom holds no subscriptions and does not follow
/// its dependencies.
pub struct Computed<T> {
	body: Rc<ComputedBody<T>>,
}

impl<T> Clone for Computed<T> {
	fn clone(&self) -> Self {
		Self {
			body: self.body.clone(),
		}
	}
}

pub(crate) struct ComputedBody<T> {
	func: Compute<T>,
	// The value listeners have last observed.
	value: RefCell<Option<T>>,
	inner: RefCell<ComputedInner<T>>,
	scheduler: Scheduler,
	this: Weak<ComputedBody<T>>,
}

struct ComputedInner<T> {
	listeners: Listeners<T>,
	dependencies: Dependencies,
}

impl<T> Drop for ComputedInner<T> {
	fn drop(&mut self) {
		self.dependencies.clear();
	}
}

impl<T> Computed<T>
where
	T: Identity + Clone + 'static,
{
	pub fn new(func: impl Fn(&Tracker) -> Result<T, Fault> + 'static) -> Self {
		Self::new_in(func, &Scheduler::current())
	}

	pub fn new_in(
		func: impl Fn(&Tracker) -> Result<T, Fault> + 'static,
		scheduler: &Scheduler,
	) -> Self {
		Computed {
			body: Rc::new_cyclic(|this| ComputedBody {
				func: Box::new(func),
				value: RefCell::new(None),
				inner: RefCell::new(ComputedInner {
					listeners: Listeners::new(),
					dependencies: Dependencies::new(),
				}),
				scheduler: scheduler.clone(),
				this: this.clone(),
			}),
		}
	}

	#[inline]
	pub fn get(&self) -> Read<T> {
		self.body.read()
	}

	/// Fails with [`WriteError::Unsupported`]: derived atoms are read-only.
	pub fn set(&self, _value: T) -> Result<(), WriteError> {
		Err(WriteError::unsupported("derived"))
	}

	pub fn subscribe(&self, func: impl Fn(&T) + 'static) -> Subscription {
		self.body.subscribe(Rc::new(func))
	}

	pub fn subscribe_listener(&self, listener: Listener<T>) -> Subscription {
		self.body.subscribe(listener)
	}

	pub fn listener_count(&self) -> usize {
		self.body.inner.borrow().listeners.len()
	}

	/// Number of atoms this atom currently follows.
	pub fn dependency_count(&self) -> usize {
		self.body.inner.borrow().dependencies.len()
	}

	pub fn scheduler(&self) -> &Scheduler {
		&self.body.scheduler
	}
}

impl<T> ComputedBody<T>
where
	T: Identity + Clone + 'static,
{
	fn is_observed(&self) -> bool {
		!self.inner.borrow().listeners.is_empty()
	}

	fn read(&self) -> Read<T> {
		self.evaluate(self.is_observed()).into()
	}

	/// Runs the computation. With `follow`, the dependency subscriptions
	/// are replaced when the set of atoms read has changed.
	fn evaluate(&self, follow: bool) -> Result<T, Fault> {
		let tracker = Tracker::new();
		let result = (self.func)(&tracker);

		if follow {
			let tracked = tracker.take();
			let mut dependencies = std::mem::take(&mut self.inner.borrow_mut().dependencies);
			if !dependencies.matches(&tracked) {
				tracing::debug!(
					from = dependencies.len(),
					to = tracked.len(),
					"derived dependencies changed"
				);
				dependencies.swap(tracked, &self.on_dependency());
			}
			self.inner.borrow_mut().dependencies = dependencies;
		}

		result
	}

	fn on_dependency(&self) -> Rc<dyn Fn()> {
		let this = self.this.clone();
		Rc::new(move || {
			let Some(body) = this.upgrade() else {
				return;
			};

			if body.is_observed() {
				body.scheduler.request(this.clone() as Weak<dyn Reactive>);
			}
		})
	}

	fn subscribe(&self, listener: Listener<T>) -> Subscription {
		if !self.is_observed() {
			tracing::debug!("derived atom observed");
			let value = self.evaluate(true).ok();
			*self.value.borrow_mut() = value;
		}

		let listener = self.inner.borrow_mut().listeners.insert(listener);
		let this = self.this.clone();
		Subscription::new(move || {
			if let Some(body) = this.upgrade() {
				body.unsubscribe(&listener);
			}
		})
	}

	fn unsubscribe(&self, listener: &Weak<dyn Fn(&T)>) {
		let dependencies = {
			let mut inner = self.inner.borrow_mut();
			if !inner.listeners.remove(listener) || !inner.listeners.is_empty() {
				return;
			}

			std::mem::take(&mut inner.dependencies)
		};

		tracing::debug!("derived atom no longer observed");
		// Unsubscribing may release other derived atoms, keep no borrow here.
		let mut dependencies = dependencies;
		dependencies.clear();
		*self.value.borrow_mut() = None;
	}
}

impl<T> Reactive for ComputedBody<T>
where
	T: Identity + Clone + 'static,
{
	fn react(self: Rc<Self>) {
		if !self.is_observed() {
			return;
		}

		let next = match self.evaluate(true) {
			Ok(next) => next,
			Err(fault) => {
				tracing::debug!(%fault, "derived recomputation did not produce a value");
				*self.value.borrow_mut() = None;
				return;
			}
		};

		let changed = match &*self.value.borrow() {
			Some(prev) => !prev.is_same(&next),
			None => true,
		};

		if !changed {
			tracing::trace!("derived value unchanged");
			return;
		}

		*self.value.borrow_mut() = Some(next.clone());
		let listeners = self.inner.borrow().listeners.snapshot();
		tracing::trace!(listeners = listeners.len(), "derived flushed");
		fan_out(listeners, &next);
	}
}

impl<T> Source for ComputedBody<T>
where
	T: Identity + Clone + 'static,
{
	fn watch(&self, callback: Rc<dyn Fn()>) -> Subscription {
		self.subscribe(Rc::new(move |_: &T| callback()))
	}
}

impl<T> Access<T> for ComputedBody<T>
where
	T: Identity + Clone + 'static,
{
	fn read(&self) -> Read<T> {
		ComputedBody::read(self)
	}

	fn write(&self, _value: T) -> Result<(), WriteError> {
		Err(WriteError::unsupported("derived"))
	}

	fn subscribe(&self, listener: Listener<T>) -> Subscription {
		ComputedBody::subscribe(self, listener)
	}

	fn listener_count(&self) -> usize {
		self.inner.borrow().listeners.len()
	}

	fn source(self: Rc<Self>) -> Rc<dyn Source> {
		self
	}
}

impl<T> Observable<T> for Computed<T>
where
	T: Identity + Clone + 'static,
{
	fn atom(&self) -> Atom<T> {
		Atom::new(self.body.clone())
	}
}

impl<T> From<Computed<T>> for Atom<T>
where
	T: Identity + Clone + 'static,
{
	fn from(computed: Computed<T>) -> Self {
		Atom::new(computed.body)
	}
}

impl<T> std::fmt::Debug for Computed<T> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let inner = self.body.inner.borrow();
		f.debug_struct("Computed")
			.field("listeners", &inner.listeners.len())
			.field("dependencies", &inner.dependencies.len())
			.finish()
	}
}
