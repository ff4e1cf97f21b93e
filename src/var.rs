use std::cell::{Ref, RefCell};
use std::fmt::Debug;
use std::rc::{Rc, Weak};

use crate::listeners::{fan_out, Listener, Listeners, Subscription};
use crate::scheduler::{Reactive, Scheduler};
use crate::value::{Access, Observable, Source};
use crate::{Atom, Identity, Read, WriteError};

/// Base atom: a mutable cell that notifies subscribers after changes.
///
/// Writes that are [`Identity::is_same`] as the current value are ignored.
/// Other writes replace the value immediately and arm a flush on the
/// atom's scheduler; listeners see the value current at flush time.
pub struct Var<T> {
	body: Rc<VarBody<T>>,
}

pub(crate) struct VarBody<T> {
	value: RefCell<T>,
	listeners: RefCell<Listeners<T>>,
	scheduler: Scheduler,
	this: Weak<VarBody<T>>,
}

impl<T> Clone for Var<T> {
	fn clone(&self) -> Self {
		Self {
			body: self.body.clone(),
		}
	}
}

impl<T> Default for Var<T>
where
	T: Default + Identity + Clone + 'static,
{
	fn default() -> Self {
		Var::new(Default::default())
	}
}

pub trait Toggle {
	fn toggle(&mut self);
}

impl Toggle for bool {
	fn toggle(&mut self) {
		*self = !*self
	}
}

impl<T> Var<T>
where
	T: Identity + Clone + 'static,
{
	pub fn new(value: T) -> Self {
		Self::new_in(value, &Scheduler::current())
	}

	pub fn new_in(value: T, scheduler: &Scheduler) -> Self {
		Var {
			body: Rc::new_cyclic(|this| VarBody {
				value: RefCell::new(value),
				listeners: RefCell::new(Listeners::new()),
				scheduler: scheduler.clone(),
				this: this.clone(),
			}),
		}
	}

	#[inline]
	pub fn get(&self) -> T {
		self.body.value.borrow().clone()
	}

	/// Borrows the current value without cloning it.
	#[inline]
	pub fn get_ref(&self) -> Ref<'_, T> {
		self.body.value.borrow()
	}

	#[inline]
	pub fn set(&self, value: T) {
		self.body.replace(value);
	}

	#[inline]
	pub fn replace(&self, value: T) -> T {
		self.body.replace(value)
	}

	#[inline]
	pub fn update(&self, func: impl FnOnce(&mut T)) {
		self.body.update(func)
	}

	#[inline]
	pub fn toggle(&self)
	where
		T: Toggle,
	{
		self.update(T::toggle)
	}

	pub fn subscribe(&self, func: impl Fn(&T) + 'static) -> Subscription {
		self.body.subscribe(Rc::new(func))
	}

	pub fn subscribe_listener(&self, listener: Listener<T>) -> Subscription {
		self.body.subscribe(listener)
	}

	pub fn listener_count(&self) -> usize {
		self.body.listeners.borrow().len()
	}

	pub fn scheduler(&self) -> &Scheduler {
		&self.body.scheduler
	}

	pub fn map<F, R>(&self, func: F) -> crate::Computed<R>
	where
		F: Fn(&T) -> R + 'static,
		R: Identity + Clone + 'static,
	{
		let this = self.clone();
		crate::Computed::new_in(
			move |cx| {
				let value = cx.get(&this)?;
				Ok(func(&value))
			},
			&self.body.scheduler,
		)
	}
}

impl<T> VarBody<T>
where
	T: Identity + Clone + 'static,
{
	fn replace(&self, value: T) -> T {
		let mut current = self.value.borrow_mut();
		if current.is_same(&value) {
			return value;
		}

		let old = std::mem::replace(&mut *current, value);
		std::mem::drop(current);
		self.changed();

		old
	}

	// The closure mutates a copy, so it may read this atom.
	fn update(&self, func: impl FnOnce(&mut T)) {
		let mut next = self.value.borrow().clone();
		func(&mut next);
		self.replace(next);
	}

	fn changed(&self) {
		self.scheduler.request(self.this.clone() as Weak<dyn Reactive>);
	}

	fn subscribe(&self, listener: Listener<T>) -> Subscription {
		let listener = self.listeners.borrow_mut().insert(listener);
		let this = self.this.clone();
		Subscription::new(move || {
			if let Some(body) = this.upgrade() {
				body.listeners.borrow_mut().remove(&listener);
			}
		})
	}
}

impl<T> Reactive for VarBody<T>
where
	T: Identity + Clone + 'static,
{
	fn react(self: Rc<Self>) {
		let listeners = self.listeners.borrow().snapshot();
		if listeners.is_empty() {
			return;
		}

		let value = self.value.borrow().clone();
		tracing::trace!(listeners = listeners.len(), "var flushed");
		fan_out(listeners, &value);
	}
}

impl<T> Source for VarBody<T>
where
	T: Identity + Clone + 'static,
{
	fn watch(&self, callback: Rc<dyn Fn()>) -> Subscription {
		self.subscribe(Rc::new(move |_: &T| callback()))
	}
}

impl<T> Access<T> for VarBody<T>
where
	T: Identity + Clone + 'static,
{
	fn read(&self) -> Read<T> {
		Read::Ready(self.value.borrow().clone())
	}

	fn write(&self, value: T) -> Result<(), WriteError> {
		self.replace(value);
		Ok(())
	}

	fn subscribe(&self, listener: Listener<T>) -> Subscription {
		VarBody::subscribe(self, listener)
	}

	fn listener_count(&self) -> usize {
		self.listeners.borrow().len()
	}

	fn source(self: Rc<Self>) -> Rc<dyn Source> {
		self
	}
}

impl<T> Observable<T> for Var<T>
where
	T: Identity + Clone + 'static,
{
	fn atom(&self) -> Atom<T> {
		Atom::new(self.body.clone())
	}
}

impl<T> From<Var<T>> for Atom<T>
where
	T: Identity + Clone + 'static,
{
	fn from(var: Var<T>) -> Self {
		Atom::new(var.body)
	}
}

impl<T> Debug for Var<T>
where
	T: Debug,
{
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Var")
			.field("value", &*self.body.value.borrow())
			.field("listeners", &self.body.listeners.borrow().len())
			.finish()
	}
}
