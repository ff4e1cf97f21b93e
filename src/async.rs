use std::cell::RefCell;
use std::error::Error;
use std::future::Future;
use std::rc::{Rc, Weak};

use futures::channel::oneshot;
use futures::FutureExt;

use crate::listeners::{fan_out, Listener, Listeners, Subscription};
use crate::scheduler::{Reactive, Scheduler};
use crate::value::{Access, Observable, Source};
use crate::{Atom, Failure, Read, Status, Suspense, WriteError};

/// Async atom: the eventual result of a one-shot computation.
///
/// The computation starts when the atom is created. Until it settles,
/// reads return [`Read::Suspend`] with a handle that resolves on
/// settlement. A fulfilled atom reads as [`Read::Ready`] and notifies its
/// listeners once; a rejected atom reads as [`Read::Failed`] on every read
/// and notifies nobody. Settlement is final.
pub struct Async<T> {
	body: Rc<AsyncBody<T>>,
}

impl<T> Clone for Async<T> {
	fn clone(&self) -> Self {
		Self {
			body: self.body.clone(),
		}
	}
}

enum State<T> {
	Pending,
	Fulfilled(T),
	Rejected(Failure),
}

pub(crate) struct AsyncBody<T> {
	state: RefCell<State<T>>,
	suspense: Suspense,
	listeners: RefCell<Listeners<T>>,
	scheduler: Scheduler,
	this: Weak<AsyncBody<T>>,
}

impl<T> Async<T>
where
	T: Clone + 'static,
{
	pub fn new<E>(future: impl Future<Output = Result<T, E>> + 'static) -> Self
	where
		E: Error + 'static,
	{
		Self::new_in(future, &Scheduler::current())
	}

	pub fn new_in<E>(
		future: impl Future<Output = Result<T, E>> + 'static,
		scheduler: &Scheduler,
	) -> Self
	where
		E: Error + 'static,
	{
		let (settled, on_settled) = oneshot::channel::<()>();
		let suspense = Suspense::new(on_settled.map(|_| ()).boxed_local().shared());
		let body = AsyncBody::new(State::Pending, suspense, scheduler);

		let this = Rc::downgrade(&body);
		scheduler.spawn(async move {
			let outcome = future.await.map_err(Failure::new);
			if let Some(body) = this.upgrade() {
				body.settle(outcome);
			}
			let _ = settled.send(());
		});

		Async { body }
	}

	/// An atom that is already fulfilled with `value`.
	pub fn fulfilled(value: T) -> Self {
		Self::fulfilled_in(value, &Scheduler::current())
	}

	pub fn fulfilled_in(value: T, scheduler: &Scheduler) -> Self {
		Self::settled_in(State::Fulfilled(value), scheduler)
	}

	/// An atom that is already rejected with `error`.
	pub fn rejected(error: impl Error + 'static) -> Self {
		Self::rejected_in(error, &Scheduler::current())
	}

	pub fn rejected_in(error: impl Error + 'static, scheduler: &Scheduler) -> Self {
		Self::settled_in(State::Rejected(Failure::new(error)), scheduler)
	}

	fn settled_in(state: State<T>, scheduler: &Scheduler) -> Self {
		let suspense = Suspense::new(futures::future::ready(()).boxed_local().shared());
		Async {
			body: AsyncBody::new(state, suspense, scheduler),
		}
	}

	#[inline]
	pub fn get(&self) -> Read<T> {
		self.body.read()
	}

	/// Fails with [`WriteError::Unsupported`]: async atoms are immutable.
	pub fn set(&self, _value: T) -> Result<(), WriteError> {
		Err(WriteError::unsupported("async"))
	}

	pub fn status(&self) -> Status {
		match &*self.body.state.borrow() {
			State::Pending => Status::Pending,
			State::Fulfilled(_) => Status::Fulfilled,
			State::Rejected(_) => Status::Rejected,
		}
	}

	/// Resolves once the computation has settled.
	pub fn suspense(&self) -> Suspense {
		self.body.suspense.clone()
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
}

impl<T> AsyncBody<T>
where
	T: Clone + 'static,
{
	fn new(state: State<T>, suspense: Suspense, scheduler: &Scheduler) -> Rc<Self> {
		Rc::new_cyclic(|this| AsyncBody {
			state: RefCell::new(state),
			suspense,
			listeners: RefCell::new(Listeners::new()),
			scheduler: scheduler.clone(),
			this: this.clone(),
		})
	}

	fn read(&self) -> Read<T> {
		match &*self.state.borrow() {
			State::Pending => Read::Suspend(self.suspense.clone()),
			State::Fulfilled(value) => Read::Ready(value.clone()),
			State::Rejected(failure) => Read::Failed(failure.clone()),
		}
	}

	fn settle(&self, outcome: Result<T, Failure>) {
		let mut state = self.state.borrow_mut();
		if !matches!(*state, State::Pending) {
			return;
		}

		match outcome {
			Ok(value) => {
				*state = State::Fulfilled(value);
				std::mem::drop(state);
				tracing::debug!("async atom fulfilled");
				self.scheduler.request(self.this.clone() as Weak<dyn Reactive>);
			}
			// Readers observe the failure by reading again; listeners stay quiet.
			Err(failure) => {
				tracing::debug!(%failure, "async atom rejected");
				*state = State::Rejected(failure);
			}
		}
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

impl<T> Reactive for AsyncBody<T>
where
	T: Clone + 'static,
{
	fn react(self: Rc<Self>) {
		let value = match &*self.state.borrow() {
			State::Fulfilled(value) => value.clone(),
			_ => return,
		};

		let listeners = self.listeners.borrow().snapshot();
		tracing::trace!(listeners = listeners.len(), "async flushed");
		fan_out(listeners, &value);
	}
}

impl<T> Source for AsyncBody<T>
where
	T: Clone + 'static,
{
	fn watch(&self, callback: Rc<dyn Fn()>) -> Subscription {
		self.subscribe(Rc::new(move |_: &T| callback()))
	}
}

impl<T> Access<T> for AsyncBody<T>
where
	T: Clone + 'static,
{
	fn read(&self) -> Read<T> {
		AsyncBody::read(self)
	}

	fn write(&self, _value: T) -> Result<(), WriteError> {
		Err(WriteError::unsupported("async"))
	}

	fn subscribe(&self, listener: Listener<T>) -> Subscription {
		AsyncBody::subscribe(self, listener)
	}

	fn listener_count(&self) -> usize {
		self.listeners.borrow().len()
	}

	fn source(self: Rc<Self>) -> Rc<dyn Source> {
		self
	}
}

impl<T> Observable<T> for Async<T>
where
	T: Clone + 'static,
{
	fn atom(&self) -> Atom<T> {
		Atom::new(self.body.clone())
	}
}

impl<T> From<Async<T>> for Atom<T>
where
	T: Clone + 'static,
{
	fn from(future: Async<T>) -> Self {
		Atom::new(future.body)
	}
}

impl<T> std::fmt::Debug for Async<T>
where
	T: Clone + 'static,
{
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Async")
			.field("status", &self.status())
			.field("listeners", &self.listener_count())
			.finish()
	}
}
