//! Reactive atoms.
//!
//! An atom is a cell that can be read, written and subscribed to. Three
//! kinds share the same capability:
//!
//! - [`Var`], a base atom holding a value,
//! - [`Computed`], a read-only value derived from other atoms,
//! - [`Async`], the eventual result of a one-shot async computation.
//!
//! Writes never notify synchronously. They arm a flush on a [`Scheduler`],
//! which coalesces every write made before it runs into one notification
//! carrying the latest value.
//!
//! ```
//! use std::cell::Cell;
//! use std::rc::Rc;
//!
//! use reactive_atom::{Scheduler, Var};
//!
//! let scheduler = Scheduler::new();
//! let count = Var::new_in(0, &scheduler);
//!
//! let seen = Rc::new(Cell::new(0));
//! let _subscription = count.subscribe({
//! 	let seen = seen.clone();
//! 	move |value| seen.set(*value)
//! });
//!
//! count.set(1);
//! count.set(2);
//! assert_eq!(seen.get(), 0);
//!
//! scheduler.flush();
//! assert_eq!(seen.get(), 2);
//! ```

pub mod macros;

mod addr;
mod r#async;
mod computed;
mod dependencies;
mod error;
mod identity;
mod listeners;
mod read;
mod scheduler;
mod tracker;
mod value;
mod var;

#[cfg(target_arch = "wasm32")]
mod microtask;

use std::error::Error;
use std::future::Future;

pub use computed::Computed;
pub use error::WriteError;
pub use identity::Identity;
pub use listeners::{Listener, Subscription};
pub use r#async::Async;
pub use read::{Failure, Fault, Read, Status, Suspense};
pub use scheduler::Scheduler;
pub use tracker::Tracker;
pub use value::{Atom, Observable};
pub use var::{Toggle, Var};

/// Creates a base atom on the current scheduler.
pub fn atom<T>(value: T) -> Atom<T>
where
	T: Identity + Clone + 'static,
{
	Var::new(value).into()
}

/// Creates a derived atom on the current scheduler.
pub fn derived<T>(func: impl Fn(&Tracker) -> Result<T, Fault> + 'static) -> Atom<T>
where
	T: Identity + Clone + 'static,
{
	Computed::new(func).into()
}

/// Creates an async atom on the current scheduler and starts `future`.
pub fn async_atom<T, E>(future: impl Future<Output = Result<T, E>> + 'static) -> Atom<T>
where
	T: Clone + 'static,
	E: Error + 'static,
{
	Async::new(future).into()
}

pub fn get<T: 'static>(atom: &impl Observable<T>) -> Read<T> {
	atom.atom().read()
}

pub fn set<T: 'static>(atom: &impl Observable<T>, value: T) -> Result<(), WriteError> {
	atom.atom().write(value)
}

pub fn subscribe<T: 'static>(
	atom: &impl Observable<T>,
	func: impl Fn(&T) + 'static,
) -> Subscription {
	atom.atom().subscribe(func)
}
