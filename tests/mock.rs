use std::cell::{RefCell, RefMut};
use std::rc::Rc;

use mockall::*;

#[automock]
pub trait Spy {
	fn trigger(&self, value: i64);
}

#[derive(Clone)]
pub struct SharedMock(Rc<RefCell<MockSpy>>);

#[allow(dead_code)]
impl SharedMock {
	pub fn new() -> SharedMock {
		SharedMock(Rc::new(RefCell::new(MockSpy::new())))
	}

	pub fn get(&self) -> RefMut<'_, MockSpy> {
		self.0.borrow_mut()
	}

	/// A listener forwarding every notification to the spy.
	pub fn listener(&self) -> impl Fn(&i64) + 'static {
		let mock = self.clone();
		move |value: &i64| mock.get().trigger(*value)
	}
}

#[allow(dead_code)]
pub fn init_tracing() {
	let _ = tracing_subscriber::fmt()
		.with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
		.with_test_writer()
		.try_init();
}
