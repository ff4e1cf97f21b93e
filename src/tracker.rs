use std::cell::RefCell;
use std::rc::Rc;

use smallvec::SmallVec;

use crate::addr::RcAddr;
use crate::value::{Observable, Source};
use crate::{Fault, Read};

pub(crate) type Tracked = SmallVec<[RcAddr<dyn Source>; 4]>;

/// Read accessor handed to a derived computation.
///
/// Every atom read through it becomes a dependency of the computation
/// for this run.
pub struct Tracker {
	tracked: RefCell<Tracked>,
}

impl AsRef<Tracker> for Tracker {
	fn as_ref(&self) -> &Tracker {
		self
	}
}

impl Tracker {
	pub(crate) fn new() -> Self {
		Tracker {
			tracked: RefCell::new(SmallVec::new()),
		}
	}

	/// Reads `source` and records it, ready for `?`.
	#[inline]
	pub fn get<T: 'static>(&self, source: &impl Observable<T>) -> Result<T, Fault> {
		self.read(source).into_result()
	}

	/// Reads `source` and records it.
	pub fn read<T: 'static>(&self, source: &impl Observable<T>) -> Read<T> {
		let atom = source.atom();
		// Recorded before reading so a suspended read still subscribes.
		self.based_on(atom.source());
		atom.read()
	}

	/// Reads `source` without making it a dependency.
	pub fn untracked<T: 'static>(&self, source: &impl Observable<T>) -> Read<T> {
		source.atom().read()
	}

	pub(crate) fn based_on(&self, source: Rc<dyn Source>) {
		let source = RcAddr::new(source);
		let mut tracked = self.tracked.borrow_mut();
		if !tracked.contains(&source) {
			tracked.push(source);
		}
	}

	pub(crate) fn take(self) -> Tracked {
		self.tracked.into_inner()
	}
}
