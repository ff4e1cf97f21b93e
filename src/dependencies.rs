use std::collections::BTreeMap;
use std::rc::Rc;

use crate::addr::RcAddr;
use crate::listeners::Subscription;
use crate::tracker::Tracked;
use crate::value::Source;

/// Internal subscriptions a derived atom holds on the atoms it read.
#[derive(Default)]
pub(crate) struct Dependencies {
	based_on: BTreeMap<RcAddr<dyn Source>, Subscription>,
}

impl Dependencies {
	pub fn new() -> Self {
		Self {
			based_on: BTreeMap::new(),
		}
	}

	pub fn len(&self) -> usize {
		self.based_on.len()
	}

	/// Same size and same members, regardless of order.
	pub fn matches(&self, tracked: &Tracked) -> bool {
		tracked.len() == self.based_on.len()
			&& tracked.iter().all(|source| self.based_on.contains_key(source))
	}

	/// Drops every previous subscription and subscribes to `tracked`.
	pub fn swap(&mut self, tracked: Tracked, callback: &Rc<dyn Fn()>) {
		self.clear();
		for source in tracked {
			let subscription = source.watch(callback.clone());
			self.based_on.insert(source, subscription);
		}
	}

	pub fn clear(&mut self) {
		let prev = std::mem::take(&mut self.based_on);
		for (_, subscription) in prev {
			subscription.unsubscribe();
		}
	}
}
