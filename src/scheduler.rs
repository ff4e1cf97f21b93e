use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::future::Future;
use std::rc::{Rc, Weak};

use fxhash::FxHashSet;

/// Something that can be flushed by the scheduler.
pub(crate) trait Reactive {
	fn react(self: Rc<Self>);
}

const DEFAULT_TURN_LIMIT: usize = 1024;

thread_local! {
	static CURRENT: RefCell<Scheduler> = RefCell::new(Scheduler::host());
}

/// Coalesces notification requests into deferred flushes.
///
/// Every atom asks the scheduler to be flushed after a change. The first
/// request arms a flush for that atom; further requests before the flush
/// runs are dropped. Flushes never run inside the call that requested
/// them: they run when the scheduler is driven with [`Scheduler::tick`]
/// or [`Scheduler::flush`] (or, on `wasm32`, from a host microtask).
///
/// The same queue drives async computations spawned by async atoms.
#[derive(Clone)]
pub struct Scheduler {
	inner: Rc<SchedulerInner>,
}

struct SchedulerInner {
	queue: RefCell<Queue>,
	turn_limit: Cell<usize>,
	#[cfg(not(target_arch = "wasm32"))]
	pool: RefCell<futures::executor::LocalPool>,
	#[cfg(not(target_arch = "wasm32"))]
	spawner: futures::executor::LocalSpawner,
	#[cfg(target_arch = "wasm32")]
	microtask: Cell<Option<bool>>,
}

// Armed flushes in arming order, plus the keys of those still waiting.
#[derive(Default)]
struct Queue {
	order: VecDeque<(usize, Weak<dyn Reactive>)>,
	armed: FxHashSet<usize>,
}

impl Queue {
	fn push(&mut self, key: usize, reactive: Weak<dyn Reactive>) -> bool {
		if !self.armed.insert(key) {
			return false;
		}

		self.order.push_back((key, reactive));
		true
	}

	fn pop(&mut self) -> Option<Weak<dyn Reactive>> {
		let (key, reactive) = self.order.pop_front()?;
		self.armed.remove(&key);
		Some(reactive)
	}

	fn len(&self) -> usize {
		self.order.len()
	}
}

impl Default for Scheduler {
	fn default() -> Self {
		Scheduler::new()
	}
}

impl Scheduler {
	/// Creates a scheduler that only flushes when driven explicitly.
	pub fn new() -> Self {
		#[cfg(not(target_arch = "wasm32"))]
		let pool = futures::executor::LocalPool::new();

		Scheduler {
			inner: Rc::new(SchedulerInner {
				queue: RefCell::new(Queue::default()),
				turn_limit: Cell::new(DEFAULT_TURN_LIMIT),
				#[cfg(not(target_arch = "wasm32"))]
				spawner: pool.spawner(),
				#[cfg(not(target_arch = "wasm32"))]
				pool: RefCell::new(pool),
				#[cfg(target_arch = "wasm32")]
				microtask: Cell::new(None),
			}),
		}
	}

	#[cfg(not(target_arch = "wasm32"))]
	fn host() -> Self {
		Scheduler::new()
	}

	// The thread default drains itself from a host microtask.
	#[cfg(target_arch = "wasm32")]
	fn host() -> Self {
		let scheduler = Scheduler::new();
		scheduler.inner.microtask.set(Some(false));
		scheduler
	}

	/// Caps the number of turns a single [`Scheduler::flush`] may run.
	pub fn with_turn_limit(self, limit: usize) -> Self {
		self.inner.turn_limit.set(limit.max(1));
		self
	}

	/// The scheduler used by constructors without an explicit one.
	pub fn current() -> Scheduler {
		CURRENT.with(|current| current.borrow().clone())
	}

	/// Replaces the thread default, returning the previous one.
	///
	/// Atoms keep the scheduler they were created with.
	pub fn set_current(scheduler: Scheduler) -> Scheduler {
		CURRENT.with(|current| std::mem::replace(&mut *current.borrow_mut(), scheduler))
	}

	pub fn ptr_eq(&self, other: &Scheduler) -> bool {
		Rc::ptr_eq(&self.inner, &other.inner)
	}

	pub fn is_idle(&self) -> bool {
		self.inner.queue.borrow().len() == 0
	}

	/// Number of armed flushes.
	pub fn pending(&self) -> usize {
		self.inner.queue.borrow().len()
	}

	pub(crate) fn request(&self, reactive: Weak<dyn Reactive>) {
		let key = Weak::as_ptr(&reactive) as *const () as usize;
		let armed = self.inner.queue.borrow_mut().push(key, reactive);
		if armed {
			tracing::trace!(pending = self.pending(), "flush armed");
			#[cfg(target_arch = "wasm32")]
			self.arm_microtask();
		}
	}

	/// Runs one turn: async computations make progress, then every flush
	/// armed before the turn started runs once. Flushes armed during the
	/// turn wait for the next one.
	///
	/// Returns the number of flushes that ran.
	pub fn tick(&self) -> usize {
		self.run_tasks();

		let armed = self.pending();
		let mut flushed = 0;
		for _ in 0..armed {
			// Removed before reacting so a write from a listener arms again.
			let next = self.inner.queue.borrow_mut().pop();
			let Some(reactive) = next else {
				break;
			};

			if let Some(reactive) = reactive.upgrade() {
				reactive.react();
				flushed += 1;
			}
		}

		if flushed > 0 {
			tracing::trace!(flushed, "turn finished");
		}

		flushed
	}

	/// Runs turns until nothing is armed, or the turn limit is reached.
	///
	/// Returns the total number of flushes that ran.
	pub fn flush(&self) -> usize {
		let limit = self.inner.turn_limit.get();
		let mut total = 0;
		let mut turns = 0;

		loop {
			total += self.tick();
			turns += 1;

			if self.is_idle() {
				break;
			}

			if turns >= limit {
				tracing::warn!(
					turns,
					pending = self.pending(),
					"flush stopped at the turn limit, listeners keep re-arming"
				);
				break;
			}
		}

		total
	}

	#[cfg(not(target_arch = "wasm32"))]
	pub(crate) fn spawn(&self, future: impl Future<Output = ()> + 'static) {
		use futures::task::LocalSpawnExt;

		if let Err(err) = self.inner.spawner.spawn_local(future) {
			tracing::error!(%err, "failed to spawn async computation");
			return;
		}

		self.run_tasks();
	}

	#[cfg(target_arch = "wasm32")]
	pub(crate) fn spawn(&self, future: impl Future<Output = ()> + 'static) {
		wasm_bindgen_futures::spawn_local(future);
	}

	#[cfg(not(target_arch = "wasm32"))]
	fn run_tasks(&self) {
		// Already being driven further up the stack.
		if let Ok(mut pool) = self.inner.pool.try_borrow_mut() {
			pool.run_until_stalled();
		}
	}

	#[cfg(target_arch = "wasm32")]
	fn run_tasks(&self) {}

	#[cfg(target_arch = "wasm32")]
	fn arm_microtask(&self) {
		if self.inner.microtask.get() != Some(false) {
			return;
		}

		self.inner.microtask.set(Some(true));
		let scheduler = self.clone();
		crate::microtask::queue(move || {
			scheduler.flush();
			scheduler.inner.microtask.set(Some(false));
		});
	}
}

impl std::fmt::Debug for Scheduler {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Scheduler")
			.field("pending", &self.pending())
			.field("turn_limit", &self.inner.turn_limit.get())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	struct Counter {
		flushes: Cell<usize>,
	}

	impl Reactive for Counter {
		fn react(self: Rc<Self>) {
			self.flushes.set(self.flushes.get() + 1);
		}
	}

	fn counter() -> Rc<Counter> {
		Rc::new(Counter {
			flushes: Cell::new(0),
		})
	}

	#[test]
	fn requests_coalesce_until_flushed() {
		let scheduler = Scheduler::new();
		let counter = counter();
		let weak = Rc::downgrade(&counter) as Weak<dyn Reactive>;

		scheduler.request(weak.clone());
		scheduler.request(weak.clone());
		scheduler.request(weak.clone());
		assert_eq!(scheduler.pending(), 1);
		assert_eq!(counter.flushes.get(), 0);

		assert_eq!(scheduler.flush(), 1);
		assert_eq!(counter.flushes.get(), 1);

		scheduler.request(weak);
		scheduler.flush();
		assert_eq!(counter.flushes.get(), 2);
	}

	#[test]
	fn dropped_reactives_are_skipped() {
		let scheduler = Scheduler::new();
		let counter = counter();
		scheduler.request(Rc::downgrade(&counter) as Weak<dyn Reactive>);
		drop(counter);

		assert_eq!(scheduler.flush(), 0);
		assert!(scheduler.is_idle());
	}

	struct Rearm {
		scheduler: Scheduler,
		this: Weak<Rearm>,
		flushes: Cell<usize>,
	}

	impl Reactive for Rearm {
		fn react(self: Rc<Self>) {
			self.flushes.set(self.flushes.get() + 1);
			self.scheduler.request(self.this.clone() as Weak<dyn Reactive>);
		}
	}

	#[test]
	fn rearming_waits_for_the_next_turn() {
		let scheduler = Scheduler::new().with_turn_limit(3);
		let rearm = Rc::new_cyclic(|this| Rearm {
			scheduler: scheduler.clone(),
			this: this.clone(),
			flushes: Cell::new(0),
		});
		scheduler.request(Rc::downgrade(&rearm) as Weak<dyn Reactive>);

		assert_eq!(scheduler.tick(), 1);
		assert_eq!(rearm.flushes.get(), 1);
		assert_eq!(scheduler.pending(), 1);

		assert_eq!(scheduler.flush(), 3);
		assert_eq!(rearm.flushes.get(), 4);
		assert!(!scheduler.is_idle());
	}

	struct Poke {
		scheduler: Scheduler,
		target: Weak<Counter>,
	}

	impl Reactive for Poke {
		fn react(self: Rc<Self>) {
			self.scheduler.request(self.target.clone() as Weak<dyn Reactive>);
		}
	}

	#[test]
	fn request_for_a_waiting_flush_joins_it() {
		let scheduler = Scheduler::new();
		let target = counter();
		let poke = Rc::new(Poke {
			scheduler: scheduler.clone(),
			target: Rc::downgrade(&target),
		});
		scheduler.request(Rc::downgrade(&poke) as Weak<dyn Reactive>);
		scheduler.request(Rc::downgrade(&target) as Weak<dyn Reactive>);

		assert_eq!(scheduler.tick(), 2);
		assert_eq!(target.flushes.get(), 1);
		assert!(scheduler.is_idle());
	}

	#[test]
	fn large_turn_drains_in_arming_order() {
		let scheduler = Scheduler::new();
		let counters: Vec<_> = (0..50_000).map(|_| counter()).collect();
		for counter in &counters {
			scheduler.request(Rc::downgrade(counter) as Weak<dyn Reactive>);
			scheduler.request(Rc::downgrade(counter) as Weak<dyn Reactive>);
		}
		assert_eq!(scheduler.pending(), counters.len());

		let started = std::time::Instant::now();
		assert_eq!(scheduler.tick(), counters.len());
		assert!(started.elapsed() < std::time::Duration::from_secs(1));

		assert!(scheduler.is_idle());
		assert!(counters.iter().all(|counter| counter.flushes.get() == 1));
	}
}
