//! The shared poll timer.
//!
//! One `Poller` drives every state machine and status checker of an overlay
//! session. The firing mechanism is a dedicated worker thread, but ticks are
//! always marshalled through the [`Dispatch`] so subscriber code runs on the
//! single logical processing thread.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::{Dispatch, Task};

pub const DEFAULT_FIRST_DELAY: Duration = Duration::from_millis(1000);
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(100);

/// A tick handler. Runs on the dispatch context.
pub type TickFn = Box<dyn FnMut() + Send>;

/// Something that fans out periodic ticks to subscribers.
pub trait TickSource {
	fn subscribe(&self, on_tick: TickFn) -> Subscription;
}

/// RAII guard for a tick subscription.
///
/// `cancel` is idempotent, and dropping the guard cancels. A tick already in
/// flight when the subscription is cancelled simply no longer finds the
/// handler and skips it.
pub struct Subscription {
	cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
	pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
		Self {
			cancel: Some(Box::new(cancel)),
		}
	}

	pub fn cancel(&mut self) {
		if let Some(cancel) = self.cancel.take() {
			cancel();
		}
	}
}

impl Drop for Subscription {
	fn drop(&mut self) {
		self.cancel();
	}
}

/// Restartable interval timer.
///
/// `start` fires a first tick after `first_delay`, then one every `interval`.
/// Starting while already running restarts cleanly: the generation counter is
/// bumped, so any tick captured under the previous generation is discarded on
/// the dispatch context instead of acted on. There is exactly one worker
/// thread per `Poller`, so duplicate timers cannot exist structurally.
pub struct Poller {
	shared: Arc<Shared>,
	worker: Option<JoinHandle<()>>,
}

/// Cloneable start/stop handle for a [`Poller`].
///
/// Lets watcher threads and key handlers gate polling without owning the
/// timer. All handles go inert once the owning `Poller` is dropped.
#[derive(Clone)]
pub struct PollerControl {
	shared: Arc<Shared>,
}

struct Shared {
	dispatch: Arc<dyn Dispatch>,
	first_delay: Duration,
	interval: Duration,
	sched: Mutex<Sched>,
	cv: Condvar,
	subs: Mutex<Vec<Sub>>,
	next_sub_id: AtomicU64,
}

struct Sched {
	running: bool,
	shutdown: bool,
	/// Bumped on every start and stop; stale ticks compare against it and bail.
	generation: u64,
}

struct Sub {
	id: u64,
	on_tick: TickFn,
}

impl Poller {
	pub fn new(dispatch: Arc<dyn Dispatch>) -> Self {
		Self::with_timings(dispatch, DEFAULT_FIRST_DELAY, DEFAULT_INTERVAL)
	}

	pub fn with_timings(dispatch: Arc<dyn Dispatch>, first_delay: Duration, interval: Duration) -> Self {
		let shared = Arc::new(Shared {
			dispatch,
			first_delay,
			interval,
			sched: Mutex::new(Sched {
				running: false,
				shutdown: false,
				generation: 0,
			}),
			cv: Condvar::new(),
			subs: Mutex::new(Vec::new()),
			next_sub_id: AtomicU64::new(0),
		});

		let worker_shared = Arc::clone(&shared);
		let worker = std::thread::Builder::new()
			.name("poller".to_string())
			.spawn(move || run_worker(&worker_shared))
			.expect("spawn poller thread");

		Self {
			shared,
			worker: Some(worker),
		}
	}

	pub fn start(&self) {
		self.shared.start();
	}

	pub fn stop(&self) {
		self.shared.stop();
	}

	pub fn is_running(&self) -> bool {
		self.shared.is_running()
	}

	pub fn control(&self) -> PollerControl {
		PollerControl {
			shared: Arc::clone(&self.shared),
		}
	}
}

impl Drop for Poller {
	fn drop(&mut self) {
		{
			let mut sched = self.shared.sched.lock().expect("poller lock poisoned");
			sched.shutdown = true;
			sched.running = false;
			sched.generation += 1;
			self.shared.cv.notify_all();
		}

		if let Some(worker) = self.worker.take() {
			let _ = worker.join();
		}
	}
}

impl PollerControl {
	pub fn start(&self) {
		self.shared.start();
	}

	pub fn stop(&self) {
		self.shared.stop();
	}

	pub fn is_running(&self) -> bool {
		self.shared.is_running()
	}
}

impl TickSource for Poller {
	fn subscribe(&self, on_tick: TickFn) -> Subscription {
		let id = self.shared.next_sub_id.fetch_add(1, Ordering::Relaxed);
		self.shared
			.subs
			.lock()
			.expect("poller subscribers lock poisoned")
			.push(Sub { id, on_tick });

		let weak = Arc::downgrade(&self.shared);
		Subscription::new(move || {
			if let Some(shared) = weak.upgrade() {
				shared
					.subs
					.lock()
					.expect("poller subscribers lock poisoned")
					.retain(|sub| sub.id != id);
			}
		})
	}
}

impl Shared {
	fn start(&self) {
		let mut sched = self.sched.lock().expect("poller lock poisoned");
		if sched.shutdown {
			return;
		}
		sched.generation += 1;
		sched.running = true;
		self.cv.notify_all();
		tracing::debug!(generation = sched.generation, "poll timer started");
	}

	fn stop(&self) {
		let mut sched = self.sched.lock().expect("poller lock poisoned");
		if !sched.running {
			return;
		}
		sched.running = false;
		sched.generation += 1;
		self.cv.notify_all();
		tracing::debug!("poll timer stopped");
	}

	fn is_running(&self) -> bool {
		self.sched.lock().expect("poller lock poisoned").running
	}

	/// Fan a tick out to subscribers. Runs on the dispatch context.
	fn fire(&self, generation: u64) {
		{
			let sched = self.sched.lock().expect("poller lock poisoned");
			if !sched.running || sched.generation != generation {
				tracing::trace!("discarding stale tick");
				return;
			}
		}

		let mut subs = self.subs.lock().expect("poller subscribers lock poisoned");
		for sub in subs.iter_mut() {
			(sub.on_tick)();
		}
	}
}

fn run_worker(shared: &Arc<Shared>) {
	loop {
		// Park until started (or shut down for good).
		let generation = {
			let mut sched = shared.sched.lock().expect("poller lock poisoned");
			loop {
				if sched.shutdown {
					return;
				}
				if sched.running {
					break;
				}
				sched = shared.cv.wait(sched).expect("poller lock poisoned during wait");
			}
			sched.generation
		};

		// One polling cycle: first tick after the initial delay, then a fixed cadence.
		let mut next = Instant::now() + shared.first_delay;
		loop {
			let due = {
				let mut sched = shared.sched.lock().expect("poller lock poisoned");
				loop {
					if sched.shutdown {
						return;
					}
					if !sched.running || sched.generation != generation {
						break false;
					}
					let now = Instant::now();
					if now >= next {
						break true;
					}
					let (guard, _timeout) = shared
						.cv
						.wait_timeout(sched, next - now)
						.expect("poller lock poisoned during wait");
					sched = guard;
				}
			};

			if !due {
				// Stopped or restarted; park again (a restart re-enters with
				// the new generation and a fresh first delay).
				break;
			}

			let tick = Arc::clone(shared);
			shared.dispatch.post(Box::new(move || tick.fire(generation)));

			next += shared.interval;
		}
	}
}
