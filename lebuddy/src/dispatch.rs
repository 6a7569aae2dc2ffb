//! The single logical processing thread.
//!
//! Everything the engine does per tick (sample, classify, emit, inject) runs
//! on this one worker, in submission order. That is what lets the state
//! machines stay lock-light: nothing else ever touches them.

use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;

use detect::{Dispatch, Task};

pub struct WorkerDispatcher {
	tx: Option<Sender<Task>>,
	worker: Option<JoinHandle<()>>,
}

impl WorkerDispatcher {
	pub fn new() -> Self {
		let (tx, rx) = mpsc::channel::<Task>();
		let worker = std::thread::Builder::new()
			.name("dispatch".to_string())
			.spawn(move || {
				for task in rx {
					task();
				}
			})
			.expect("spawn dispatch thread");

		Self {
			tx: Some(tx),
			worker: Some(worker),
		}
	}

	fn submit(&self, task: Task) -> Result<(), Task> {
		match &self.tx {
			Some(tx) => tx.send(task).map_err(|err| err.0),
			None => Err(task),
		}
	}
}

impl Dispatch for WorkerDispatcher {
	fn post(&self, task: Task) {
		if self.submit(task).is_err() {
			tracing::warn!("dispatch thread gone; dropping task");
		}
	}

	fn run(&self, task: Task) {
		let done = Arc::new((Mutex::new(false), Condvar::new()));
		let signal = Arc::clone(&done);

		let wrapped: Task = Box::new(move || {
			task();
			let (flag, cv) = &*signal;
			*flag.lock().expect("dispatch run flag poisoned") = true;
			cv.notify_all();
		});

		match self.submit(wrapped) {
			Ok(()) => {
				let (flag, cv) = &*done;
				let mut finished = flag.lock().expect("dispatch run flag poisoned");
				while !*finished {
					finished = cv.wait(finished).expect("dispatch run flag poisoned");
				}
			}
			// Queue already closed: run on the caller so the blocking
			// contract still holds.
			Err(task) => task(),
		}
	}
}

impl Drop for WorkerDispatcher {
	fn drop(&mut self) {
		// Closing the queue lets the worker drain what is left and exit.
		self.tx.take();
		if let Some(worker) = self.worker.take() {
			let _ = worker.join();
		}
	}
}
