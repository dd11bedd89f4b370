//! Hand-rolled intra-process synchronization primitives.
//!
//! The event channel's two semaphores connect the simulation thread and
//! the receiver thread of the same process — never two processes — so a
//! safe `Mutex`/`Condvar`-backed counting semaphore is the right tool
//! here, the same way a narrow in-process critical section elsewhere in
//! this codebase is a hand-rolled spinlock rather than an external crate
//! or raw `sem_init`/`sem_post` FFI.

use std::sync::{Condvar, Mutex};

/// A counting semaphore. `post` increments and wakes one waiter; `wait`
/// blocks until the count is positive, then decrements it.
#[derive(Debug)]
pub struct Semaphore {
    count: Mutex<usize>,
    condvar: Condvar,
}

impl Semaphore {
    pub fn new(initial: usize) -> Semaphore {
        Semaphore {
            count: Mutex::new(initial),
            condvar: Condvar::new(),
        }
    }

    pub fn post(&self) {
        let mut count = self.count.lock().expect("semaphore mutex poisoned");
        *count += 1;
        self.condvar.notify_one();
    }

    pub fn wait(&self) {
        let mut count = self.count.lock().expect("semaphore mutex poisoned");
        while *count == 0 {
            count = self.condvar.wait(count).expect("semaphore mutex poisoned");
        }
        *count -= 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn wait_blocks_until_post() {
        let sem = Arc::new(Semaphore::new(0));
        let sem2 = Arc::clone(&sem);
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            sem2.post();
        });
        sem.wait();
        handle.join().unwrap();
    }

    #[test]
    fn initial_count_is_immediately_available() {
        let sem = Semaphore::new(1);
        sem.wait();
    }
}
