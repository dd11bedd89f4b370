//! The producer/consumer event channel between the simulation thread and
//! the receiver thread: a FIFO queue of [`Event`]s gated by two counting
//! semaphores so the VP stays suspended until the driver has drained the
//! event it was told about.
//!
//! `EventChannel::new` hands back a producer half and a consumer half
//! sharing one inner queue, so "who may enqueue" and "who may dequeue on
//! CONTINUE" are distinct types rather than a convention both sides have
//! to honor by hand.

use crate::event::Event;
use crate::sync::Semaphore;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

struct Inner {
    queue: Mutex<VecDeque<Event>>,
    full_slots: Semaphore,
    empty_slots: Semaphore,
}

pub fn channel() -> (EventProducer, EventConsumer) {
    let inner = Arc::new(Inner {
        queue: Mutex::new(VecDeque::new()),
        full_slots: Semaphore::new(0),
        empty_slots: Semaphore::new(0),
    });
    (
        EventProducer {
            inner: inner.clone(),
        },
        EventConsumer { inner },
    )
}

/// Held by the simulation thread.
pub struct EventProducer {
    inner: Arc<Inner>,
}

impl EventProducer {
    /// Enqueues `event`, signals the consumer, then blocks until the
    /// consumer has drained the queue down to empty. This is the
    /// suspend-on-event half of the suspend-on-event/resume-on-CONTINUE
    /// discipline: the VP does not run again until the driver has
    /// acknowledged the last buffered event.
    pub fn notify(&self, event: Event) {
        self.inner.queue.lock().expect("event queue poisoned").push_back(event);
        self.inner.full_slots.post();
        self.inner.empty_slots.wait();
    }
}

/// Held by the receiver thread.
pub struct EventConsumer {
    inner: Arc<Inner>,
}

impl EventConsumer {
    /// Blocks until an event is available, then dequeues and returns it.
    /// If that dequeue empties the queue, wakes the producer — the next
    /// CONTINUE will do so otherwise.
    pub fn recv(&self) -> Event {
        self.inner.full_slots.wait();
        let (event, now_empty) = {
            let mut queue = self.inner.queue.lock().expect("event queue poisoned");
            let event = queue.pop_front().expect("full_slots guarantees an entry");
            (event, queue.is_empty())
        };
        if now_empty {
            self.inner.empty_slots.post();
        }
        event
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventKind;
    use std::thread;

    #[test]
    fn delivers_events_in_production_order() {
        let (producer, consumer) = channel();
        let handle = thread::spawn(move || {
            producer.notify(Event::mmio_read(0x1000, 4));
            producer.notify(Event::vp_end());
        });

        let first = consumer.recv();
        assert_eq!(first.kind, EventKind::MmioRead);
        let second = consumer.recv();
        assert_eq!(second.kind, EventKind::VpEnd);
        handle.join().unwrap();
    }
}
