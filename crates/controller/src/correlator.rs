//! Request/response correlation
//!
//! Responses carry no request id, only a response id shared by every
//! request of the same kind. Waiters are therefore queued per response id
//! and a response resolves the oldest waiter still registered under it.
//! A waiter that gives up is removed, so a late response goes to the next
//! waiter in line or is dropped when nobody is waiting.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::oneshot;

use crate::error::ControllerError;
use crate::Envelope;

pub type Delivery = Result<Envelope, ControllerError>;

/// Identifies one registered waiter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ticket(u64);

#[derive(Debug)]
struct Waiter {
    ticket: Ticket,
    tx: oneshot::Sender<Delivery>,
}

#[derive(Debug, Default)]
struct Inner {
    next_ticket: u64,
    waiters: HashMap<u8, VecDeque<Waiter>>,
}

#[derive(Debug, Default)]
pub struct Correlator {
    inner: Mutex<Inner>,
}

impl Correlator {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queues a waiter for the next unclaimed response on `response_id`
    pub fn register(&self, response_id: u8) -> (Ticket, oneshot::Receiver<Delivery>) {
        let (tx, rx) = oneshot::channel();
        let mut inner = self.lock();

        let ticket = Ticket(inner.next_ticket);
        inner.next_ticket += 1;
        inner
            .waiters
            .entry(response_id)
            .or_default()
            .push_back(Waiter { ticket, tx });

        (ticket, rx)
    }

    /// Removes a waiter; a no-op if it was already resolved
    pub fn deregister(&self, response_id: u8, ticket: Ticket) {
        let mut inner = self.lock();
        if let Some(queue) = inner.waiters.get_mut(&response_id) {
            queue.retain(|w| w.ticket != ticket);
            if queue.is_empty() {
                inner.waiters.remove(&response_id);
            }
        }
    }

    /// Hands `delivery` to the oldest live waiter on `response_id`
    ///
    /// Returns the delivery back if nobody took it.
    pub fn resolve(&self, response_id: u8, delivery: Delivery) -> Option<Delivery> {
        let mut inner = self.lock();
        let Some(queue) = inner.waiters.get_mut(&response_id) else {
            return Some(delivery);
        };

        let mut pending = delivery;
        let unclaimed = loop {
            let Some(waiter) = queue.pop_front() else {
                break Some(pending);
            };
            match waiter.tx.send(pending) {
                Ok(()) => break None,
                Err(returned) => pending = returned,
            }
        };

        if queue.is_empty() {
            inner.waiters.remove(&response_id);
        }
        unclaimed
    }

    /// Number of waiters registered under `response_id`
    pub fn pending(&self, response_id: u8) -> usize {
        self.lock().waiters.get(&response_id).map_or(0, VecDeque::len)
    }

    pub fn total_pending(&self) -> usize {
        self.lock().waiters.values().map(VecDeque::len).sum()
    }
}
