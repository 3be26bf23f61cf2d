//! Mailboxes
//!
//! Each agent owns one [`Mailbox`]; everybody else holds cloneable
//! [`Endpoint`]s obtained through the address book. The queue is FIFO, so
//! messages from one sender reach the receiver in send order.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::Instant;

use crate::error::AgentError;
use crate::id::AgentId;
use crate::message::Envelope;

struct Queue {
    items: RefCell<VecDeque<Envelope>>,
    notify: Notify,
    closed: Cell<bool>,
}

impl Queue {
    fn close(&self) -> usize {
        self.closed.set(true);
        let drained: Vec<Envelope> = self.items.borrow_mut().drain(..).collect();
        // wake a reader parked on an empty queue so it observes the closure
        self.notify.notify_one();
        drained.len()
    }
}

/// Sending side of a mailbox.
#[derive(Clone)]
pub struct Endpoint {
    owner: AgentId,
    queue: Rc<Queue>,
}

impl Endpoint {
    pub fn owner(&self) -> &AgentId {
        &self.owner
    }

    /// Enqueues an envelope. A closed mailbox hands it back.
    pub fn deliver(&self, envelope: Envelope) -> Result<(), Envelope> {
        if self.queue.closed.get() {
            return Err(envelope);
        }
        self.queue.items.borrow_mut().push_back(envelope);
        self.queue.notify.notify_one();
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.queue.closed.get()
    }

    /// Whether both endpoints lead to the same mailbox.
    pub fn same_mailbox(&self, other: &Endpoint) -> bool {
        Rc::ptr_eq(&self.queue, &other.queue)
    }

    /// Number of queued envelopes.
    pub fn pending(&self) -> usize {
        self.queue.items.borrow().len()
    }

    /// Closes the mailbox from the sending side, as at shutdown.
    pub fn close(&self) -> usize {
        self.queue.close()
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("owner", &self.owner)
            .field("pending", &self.pending())
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Receiving side of a mailbox, owned by the agent's execution context.
pub struct Mailbox {
    owner: AgentId,
    queue: Rc<Queue>,
}

impl Mailbox {
    pub fn new(owner: AgentId) -> Self {
        Self {
            owner,
            queue: Rc::new(Queue {
                items: RefCell::new(VecDeque::new()),
                notify: Notify::new(),
                closed: Cell::new(false),
            }),
        }
    }

    pub fn owner(&self) -> &AgentId {
        &self.owner
    }

    pub fn endpoint(&self) -> Endpoint {
        Endpoint {
            owner: self.owner.clone(),
            queue: Rc::clone(&self.queue),
        }
    }

    pub fn try_read(&self) -> Option<Envelope> {
        self.queue.items.borrow_mut().pop_front()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.items.borrow().is_empty()
    }

    pub fn is_closed(&self) -> bool {
        self.queue.closed.get()
    }

    /// Waits for the next envelope.
    ///
    /// With a timeout, fails with [`AgentError::NoMessage`] once it elapses
    /// on an empty queue.
    pub async fn read(&self, timeout: Option<Duration>) -> Result<Envelope, AgentError> {
        let deadline = timeout.map(|t| Instant::now() + t);
        loop {
            if let Some(envelope) = self.try_read() {
                return Ok(envelope);
            }
            if self.queue.closed.get() {
                return Err(AgentError::NoMessage);
            }
            let notified = self.queue.notify.notified();
            match deadline {
                None => notified.await,
                Some(deadline) => {
                    if tokio::time::timeout_at(deadline, notified).await.is_err() {
                        return self.try_read().ok_or(AgentError::NoMessage);
                    }
                }
            }
        }
    }

    /// Human-readable listing of queued messages, for error records.
    pub fn snapshot(&self) -> Vec<String> {
        self.queue
            .items
            .borrow()
            .iter()
            .map(|envelope| envelope.message.to_string())
            .collect()
    }

    /// Refuses further deliveries and drops everything queued, which resolves
    /// every pending sender with a shutdown error. Returns how many were
    /// dropped.
    pub fn close(&self) -> usize {
        self.queue.close()
    }
}

impl Drop for Mailbox {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for Mailbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mailbox")
            .field("owner", &self.owner)
            .field("pending", &self.queue.items.borrow().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Message;
    use crate::runtime::run_local;
    use crate::value::Params;

    fn envelope(payload: &str) -> (Envelope, crate::AsyncResult) {
        Envelope::new(
            Message::new(AgentId::service("test"), payload, Params::new()),
            Duration::ZERO,
        )
    }

    #[test]
    fn test_fifo_order() {
        let mailbox = Mailbox::new(AgentId::Node(0));
        let endpoint = mailbox.endpoint();
        for payload in ["a", "b", "c"] {
            endpoint.deliver(envelope(payload).0).unwrap();
        }
        let order: Vec<_> = std::iter::from_fn(|| mailbox.try_read())
            .map(|e| e.message.payload)
            .collect();
        assert_eq!(order, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_read_times_out_when_empty() {
        run_local(async {
            let mailbox = Mailbox::new(AgentId::Node(0));
            let outcome = mailbox.read(Some(Duration::from_millis(5))).await;
            assert!(matches!(outcome, Err(AgentError::NoMessage)));
        });
    }

    #[test]
    fn test_close_rejects_and_drains() {
        let mailbox = Mailbox::new(AgentId::Node(0));
        let endpoint = mailbox.endpoint();
        let (queued, result) = envelope("activate");
        endpoint.deliver(queued).unwrap();
        assert_eq!(mailbox.snapshot(), vec!["activate <- test()"]);
        assert_eq!(mailbox.close(), 1);
        assert_eq!(result.try_get(), Some(Err(AgentError::Shutdown)));
        assert!(endpoint.deliver(envelope("late").0).is_err());
    }
}
