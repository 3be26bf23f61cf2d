//! Asynchronous Results
//!
//! Single-assignment reply cells handed back to senders at enqueue time.
//! Waiting on an unset cell is a suspension point: other agents run until the
//! receiver completes it.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use tokio::sync::Notify;

use crate::error::AgentError;
use crate::value::Value;

struct Cell {
    slot: RefCell<Option<Result<Value, AgentError>>>,
    notify: Notify,
}

/// A value-or-error cell that is assigned exactly once.
#[derive(Clone)]
pub struct AsyncResult {
    cell: Rc<Cell>,
}

impl AsyncResult {
    /// Creates an unset cell.
    pub fn new() -> Self {
        Self {
            cell: Rc::new(Cell {
                slot: RefCell::new(None),
                notify: Notify::new(),
            }),
        }
    }

    /// A cell already holding an error, used for sends that cannot be routed.
    pub fn failed(error: AgentError) -> Self {
        let result = Self::new();
        result.set_exception(error);
        result
    }

    /// A cell already holding a value.
    pub fn ready_with(value: Value) -> Self {
        let result = Self::new();
        result.set(value);
        result
    }

    pub fn ready(&self) -> bool {
        self.cell.slot.borrow().is_some()
    }

    /// Whether the cell holds an error.
    pub fn failed_already(&self) -> bool {
        matches!(&*self.cell.slot.borrow(), Some(Err(_)))
    }

    /// Assigns a value. Returns `false` if the cell was already set.
    pub fn set(&self, value: Value) -> bool {
        self.complete(Ok(value))
    }

    /// Assigns an error. Returns `false` if the cell was already set.
    pub fn set_exception(&self, error: AgentError) -> bool {
        self.complete(Err(error))
    }

    /// Assigns the outcome of a handler. Returns `false` if already set.
    pub fn complete(&self, outcome: Result<Value, AgentError>) -> bool {
        {
            let mut slot = self.cell.slot.borrow_mut();
            if slot.is_some() {
                return false;
            }
            *slot = Some(outcome);
        }
        self.cell.notify.notify_waiters();
        true
    }

    /// Current content without waiting.
    pub fn try_get(&self) -> Option<Result<Value, AgentError>> {
        self.cell.slot.borrow().clone()
    }

    /// Waits until the cell is assigned.
    pub async fn get(&self) -> Result<Value, AgentError> {
        loop {
            let notified = self.cell.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if let Some(outcome) = self.try_get() {
                return outcome;
            }
            notified.await;
        }
    }

    /// Waits at most `timeout`. The underlying work is not cancelled.
    pub async fn get_timeout(&self, timeout: Duration) -> Result<Value, AgentError> {
        tokio::time::timeout(timeout, self.get())
            .await
            .map_err(|_| AgentError::Timeout(timeout))?
    }
}

impl Default for AsyncResult {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for AsyncResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncResult")
            .field("slot", &*self.cell.slot.borrow())
            .finish()
    }
}

/// Aggregate of the results of one broadcast.
#[derive(Debug, Clone, Default)]
pub struct SequenceAsyncResult {
    results: Vec<AsyncResult>,
}

impl SequenceAsyncResult {
    pub fn new(results: Vec<AsyncResult>) -> Self {
        Self { results }
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Whether every member is assigned.
    pub fn ready(&self) -> bool {
        self.results.iter().all(AsyncResult::ready)
    }

    pub fn results(&self) -> &[AsyncResult] {
        &self.results
    }

    /// Waits for every member, in order. Fails with the first error met.
    pub async fn get(&self) -> Result<Vec<Value>, AgentError> {
        let mut values = Vec::with_capacity(self.results.len());
        for result in &self.results {
            values.push(result.get().await?);
        }
        Ok(values)
    }

    /// Waits for every member and keeps individual outcomes.
    pub async fn settle(&self) -> Vec<Result<Value, AgentError>> {
        let mut outcomes = Vec::with_capacity(self.results.len());
        for result in &self.results {
            outcomes.push(result.get().await);
        }
        outcomes
    }
}

impl IntoIterator for SequenceAsyncResult {
    type Item = AsyncResult;
    type IntoIter = std::vec::IntoIter<AsyncResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.results.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::run_local;

    #[test]
    fn test_single_assignment() {
        let result = AsyncResult::new();
        assert!(!result.ready());
        assert!(result.set(Value::Int(1)));
        assert!(!result.set(Value::Int(2)));
        assert!(!result.set_exception(AgentError::Shutdown));
        assert_eq!(result.try_get(), Some(Ok(Value::Int(1))));
    }

    #[test]
    fn test_get_waits_for_assignment() {
        let value = run_local(async {
            let result = AsyncResult::new();
            let writer = result.clone();
            tokio::task::spawn_local(async move {
                tokio::task::yield_now().await;
                writer.set(Value::from("done"));
            });
            result.get().await
        });
        assert_eq!(value, Ok(Value::from("done")));
    }

    #[test]
    fn test_get_timeout_leaves_cell_usable() {
        run_local(async {
            let result = AsyncResult::new();
            let outcome = result.get_timeout(Duration::from_millis(5)).await;
            assert!(matches!(outcome, Err(AgentError::Timeout(_))));
            result.set(Value::Bool(true));
            assert_eq!(result.get().await, Ok(Value::Bool(true)));
        });
    }

    #[test]
    fn test_sequence_reports_first_error() {
        run_local(async {
            let ok = AsyncResult::ready_with(Value::Int(1));
            let err = AsyncResult::failed(AgentError::handler("boom"));
            let later = AsyncResult::failed(AgentError::Shutdown);
            let sequence = SequenceAsyncResult::new(vec![ok, err, later]);
            assert!(sequence.ready());
            assert_eq!(sequence.get().await, Err(AgentError::handler("boom")));
            assert_eq!(sequence.settle().await.len(), 3);
        });
    }
}
