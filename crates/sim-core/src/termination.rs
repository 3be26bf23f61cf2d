//! Termination checking.
//!
//! The checker holds an ordered list of conditions. Each `check` evaluates
//! them against the current graph and the first one that holds ends the run.

use std::fmt;

use futures::future::LocalBoxFuture;
use futures::FutureExt;
use sim_agents::{
    services, Agent, AgentContext, AgentId, HandlerResult, HandlerTable, Params, Value,
};
use sim_graph::DynGraph;

/// Motive reported by [`TerminationCondition::count_down`].
pub const COUNT_DOWN_MOTIVE: &str = "Exhausted Count Down.";

type Predicate = Box<dyn FnMut(&DynGraph) -> bool>;

/// A named predicate over the graph.
pub struct TerminationCondition {
    motive: String,
    predicate: Predicate,
}

impl TerminationCondition {
    pub fn new(motive: impl Into<String>, predicate: impl FnMut(&DynGraph) -> bool + 'static) -> Self {
        Self {
            motive: motive.into(),
            predicate: Box::new(predicate),
        }
    }

    /// Holds from the `n`-th evaluation on.
    pub fn count_down(n: u64) -> Self {
        let mut checks = 0u64;
        Self::new(COUNT_DOWN_MOTIVE, move |_| {
            checks += 1;
            checks >= n
        })
    }

    pub fn always_true() -> Self {
        Self::new("Always true.", |_| true)
    }

    pub fn always_false() -> Self {
        Self::new("Always false.", |_| false)
    }

    pub fn motive(&self) -> &str {
        &self.motive
    }

    pub fn evaluate(&mut self, graph: &DynGraph) -> bool {
        (self.predicate)(graph)
    }
}

impl fmt::Debug for TerminationCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TerminationCondition")
            .field("motive", &self.motive)
            .finish()
    }
}

#[derive(Debug, Default)]
pub struct TerminationChecker {
    conditions: Vec<TerminationCondition>,
    motive: Option<String>,
    pending: Option<String>,
    checks: u64,
}

impl TerminationChecker {
    pub fn new(conditions: Vec<TerminationCondition>) -> Self {
        Self {
            conditions,
            ..Self::default()
        }
    }

    pub fn id() -> AgentId {
        AgentId::service(services::TERMINATION_CHECKER)
    }

    pub fn with_condition(mut self, condition: TerminationCondition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// Motive of the condition that fired, once one has.
    pub fn motive(&self) -> Option<&str> {
        self.motive.as_deref()
    }

    pub fn checks(&self) -> u64 {
        self.checks
    }

    /// Evaluates the conditions in order. A forced motive wins.
    pub fn evaluate(&mut self, graph: &DynGraph) -> Option<String> {
        self.checks += 1;
        if let Some(reason) = self.pending.take() {
            return Some(reason);
        }
        self.conditions
            .iter_mut()
            .find_map(|condition| condition.evaluate(graph).then(|| condition.motive.clone()))
    }
}

/// `check(requester) -> bool`
fn check<'a>(
    checker: &'a mut TerminationChecker,
    ctx: &'a AgentContext,
    params: Params,
) -> LocalBoxFuture<'a, HandlerResult> {
    async move {
        let requester = params.agent_id("requester")?;
        let fired = {
            let graph = ctx.graph();
            checker.evaluate(&*graph)
        };
        let Some(motive) = fired else {
            return Ok(Value::Bool(false));
        };
        checker.motive = Some(motive.clone());
        ctx.send(
            requester,
            "positive_termination",
            Params::new()
                .with("originator", ctx.id().clone())
                .with("motive", motive),
        );
        Ok(Value::Bool(true))
    }
    .boxed_local()
}

/// `signal_termination(reason)`: the next `check` reports `reason`.
fn signal_termination<'a>(
    checker: &'a mut TerminationChecker,
    _ctx: &'a AgentContext,
    params: Params,
) -> LocalBoxFuture<'a, HandlerResult> {
    async move {
        let reason = params.str_or("reason", "Termination requested.")?;
        checker.pending = Some(reason.to_string());
        Ok(Value::Null)
    }
    .boxed_local()
}

fn motive<'a>(
    checker: &'a mut TerminationChecker,
    _ctx: &'a AgentContext,
    _params: Params,
) -> LocalBoxFuture<'a, HandlerResult> {
    async move { Ok(Value::from(checker.motive.clone())) }.boxed_local()
}

impl Agent for TerminationChecker {
    const KIND: &'static str = "termination_checker";

    fn handlers() -> HandlerTable<Self> {
        HandlerTable::new()
            .on("check", check)
            .on("signal_termination", signal_termination)
            .on("motive", motive)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sim_graph::{Graph, SparseGraph};

    #[test]
    fn test_count_down_fires_on_nth_check() {
        let graph = SparseGraph::undirected(0);
        let mut checker = TerminationChecker::new(vec![TerminationCondition::count_down(3)]);
        assert_eq!(checker.evaluate(&graph), None);
        assert_eq!(checker.evaluate(&graph), None);
        assert_eq!(checker.evaluate(&graph).as_deref(), Some(COUNT_DOWN_MOTIVE));
        assert_eq!(checker.checks(), 3);
    }

    #[test]
    fn test_first_true_condition_wins() {
        let mut graph = SparseGraph::undirected(0);
        let mut checker = TerminationChecker::new(vec![
            TerminationCondition::always_false(),
            TerminationCondition::new("Too big.", |g: &DynGraph| g.number_of_nodes() > 2),
            TerminationCondition::always_true(),
        ]);
        assert_eq!(checker.evaluate(&graph).as_deref(), Some("Always true."));
        graph.add_nodes(3).unwrap();
        assert_eq!(checker.evaluate(&graph).as_deref(), Some("Too big."));
    }

    #[test]
    fn test_forced_motive_preempts_conditions() {
        let graph = SparseGraph::undirected(0);
        let mut checker = TerminationChecker::new(vec![TerminationCondition::always_true()]);
        checker.pending = Some("Extinct.".into());
        assert_eq!(checker.evaluate(&graph).as_deref(), Some("Extinct."));
        assert_eq!(checker.evaluate(&graph).as_deref(), Some("Always true."));
    }
}
