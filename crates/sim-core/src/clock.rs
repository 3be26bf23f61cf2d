//! Simulation Clock
//!
//! Drives discrete time. Each tick is one `advance` message the clock sends
//! to itself, so observer registrations and termination notices are handled
//! between ticks. Stopping is a `halt` message sent the same way; the clock
//! kills itself once the activator has acknowledged `simulation_ended`.
//!
//! - [`ClockMode::Synchronous`] waits for the activator to finish the tick
//!   and then asks the termination checker whether to stop.
//! - [`ClockMode::Pipelined`] fires a fixed number of ticks without waiting
//!   and never consults the checker.

use futures::future::LocalBoxFuture;
use futures::FutureExt;
use sim_agents::{
    services, Agent, AgentContext, AgentId, HandlerResult, HandlerTable, Params, Value,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockMode {
    Synchronous,
    Pipelined { ticks: u64 },
}

#[derive(Debug)]
pub struct Clock {
    mode: ClockMode,
    ticks: u64,
    observers: Vec<AgentId>,
    motive: Option<String>,
    running: bool,
}

impl Clock {
    pub fn new(mode: ClockMode) -> Self {
        Self {
            mode,
            ticks: 0,
            observers: Vec::new(),
            motive: None,
            running: false,
        }
    }

    pub fn synchronous() -> Self {
        Self::new(ClockMode::Synchronous)
    }

    pub fn pipelined(ticks: u64) -> Self {
        Self::new(ClockMode::Pipelined { ticks })
    }

    pub fn id() -> AgentId {
        AgentId::service(services::CLOCK)
    }

    pub fn mode(&self) -> ClockMode {
        self.mode
    }

    /// Ticks emitted so far.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn motive(&self) -> Option<&str> {
        self.motive.as_deref()
    }

    pub fn observers(&self) -> &[AgentId] {
        &self.observers
    }

    fn emit_ticked(&self, ctx: &AgentContext) {
        if self.observers.is_empty() {
            return;
        }
        ctx.send_all(
            self.observers.iter().cloned(),
            "ticked",
            Params::new().with("tick", self.ticks),
            &[],
        );
    }

    async fn tick_synchronously(&mut self, ctx: &AgentContext) -> bool {
        self.emit_ticked(ctx);
        let activator = AgentId::service(services::ACTIVATOR);
        if let Err(err) = ctx
            .sync_send(activator, "tick", Params::new().with("tick", self.ticks))
            .await
        {
            ctx.error(format!("tick {} failed: {err}", self.ticks));
        }
        self.ticks += 1;

        let checker = AgentId::service(services::TERMINATION_CHECKER);
        match ctx
            .sync_send(
                checker,
                "check",
                Params::new().with("requester", ctx.id().clone()),
            )
            .await
        {
            Ok(reply) => reply.as_bool().unwrap_or(false),
            Err(err) => {
                self.motive = Some(format!("Termination checker failed: {err}"));
                true
            }
        }
    }

    fn tick_pipelined(&mut self, ctx: &AgentContext, limit: u64) -> bool {
        if self.ticks >= limit {
            return true;
        }
        self.emit_ticked(ctx);
        ctx.send(
            AgentId::service(services::ACTIVATOR),
            "tick",
            Params::new().with("tick", self.ticks),
        );
        self.ticks += 1;
        self.ticks >= limit
    }

    async fn halt(&mut self, ctx: &AgentContext) {
        self.running = false;
        if self.motive.is_none() {
            if let ClockMode::Synchronous = self.mode {
                let checker = AgentId::service(services::TERMINATION_CHECKER);
                if let Ok(Value::Str(motive)) = ctx.sync_send(checker, "motive", Params::new()).await {
                    self.motive = Some(motive);
                }
            } else {
                self.motive = Some("Exhausted Tick Budget.".to_string());
            }
        }
        let activator = AgentId::service(services::ACTIVATOR);
        if let Err(err) = ctx
            .sync_send(activator, "simulation_ended", Params::new())
            .await
        {
            ctx.error(format!("simulation_ended failed: {err}"));
        }
        ctx.log(format!(
            "clock stopped after {} ticks: {}",
            self.ticks,
            self.motive.as_deref().unwrap_or("no motive")
        ));
        ctx.kill();
    }
}

fn start<'a>(
    clock: &'a mut Clock,
    ctx: &'a AgentContext,
    _params: Params,
) -> LocalBoxFuture<'a, HandlerResult> {
    async move {
        if !clock.running {
            clock.running = true;
            ctx.send(ctx.id().clone(), "advance", Params::new());
        }
        Ok(Value::Null)
    }
    .boxed_local()
}

fn advance<'a>(
    clock: &'a mut Clock,
    ctx: &'a AgentContext,
    _params: Params,
) -> LocalBoxFuture<'a, HandlerResult> {
    async move {
        if !clock.running {
            return Ok(Value::Null);
        }
        let done = match clock.mode {
            ClockMode::Synchronous => clock.tick_synchronously(ctx).await,
            ClockMode::Pipelined { ticks } => clock.tick_pipelined(ctx, ticks),
        };
        // a termination notice from the checker is already queued ahead of
        // the halt
        let next = if done { "halt" } else { "advance" };
        ctx.send(ctx.id().clone(), next, Params::new());
        Ok(Value::from(clock.ticks))
    }
    .boxed_local()
}

fn halt<'a>(
    clock: &'a mut Clock,
    ctx: &'a AgentContext,
    _params: Params,
) -> LocalBoxFuture<'a, HandlerResult> {
    async move {
        clock.halt(ctx).await;
        Ok(Value::from(clock.ticks))
    }
    .boxed_local()
}

fn register_observer<'a>(
    clock: &'a mut Clock,
    _ctx: &'a AgentContext,
    params: Params,
) -> LocalBoxFuture<'a, HandlerResult> {
    async move {
        let observer = params.agent_id("name")?;
        if !clock.observers.contains(&observer) {
            clock.observers.push(observer);
        }
        Ok(Value::Null)
    }
    .boxed_local()
}

fn unregister_observer<'a>(
    clock: &'a mut Clock,
    _ctx: &'a AgentContext,
    params: Params,
) -> LocalBoxFuture<'a, HandlerResult> {
    async move {
        let observer = params.agent_id("name")?;
        let before = clock.observers.len();
        clock.observers.retain(|o| *o != observer);
        Ok(Value::Bool(clock.observers.len() != before))
    }
    .boxed_local()
}

/// `positive_termination(originator, motive)` from the checker.
fn positive_termination<'a>(
    clock: &'a mut Clock,
    _ctx: &'a AgentContext,
    params: Params,
) -> LocalBoxFuture<'a, HandlerResult> {
    async move {
        let motive = params.str("motive")?;
        tracing::debug!(originator = ?params.get("originator"), motive, "termination");
        clock.motive = Some(motive.to_string());
        Ok(Value::Null)
    }
    .boxed_local()
}

fn ticks<'a>(
    clock: &'a mut Clock,
    _ctx: &'a AgentContext,
    _params: Params,
) -> LocalBoxFuture<'a, HandlerResult> {
    async move { Ok(Value::from(clock.ticks)) }.boxed_local()
}

impl Agent for Clock {
    const KIND: &'static str = "clock";

    fn handlers() -> HandlerTable<Self> {
        HandlerTable::new()
            .on("start", start)
            .on("advance", advance)
            .on("halt", halt)
            .on("register_observer", register_observer)
            .on("unregister_observer", unregister_observer)
            .on("positive_termination", positive_termination)
            .on("ticks", ticks)
    }
}
