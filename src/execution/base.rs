//! Runtime state shared by every operator
//!
//! A `Base` owns one operator's bounded output channel, its run-once guard
//! and its state watcher. `run` drives the operator body at most once:
//!
//! 1. `Idle -> Running`, exactly once, under the `OnceCell`
//! 2. the body sends items through `Output`
//! 3. a failure is logged and recorded in the context
//! 4. the output channel closes
//! 5. watchers see `Completed` or `Failed`
//!
//! Concurrent callers wait on the same cell and return the same state.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::Value;
use tokio::sync::{mpsc, watch, OnceCell};

use super::context::Context;
use super::errors::{ExecutionError, ExecutionResult};
use crate::observability::Logger;

/// Lifecycle of an operator instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Idle,
    Running,
    Completed,
    Failed,
}

impl State {
    pub fn is_terminal(&self) -> bool {
        matches!(self, State::Completed | State::Failed)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

pub struct Base {
    name: &'static str,
    capacity: usize,
    sender: Mutex<Option<mpsc::Sender<Value>>>,
    receiver: Mutex<Option<mpsc::Receiver<Value>>>,
    once: OnceCell<State>,
    state: watch::Sender<State>,
}

impl Base {
    pub fn new(name: &'static str, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (sender, receiver) = mpsc::channel(capacity);
        let (state, _) = watch::channel(State::Idle);
        Self {
            name,
            capacity,
            sender: Mutex::new(Some(sender)),
            receiver: Mutex::new(Some(receiver)),
            once: OnceCell::new(),
            state,
        }
    }

    /// Fresh runtime state with the same name and capacity
    pub fn copy(&self) -> Self {
        Self::new(self.name, self.capacity)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn state(&self) -> State {
        *self.state.borrow()
    }

    /// Watcher notified on every state change
    pub fn watch(&self) -> watch::Receiver<State> {
        self.state.subscribe()
    }

    /// Resolves once the operator reached a terminal state
    pub async fn wait(&self) -> State {
        let mut rx = self.state.subscribe();
        let state = match rx.wait_for(State::is_terminal).await {
            Ok(state) => *state,
            Err(_) => self.state(),
        };
        state
    }

    /// Consumer end of the output channel. Only the first caller gets it.
    pub fn take_output(&self) -> Option<mpsc::Receiver<Value>> {
        lock(&self.receiver).take()
    }

    /// Runs `body` unless it already ran, and returns the terminal state
    pub async fn run<F, Fut>(&self, ctx: &Arc<Context>, body: F) -> State
    where
        F: FnOnce(Output) -> Fut,
        Fut: Future<Output = ExecutionResult<()>>,
    {
        *self
            .once
            .get_or_init(|| async move {
                self.state.send_replace(State::Running);
                ctx.metrics().increment_operators_run();

                let sender = lock(&self.sender).take();
                let result = match &sender {
                    Some(tx) => body(Output::new(tx.clone(), Arc::clone(ctx))).await,
                    None => Err(ExecutionError::internal(format!(
                        "{} output already closed",
                        self.name
                    ))),
                };

                let state = match result {
                    Ok(()) => State::Completed,
                    Err(err) => {
                        Logger::error(
                            "OPERATOR_FAILED",
                            &[
                                ("operator", self.name),
                                ("code", err.code().code()),
                                ("reason", err.message()),
                            ],
                        );
                        ctx.error(err);
                        State::Failed
                    }
                };

                // Close the output before anyone is told the operator is done.
                drop(sender);
                self.state.send_replace(state);
                state
            })
            .await
    }
}

/// Producer end handed to an operator body
pub struct Output {
    sender: mpsc::Sender<Value>,
    ctx: Arc<Context>,
}

impl Output {
    fn new(sender: mpsc::Sender<Value>, ctx: Arc<Context>) -> Self {
        Self { sender, ctx }
    }

    /// Sends one item. Returns false when the query stopped or the consumer
    /// went away; the body should return then.
    pub async fn send(&self, item: Value) -> bool {
        tokio::select! {
            biased;
            _ = self.ctx.stopped() => false,
            sent = self.sender.send(item) => {
                if sent.is_ok() {
                    self.ctx.metrics().add_items_produced(1);
                }
                sent.is_ok()
            }
        }
    }
}

/// Consumer end of a child's output
pub struct Input {
    receiver: mpsc::Receiver<Value>,
    ctx: Arc<Context>,
}

impl Input {
    pub fn new(receiver: mpsc::Receiver<Value>, ctx: Arc<Context>) -> Self {
        Self { receiver, ctx }
    }

    /// Next item, or `None` once the child closed its output or the query
    /// stopped
    pub async fn recv(&mut self) -> Option<Value> {
        tokio::select! {
            biased;
            _ = self.ctx.stopped() => None,
            item = self.receiver.recv() => item,
        }
    }
}
