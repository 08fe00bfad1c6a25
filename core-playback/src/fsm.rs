//! # Transition Queue
//!
//! A state machine whose transitions run strictly one at a time, in the order
//! they were submitted, even though each transition awaits engine calls.
//!
//! ## Architecture
//!
//! ```text
//!  advance(edge) ──┐
//!  advance(edge) ──┼──> mpsc FIFO ──> worker task ──> StateTable::transition
//!  advance(edge) ──┘        │              │
//!                           │              └── commit next state (watch)
//!       Pending <── oneshot ┘
//! ```
//!
//! [`TransitionQueue::advance`] enqueues synchronously and hands back a
//! [`Pending`] future, so submission order is fixed at call time rather than
//! at first poll. A single worker task owns the committed state; it looks up
//! the edge, awaits the transition, validates the target state and only then
//! commits it and completes the caller's handle before dequeuing the next job.
//!
//! A failed transition normally commits nothing: the machine stays in its
//! origin state and the worker moves on to the next job. A transition that
//! fails partway, after side effects the origin state no longer describes,
//! reports a [`Failure`] with a settle state instead; the worker commits that
//! state before handing the error back.
//!
//! The worker stops once the queue is dropped and every already-queued job
//! has run.

use crate::error::{PlaybackError, Result};
use async_trait::async_trait;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, trace};

/// The table a [`TransitionQueue`] executes against.
///
/// States and edges are plain enums; the table decides which edges exist for
/// which state and what each transition does.
#[async_trait]
pub trait StateTable: Send + Sync + 'static {
    type State: Copy + Eq + fmt::Debug + fmt::Display + Send + Sync + 'static;
    type Edge: Copy + fmt::Debug + fmt::Display + Send + 'static;
    type Args: Send + 'static;
    type Output: Send + 'static;

    /// Whether `state` is part of this table.
    fn declares(&self, state: Self::State) -> bool;

    /// Whether `edge` is defined for `state`.
    fn accepts(&self, state: Self::State, edge: Self::Edge) -> bool;

    /// Run the transition for `edge` out of `state`, returning the target
    /// state and the value handed back to the caller.
    ///
    /// `?` on a [`PlaybackError`] produces a [`Failure`] that keeps the
    /// origin state.
    async fn transition(
        &self,
        state: Self::State,
        edge: Self::Edge,
        args: Self::Args,
    ) -> std::result::Result<(Self::State, Self::Output), Failure<Self::State>>;
}

/// Why a transition failed, and where the machine ends up.
#[derive(Debug)]
pub struct Failure<S> {
    pub error: PlaybackError,
    /// Committed instead of the origin state when set.
    pub settle: Option<S>,
}

impl<S> Failure<S> {
    /// A failure that still moves the machine to `state`.
    pub fn settle_in(state: S, error: PlaybackError) -> Self {
        Self {
            error,
            settle: Some(state),
        }
    }
}

impl<S> From<PlaybackError> for Failure<S> {
    fn from(error: PlaybackError) -> Self {
        Self { error, settle: None }
    }
}

struct Job<T: StateTable> {
    edge: T::Edge,
    args: T::Args,
    reply: oneshot::Sender<Result<T::Output>>,
}

/// Serialized asynchronous state machine over a [`StateTable`].
pub struct TransitionQueue<T: StateTable> {
    jobs: mpsc::UnboundedSender<Job<T>>,
    state: watch::Receiver<T::State>,
}

impl<T: StateTable> TransitionQueue<T> {
    /// Start a queue in `initial` and spawn its worker on the current Tokio
    /// runtime.
    ///
    /// # Errors
    ///
    /// `InvalidState` if the table does not declare `initial`.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn new(table: Arc<T>, initial: T::State) -> Result<Self> {
        if !table.declares(initial) {
            return Err(PlaybackError::InvalidState(initial.to_string()));
        }

        let (jobs, receiver) = mpsc::unbounded_channel();
        let (state_tx, state) = watch::channel(initial);
        tokio::spawn(run_worker(table, receiver, state_tx));

        Ok(Self { jobs, state })
    }

    /// The last committed state.
    pub fn state(&self) -> T::State {
        *self.state.borrow()
    }

    /// Watch committed states.
    pub fn subscribe(&self) -> watch::Receiver<T::State> {
        self.state.clone()
    }

    /// Queue a transition along `edge`.
    ///
    /// The job is enqueued before this returns; awaiting the returned
    /// [`Pending`] yields the transition's output once it has run.
    pub fn advance(&self, edge: T::Edge, args: T::Args) -> Pending<T::Output> {
        let (reply, receiver) = oneshot::channel();
        if self.jobs.send(Job { edge, args, reply }).is_err() {
            // The rejected job drops its reply sender; Pending resolves to QueueClosed.
            debug!(%edge, "Transition submitted to a stopped queue");
        }
        Pending { receiver }
    }
}

impl<T: StateTable> fmt::Debug for TransitionQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransitionQueue")
            .field("state", &self.state())
            .finish()
    }
}

async fn run_worker<T: StateTable>(
    table: Arc<T>,
    mut jobs: mpsc::UnboundedReceiver<Job<T>>,
    state: watch::Sender<T::State>,
) {
    while let Some(job) = jobs.recv().await {
        let from = *state.borrow();
        let edge = job.edge;

        let outcome = if table.accepts(from, edge) {
            trace!(%from, %edge, "Running transition");
            match table.transition(from, edge, job.args).await {
                Ok((next, output)) if table.declares(next) => {
                    state.send_replace(next);
                    debug!(%from, %edge, to = %next, "Transition committed");
                    Ok(output)
                }
                Ok((next, _)) => Err(PlaybackError::InvalidState(next.to_string())),
                Err(Failure { error, settle: Some(settled) }) if table.declares(settled) => {
                    state.send_replace(settled);
                    debug!(%from, %edge, to = %settled, error = %error, "Transition failed partway");
                    Err(error)
                }
                Err(Failure { error, .. }) => {
                    debug!(%from, %edge, error = %error, "Transition failed");
                    Err(error)
                }
            }
        } else {
            Err(PlaybackError::InvalidEdge {
                state: from.to_string(),
                edge: edge.to_string(),
            })
        };

        if job.reply.send(outcome).is_err() {
            trace!(%edge, "Transition caller went away before completion");
        }
    }
}

/// Completion handle for a queued transition.
#[must_use = "a queued transition runs regardless, but its result is only observable by awaiting"]
pub struct Pending<O> {
    receiver: oneshot::Receiver<Result<O>>,
}

impl<O> Future for Pending<O> {
    type Output = Result<O>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.receiver)
            .poll(cx)
            .map(|received| received.unwrap_or_else(|_| Err(PlaybackError::QueueClosed)))
    }
}

impl<O> fmt::Debug for Pending<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pending").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Lamp {
        Off,
        On,
        Broken,
        Haunted,
    }

    impl fmt::Display for Lamp {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            fmt::Debug::fmt(self, f)
        }
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Switch {
        Toggle,
        Smash,
        Haunt,
        Fail,
        Trip,
    }

    impl fmt::Display for Switch {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            fmt::Debug::fmt(self, f)
        }
    }

    #[derive(Default)]
    struct Instrumented {
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        order: Mutex<Vec<u32>>,
    }

    #[async_trait]
    impl StateTable for Instrumented {
        type State = Lamp;
        type Edge = Switch;
        type Args = u32;
        type Output = u32;

        fn declares(&self, state: Lamp) -> bool {
            state != Lamp::Haunted
        }

        fn accepts(&self, state: Lamp, _edge: Switch) -> bool {
            state != Lamp::Broken
        }

        async fn transition(
            &self,
            state: Lamp,
            edge: Switch,
            args: u32,
        ) -> std::result::Result<(Lamp, u32), Failure<Lamp>> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);

            for _ in 0..3 {
                tokio::task::yield_now().await;
            }
            self.order.lock().push(args);
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            match edge {
                Switch::Toggle if state == Lamp::Off => Ok((Lamp::On, args)),
                Switch::Toggle => Ok((Lamp::Off, args)),
                Switch::Smash => Ok((Lamp::Broken, args)),
                Switch::Haunt => Ok((Lamp::Haunted, args)),
                Switch::Fail => Err(PlaybackError::InvariantViolation("fuse blown".into()).into()),
                Switch::Trip => Err(Failure::settle_in(
                    Lamp::Off,
                    PlaybackError::InvariantViolation("breaker tripped".into()),
                )),
            }
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn transitions_never_overlap_and_run_in_submission_order() {
        let table = Arc::new(Instrumented::default());
        let queue = Arc::new(TransitionQueue::new(Arc::clone(&table), Lamp::Off).unwrap());

        let pending: Vec<_> = (0..50).map(|i| queue.advance(Switch::Toggle, i)).collect();
        let results = futures::future::join_all(pending).await;

        let outputs: Vec<u32> = results.into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(outputs, (0..50).collect::<Vec<_>>());
        assert_eq!(*table.order.lock(), (0..50).collect::<Vec<_>>());
        assert_eq!(table.max_in_flight.load(Ordering::SeqCst), 1);
        assert_eq!(queue.state(), Lamp::Off);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_callers_are_serialized() {
        let table = Arc::new(Instrumented::default());
        let queue = Arc::new(TransitionQueue::new(Arc::clone(&table), Lamp::Off).unwrap());

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let queue = Arc::clone(&queue);
                tokio::spawn(async move {
                    for j in 0..5 {
                        queue.advance(Switch::Toggle, i * 10 + j).await.unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(table.order.lock().len(), 40);
        assert_eq!(table.max_in_flight.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn undefined_edge_is_rejected_without_running() {
        let table = Arc::new(Instrumented::default());
        let queue = TransitionQueue::new(Arc::clone(&table), Lamp::Off).unwrap();

        queue.advance(Switch::Smash, 1).await.unwrap();
        assert_eq!(queue.state(), Lamp::Broken);

        let err = queue.advance(Switch::Toggle, 2).await.unwrap_err();
        assert!(matches!(err, PlaybackError::InvalidEdge { .. }));
        assert_eq!(*table.order.lock(), vec![1]);
    }

    #[tokio::test]
    async fn undeclared_target_state_is_not_committed() {
        let queue = TransitionQueue::new(Arc::new(Instrumented::default()), Lamp::Off).unwrap();

        let err = queue.advance(Switch::Haunt, 1).await.unwrap_err();
        assert!(matches!(err, PlaybackError::InvalidState(ref s) if s == "Haunted"));
        assert_eq!(queue.state(), Lamp::Off);
    }

    #[tokio::test]
    async fn failed_transition_keeps_origin_state_and_queue_continues() {
        let queue = TransitionQueue::new(Arc::new(Instrumented::default()), Lamp::Off).unwrap();

        let failed = queue.advance(Switch::Fail, 1);
        let next = queue.advance(Switch::Toggle, 2);

        assert!(failed.await.is_err());
        assert_eq!(next.await.unwrap(), 2);
        assert_eq!(queue.state(), Lamp::On);
    }

    #[tokio::test]
    async fn partial_failure_commits_settle_state() {
        let queue = TransitionQueue::new(Arc::new(Instrumented::default()), Lamp::Off).unwrap();
        queue.advance(Switch::Toggle, 1).await.unwrap();
        assert_eq!(queue.state(), Lamp::On);

        let err = queue.advance(Switch::Trip, 2).await.unwrap_err();
        assert!(matches!(err, PlaybackError::InvariantViolation(ref m) if m == "breaker tripped"));
        assert_eq!(queue.state(), Lamp::Off);

        queue.advance(Switch::Toggle, 3).await.unwrap();
        assert_eq!(queue.state(), Lamp::On);
    }

    #[tokio::test]
    async fn undeclared_initial_state_is_rejected() {
        let result = TransitionQueue::new(Arc::new(Instrumented::default()), Lamp::Haunted);
        assert!(matches!(result, Err(PlaybackError::InvalidState(_))));
    }

    #[tokio::test]
    async fn subscribers_observe_committed_states() {
        let queue = TransitionQueue::new(Arc::new(Instrumented::default()), Lamp::Off).unwrap();
        let mut states = queue.subscribe();

        queue.advance(Switch::Toggle, 0).await.unwrap();
        states.changed().await.unwrap();
        assert_eq!(*states.borrow(), Lamp::On);
    }
}
