use crate::error::EventBusError;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::thread::ThreadId;
use tokio::sync::oneshot;

/// The asynchronous result of a bus operation.
///
/// Resolves once the lane has executed the queued task. Dropping it does not
/// cancel the task; the lane runs it regardless and discards the reply.
#[must_use = "the operation is queued either way; await the result to observe it"]
#[derive(Debug)]
pub struct Pending<R> {
    state: State<R>,
}

#[derive(Debug)]
enum State<R> {
    Queued { reply: oneshot::Receiver<R>, operation: &'static str, lane: ThreadId },
    Rejected(Option<EventBusError>),
}

impl<R> Pending<R> {
    pub(crate) const fn queued(
        reply: oneshot::Receiver<R>,
        operation: &'static str,
        lane: ThreadId,
    ) -> Self {
        Self { state: State::Queued { reply, operation, lane } }
    }

    pub(crate) const fn rejected(error: EventBusError) -> Self {
        Self { state: State::Rejected(Some(error)) }
    }

    /// Blocks the current thread until the lane replies.
    ///
    /// Meant for synchronous callers; async code should `.await` instead.
    ///
    /// # Errors
    /// Returns [`EventBusError::BusClosed`] if the bus rejected the task or the
    /// lane terminated without replying, and [`EventBusError::InterruptedWait`]
    /// if called from a listener running on the same lane. In the latter case
    /// the task stays queued and still runs once the listener returns.
    ///
    /// # Panics
    /// Panics if called from within an asynchronous execution context.
    pub fn wait(self) -> Result<R, EventBusError> {
        match self.state {
            State::Queued { operation, lane, .. } if std::thread::current().id() == lane => {
                Err(EventBusError::InterruptedWait {
                    message: "a listener cannot block on a reply from its own lane".into(),
                    context: Some(operation.into()),
                })
            },
            State::Queued { reply, operation, .. } => {
                reply.blocking_recv().map_err(|_| EventBusError::lane_dropped(operation))
            },
            State::Rejected(error) => Err(error.unwrap_or_else(|| EventBusError::closed("wait"))),
        }
    }
}

impl<R> Future for Pending<R> {
    type Output = Result<R, EventBusError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match &mut self.get_mut().state {
            State::Queued { reply, operation, .. } => Pin::new(reply)
                .poll(cx)
                .map(|reply| reply.map_err(|_| EventBusError::lane_dropped(*operation))),
            State::Rejected(error) => {
                Poll::Ready(Err(error.take().unwrap_or_else(|| EventBusError::closed("poll"))))
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn elsewhere() -> ThreadId {
        std::thread::spawn(|| std::thread::current().id()).join().unwrap()
    }

    #[tokio::test]
    async fn resolves_with_reply() {
        let (tx, rx) = oneshot::channel();
        let pending = Pending::queued(rx, "emit", elsewhere());
        tx.send(true).unwrap();
        assert!(pending.await.unwrap());
    }

    #[tokio::test]
    async fn dropped_reply_is_bus_closed() {
        let (tx, rx) = oneshot::channel::<bool>();
        let pending = Pending::queued(rx, "emit", elsewhere());
        drop(tx);
        assert!(matches!(pending.await, Err(EventBusError::BusClosed { .. })));
    }

    #[tokio::test]
    async fn rejected_fails_immediately() {
        let pending = Pending::<usize>::rejected(EventBusError::closed("subscribe"));
        let err = pending.await.unwrap_err();
        assert!(err.to_string().contains("(subscribe)"));
    }

    #[test]
    fn wait_blocks_until_reply() {
        let (tx, rx) = oneshot::channel();
        let pending = Pending::queued(rx, "listener_count", elsewhere());
        let sender = std::thread::spawn(move || tx.send(3usize).unwrap());
        assert_eq!(pending.wait().unwrap(), 3);
        sender.join().unwrap();
    }

    #[test]
    fn wait_on_the_lane_thread_fails_fast() {
        let (tx, rx) = oneshot::channel::<usize>();
        let pending = Pending::queued(rx, "listener_count", std::thread::current().id());
        let err = pending.wait().unwrap_err();
        assert!(matches!(err, EventBusError::InterruptedWait { .. }));
        assert!(err.to_string().contains("(listener_count)"));
        assert!(tx.is_closed(), "receiver is dropped rather than left waiting");
    }
}
