//! Idle timeout for push stream bodies.
//!
//! The backend writes a keep-alive comment every 15 seconds. A body that stays
//! silent for much longer than that is a dead connection that never produced
//! an error, so the wrapper yields [`DataError::Timeout`] and then ends.

use crate::error::DataError;
use futures::Stream;
use pin_project::pin_project;
use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
    time::Duration,
};
use tokio::time::{Instant, Sleep};

/// Default idle timeout, three missed keep-alives.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(45);

#[derive(Debug)]
#[pin_project]
pub struct TimeoutStream<S> {
    #[pin]
    inner: S,
    timeout_duration: Duration,
    #[pin]
    deadline: Sleep,
    expired: bool,
}

impl<S> TimeoutStream<S> {
    pub fn new(inner: S, timeout_duration: Duration) -> Self {
        Self {
            inner,
            timeout_duration,
            deadline: tokio::time::sleep(timeout_duration),
            expired: false,
        }
    }

    pub fn with_default_timeout(inner: S) -> Self {
        Self::new(inner, DEFAULT_IDLE_TIMEOUT)
    }
}

impl<S, T> Stream for TimeoutStream<S>
where
    S: Stream<Item = Result<T, DataError>>,
{
    type Item = Result<T, DataError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();
        if *this.expired {
            return Poll::Ready(None);
        }

        match this.inner.poll_next(cx) {
            Poll::Ready(Some(item)) => {
                this.deadline.reset(Instant::now() + *this.timeout_duration);
                Poll::Ready(Some(item))
            }
            Poll::Ready(None) => Poll::Ready(None),
            Poll::Pending => match this.deadline.poll(cx) {
                Poll::Ready(()) => {
                    tracing::warn!(
                        timeout_secs = this.timeout_duration.as_secs(),
                        "push stream idle timeout - no data received"
                    );
                    *this.expired = true;
                    Poll::Ready(Some(Err(DataError::Timeout(
                        this.timeout_duration.as_secs(),
                    ))))
                }
                Poll::Pending => Poll::Pending,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test(start_paused = true)]
    async fn test_timeout_after_silence() {
        let inner = futures::stream::pending::<Result<u8, DataError>>();
        let mut stream = Box::pin(TimeoutStream::new(inner, Duration::from_secs(45)));

        assert_eq!(stream.next().await, Some(Err(DataError::Timeout(45))));
        assert_eq!(stream.next().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_items_pass_through() {
        let inner = futures::stream::iter(vec![Ok::<u8, DataError>(1), Ok(2)]);
        let stream = TimeoutStream::with_default_timeout(inner);

        let items: Vec<_> = stream.collect().await;
        assert_eq!(items, vec![Ok(1), Ok(2)]);
    }
}
