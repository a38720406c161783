//! Generation progress polling.

use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::stream::{self, Stream};
use tokio::time::{Interval, MissedTickBehavior};

use crate::client::ChatClient;
use crate::model::ProgressReport;
use crate::stream::SessionHandle;

/// Interval-driven stream of progress snapshots.
///
/// Ticks on a fixed period and fetches the backend's progress report. A
/// failed tick is skipped silently (visible at `tracing::debug!` level) and
/// polling continues. Stops when cancelled through its handle or dropped.
pub struct ProgressPoller {
    inner: Pin<Box<dyn Stream<Item = ProgressReport> + Send>>,
    handle: SessionHandle,
}

impl ProgressPoller {
    pub(crate) fn new(client: ChatClient, period: Duration) -> Self {
        let (handle, cancel) = SessionHandle::new();
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let state = PollState {
            client,
            interval,
            cancel,
            _keepalive: handle.clone(),
        };
        let inner = stream::unfold(state, |mut state| async move {
            let report = state.advance().await?;
            Some((report, state))
        });

        Self {
            inner: Box::pin(inner),
            handle,
        }
    }

    /// A handle for stopping this poller.
    pub fn handle(&self) -> SessionHandle {
        self.handle.clone()
    }
}

impl Stream for ProgressPoller {
    type Item = ProgressReport;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

struct PollState {
    client: ChatClient,
    interval: Interval,
    cancel: tokio::sync::watch::Receiver<bool>,
    _keepalive: SessionHandle,
}

impl PollState {
    async fn advance(&mut self) -> Option<ProgressReport> {
        loop {
            if *self.cancel.borrow() {
                return None;
            }
            tokio::select! {
                biased;
                _ = self.cancel.wait_for(|cancelled| *cancelled) => return None,
                _ = self.interval.tick() => {}
            }

            let PollState { client, cancel, .. } = self;
            tokio::select! {
                biased;
                _ = cancel.wait_for(|cancelled| *cancelled) => return None,
                result = client.progress() => match result {
                    Ok(report) => return Some(report),
                    Err(error) => {
                        tracing::debug!(%error, "progress tick failed, skipping");
                    }
                },
            }
        }
    }
}
