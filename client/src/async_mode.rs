//! Asynchronous delivery strategy
//!
//! Events enter a bounded MPMC channel (a full channel blocks the
//! producer; that is the backpressure). Flush workers accumulate them
//! into batches and hand each batch to an independent retry task:
//!
//! ```text
//! send ──► channel ──► worker (size/linger flush) ──► retry task ──► RPC
//! ```
//!
//! A batch is retried whole on transport errors, and shrunk to the failed
//! subset when the gateway answers with failure indexes. After
//! `max_retries` attempts the remaining events are dropped and counted.
//!
//! Pending accounting: one unit per accepted event while it sits in the
//! channel, folded into one unit per forming batch once a worker picks it
//! up, released on the batch's terminal outcome. `graceful_stop` waits
//! for the counter to reach zero, so nothing accepted is lost.

use crate::config::Config;
use crate::error::ClientError;
use crate::metrics::{Metrics, STATUS_FAILED, STATUS_OK};
use crate::pending::Pending;
use crate::strategy::SendStrategy;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::MissedTickBehavior;
use tonic::transport::Channel;
use tracing::{debug, error, info, warn};
use ulid::Ulid;
use virta_core::proto::events_forwarder_client::EventsForwarderClient;
use virta_core::{routes, Event, SendEventsRequest, SendEventsResponse};

pub(crate) struct AsyncSender {
    client: EventsForwarderClient<Channel>,
    /// Taken on graceful_stop; a closed channel is how workers learn to
    /// drain and exit.
    ingress: Mutex<Option<flume::Sender<Event>>>,
    pending: Pending,
    stopped: AtomicBool,
    batch_size: usize,
    linger_interval: Duration,
    max_retries: u32,
    retry_interval: Duration,
    timeout: Duration,
    metrics: &'static Metrics,
}

impl AsyncSender {
    pub(crate) fn new(
        config: &Config,
        channel: Channel,
        metrics: &'static Metrics,
    ) -> Arc<Self> {
        let (tx, rx) = flume::bounded(config.channel_buffer);

        let sender = Arc::new(Self {
            client: EventsForwarderClient::new(channel),
            ingress: Mutex::new(Some(tx)),
            pending: Pending::new(),
            stopped: AtomicBool::new(false),
            batch_size: config.batch_size,
            linger_interval: config.linger_interval,
            max_retries: config.max_retries,
            retry_interval: config.retry_interval,
            timeout: config.timeout,
            metrics,
        });

        debug!(
            batch_size = config.batch_size,
            linger_interval_ms = config.linger_interval.as_millis() as u64,
            channel_buffer = config.channel_buffer,
            num_routines = config.num_routines,
            "starting async flush workers"
        );

        for _ in 0..config.num_routines {
            let worker = Arc::clone(&sender);
            let rx = rx.clone();
            tokio::spawn(worker.run_worker(rx));
        }

        sender
    }

    async fn run_worker(self: Arc<Self>, rx: flume::Receiver<Event>) {
        let mut ticker = tokio::time::interval(self.linger_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut batch: Vec<Event> = Vec::with_capacity(self.batch_size);
        loop {
            tokio::select! {
                received = rx.recv_async() => match received {
                    Ok(event) => {
                        if batch.is_empty() {
                            // the forming batch takes over the pending
                            // unit held by the buffered event
                            self.pending.add(1);
                        }
                        self.pending.done();
                        batch.push(event);
                        if batch.len() >= self.batch_size {
                            Self::flush(&self, &mut batch);
                        }
                    }
                    Err(_closed) => {
                        if !batch.is_empty() {
                            Self::flush(&self, &mut batch);
                        }
                        return;
                    }
                },
                _ = ticker.tick() => {
                    if !batch.is_empty() {
                        Self::flush(&self, &mut batch);
                    }
                }
            }
        }
    }

    /// Hand the accumulator off to an independent retry task and start a
    /// fresh one. The worker never blocks on the RPC.
    fn flush(this: &Arc<Self>, batch: &mut Vec<Event>) {
        let events = std::mem::replace(batch, Vec::with_capacity(this.batch_size));
        let request = SendEventsRequest {
            id: Ulid::new().to_string(),
            events,
            retry: 0,
        };
        let task = Arc::clone(this);
        tokio::spawn(async move { task.send_events(request).await });
    }

    /// Retry loop for one batch. The batch id stays the same across
    /// attempts so downstream consumers can fold duplicates.
    async fn send_events(self: Arc<Self>, mut request: SendEventsRequest) {
        let mut retry_count: u32 = 0;
        loop {
            debug!(
                request_id = %request.id,
                retry_count,
                size = request.events.len(),
                "sending events"
            );

            if retry_count > self.max_retries {
                info!(request_id = %request.id, "dropped events due to max retries");
                self.drop_batch(&request);
                return;
            }

            request.retry = retry_count as i64;
            match self.call(&request).await {
                Err(err) => {
                    error!(request_id = %request.id, error = %err, "failed to send events");
                    self.backoff(retry_count).await;
                    retry_count += 1;
                }
                Ok(response) if response.failure_indexes.is_empty() => {
                    self.pending.done();
                    return;
                }
                Ok(response) => {
                    error!(
                        request_id = %request.id,
                        failure_indexes = ?response.failure_indexes,
                        "failed to send events"
                    );
                    if !failure_indexes_valid(&response.failure_indexes, request.events.len()) {
                        warn!(
                            request_id = %request.id,
                            failure_indexes = ?response.failure_indexes,
                            "malformed failure indexes in reply, dropping batch"
                        );
                        self.drop_batch(&request);
                        return;
                    }
                    self.backoff(retry_count).await;
                    request.events = retain_indexes(
                        std::mem::take(&mut request.events),
                        &response.failure_indexes,
                    );
                    retry_count += 1;
                }
            }
        }
    }

    /// One RPC attempt, with per-event accounting.
    async fn call(&self, request: &SendEventsRequest) -> Result<SendEventsResponse, ClientError> {
        let start = Instant::now();
        let retry_label = request.retry.to_string();

        let mut client = self.client.clone();
        let mut rpc = tonic::Request::new(request.clone());
        rpc.set_timeout(self.timeout);

        let outcome = match tokio::time::timeout(self.timeout, client.send_events(rpc)).await {
            Ok(Ok(response)) => Ok(response.into_inner()),
            Ok(Err(status)) => Err(ClientError::Rpc(status)),
            // normalize the local deadline into the error path, like any
            // other transport fault
            Err(_elapsed) => Err(ClientError::DeadlineExceeded),
        };

        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
        match &outcome {
            Ok(response) => {
                let mut cursor = 0usize;
                for (index, event) in request.events.iter().enumerate() {
                    self.metrics
                        .response_time
                        .with_label_values(&[
                            routes::SEND_EVENTS,
                            &event.topic,
                            &retry_label,
                            STATUS_OK,
                        ])
                        .observe(elapsed_ms);

                    let failed = response.failure_indexes.get(cursor).copied()
                        == Some(index as i64);
                    let status = if failed {
                        cursor += 1;
                        STATUS_FAILED
                    } else {
                        STATUS_OK
                    };
                    self.metrics
                        .events
                        .with_label_values(&[
                            routes::SEND_EVENTS,
                            &event.topic,
                            &retry_label,
                            status,
                        ])
                        .inc();
                }
            }
            Err(_err) => {
                for event in &request.events {
                    self.metrics
                        .response_time
                        .with_label_values(&[
                            routes::SEND_EVENTS,
                            &event.topic,
                            &retry_label,
                            STATUS_FAILED,
                        ])
                        .observe(elapsed_ms);
                    self.metrics
                        .events
                        .with_label_values(&[
                            routes::SEND_EVENTS,
                            &event.topic,
                            &retry_label,
                            STATUS_FAILED,
                        ])
                        .inc();
                }
            }
        }
        outcome
    }

    fn drop_batch(&self, request: &SendEventsRequest) {
        for event in &request.events {
            self.metrics
                .async_dropped
                .with_label_values(&[&event.topic])
                .inc();
        }
        self.pending.done();
    }

    async fn backoff(&self, retry_count: u32) {
        let factor = 2u32.saturating_pow(retry_count);
        tokio::time::sleep(self.retry_interval.saturating_mul(factor)).await;
    }
}

#[async_trait]
impl SendStrategy for AsyncSender {
    async fn send(&self, event: Event) -> Result<(), ClientError> {
        if self.stopped.load(Ordering::Acquire) {
            return Err(ClientError::Stopped);
        }
        let tx = {
            let guard = self.ingress.lock();
            match guard.as_ref() {
                Some(tx) => tx.clone(),
                None => return Err(ClientError::Stopped),
            }
        };

        let topic = event.topic.clone();
        self.pending.add(1);
        if tx.send_async(event).await.is_err() {
            self.pending.done();
            return Err(ClientError::Stopped);
        }
        self.metrics
            .async_channel_depth
            .with_label_values(&[&topic])
            .set(tx.len() as i64);
        Ok(())
    }

    async fn graceful_stop(&self) -> Result<(), ClientError> {
        self.stopped.store(true, Ordering::Release);
        self.pending.wait().await;
        // closing the ingress lets the workers drain and exit
        self.ingress.lock().take();
        Ok(())
    }
}

/// A well-formed reply lists failed positions strictly ascending, each
/// inside the batch that was sent.
fn failure_indexes_valid(indexes: &[i64], batch_len: usize) -> bool {
    let mut previous: i64 = -1;
    for &index in indexes {
        if index <= previous || index >= batch_len as i64 {
            return false;
        }
        previous = index;
    }
    true
}

/// Keep only the events at the given (ascending) positions, preserving
/// their relative order.
fn retain_indexes(events: Vec<Event>, indexes: &[i64]) -> Vec<Event> {
    let mut wanted = indexes.iter().copied().peekable();
    events
        .into_iter()
        .enumerate()
        .filter(|(index, _)| {
            if wanted.peek() == Some(&(*index as i64)) {
                wanted.next();
                true
            } else {
                false
            }
        })
        .map(|(_, event)| event)
        .collect()
}
