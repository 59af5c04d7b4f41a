//! Bounded work queue and the single consumer driving update passes.
//!
//! Notifications are offered without blocking: a full queue and an exhausted
//! retry count are both reported to the caller. Retries are short-lived
//! timer tasks that re-enqueue with an incremented count.

use crate::error::{Result, SkilletError};
use crate::index::controller::IndexController;
use crate::types::{UpdateNotif, CONTENT_DOC_TYPE, FILES_DOC_TYPE};
use std::sync::Weak;
use std::time::Duration;
use tokio::sync::mpsc;

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub queue_size: usize,
    pub retry_delay: Duration,
    pub retry_count_max: u32,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        WorkerConfig {
            queue_size: 100,
            retry_delay: Duration::from_secs(600),
            retry_count_max: 5,
        }
    }
}

#[derive(Clone)]
pub struct UpdateQueue {
    tx: mpsc::Sender<UpdateNotif>,
    retry_delay: Duration,
    retry_count_max: u32,
}

impl UpdateQueue {
    /// Non-blocking offer. Rejects notifications past the retry cap and
    /// enqueues when the channel is full.
    pub fn push(&self, notif: UpdateNotif) -> Result<()> {
        if notif.retry_count > self.retry_count_max {
            return Err(SkilletError::RetryExhausted {
                doc_type: notif.doc_type,
                count: notif.retry_count,
                max: self.retry_count_max,
            });
        }
        self.tx.try_send(notif).map_err(|_| SkilletError::QueueFull)
    }

    fn schedule_retry(&self, mut notif: UpdateNotif) {
        let queue = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(queue.retry_delay).await;
            notif.retry_count += 1;
            if let Err(e) = queue.push(notif) {
                tracing::warn!("could not re-enqueue update notification: {}", e);
            }
        });
    }
}

/// Start the consumer task and hand back the queue. Must run inside a tokio
/// runtime; the worker exits once the controller is dropped.
pub(crate) fn start(controller: Weak<IndexController>, config: WorkerConfig) -> UpdateQueue {
    let (tx, rx) = mpsc::channel(config.queue_size);
    let queue = UpdateQueue {
        tx,
        retry_delay: config.retry_delay,
        retry_count_max: config.retry_count_max,
    };

    tokio::spawn(run_worker(rx, controller, queue.clone()));

    queue
}

async fn run_worker(
    mut rx: mpsc::Receiver<UpdateNotif>,
    controller: Weak<IndexController>,
    queue: UpdateQueue,
) {
    while let Some(notif) = rx.recv().await {
        let Some(controller) = controller.upgrade() else {
            break;
        };

        if let Err(e) = controller
            .update_index(&notif.instance, &notif.doc_type)
            .await
        {
            tracing::error!(
                "error on update for instance {} docType {}: {}",
                notif.instance,
                notif.doc_type,
                e
            );
            queue.schedule_retry(notif);
            continue;
        }

        // The pass succeeded; ship the fresh shards to the read side. For
        // the files docType the paired content shards go too.
        if let Err(e) = controller
            .send_index_to_query(&notif.instance, &notif.doc_type)
            .await
        {
            tracing::error!("error on send to query side: {}", e);
            queue.schedule_retry(notif.clone());
        }
        if notif.doc_type == FILES_DOC_TYPE {
            if let Err(e) = controller
                .send_index_to_query(&notif.instance, CONTENT_DOC_TYPE)
                .await
            {
                tracing::error!("error on send to query side: {}", e);
                queue.schedule_retry(notif);
            }
        }
    }
}
