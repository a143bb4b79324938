//! The transaction submitter: sign, submit, fold progress into the queue.

use std::sync::Arc;

use log::{error, info, warn};
use snafu::ResultExt;
use subxt::tx::{Payload, TxInBlock, TxProgress, TxStatus as ChainTxStatus};
use subxt::PolkadotConfig;
use subxt_signer::sr25519::Keypair;
use tokio::sync::Mutex;
use tokio::time::{sleep, Duration};
use tx_queue::model::{TxResult, TxStatus};
use tx_queue::queue::TxQueue;

use crate::client::Api;
use crate::error::{Error, FetchEventsSnafu, Result, SubmissionSnafu};
use crate::events::event_record;

/// Submission attempts before giving up on a transient failure.
const MAX_RETRIES: usize = 3;

/// Signs and submits payloads, reporting lifecycle progress into a
/// [`TxQueue`].
///
/// One submitter serves one signing account. The queue entry is created
/// before anything touches the wire, so observers see the submission from
/// `queued` onwards even when it never leaves this process.
#[derive(Clone)]
pub struct TxSubmitter {
    /// Shared chain client.
    client: Arc<Mutex<Api>>,
    /// The keypair used to sign transactions.
    signer: Keypair,
    /// Queue receiving lifecycle updates.
    queue: TxQueue,
}

impl TxSubmitter {
    /// Submitter signing with `signer` and reporting into `queue`.
    pub fn new(client: Api, signer: Keypair, queue: TxQueue) -> Self {
        Self {
            client: Arc::new(Mutex::new(client)),
            signer,
            queue,
        }
    }

    /// The queue this submitter reports into.
    pub fn queue(&self) -> &TxQueue {
        &self.queue
    }

    /// Submits `call` and tracks it until its progress stream ends.
    ///
    /// Every progress event is folded into the queue, so a queue observer
    /// sees the same lifecycle the node reports. Returns the queue id of the
    /// tracked entry. A submission failure is returned as an error *and*
    /// recorded on the entry; the queue keeps showing it until removal.
    pub async fn submit<Call: Payload>(&self, call: &Call) -> Result<u64> {
        let account = self.signer.public_key().to_account_id().to_string();
        let id = self.queue.enqueue_extrinsic(Some(account), None).await;
        self.queue
            .update_tx_status(id, TxStatus::Sending, None, None)
            .await;

        let mut progress = match self.sign_and_submit(call).await {
            Ok(progress) => progress,
            Err(err) => {
                self.queue
                    .update_tx_status(id, TxStatus::Error, None, Some(err.to_string()))
                    .await;
                return Err(err);
            }
        };

        info!(
            "submitted transaction #{id} as {:#x}",
            progress.extrinsic_hash()
        );

        while let Some(event) = progress.next().await {
            match event {
                Ok(status) => {
                    if self.apply(id, status).await? {
                        break;
                    }
                }
                Err(err) => {
                    error!("lost track of transaction #{id}: {err}");
                    self.queue
                        .update_tx_status(id, TxStatus::Error, None, Some(err.to_string()))
                        .await;
                    return Err(Error::Submission { source: err });
                }
            }
        }

        Ok(id)
    }

    /// Signs and submits with bounded retry on transient transport failures.
    async fn sign_and_submit<Call: Payload>(
        &self,
        call: &Call,
    ) -> Result<TxProgress<PolkadotConfig, Api>> {
        for attempt in 0..=MAX_RETRIES {
            let client = self.client.lock().await;
            let submitted = client
                .tx()
                .sign_and_submit_then_watch_default(call, &self.signer)
                .await;
            drop(client);

            match submitted {
                Ok(progress) => return Ok(progress),
                Err(err) if attempt < MAX_RETRIES && is_transient(&err.to_string()) => {
                    warn!("submission attempt {} failed: {err}. Retrying...", attempt + 1);
                    sleep(Duration::from_millis(500 * (attempt as u64 + 1))).await;
                }
                Err(err) => return Err(Error::Submission { source: err }),
            }
        }

        Err(Error::Submission {
            source: subxt::Error::Other("exceeded retry limit".into()),
        })
    }

    /// Folds one progress event into the queue. Returns `true` once the
    /// transaction reached a state after which the stream carries nothing of
    /// interest.
    async fn apply(&self, id: u64, status: ChainTxStatus<PolkadotConfig, Api>) -> Result<bool> {
        match status {
            ChainTxStatus::Validated => {
                self.queue
                    .update_tx_status(id, TxStatus::Sent, None, None)
                    .await;
                Ok(false)
            }
            ChainTxStatus::Broadcasted { num_peers } => {
                info!("transaction #{id} broadcast to {num_peers} peers");
                self.queue
                    .update_tx_status(id, TxStatus::Broadcast, None, None)
                    .await;
                Ok(false)
            }
            ChainTxStatus::NoLongerInBestBlock => {
                warn!("transaction #{id} is no longer in the best block");
                self.queue
                    .update_tx_status(id, TxStatus::Retracted, None, None)
                    .await;
                Ok(false)
            }
            ChainTxStatus::InBestBlock(details) => {
                let result = self.collect_result(&details).await?;
                self.queue
                    .update_tx_status(id, TxStatus::InBlock, Some(result), None)
                    .await;
                Ok(false)
            }
            ChainTxStatus::InFinalizedBlock(details) => {
                info!(
                    "transaction #{id} finalized in block {:#x}",
                    details.block_hash()
                );
                let result = self.collect_result(&details).await?;
                self.queue
                    .update_tx_status(id, TxStatus::Finalized, Some(result), None)
                    .await;
                Ok(true)
            }
            ChainTxStatus::Error { message } => {
                error!("transaction #{id} errored: {message}");
                self.queue
                    .update_tx_status(id, TxStatus::Error, None, Some(message))
                    .await;
                Ok(true)
            }
            ChainTxStatus::Dropped { message } => {
                error!("transaction #{id} dropped: {message}");
                self.queue
                    .update_tx_status(id, TxStatus::Dropped, None, Some(message))
                    .await;
                Ok(true)
            }
            ChainTxStatus::Invalid { message } => {
                error!("transaction #{id} invalid: {message}");
                self.queue
                    .update_tx_status(id, TxStatus::Invalid, None, Some(message))
                    .await;
                Ok(true)
            }
        }
    }

    /// Fetches the events of an included transaction as a queue result
    /// payload.
    async fn collect_result(&self, details: &TxInBlock<PolkadotConfig, Api>) -> Result<TxResult> {
        let events = details.fetch_events().await.context(FetchEventsSnafu)?;

        let records = events
            .iter()
            .filter_map(|event| event.ok())
            .map(|event| event_record(&event))
            .collect();

        Ok(TxResult {
            block_hash: Some(format!("{:#x}", details.block_hash())),
            events: records,
        })
    }
}

/// Whether a submission error is worth retrying.
fn is_transient(err: &str) -> bool {
    err.contains("background task closed")
        || err.contains("connection closed")
        || err.contains("restart required")
        || err.contains("Priority is too low")
        || err.contains("Transaction is outdated")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_drops_and_stale_nonces_are_transient() {
        assert!(is_transient("the background task closed unexpectedly"));
        assert!(is_transient("Priority is too low: (1 vs 1)"));
        assert!(!is_transient("Invalid Transaction: bad signature"));
    }
}
