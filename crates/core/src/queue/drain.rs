use steadfast_domain::{ApiError, ApiErrorCategory, FlushReport};
use tracing::{debug, info, instrument, warn};

use super::ports::{OfflineQueue, QueueReplayer};

/// Replay queued items in drain order
///
/// - success removes the item
/// - a terminal failure (client error) drops the item
/// - a transient failure charges the item's own retry budget and stops the
///   drain, since connectivity is likely gone again; an exhausted item is
///   dropped
/// - going offline again or losing the session stops the drain without
///   charging the item
#[instrument(skip_all)]
pub async fn drain_queue<Q, R>(queue: &Q, replayer: &R) -> Result<FlushReport, ApiError>
where
    Q: OfflineQueue + ?Sized,
    R: QueueReplayer + ?Sized,
{
    let mut report = FlushReport::default();

    for item in queue.pending().await? {
        if !item.can_retry() {
            warn!(id = %item.id, retries = item.retry_count, "dropping exhausted queue item");
            queue.remove(&item.id).await?;
            report.dropped += 1;
            continue;
        }

        match replayer.replay(&item).await {
            Ok(response) => {
                debug!(id = %item.id, status = response.status, "replayed queue item");
                queue.remove(&item.id).await?;
                report.replayed += 1;
            }
            Err(error) => match error.category() {
                ApiErrorCategory::Offline | ApiErrorCategory::AuthFailed => {
                    info!(id = %item.id, error = %error, "pausing queue drain");
                    report.stopped_early = true;
                    break;
                }
                _ if error.is_transient() => {
                    report.stopped_early = true;
                    match queue.record_failure(&item.id).await? {
                        Some(updated) if !updated.can_retry() => {
                            warn!(
                                id = %item.id,
                                error = %error,
                                "queue item exhausted its retries"
                            );
                            queue.remove(&item.id).await?;
                            report.dropped += 1;
                        }
                        _ => {
                            warn!(id = %item.id, error = %error, "replay failed, will retry later");
                        }
                    }
                    break;
                }
                _ => {
                    warn!(id = %item.id, error = %error, "dropping rejected queue item");
                    queue.remove(&item.id).await?;
                    report.dropped += 1;
                }
            },
        }
    }

    report.remaining = queue.len().await?;
    info!(
        replayed = report.replayed,
        dropped = report.dropped,
        remaining = report.remaining,
        stopped_early = report.stopped_early,
        "offline queue drained"
    );
    Ok(report)
}
