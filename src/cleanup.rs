//! Guaranteed fixture teardown.
//!
//! Runs exactly once after the suite, on every exit path (normal end or
//! operator interrupt).  Teardown is best-effort and idempotent:
//! deleting an already-deleted key is success, and every failure is
//! recorded as a [`CleanupWarning`] rather than escalated -- a leaked
//! fixture is a liveness annoyance, not a correctness bug for the run
//! that just executed.

use tracing::{debug, info, warn};

use crate::errors::ProbeError;
use crate::report::CleanupWarning;
use crate::suite::context::RunContext;

/// Batch size for DeleteObjects, the protocol maximum.
const DELETE_BATCH: usize = 1000;

/// Record one teardown failure as a warning, logged through the
/// taxonomy so it is attributable in the run log.
fn record(warnings: &mut Vec<CleanupWarning>, key: String, message: String) {
    let err = ProbeError::Cleanup {
        key: key.clone(),
        message: message.clone(),
    };
    warn!("{err}");
    warnings.push(CleanupWarning { key, message });
}

/// Tear down everything the run created: abort open multipart uploads,
/// batch-delete registered keys, then sweep the run prefix for strays.
pub async fn run(ctx: &RunContext) -> Vec<CleanupWarning> {
    let mut warnings = Vec::new();

    abort_open_uploads(ctx, &mut warnings).await;
    delete_registered_keys(ctx, &mut warnings).await;
    sweep_prefix(ctx, &mut warnings).await;

    if warnings.is_empty() {
        info!("cleanup complete, no fixtures leaked");
    } else {
        warn!("cleanup finished with {} leaked fixture(s)", warnings.len());
    }

    warnings
}

/// Abort any multipart upload a scenario left open.
async fn abort_open_uploads(ctx: &RunContext, warnings: &mut Vec<CleanupWarning>) {
    for (upload_id, key) in ctx.open_uploads() {
        debug!("aborting leftover upload {} for {}", upload_id, key);
        match ctx
            .client()
            .abort_multipart_upload(ctx.bucket(), &key, &upload_id)
            .await
        {
            Ok(()) => ctx.clear_upload(&upload_id),
            // An upload that already completed or was aborted is gone;
            // that is the state we want.
            Err(e) if e.is_not_found() => ctx.clear_upload(&upload_id),
            Err(e) => record(warnings, key.clone(), format!("abort upload {upload_id}: {e}")),
        }
    }
}

/// Batch-delete every registered key, falling back to per-key deletes
/// when the batch call itself fails.
async fn delete_registered_keys(ctx: &RunContext, warnings: &mut Vec<CleanupWarning>) {
    let keys = ctx.created_keys();
    if keys.is_empty() {
        return;
    }

    debug!("deleting {} registered key(s)", keys.len());
    for batch in keys.chunks(DELETE_BATCH) {
        match ctx.client().delete_objects(ctx.bucket(), batch).await {
            Ok(outcome) => {
                for err in outcome.errors {
                    // Absent keys are already-clean state, not leaks.
                    if matches!(err.code.as_str(), "NoSuchKey" | "NotFound" | "404") {
                        continue;
                    }
                    record(warnings, err.key, format!("{}: {}", err.code, err.message));
                }
            }
            Err(e) => {
                debug!("batch delete failed ({e}), falling back to per-key deletes");
                for key in batch {
                    if let Err(e) = ctx.client().delete_object(ctx.bucket(), key).await {
                        if e.is_not_found() {
                            continue;
                        }
                        record(warnings, key.clone(), e.to_string());
                    }
                }
            }
        }
    }
}

/// List the run prefix and delete anything still there -- keys a
/// scenario created without registering would otherwise outlive the run.
async fn sweep_prefix(ctx: &RunContext, warnings: &mut Vec<CleanupWarning>) {
    let prefix = format!("{}/", ctx.key_prefix());
    let strays = match ctx.client().list_objects(ctx.bucket(), &prefix, 1000).await {
        Ok(entries) => entries,
        Err(e) => {
            record(warnings, prefix, format!("prefix sweep listing failed: {e}"));
            return;
        }
    };

    for entry in strays {
        debug!("sweeping stray object {}", entry.key);
        if let Err(e) = ctx.client().delete_object(ctx.bucket(), &entry.key).await {
            if e.is_not_found() {
                continue;
            }
            record(warnings, entry.key, e.to_string());
        }
    }
}
