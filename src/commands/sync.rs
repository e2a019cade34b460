//! Push to and pull from the cloud mirror.

use crate::commands::Out;
use crate::error::Result;
use crate::mirror::{Mirror, MirrorStatus, Mode};
use crate::model::{Record, Summary};
use crate::{reconcile, Config};
use serde::Serialize;
use tracing::info;

/// Makes the cloud sheet match the local dataset. A mirror failure is reported in the returned
/// status, not as an error.
pub async fn sync_up(config: &Config, mode: Mode) -> Result<Out<MirrorStatus>> {
    let dataset = config.store().read().await?;
    let status = Mirror::new(config, mode).push(&dataset).await;
    Ok(Out::new(status.message().to_string(), status))
}

/// The result of `sync_down`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncDown {
    #[serde(flatten)]
    pub status: MirrorStatus,
    /// Whether the pulled records replaced the local ones.
    pub applied: bool,
    pub records: Vec<Record>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<Summary>,
}

/// Reads the income and expense tabs of the cloud sheet. With `apply` each kind found in the sheet
/// replaces the local transactions of that kind; otherwise the local dataset is untouched.
///
/// A pulled record whose ID is held locally by a record of a kind the sheet has no tab for gets a
/// fresh ID, so applying never drops local records of that kind.
pub async fn sync_down(config: &Config, mode: Mode, apply: bool) -> Result<Out<SyncDown>> {
    let (status, pull) = Mirror::new(config, mode).pull().await;
    let Some(pull) = pull else {
        let message = status.message().to_string();
        let out = SyncDown {
            status,
            applied: false,
            records: Vec::new(),
            summary: None,
        };
        return Ok(Out::new(message, out));
    };

    if !apply {
        let out = SyncDown {
            summary: Some(pull.dataset().summary().clone()),
            status,
            applied: false,
            records: pull.dataset().all_records().cloned().collect(),
        };
        return Ok(Out::new(
            format!("{}, the local data was not changed", out.status.message()),
            out,
        ));
    }

    let mut batch = pull.batch();
    let ((summary, records), _) = config
        .store()
        .update(|dataset, now| {
            let renumbered = batch.renumber_against(dataset);
            if renumbered > 0 {
                info!("Gave {renumbered} pulled records fresh IDs");
            }
            let records: Vec<Record> = batch.records().cloned().collect();
            reconcile::reconcile(dataset, batch, now);
            Ok((dataset.summary().clone(), records))
        })
        .await?;
    let out = SyncDown {
        status,
        applied: true,
        records,
        summary: Some(summary),
    };
    Ok(Out::new(
        format!("{}, and replaced the local data", out.status.message()),
        out,
    ))
}
