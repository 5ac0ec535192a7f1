use clap::Args;
use divemedia_ops::OpsClient;
use divemedia_ops::divemedia_client::PollOutcome;

use crate::OutputFormat;

#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Dive ID.
    pub dive: String,
}

pub async fn run(ops: &OpsClient, args: &WatchArgs, format: &OutputFormat) -> anyhow::Result<()> {
    follow(ops, &args.dive, format).await
}

/// Poll `dive_id` until nothing is processing, printing each change in the
/// number of processing items. Ctrl-C stops polling.
pub(crate) async fn follow(ops: &OpsClient, dive_id: &str, format: &OutputFormat) -> anyhow::Result<()> {
    let handle = ops.watch_processing(dive_id);
    let mut snapshots = handle.snapshots();

    let progress = async {
        let mut last = None;
        while snapshots.changed().await.is_ok() {
            let processing = snapshots
                .borrow_and_update()
                .as_ref()
                .map(|d| (d.processing_count(), d.media_items.len()));
            if let Some((processing, total)) = processing {
                if last != Some(processing) && processing > 0 {
                    eprintln!("{processing} of {total} items still processing...");
                }
                last = Some(processing);
            }
        }
    };

    tokio::select! {
        () = progress => {}
        res = tokio::signal::ctrl_c() => {
            res?;
            handle.stop();
        }
    }

    match handle.join().await {
        PollOutcome::Settled(dive) => {
            match format {
                OutputFormat::Json => super::dives::print_dive(&dive, format)?,
                OutputFormat::Text => {
                    println!("All {} items of '{}' are ready.", dive.media_items.len(), dive.name);
                }
            }
            Ok(())
        }
        PollOutcome::Failed(e) => Err(anyhow::Error::new(e).context("stopped watching dive")),
        PollOutcome::Cancelled => {
            println!("Stopped watching dive {dive_id}.");
            Ok(())
        }
    }
}
