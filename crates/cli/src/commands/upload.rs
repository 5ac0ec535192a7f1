use std::collections::HashMap;
use std::path::PathBuf;

use clap::Args;
use divemedia_ops::OpsClient;
use divemedia_ops::divemedia_client::{ProgressUpdate, UploadProgress, UploadReport, UploadState};
use divemedia_core::format_size;
use tokio::sync::{mpsc, oneshot};

use crate::OutputFormat;

#[derive(Args, Debug)]
pub struct UploadArgs {
    /// Destination dive ID.
    pub dive: String,
    /// Photos and videos to upload.
    #[arg(required = true)]
    pub files: Vec<PathBuf>,
    /// Keep polling until the uploaded media finished processing.
    #[arg(long)]
    pub watch: bool,
}

pub async fn run(ops: &OpsClient, args: &UploadArgs, format: &OutputFormat) -> anyhow::Result<()> {
    let (tx, rx) = mpsc::unbounded_channel();
    let mut queue = ops
        .queue_paths(&args.files, UploadProgress::new().with_listener(tx))
        .await?;

    let names: HashMap<String, String> = queue
        .files()
        .map(|f| (f.id.clone(), f.name.clone()))
        .collect();
    let total: u64 = queue.files().map(|f| f.size_bytes).sum();
    if matches!(format, OutputFormat::Text) {
        eprintln!("Uploading {} files ({})", queue.len(), format_size(total));
    }
    let (done_tx, done_rx) = oneshot::channel();
    let printer = tokio::spawn(print_progress(rx, done_rx, names));

    let report = ops.upload_queue(&mut queue, &args.dive).await;
    let _ = done_tx.send(());
    let _ = printer.await;
    let report = report?;

    print_report(&report, format)?;
    if args.watch && report.registered().next().is_some() {
        super::watch::follow(ops, &args.dive, format).await?;
    }
    report.into_result()?;
    Ok(())
}

/// Print one line per file each time it crosses another 25 percent. Runs
/// until `done` fires, then prints whatever is still buffered.
async fn print_progress(
    mut rx: mpsc::UnboundedReceiver<ProgressUpdate>,
    mut done: oneshot::Receiver<()>,
    names: HashMap<String, String>,
) {
    let mut printed: HashMap<String, u8> = HashMap::new();
    let mut show = |update: ProgressUpdate| {
        let step = update.percent / 25;
        let last = printed.entry(update.file_id.clone()).or_insert(0);
        if step > *last {
            *last = step;
            let name = names.get(&update.file_id).map_or("?", String::as_str);
            eprintln!("  {name}: {}%", update.percent);
        }
    };
    loop {
        tokio::select! {
            biased;
            Some(update) = rx.recv() => show(update),
            _ = &mut done => break,
        }
    }
    while let Ok(update) = rx.try_recv() {
        show(update);
    }
}

fn print_report(report: &UploadReport, format: &OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => {
            let items: Vec<serde_json::Value> = report
                .outcomes
                .iter()
                .map(|o| {
                    serde_json::json!({
                        "id": o.file_id,
                        "name": o.name,
                        "result": o.state,
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&items)?);
        }
        OutputFormat::Text => {
            for o in &report.outcomes {
                match &o.state {
                    UploadState::Registered { .. } => println!("  {} uploaded", o.name),
                    UploadState::Failed { stage, message, .. } => {
                        println!("  {} FAILED at {stage}: {message}", o.name);
                    }
                    UploadState::Pending => println!("  {} not attempted", o.name),
                }
            }
            println!(
                "{} of {} files uploaded.",
                report.registered().count(),
                report.outcomes.len()
            );
        }
    }
    Ok(())
}
