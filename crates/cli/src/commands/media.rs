use clap::{Args, Subcommand};
use divemedia_ops::OpsClient;
use divemedia_ops::divemedia_client::BatchItemResult;

use crate::OutputFormat;

#[derive(Args, Debug)]
pub struct MediaArgs {
    #[command(subcommand)]
    pub command: MediaCommand,
}

#[derive(Subcommand, Debug)]
pub enum MediaCommand {
    /// Delete media items.
    Delete {
        /// Media item IDs.
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Move media items to another dive.
    Move {
        /// Media item IDs.
        #[arg(required = true)]
        ids: Vec<String>,
        /// Destination dive ID.
        #[arg(long)]
        to: String,
    },
    /// Toggle the favorite flag of a media item.
    Favorite {
        /// Media item ID.
        id: String,
    },
}

pub async fn run(ops: &OpsClient, args: &MediaArgs, format: &OutputFormat) -> anyhow::Result<()> {
    let client = ops.client();
    match &args.command {
        MediaCommand::Delete { ids } => {
            let results = client.delete_media_batch(ids).await;
            report(&results, "deleted", format)
        }
        MediaCommand::Move { ids, to } => {
            let results = client.move_media_batch(ids, to).await;
            report(&results, &format!("moved to dive {to}"), format)
        }
        MediaCommand::Favorite { id } => {
            let favorite = client.toggle_favorite(id).await?;
            match format {
                OutputFormat::Json => {
                    println!("{}", serde_json::json!({ "id": id, "is_favorite": favorite }));
                }
                OutputFormat::Text => {
                    if favorite {
                        println!("Media {id} marked as favorite.");
                    } else {
                        println!("Media {id} is no longer a favorite.");
                    }
                }
            }
            Ok(())
        }
    }
}

fn report(results: &[BatchItemResult], verb: &str, format: &OutputFormat) -> anyhow::Result<()> {
    let failed = results.iter().filter(|r| !r.is_success()).count();
    match format {
        OutputFormat::Json => {
            let items: Vec<serde_json::Value> = results
                .iter()
                .map(|r| match &r.result {
                    Ok(()) => serde_json::json!({ "id": r.media_id, "ok": true }),
                    Err(e) => {
                        serde_json::json!({ "id": r.media_id, "ok": false, "error": e.to_string() })
                    }
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&items)?);
        }
        OutputFormat::Text => {
            for r in results {
                match &r.result {
                    Ok(()) => println!("  {} {verb}", r.media_id),
                    Err(e) => println!("  {} FAILED: {e}", r.media_id),
                }
            }
        }
    }
    if failed > 0 {
        anyhow::bail!("{failed} of {} media items failed", results.len());
    }
    Ok(())
}
