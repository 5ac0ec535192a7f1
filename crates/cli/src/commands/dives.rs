use clap::{Args, Subcommand};
use divemedia_ops::OpsClient;
use divemedia_ops::divemedia_client::DeleteDiveOptions;
use divemedia_core::{Dive, NewDive};

use crate::OutputFormat;

#[derive(Args, Debug)]
pub struct DivesArgs {
    #[command(subcommand)]
    pub command: DivesCommand,
}

#[derive(Subcommand, Debug)]
pub enum DivesCommand {
    /// List your dives.
    List,
    /// Show a dive and its media.
    Get {
        /// Dive ID.
        id: String,
    },
    /// Create a dive.
    Create {
        /// Dive name.
        name: String,
        /// Dive site.
        #[arg(long)]
        location: Option<String>,
        /// Dive date (YYYY-MM-DD).
        #[arg(long)]
        date: Option<String>,
    },
    /// Rename a dive.
    Rename {
        /// Dive ID.
        id: String,
        /// New name.
        name: String,
    },
    /// Delete a dive.
    Delete {
        /// Dive ID.
        id: String,
        /// Delete the dive's media too instead of leaving it unassigned.
        #[arg(long)]
        delete_media: bool,
    },
}

pub async fn run(ops: &OpsClient, args: &DivesArgs, format: &OutputFormat) -> anyhow::Result<()> {
    let client = ops.client();
    match &args.command {
        DivesCommand::List => {
            let dives = client.list_dives().await?;
            match format {
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&dives)?);
                }
                OutputFormat::Text => {
                    println!("{} dives:", dives.len());
                    for d in &dives {
                        println!(
                            "  {id} | {name} | {location} | {date} | {items} items ({processing} processing)",
                            id = d.id,
                            name = d.name,
                            location = d.location.as_deref().unwrap_or("-"),
                            date = d.date.as_deref().unwrap_or("-"),
                            items = d.media_items.len(),
                            processing = d.processing_count(),
                        );
                    }
                }
            }
            Ok(())
        }
        DivesCommand::Get { id } => {
            let dive = client.get_dive(id).await?;
            print_dive(&dive, format)
        }
        DivesCommand::Create {
            name,
            location,
            date,
        } => {
            let mut new = NewDive::new(name);
            if let Some(location) = location {
                new = new.location(location);
            }
            if let Some(date) = date {
                new = new.date(date);
            }
            let dive = client.create_dive(&new).await?;
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&dive)?),
                OutputFormat::Text => println!("Dive '{}' created with ID {}.", dive.name, dive.id),
            }
            Ok(())
        }
        DivesCommand::Rename { id, name } => {
            let dive = client.rename_dive(id, name).await?;
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&dive)?),
                OutputFormat::Text => println!("Dive {id} renamed to '{}'.", dive.name),
            }
            Ok(())
        }
        DivesCommand::Delete { id, delete_media } => {
            client
                .delete_dive(
                    id,
                    DeleteDiveOptions {
                        delete_media: *delete_media,
                    },
                )
                .await?;
            if *delete_media {
                println!("Dive {id} and its media deleted.");
            } else {
                println!("Dive {id} deleted; its media is now unassigned.");
            }
            Ok(())
        }
    }
}

pub(crate) fn print_dive(dive: &Dive, format: &OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(dive)?);
        }
        OutputFormat::Text => {
            println!("ID:       {}", dive.id);
            println!("Name:     {}", dive.name);
            if let Some(location) = &dive.location {
                println!("Location: {location}");
            }
            if let Some(date) = &dive.date {
                println!("Date:     {date}");
            }
            println!("Media:    {} items", dive.media_items.len());
            for m in &dive.media_items {
                let fav = if m.is_favorite { "*" } else { " " };
                println!(
                    "  [{fav}] {id} | {name} | {mime} | {state}",
                    id = m.id,
                    name = m.filename,
                    mime = m.mime_type,
                    state = m.state,
                );
            }
        }
    }
    Ok(())
}
