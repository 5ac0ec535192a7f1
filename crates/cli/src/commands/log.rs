use clap::{Args, Subcommand};
use divemedia_ops::OpsClient;
use divemedia_core::DiveLog;

use crate::OutputFormat;

#[derive(Args, Debug)]
pub struct LogArgs {
    #[command(subcommand)]
    pub command: LogCommand,
}

#[derive(Subcommand, Debug)]
pub enum LogCommand {
    /// Show the log of a dive.
    Get {
        /// Dive ID.
        dive: String,
    },
    /// Create or update the log of a dive. Unset fields keep their value.
    Set(SetArgs),
}

#[derive(Args, Debug)]
pub struct SetArgs {
    /// Dive ID.
    pub dive: String,
    /// Full log as JSON (string or @file path), applied before the flags.
    #[arg(long)]
    pub data: Option<String>,
    /// Maximum depth in meters.
    #[arg(long)]
    pub max_depth: Option<f64>,
    /// Bottom time in minutes.
    #[arg(long)]
    pub duration: Option<f64>,
    /// Entry time (ISO 8601).
    #[arg(long)]
    pub start_time: Option<String>,
    /// Tank pressure at entry, in bar.
    #[arg(long)]
    pub starting_air: Option<f64>,
    /// Tank pressure at exit, in bar.
    #[arg(long)]
    pub ending_air: Option<f64>,
    /// Visibility in meters.
    #[arg(long)]
    pub visibility: Option<f64>,
    /// Water temperature in degrees Celsius.
    #[arg(long)]
    pub water_temperature: Option<f64>,
    /// Weights in kilograms.
    #[arg(long)]
    pub weights: Option<f64>,
    /// Comma-separated species seen.
    #[arg(long)]
    pub fish: Option<String>,
    /// Free-form notes.
    #[arg(long)]
    pub notes: Option<String>,
}

fn parse_json_data(input: &str) -> anyhow::Result<serde_json::Value> {
    if let Some(path) = input.strip_prefix('@') {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    } else {
        Ok(serde_json::from_str(input)?)
    }
}

pub async fn run(ops: &OpsClient, args: &LogArgs, format: &OutputFormat) -> anyhow::Result<()> {
    match &args.command {
        LogCommand::Get { dive } => match ops.client().get_dive_log(dive).await? {
            Some(log) => print_log(&log, format),
            None => {
                println!("Dive {dive} has no log yet.");
                Ok(())
            }
        },
        LogCommand::Set(set) => run_set(ops, set, format).await,
    }
}

async fn run_set(ops: &OpsClient, args: &SetArgs, format: &OutputFormat) -> anyhow::Result<()> {
    let client = ops.client();
    let mut log: DiveLog = match &args.data {
        Some(data) => serde_json::from_value(parse_json_data(data)?)?,
        None => client.get_dive_log(&args.dive).await?.unwrap_or_default(),
    };
    apply(&mut log, args);
    client.save_dive_log(&args.dive, &log).await?;
    match format {
        OutputFormat::Json => print_log(&log, format),
        OutputFormat::Text => {
            println!("Log for dive {} saved.", args.dive);
            Ok(())
        }
    }
}

fn apply(log: &mut DiveLog, args: &SetArgs) {
    fn set<T: Clone>(field: &mut Option<T>, value: Option<&T>) {
        if let Some(v) = value {
            *field = Some(v.clone());
        }
    }
    set(&mut log.max_depth, args.max_depth.as_ref());
    set(&mut log.dive_duration, args.duration.as_ref());
    set(&mut log.dive_start_time, args.start_time.as_ref());
    set(&mut log.starting_air, args.starting_air.as_ref());
    set(&mut log.ending_air, args.ending_air.as_ref());
    set(&mut log.visibility, args.visibility.as_ref());
    set(&mut log.water_temperature, args.water_temperature.as_ref());
    set(&mut log.weights, args.weights.as_ref());
    set(&mut log.notes, args.notes.as_ref());
    if let Some(fish) = &args.fish {
        log.fish_ids = DiveLog::parse_fish_ids(fish);
    }
}

fn print_log(log: &DiveLog, format: &OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(log)?);
        }
        OutputFormat::Text => {
            let num = |v: Option<f64>, unit: &str| v.map_or_else(|| "-".to_string(), |v| format!("{v} {unit}"));
            println!("Start:       {}", log.dive_start_time.as_deref().unwrap_or("-"));
            println!("Duration:    {}", num(log.dive_duration, "min"));
            println!("Max depth:   {}", num(log.max_depth, "m"));
            println!("Visibility:  {}", num(log.visibility, "m"));
            println!("Water temp:  {}", num(log.water_temperature, "C"));
            println!(
                "Air:         {} -> {} (used {})",
                num(log.starting_air, "bar"),
                num(log.ending_air, "bar"),
                num(log.air_used(), "bar"),
            );
            println!("Weights:     {}", num(log.weights, "kg"));
            if let Some(suit) = &log.wetsuit_type {
                println!("Wetsuit:     {suit} {}", num(log.wetsuit_thickness, "mm"));
            }
            if !log.fish_ids.is_empty() {
                println!("Fish:        {}", log.fish_ids.join(", "));
            }
            if let Some(notes) = &log.notes {
                println!("Notes:       {notes}");
            }
        }
    }
    Ok(())
}
