//! CLI argument parsing for the eld-planner-worker binary.

use chrono::{DateTime, FixedOffset};
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "eld-planner-worker", about = "HOS-compliant trip planning worker")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the worker server (default if no subcommand given)
    Serve,
    /// Plan one trip and print the plan as JSON
    Plan {
        /// Where the driver is now
        #[arg(long)]
        from: String,
        /// Pickup location
        #[arg(long)]
        pickup: String,
        /// Dropoff location
        #[arg(long)]
        dropoff: String,
        /// Hours already used in the 70-hour/8-day cycle
        #[arg(long, default_value_t = 0.0)]
        cycle_hours: f64,
        /// Trip start (RFC 3339); defaults to 06:00 UTC today
        #[arg(long)]
        start: Option<DateTime<FixedOffset>>,
        /// Pretty-print the JSON output
        #[arg(long)]
        pretty: bool,
    },
}
