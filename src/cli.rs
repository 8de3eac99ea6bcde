use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "taches", version, about = "Daily task board with business-day reminders")]
pub struct Cli {
    /// Path to the YAML config file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    /// Use an in-memory backend signed in as a local user
    #[arg(long, global = true)]
    pub offline: bool,
    /// Debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Email a one-time sign-in code
    Login {
        email: String,
    },
    /// Finish sign-in with the emailed code
    Verify {
        email: String,
        code: String,
    },
    /// Sign out and forget the cached session
    Logout,
    /// Show the signed-in user
    Whoami,
    /// Print the board
    List {
        /// Case-insensitive title filter
        #[arg(long, short = 's')]
        search: Option<String>,
        /// date, priorite or importance
        #[arg(long, default_value = "date")]
        sort: String,
        /// Only show one lane
        #[arg(long)]
        status: Option<String>,
    },
    /// Add a task
    Add {
        /// Title of the task
        title: String,
        /// Optional description
        #[arg(long)]
        description: Option<String>,
        /// Due date (YYYY-MM-DD)
        #[arg(long)]
        date: String,
        /// Due time (HH:MM)
        #[arg(long)]
        time: Option<String>,
        /// Basse, Normale or Haute
        #[arg(long)]
        priority: Option<String>,
        /// Faible, Moyenne or Forte
        #[arg(long)]
        importance: Option<String>,
        /// Mark as urgent
        #[arg(long)]
        urgent: bool,
        /// Remind this many business days before, at 08:00
        #[arg(long)]
        reminder: Option<u32>,
        /// Jamais, Quotidienne or Hebdomadaire
        #[arg(long)]
        recurrence: Option<String>,
    },
    /// Change the status of a task
    Status {
        task_id: String,
        /// À faire, En cours or Terminé (todo/doing/done accepted)
        status: String,
    },
    /// Delete a task
    Delete {
        task_id: String,
    },
    /// Poll reminders without the board
    Watch,
    /// Manage the config file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Launch the interactive board
    Tui,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Write a template config file
    Init,
    /// Print the effective config
    Show,
}
