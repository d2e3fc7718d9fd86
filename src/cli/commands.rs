use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "dayledger")]
#[command(version, about = "Keeps meal, gym and water schedules in one daily ledger")]
#[command(propagate_version = true)]
pub struct Cli {
    /// User whose schedule to read or write
    #[arg(long, global = true, default_value = "default")]
    pub user: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a new dayledger project in the current directory
    Init,

    /// Inspect or edit a day's task ledger directly
    Ledger(LedgerCommand),

    /// Save or show a day's meal plan
    Meal(RecordCommand),

    /// Save or show a day's scheduled workout
    Workout(RecordCommand),

    /// Log glasses of water for a day
    Water {
        /// Glasses drunk so far
        glasses: u32,

        /// Day as YYYY-MM-DD (defaults to today)
        #[arg(long)]
        date: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Manage workout templates
    Template(TemplateCommand),

    /// Show tagged days of a month
    Calendar {
        /// Month as YYYY-MM (defaults to the current month)
        month: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show current and longest streaks
    Streak {
        /// Restrict to one domain (meal, gym, water)
        #[arg(long)]
        domain: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args, Debug)]
pub struct LedgerCommand {
    #[command(subcommand)]
    pub action: LedgerAction,
}

#[derive(Subcommand, Debug)]
pub enum LedgerAction {
    /// Show the tags for a day
    Show {
        /// Day as YYYY-MM-DD (defaults to today)
        #[arg(long)]
        date: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Add a tag owned by a domain
    Add {
        /// Owning domain (meal, gym, water)
        domain: String,

        /// Tag to add, e.g. meal-6pm
        tag: String,

        /// Day as YYYY-MM-DD (defaults to today)
        #[arg(long)]
        date: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Remove a tag owned by a domain
    Remove {
        /// Owning domain (meal, gym, water)
        domain: String,

        /// Tag to remove
        tag: String,

        /// Day as YYYY-MM-DD (defaults to today)
        #[arg(long)]
        date: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args, Debug)]
pub struct RecordCommand {
    #[command(subcommand)]
    pub action: RecordAction,
}

#[derive(Subcommand, Debug)]
pub enum RecordAction {
    /// Save the record read as JSON from stdin
    Save {
        /// Day as YYYY-MM-DD (defaults to today)
        #[arg(long)]
        date: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the saved record
    Show {
        /// Day as YYYY-MM-DD (defaults to today)
        #[arg(long)]
        date: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args, Debug)]
pub struct TemplateCommand {
    #[command(subcommand)]
    pub action: TemplateAction,
}

#[derive(Subcommand, Debug)]
pub enum TemplateAction {
    /// List templates of a workout type, most recently used first
    List {
        workout_type: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Save exercises read as JSON from stdin as a template
    Save {
        workout_type: String,

        name: String,

        /// Overwrite this template instead of creating one
        #[arg(long)]
        update: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Delete a template
    Delete { id: String },

    /// Load the most recently used template of a workout type
    Select {
        workout_type: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}
