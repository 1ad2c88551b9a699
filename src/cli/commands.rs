use std::path::PathBuf;

use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use clap::{Args, Parser, Subcommand};

use crate::model::pantry::ItemStatus;

#[derive(Parser)]
#[command(name = "daymx", about = concat!("daymx v", env!("CARGO_PKG_VERSION"), " - threads, tasks and pantry"), version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Use this data directory instead of $DAYMX_DIR or the XDG default
    #[arg(short = 'C', long = "data-dir", global = true)]
    pub data_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create the data directory (seeded with example threads)
    Init(InitArgs),
    /// Show the thread tree
    Threads,
    /// Add, rename, toggle, move or remove a thread node
    Thread(ThreadCmd),
    /// Manage the questions of a thread node
    Question(QuestionCmd),
    /// Manage the tasks of a thread node
    Task(TaskCmd),
    /// Unified task view across every enabled thread
    Tasks(TasksArgs),
    /// Show the pantry tree, or manage categories
    Pantry(PantryCmd),
    /// Manage pantry items
    Item(ItemCmd),
    /// Items to buy, grouped by category
    Shop,
    /// Walk through enabled nodes one at a time
    Review(ReviewCmd),
    /// Re-render the task view whenever data.json changes
    Watch(WatchArgs),
    /// Show recent recovery log entries
    Recovery(RecoveryArgs),
}

#[derive(Args)]
pub struct InitArgs {
    /// Start with no example threads
    #[arg(long)]
    pub empty: bool,
}

// ---------------------------------------------------------------------------
// Nodes (thread nodes and pantry categories)
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct ThreadCmd {
    #[command(subcommand)]
    pub action: NodeAction,
}

#[derive(Args)]
pub struct PantryCmd {
    /// Omit to print the pantry tree
    #[command(subcommand)]
    pub action: Option<NodeAction>,
}

#[derive(Subcommand)]
pub enum NodeAction {
    /// Add a node (top level unless --parent is given)
    Add(NodeAddArgs),
    /// Rename a node
    Rename(NodeRenameArgs),
    /// Enable a node (its descendants follow unless disabled themselves)
    Enable(IdArg),
    /// Disable a node and hide its whole subtree
    Disable(IdArg),
    /// Delete a node and everything under it
    Rm(IdArg),
    /// Move a node under another parent or to the top level
    Mv(NodeMvArgs),
}

#[derive(Args)]
pub struct NodeAddArgs {
    pub name: String,
    /// Parent node ID
    #[arg(long)]
    pub parent: Option<String>,
}

#[derive(Args)]
pub struct NodeRenameArgs {
    pub id: String,
    pub name: String,
}

#[derive(Args)]
pub struct IdArg {
    pub id: String,
}

#[derive(Args)]
pub struct NodeMvArgs {
    pub id: String,
    /// New parent node ID (omit for top level)
    #[arg(long)]
    pub parent: Option<String>,
    /// Position among the new siblings, 0-indexed (default: last)
    #[arg(long)]
    pub position: Option<usize>,
}

// ---------------------------------------------------------------------------
// Questions and tasks
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct QuestionCmd {
    #[command(subcommand)]
    pub action: QuestionAction,
}

#[derive(Subcommand)]
pub enum QuestionAction {
    /// Add a question to a node
    Add { node: String, text: String },
    /// Change a question's text
    Edit { node: String, id: String, text: String },
    /// Remove a question
    Rm { node: String, id: String },
}

#[derive(Args)]
pub struct TaskCmd {
    #[command(subcommand)]
    pub action: TaskAction,
}

#[derive(Subcommand)]
pub enum TaskAction {
    /// Add a task to a node
    Add(TaskAddArgs),
    /// Change task fields
    Edit(TaskEditArgs),
    /// Mark a task completed
    Done(IdArg),
    /// Mark a task not completed
    Undo(IdArg),
    /// Remove a task
    Rm(IdArg),
}

#[derive(Args, Default)]
pub struct TaskFieldArgs {
    /// 1 (highest) to 5; out-of-range values are clamped
    #[arg(long, allow_negative_numbers = true)]
    pub priority: Option<i64>,
    /// Context tag (repeatable, or comma-separated)
    #[arg(long = "context", value_delimiter = ',')]
    pub contexts: Vec<String>,
    /// Who or what the task is waiting on
    #[arg(long)]
    pub waiting_on: Option<String>,
    /// Earliest time the task becomes available (RFC 3339 or "YYYY-MM-DD HH:MM")
    #[arg(long, value_parser = parse_time)]
    pub available_at: Option<DateTime<Utc>>,
    /// When to follow up (RFC 3339 or "YYYY-MM-DD HH:MM")
    #[arg(long, value_parser = parse_time)]
    pub follow_up_at: Option<DateTime<Utc>>,
}

#[derive(Args)]
pub struct TaskAddArgs {
    pub node: String,
    pub text: String,
    #[command(flatten)]
    pub fields: TaskFieldArgs,
}

#[derive(Args)]
pub struct TaskEditArgs {
    pub id: String,
    /// New task text
    #[arg(long)]
    pub text: Option<String>,
    #[command(flatten)]
    pub fields: TaskFieldArgs,
    /// Remove every context tag
    #[arg(long, conflicts_with = "contexts")]
    pub clear_contexts: bool,
    /// Make the task available immediately
    #[arg(long, conflicts_with = "available_at")]
    pub clear_available_at: bool,
    /// Drop the follow-up time
    #[arg(long, conflicts_with = "follow_up_at")]
    pub clear_follow_up_at: bool,
}

#[derive(Args, Clone, Default)]
pub struct TasksArgs {
    /// Show only tasks usable in this context (plus context-free tasks)
    #[arg(long)]
    pub context: Option<String>,
    /// Context you are in now, for availability (default: config)
    #[arg(long)]
    pub active_context: Option<String>,
    /// Include completed tasks
    #[arg(long)]
    pub all: bool,
}

// ---------------------------------------------------------------------------
// Pantry items
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct ItemCmd {
    #[command(subcommand)]
    pub action: ItemAction,
}

#[derive(Subcommand)]
pub enum ItemAction {
    /// Add an item to a category (status to_buy)
    Add { category: String, name: String },
    /// Set an item's status: to_buy, stocked, not_needed
    Status {
        id: String,
        #[arg(value_parser = parse_status)]
        status: ItemStatus,
    },
    /// Set an item's notes
    Note { id: String, text: String },
    /// Rename an item
    Rename { id: String, name: String },
    /// Remove an item
    Rm { id: String },
}

// ---------------------------------------------------------------------------
// Review, watch, recovery
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct ReviewCmd {
    /// Review pantry categories instead of threads
    #[arg(long)]
    pub pantry: bool,
    #[command(subcommand)]
    pub action: Option<ReviewAction>,
}

#[derive(Subcommand, Clone, Copy, PartialEq, Eq)]
pub enum ReviewAction {
    /// Begin a new review from the first enabled node
    Start,
    /// Move to the next node
    Next,
    /// Move back one node
    Prev,
    /// Show the current card (default)
    Show,
    /// Abandon the review
    Stop,
}

#[derive(Args)]
pub struct WatchArgs {
    #[command(flatten)]
    pub tasks: TasksArgs,
}

#[derive(Args)]
pub struct RecoveryArgs {
    /// Maximum number of entries to show
    #[arg(long, default_value = "10")]
    pub limit: usize,
}

// ---------------------------------------------------------------------------
// Value parsers
// ---------------------------------------------------------------------------

/// RFC 3339, or `YYYY-MM-DD HH:MM` in local time
pub fn parse_time(s: &str) -> Result<DateTime<Utc>, String> {
    let s = s.trim();
    if let Ok(t) = DateTime::parse_from_rfc3339(s) {
        return Ok(t.with_timezone(&Utc));
    }
    let naive = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M")
        .map_err(|_| format!("invalid time '{}' (expected RFC 3339 or \"YYYY-MM-DD HH:MM\")", s))?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|t| t.with_timezone(&Utc))
        .ok_or_else(|| format!("'{}' does not exist in the local time zone", s))
}

pub fn parse_status(s: &str) -> Result<ItemStatus, String> {
    ItemStatus::parse_status(s).ok_or_else(|| format!("unknown status '{}' (expected: to_buy, stocked, not_needed)", s))
}
