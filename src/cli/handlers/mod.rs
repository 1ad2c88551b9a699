mod init;
pub use init::cmd_init;

use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use chrono::{Local, Utc};

use crate::cli::commands::*;
use crate::cli::output::*;
use crate::io::backend::FileBackend;
use crate::io::config_io::read_config;
use crate::io::data_dir::{DirEnv, require_initialized, resolve_data_dir};
use crate::io::lock::DataLock;
use crate::io::recovery::read_recovery_entries;
use crate::model::config::Config;
use crate::model::review::ForestKind;
use crate::model::store::Store;
use crate::ops::aggregate::{TaskQuery, shopping_list, task_view};
use crate::ops::availability::ContextFilter;
use crate::ops::pantry_ops::{add_category, add_item, find_item, remove_item, rename_item, set_item_notes, set_item_status};
use crate::ops::review::ReviewPhase;
use crate::ops::thread_ops::{
    TaskPatch, add_question, add_task, add_thread, edit_question, edit_task, find_task, remove_question, remove_task,
    set_completed,
};
use crate::session::Session;

type CmdResult = Result<(), Box<dyn std::error::Error>>;

/// How often `daymx watch` checks for changes
const WATCH_INTERVAL: Duration = Duration::from_millis(100);

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

pub fn dispatch(cli: Cli) -> CmdResult {
    let dir = resolve_data_dir(cli.data_dir.as_deref(), &DirEnv::from_process())?;

    let command = match cli.command {
        // Init runs before the directory exists
        Commands::Init(args) => return cmd_init(args, &dir),
        command => command,
    };

    let ctx = Context::load(dir, cli.json)?;
    match command {
        Commands::Init(_) => Ok(()),

        // Read commands
        Commands::Threads => cmd_threads(&ctx),
        Commands::Tasks(args) => cmd_tasks(&ctx, &args),
        Commands::Pantry(PantryCmd { action: None }) => cmd_pantry_tree(&ctx),
        Commands::Shop => cmd_shop(&ctx),
        Commands::Watch(args) => cmd_watch(&ctx, &args.tasks),
        Commands::Recovery(args) => cmd_recovery(&ctx, args.limit),

        // Write commands
        Commands::Thread(cmd) => cmd_node(&ctx, ForestKind::Threads, cmd.action),
        Commands::Pantry(PantryCmd { action: Some(action) }) => cmd_node(&ctx, ForestKind::Pantry, action),
        Commands::Question(cmd) => cmd_question(&ctx, cmd.action),
        Commands::Task(cmd) => cmd_task(&ctx, cmd.action),
        Commands::Item(cmd) => cmd_item(&ctx, cmd.action),
        Commands::Review(cmd) => cmd_review(&ctx, cmd),
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

struct Context {
    dir: PathBuf,
    config: Config,
    json: bool,
}

impl Context {
    fn load(dir: PathBuf, json: bool) -> Result<Self, Box<dyn std::error::Error>> {
        require_initialized(&dir)?;
        let config = read_config(&dir)?;
        Ok(Context { dir, config, json })
    }

    fn separator(&self) -> &str {
        &self.config.ui.breadcrumb_separator
    }

    fn debounce(&self) -> Duration {
        Duration::from_millis(self.config.sync.debounce_ms)
    }

    /// Unlocked session for commands that only read. Resume points in
    /// `.review.json` are left untouched.
    fn open_reader(&self) -> Session<FileBackend> {
        Session::open_read_only(FileBackend::new(&self.dir), self.debounce())
    }
}

/// A session holding the data-directory lock. Fields drop in order, so the
/// session is gone before the lock is released.
struct Locked {
    session: Session<FileBackend>,
    _lock: DataLock,
}

fn open_locked(ctx: &Context) -> Result<Locked, Box<dyn std::error::Error>> {
    let lock = DataLock::acquire_default(&ctx.dir)?;
    Ok(Locked {
        session: Session::open(FileBackend::new(&ctx.dir), ctx.debounce()),
        _lock: lock,
    })
}

/// Send anything still queued and surface the last persistence failure.
fn finish(session: &mut Session<FileBackend>) {
    session.flush();
    if let Some(err) = session.last_persist_error() {
        eprintln!("warning: {}", err);
    }
}

fn print_id(ctx: &Context, id: &str) -> CmdResult {
    if ctx.json {
        println!("{}", serde_json::to_string_pretty(&IdJson { id: id.to_string() })?);
    } else {
        println!("{}", id);
    }
    Ok(())
}

fn print_lines(lines: &[String]) {
    for line in lines {
        println!("{}", line);
    }
}

fn task_query(ctx: &Context, args: &TasksArgs) -> TaskQuery {
    let filter = args
        .context
        .as_deref()
        .map(|c| c.parse::<ContextFilter>().unwrap_or_default())
        .unwrap_or_default();
    TaskQuery {
        filter,
        active_context: args.active_context.clone().or_else(|| ctx.config.tasks.active_context.clone()),
        include_completed: args.all || ctx.config.tasks.show_completed,
        now: Utc::now(),
    }
}

// ---------------------------------------------------------------------------
// Read commands
// ---------------------------------------------------------------------------

fn cmd_threads(ctx: &Context) -> CmdResult {
    let session = ctx.open_reader();
    let forest = &session.store().threads;
    if ctx.json {
        println!("{}", serde_json::to_string_pretty(&forest.to_records())?);
    } else if forest.is_empty() {
        println!("No threads. Add one with `daymx thread add <name>`.");
    } else {
        print_lines(&format_tree(forest, ctx.config.ui.text_width, thread_summary));
    }
    Ok(())
}

fn cmd_pantry_tree(ctx: &Context) -> CmdResult {
    let session = ctx.open_reader();
    let forest = &session.store().pantry;
    if ctx.json {
        println!("{}", serde_json::to_string_pretty(&forest.to_records())?);
    } else if forest.is_empty() {
        println!("Pantry is empty. Add a category with `daymx pantry add <name>`.");
    } else {
        print_lines(&format_tree(forest, ctx.config.ui.text_width, pantry_summary));
    }
    Ok(())
}

fn render_tasks(ctx: &Context, store: &Store, args: &TasksArgs, pretty: bool) -> Result<String, serde_json::Error> {
    let rows = task_view(&store.threads, &task_query(ctx, args));
    if ctx.json {
        let json: Vec<TaskRowJson> = rows
            .iter()
            .map(|r| task_row_to_json(r, &store.threads, ctx.separator()))
            .collect();
        return if pretty {
            serde_json::to_string_pretty(&json)
        } else {
            serde_json::to_string(&json)
        };
    }
    if rows.is_empty() {
        return Ok("No tasks.".to_string());
    }
    Ok(format_task_rows(&rows, &store.threads, ctx.separator(), ctx.config.ui.text_width).join("\n"))
}

fn cmd_tasks(ctx: &Context, args: &TasksArgs) -> CmdResult {
    let session = ctx.open_reader();
    println!("{}", render_tasks(ctx, session.store(), args, true)?);
    Ok(())
}

fn cmd_shop(ctx: &Context) -> CmdResult {
    let session = ctx.open_reader();
    let groups = shopping_list(&session.store().pantry, ctx.separator());
    if ctx.json {
        println!("{}", serde_json::to_string_pretty(&shopping_to_json(&groups))?);
    } else if groups.is_empty() {
        println!("Nothing to buy.");
    } else {
        print_lines(&format_shopping(&groups));
    }
    Ok(())
}

/// Re-render the task view whenever another writer changes the document.
/// Runs until interrupted; it never takes the lock since it only reads.
fn cmd_watch(ctx: &Context, args: &TasksArgs) -> CmdResult {
    let mut session = ctx.open_reader();
    session.subscribe()?;
    println!("{}", render_tasks(ctx, session.store(), args, false)?);
    loop {
        let outcome = session.tick(Instant::now());
        if outcome.replaced {
            if !ctx.json {
                println!("\n-- updated {} --", Local::now().format("%H:%M:%S"));
            }
            println!("{}", render_tasks(ctx, session.store(), args, false)?);
        }
        thread::sleep(WATCH_INTERVAL);
    }
}

fn cmd_recovery(ctx: &Context, limit: usize) -> CmdResult {
    let entries = read_recovery_entries(&ctx.dir, Some(limit));
    if ctx.json {
        let json: Vec<serde_json::Value> = entries.iter().map(|e| e.to_json()).collect();
        println!("{}", serde_json::to_string_pretty(&json)?);
    } else if entries.is_empty() {
        println!("No recovery entries.");
    } else {
        for entry in &entries {
            print!("{}", entry.to_display_markdown());
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Nodes
// ---------------------------------------------------------------------------

fn cmd_node(ctx: &Context, kind: ForestKind, action: NodeAction) -> CmdResult {
    let mut locked = open_locked(ctx)?;
    let session = &mut locked.session;
    let now = Instant::now();

    match action {
        NodeAction::Add(args) => {
            let parent = args.parent.as_deref();
            let id = session.mutate(now, |store| match kind {
                ForestKind::Threads => add_thread(store, parent, &args.name),
                ForestKind::Pantry => add_category(store, parent, &args.name),
            })?;
            print_id(ctx, &id)?;
        }
        NodeAction::Rename(args) => {
            session.mutate(now, |store| match kind {
                ForestKind::Threads => store.threads.rename(&args.id, &args.name),
                ForestKind::Pantry => store.pantry.rename(&args.id, &args.name),
            })?;
            print_id(ctx, &args.id)?;
        }
        NodeAction::Enable(args) => {
            set_enabled(session, now, kind, &args.id, true)?;
            print_id(ctx, &args.id)?;
        }
        NodeAction::Disable(args) => {
            set_enabled(session, now, kind, &args.id, false)?;
            print_id(ctx, &args.id)?;
        }
        NodeAction::Rm(args) => {
            let removed = session.remove_node(now, kind, &args.id)?;
            if ctx.json {
                let json = RemovedJson {
                    id: args.id.clone(),
                    removed,
                };
                println!("{}", serde_json::to_string_pretty(&json)?);
            } else {
                println!("Removed {} ({} node{})", args.id, removed, if removed == 1 { "" } else { "s" });
            }
        }
        NodeAction::Mv(args) => {
            let parent = args.parent.as_deref();
            session.mutate(now, |store| match kind {
                ForestKind::Threads => store.threads.move_node(&args.id, parent, args.position),
                ForestKind::Pantry => store.pantry.move_node(&args.id, parent, args.position),
            })?;
            print_id(ctx, &args.id)?;
        }
    }

    finish(session);
    Ok(())
}

fn set_enabled(
    session: &mut Session<FileBackend>,
    now: Instant,
    kind: ForestKind,
    id: &str,
    enabled: bool,
) -> Result<(), crate::model::forest::StoreError> {
    session.mutate(now, |store| match kind {
        ForestKind::Threads => store.threads.set_enabled(id, enabled),
        ForestKind::Pantry => store.pantry.set_enabled(id, enabled),
    })
}

// ---------------------------------------------------------------------------
// Questions and tasks
// ---------------------------------------------------------------------------

fn cmd_question(ctx: &Context, action: QuestionAction) -> CmdResult {
    let mut locked = open_locked(ctx)?;
    let session = &mut locked.session;
    let now = Instant::now();

    match action {
        QuestionAction::Add { node, text } => {
            let id = session.mutate(now, |store| add_question(store, &node, &text))?;
            print_id(ctx, &id)?;
        }
        QuestionAction::Edit { node, id, text } => {
            session.mutate(now, |store| edit_question(&mut store.threads, &node, &id, &text))?;
            print_id(ctx, &id)?;
        }
        QuestionAction::Rm { node, id } => {
            session.mutate(now, |store| remove_question(&mut store.threads, &node, &id))?;
            print_id(ctx, &id)?;
        }
    }

    finish(session);
    Ok(())
}

fn patch_for_add(fields: TaskFieldArgs) -> TaskPatch {
    TaskPatch {
        text: None,
        priority: fields.priority,
        contexts: (!fields.contexts.is_empty()).then_some(fields.contexts),
        waiting_on: fields.waiting_on,
        available_at: fields.available_at.map(Some),
        follow_up_at: fields.follow_up_at.map(Some),
    }
}

fn patch_for_edit(args: TaskEditArgs) -> TaskPatch {
    let fields = args.fields;
    let contexts = if args.clear_contexts {
        Some(Vec::new())
    } else {
        (!fields.contexts.is_empty()).then_some(fields.contexts)
    };
    let available_at = if args.clear_available_at {
        Some(None)
    } else {
        fields.available_at.map(Some)
    };
    let follow_up_at = if args.clear_follow_up_at {
        Some(None)
    } else {
        fields.follow_up_at.map(Some)
    };
    TaskPatch {
        text: args.text,
        priority: fields.priority,
        contexts,
        waiting_on: fields.waiting_on,
        available_at,
        follow_up_at,
    }
}

fn cmd_task(ctx: &Context, action: TaskAction) -> CmdResult {
    let mut locked = open_locked(ctx)?;
    let session = &mut locked.session;
    let now = Instant::now();

    match action {
        TaskAction::Add(args) => {
            let patch = patch_for_add(args.fields);
            let id = session.mutate(now, |store| add_task(store, &args.node, &args.text, patch))?;
            print_id(ctx, &id)?;
        }
        TaskAction::Edit(args) => {
            let id = args.id.clone();
            let patch = patch_for_edit(args);
            session.mutate(now, |store| edit_task(&mut store.threads, &id, patch))?;
            print_id(ctx, &id)?;
        }
        TaskAction::Done(IdArg { id }) => {
            session.mutate(now, |store| set_completed(&mut store.threads, &id, true))?;
            print_id(ctx, &id)?;
        }
        TaskAction::Undo(IdArg { id }) => {
            session.mutate(now, |store| set_completed(&mut store.threads, &id, false))?;
            print_id(ctx, &id)?;
        }
        TaskAction::Rm(IdArg { id }) => {
            let node = find_task(&session.store().threads, &id)
                .map(|(node, _)| node.to_string())
                .ok_or_else(|| format!("task not found: {}", id))?;
            session.mutate(now, |store| remove_task(&mut store.threads, &node, &id))?;
            print_id(ctx, &id)?;
        }
    }

    finish(session);
    Ok(())
}

// ---------------------------------------------------------------------------
// Pantry items
// ---------------------------------------------------------------------------

fn cmd_item(ctx: &Context, action: ItemAction) -> CmdResult {
    let mut locked = open_locked(ctx)?;
    let session = &mut locked.session;
    let now = Instant::now();

    match action {
        ItemAction::Add { category, name } => {
            let id = session.mutate(now, |store| add_item(store, &category, &name))?;
            print_id(ctx, &id)?;
        }
        ItemAction::Status { id, status } => {
            session.mutate(now, |store| set_item_status(&mut store.pantry, &id, status))?;
            print_id(ctx, &id)?;
        }
        ItemAction::Note { id, text } => {
            session.mutate(now, |store| set_item_notes(&mut store.pantry, &id, &text))?;
            print_id(ctx, &id)?;
        }
        ItemAction::Rename { id, name } => {
            session.mutate(now, |store| rename_item(&mut store.pantry, &id, &name))?;
            print_id(ctx, &id)?;
        }
        ItemAction::Rm { id } => {
            let category = find_item(&session.store().pantry, &id)
                .map(|(category, _)| category.to_string())
                .ok_or_else(|| format!("item not found: {}", id))?;
            session.mutate(now, |store| remove_item(&mut store.pantry, &category, &id))?;
            print_id(ctx, &id)?;
        }
    }

    finish(session);
    Ok(())
}

// ---------------------------------------------------------------------------
// Review
// ---------------------------------------------------------------------------

fn cmd_review(ctx: &Context, cmd: ReviewCmd) -> CmdResult {
    let kind = if cmd.pantry { ForestKind::Pantry } else { ForestKind::Threads };
    let action = cmd.action.unwrap_or(ReviewAction::Show);

    let mut locked = open_locked(ctx)?;
    let session = &mut locked.session;

    match action {
        ReviewAction::Start => {
            session.review_start(kind);
        }
        ReviewAction::Next => {
            session.review_next(kind);
        }
        ReviewAction::Prev => {
            session.review_prev(kind);
        }
        ReviewAction::Stop => {
            let was_running = session.review(kind).phase() == ReviewPhase::InProgress;
            session.review_stop(kind);
            finish(session);
            if ctx.json {
                return print_review(ctx, session, kind);
            }
            if was_running {
                println!("Review stopped.");
            } else {
                println!("No review in progress.");
            }
            return Ok(());
        }
        ReviewAction::Show => {}
    }

    finish(session);
    print_review(ctx, session, kind)
}

fn print_review(ctx: &Context, session: &Session<FileBackend>, kind: ForestKind) -> CmdResult {
    let review = session.review(kind);
    let store = session.store();
    let sep = ctx.separator();
    if ctx.json {
        let json = match kind {
            ForestKind::Threads => review_to_json(kind, review, &store.threads, sep),
            ForestKind::Pantry => review_to_json(kind, review, &store.pantry, sep),
        };
        println!("{}", serde_json::to_string_pretty(&json)?);
    } else {
        let lines = match kind {
            ForestKind::Threads => format_review_card(review, &store.threads, sep, thread_card),
            ForestKind::Pantry => format_review_card(review, &store.pantry, sep, pantry_card),
        };
        print_lines(&lines);
    }
    Ok(())
}
