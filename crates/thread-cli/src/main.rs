use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use thread_core::{tree, Config, DeletePolicy, GenerationConfig, Message, Origin, Thread};
use thread_llm::create_provider;
use thread_sync::{JsonFileStore, ReplyOutcome, SyncEngine, SyncEvent};
use tokio::sync::mpsc;
use uuid::Uuid;

mod logging;

use logging::init_logging;

#[derive(Parser)]
#[command(name = "threadline")]
#[command(about = "Branching message threads on the command line")]
#[command(version)]
struct Cli {
    /// Directory holding the thread files
    #[arg(long, env = "THREADLINE_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, short, default_value = "false")]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List threads, pinned first
    Threads,
    /// Create a thread
    New { title: Option<String> },
    /// Print a thread as a tree
    Show {
        thread: String,
        /// Select a message before printing
        #[arg(long)]
        select: Option<String>,
    },
    /// Add a message, at the root level unless a parent is given
    Add {
        thread: String,
        content: String,
        #[arg(long)]
        parent: Option<String>,
    },
    /// Replace a message's content
    Edit {
        thread: String,
        message: String,
        content: String,
    },
    /// Delete a message
    Delete {
        thread: String,
        message: String,
        #[arg(long, value_enum, default_value = "cascade")]
        policy: PolicyArg,
    },
    /// Insert a copy of a subtree right after the original
    Duplicate { thread: String, message: String },
    /// Move a subtree, possibly into another thread
    Move {
        thread: String,
        message: String,
        /// Destination thread, defaults to the source thread
        #[arg(long)]
        to_thread: Option<String>,
        /// New parent, root level when omitted
        #[arg(long)]
        parent: Option<String>,
    },
    /// Toggle the pinned flag of a thread
    Pin { thread: String },
    /// Rename a thread
    Rename { thread: String, title: String },
    /// Stream a generated reply to a message
    Generate {
        thread: String,
        message: String,
        /// Model override
        #[arg(long)]
        model: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum PolicyArg {
    Cascade,
    Promote,
    Clear,
}

impl From<PolicyArg> for DeletePolicy {
    fn from(policy: PolicyArg) -> Self {
        match policy {
            PolicyArg::Cascade => DeletePolicy::Cascade,
            PolicyArg::Promote => DeletePolicy::PromoteChildren,
            PolicyArg::Clear => DeletePolicy::ClearChildren,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.debug);

    let mut config = Config::new();
    if let Some(dir) = cli.data_dir {
        config.data_dir = Some(dir);
    }
    let data_dir = config.data_dir();
    log::debug!("Using data directory {}", data_dir.display());

    let store = Arc::new(JsonFileStore::new(&data_dir));
    store
        .init()
        .await
        .with_context(|| format!("cannot open {}", data_dir.display()))?;

    let (tx, rx) = mpsc::channel(256);
    let mut engine = SyncEngine::from_config(&config, store).with_events(tx);
    if matches!(cli.command, Commands::Generate { .. }) {
        engine = engine.with_provider(create_provider(&config.generation)?);
    }
    let loaded = engine.load_threads().await?;
    log::debug!("Loaded {} thread(s)", loaded);

    let printer = tokio::spawn(print_tokens(rx));
    let result = run(&engine, &config, cli.command).await;
    drop(engine);
    printer.await?;
    result
}

async fn run(engine: &SyncEngine, config: &Config, command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Threads => {
            let threads = engine.threads().await;
            if threads.is_empty() {
                println!("{}", "No threads yet".dimmed());
            }
            for thread in threads {
                print_thread_line(&thread);
            }
        }
        Commands::New { title } => {
            let thread = engine.create_thread(title.as_deref().unwrap_or("")).await?;
            print_thread_line(&thread);
        }
        Commands::Show { thread, select } => {
            let thread = resolve_thread(engine, &thread).await?;
            let selected = match select {
                Some(prefix) => Some(resolve_message(&thread, &prefix)?),
                None => engine.selection(thread.id).await,
            };
            let visible = engine.select_message(thread.id, selected).await?;
            print_thread_line(&thread);
            print_forest(&visible, selected, 1);
        }
        Commands::Add {
            thread,
            content,
            parent,
        } => {
            let thread = resolve_thread(engine, &thread).await?;
            let parent_id = parent
                .map(|prefix| resolve_message(&thread, &prefix))
                .transpose()?;
            let message = engine
                .add_message(thread.id, parent_id, content.into())
                .await?;
            println!("{} {}", "added".green(), short(message.id));
        }
        Commands::Edit {
            thread,
            message,
            content,
        } => {
            let thread = resolve_thread(engine, &thread).await?;
            let message_id = resolve_message(&thread, &message)?;
            engine
                .edit_message(thread.id, message_id, content.into())
                .await?;
            println!("{} {}", "edited".green(), short(message_id));
        }
        Commands::Delete {
            thread,
            message,
            policy,
        } => {
            let thread = resolve_thread(engine, &thread).await?;
            let message_id = resolve_message(&thread, &message)?;
            engine
                .delete_message(thread.id, message_id, policy.into())
                .await?;
            println!("{} {} ({:?})", "deleted".yellow(), short(message_id), policy);
        }
        Commands::Duplicate { thread, message } => {
            let thread = resolve_thread(engine, &thread).await?;
            let message_id = resolve_message(&thread, &message)?;
            let copy = engine.duplicate_message(thread.id, message_id).await?;
            println!(
                "{} {} -> {}",
                "duplicated".green(),
                short(message_id),
                short(copy.id)
            );
        }
        Commands::Move {
            thread,
            message,
            to_thread,
            parent,
        } => {
            let source = resolve_thread(engine, &thread).await?;
            let message_id = resolve_message(&source, &message)?;
            let target = match to_thread {
                Some(prefix) => resolve_thread(engine, &prefix).await?,
                None => source.clone(),
            };
            let parent_id = parent
                .map(|prefix| resolve_message(&target, &prefix))
                .transpose()?;
            let moved = engine
                .move_message(source.id, message_id, target.id, parent_id)
                .await?;
            println!(
                "{} {} -> {} in {}",
                "moved".green(),
                short(message_id),
                short(moved.id),
                target.title
            );
        }
        Commands::Pin { thread } => {
            let thread = resolve_thread(engine, &thread).await?;
            let pinned = engine.toggle_pin(thread.id).await?;
            let state = if pinned { "pinned" } else { "unpinned" };
            println!("{} {}", state.green(), thread.title);
        }
        Commands::Rename { thread, title } => {
            let thread = resolve_thread(engine, &thread).await?;
            engine.rename_thread(thread.id, &title).await?;
            println!("{} {}", "renamed".green(), title);
        }
        Commands::Generate {
            thread,
            message,
            model,
        } => {
            let thread = resolve_thread(engine, &thread).await?;
            let parent_id = resolve_message(&thread, &message)?;
            let model = model.unwrap_or_else(|| config.generation.model.clone());
            let generation = GenerationConfig::new(model)
                .with_system_prompt(config.generation.system_prompt.clone());

            let reply = engine.generate_reply(thread.id, parent_id, generation);
            tokio::pin!(reply);
            let outcome = loop {
                tokio::select! {
                    outcome = &mut reply => break outcome?,
                    signal = tokio::signal::ctrl_c() => {
                        signal?;
                        if stop_streaming(engine, thread.id) == 0 {
                            eprintln!("{}", "reply is not streaming yet".dimmed());
                        }
                    }
                }
            };

            match outcome {
                ReplyOutcome::Finished {
                    message_id,
                    outcome,
                } => {
                    println!();
                    let label = if outcome.is_aborted() {
                        "stopped".yellow()
                    } else {
                        "done".green()
                    };
                    println!("{} {}", label, short(message_id));
                }
                ReplyOutcome::Stopped { message_id } => {
                    println!("{} {}", "stopped".yellow(), short(message_id));
                }
            }
        }
    }
    Ok(())
}

async fn print_tokens(mut rx: mpsc::Receiver<SyncEvent>) {
    use std::io::Write;

    while let Some(event) = rx.recv().await {
        match event {
            SyncEvent::Token { content, .. } => {
                print!("{}", content);
                let _ = std::io::stdout().flush();
            }
            SyncEvent::RolledBack { operation, error } => {
                eprintln!("{} {}: {}", "rolled back".red(), operation, error);
            }
            _ => {}
        }
    }
}

fn short(id: Uuid) -> String {
    id.simple().to_string()[..8].to_string()
}

fn print_thread_line(thread: &Thread) {
    let pin = if thread.pinned { "*" } else { " " };
    println!(
        "{} {} {} {}",
        pin.yellow(),
        short(thread.id).cyan(),
        thread.title.bold(),
        format!("({} messages)", thread.message_count()).dimmed()
    );
}

fn print_forest(forest: &[Message], selected: Option<Uuid>, depth: usize) {
    for (level, message) in tree::visible_rows(forest) {
        let indent = "  ".repeat(depth + level);
        let who = match message.origin {
            Origin::Human => message.author.as_deref().unwrap_or("user").to_string(),
            Origin::Generated => message
                .generation
                .as_ref()
                .map(|g| g.base_model.clone())
                .unwrap_or_else(|| "assistant".to_string()),
        };
        let first_line = message.content.as_text();
        let first_line = first_line.lines().next().unwrap_or("");
        let marker = if Some(message.id) == selected { ">" } else { "-" };
        println!(
            "{}{} {} {} {}",
            indent,
            marker,
            short(message.id).cyan(),
            format!("{}:", who).dimmed(),
            first_line
        );
        if message.collapsed && !message.replies.is_empty() {
            let hidden = message.descendant_count();
            println!("{}  {}", indent, format!("[+{} hidden]", hidden).dimmed());
        }
    }
}

/// Stop every reply streaming into `thread_id`; returns how many were stopped.
fn stop_streaming(engine: &SyncEngine, thread_id: Uuid) -> usize {
    engine
        .active_generations()
        .into_iter()
        .filter(|(thread, _)| *thread == thread_id)
        .filter(|(_, message_id)| engine.stop_generation(*message_id))
        .count()
}

async fn resolve_thread(engine: &SyncEngine, prefix: &str) -> anyhow::Result<Thread> {
    let needle = prefix.replace('-', "").to_ascii_lowercase();
    let mut matches: Vec<Thread> = engine
        .threads()
        .await
        .into_iter()
        .filter(|thread| thread.id.simple().to_string().starts_with(&needle) || thread.title == prefix)
        .collect();
    match matches.len() {
        0 => Err(anyhow!("no thread matches '{}'", prefix)),
        1 => Ok(matches.remove(0)),
        n => bail!("'{}' matches {} threads", prefix, n),
    }
}

fn resolve_message(thread: &Thread, prefix: &str) -> anyhow::Result<Uuid> {
    let needle = prefix.replace('-', "").to_ascii_lowercase();
    let matches: Vec<Uuid> = tree::collect_ids(&thread.messages)
        .into_iter()
        .filter(|id| id.simple().to_string().starts_with(&needle))
        .collect();
    match matches.as_slice() {
        [id] => Ok(*id),
        [] => Err(anyhow!("no message in '{}' matches '{}'", thread.title, prefix)),
        _ => bail!("'{}' is ambiguous in '{}'", prefix, thread.title),
    }
}
