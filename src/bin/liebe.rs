//! CLI binary for liebe.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use clap::{Parser, Subcommand};
use liebe::briefing::BriefingCoordinator;
use liebe::directive::DateKey;
use liebe::scheduler::alarm::{Alarm, AlarmId, AlarmTime};
use liebe::scheduler::{AlarmScheduler, SchedulerRunner};
use liebe::sink::{LogSink, NotificationSink};
use liebe::store::{HttpStore, Store};
use liebe::{
    Assistant, ChatClient, ChatUpdate, Clock, ExchangeOutcome, LiebeConfig, ReplyTail, ReplyView, SystemClock,
};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Liebe: streaming chat assistant with alarms and daily notes.
#[derive(Parser)]
#[command(name = "liebe", version, about)]
struct Cli {
    /// Path to TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Subcommand to run.
    #[command(subcommand)]
    command: Option<Command>,
}

/// Available commands.
#[derive(Subcommand)]
enum Command {
    /// Chat interactively while alarms run in the background.
    Chat,

    /// List stored alarms and timers.
    Alarms,

    /// List stored notes.
    Notes {
        /// Only notes for this day (`today`, `2026-03-14`, `Sat Mar 14 2026`).
        #[arg(short, long)]
        date: Option<String>,
    },
}

/// Prints alarms and briefings to the terminal.
struct ConsoleSink;

#[async_trait]
impl NotificationSink for ConsoleSink {
    async fn alarm_fired(&self, alarm: &Alarm) {
        LogSink.alarm_fired(alarm).await;
        println!("\n⏰ {} ({:?})", alarm.label, alarm.kind());
    }

    async fn briefing_ready(&self, _alarm: &Alarm, script: &str) {
        println!("\n☀ {script}\n");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // stdout carries the conversation; logs go to stderr.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("liebe=info")),
        )
        .init();

    let cli = Cli::parse();

    let config = match cli.config {
        Some(ref path) => LiebeConfig::from_file(path)?,
        None => LiebeConfig::load_or_default(&LiebeConfig::default_config_path())?,
    };
    config.validate()?;

    let store: Arc<dyn Store> = Arc::new(HttpStore::new(&config.server));

    match cli.command.unwrap_or(Command::Chat) {
        Command::Chat => run_chat(config, store).await,
        Command::Alarms => list_alarms(store.as_ref()).await,
        Command::Notes { date } => list_notes(store.as_ref(), date.as_deref()).await,
    }
}

async fn list_alarms(store: &dyn Store) -> anyhow::Result<()> {
    let alarms = store.list_alarms().await?;
    if alarms.is_empty() {
        println!("No alarms set.");
    }
    for alarm in alarms {
        println!("{:>4}  {:<6} {}", alarm.id, format!("{:?}", alarm.kind()), alarm.label);
    }
    Ok(())
}

async fn list_notes(store: &dyn Store, date: Option<&str>) -> anyhow::Result<()> {
    let key = match date {
        Some(token) => Some(
            liebe::directive::parse_date_token(token, &SystemClock.now())
                .ok_or_else(|| anyhow::anyhow!("unrecognised date: {token}"))?,
        ),
        None => None,
    };

    print_notes(store, key).await
}

async fn print_notes(store: &dyn Store, key: Option<DateKey>) -> anyhow::Result<()> {
    let notes = store.list_notes(key).await?;
    if notes.is_empty() {
        println!("No notes.");
    }
    for note in notes {
        println!("[{}] {:?} #{}\n{}\n", note.date_key, note.kind, note.id, note.content);
    }
    Ok(())
}

async fn run_chat(config: LiebeConfig, store: Arc<dyn Store>) -> anyhow::Result<()> {
    println!("Liebe v{}", env!("CARGO_PKG_VERSION"));
    println!("Commands: /alarm HH:MM, /timer MINUTES, /remove ID, /alarms, /notes, /new, /quit");

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let client = ChatClient::from_config(&config);
    let scheduler = Arc::new(Mutex::new(
        AlarmScheduler::new().with_prepare_window(config.scheduler.prepare_window()),
    ));

    let sink = Arc::new(
        BriefingCoordinator::new(
            Arc::new(ConsoleSink),
            Arc::new(client.clone()),
            Arc::clone(&store),
            Arc::clone(&clock),
            config.briefing.city.clone(),
        )
        .with_enabled(config.briefing.enabled),
    );

    let assistant = Assistant::new(client, Arc::clone(&store), Arc::clone(&scheduler), Arc::clone(&clock))
        .with_history_limit(config.chat.history_limit)
        .with_sink(sink.clone());

    match assistant.resync().await {
        Ok(count) => info!("loaded {count} alarms"),
        Err(e) => warn!("cannot load alarms: {e}"),
    }
    match assistant.restore_history().await {
        Ok(count) => info!("restored {count} messages"),
        Err(e) => warn!("cannot restore chat history: {e}"),
    }

    let cancel = CancellationToken::new();
    let runner = SchedulerRunner::new(scheduler, clock, Arc::clone(&store), sink)
        .with_tick_interval(config.scheduler.tick_interval())
        .run(cancel.clone());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(command) = line.strip_prefix('/') {
            if !run_command(&assistant, store.as_ref(), command).await? {
                break;
            }
            continue;
        }

        let (outcome, view) = stream_reply(&assistant, line).await;
        match outcome {
            ExchangeOutcome::Completed {
                cleaned_text,
                requests,
                ..
            } => {
                match view.finish(&cleaned_text) {
                    ReplyTail::Append(rest) => println!("{rest}\n"),
                    ReplyTail::Reprint(text) => println!("\n\n{text}\n"),
                }
                for request in requests {
                    println!("  ✓ {request:?}");
                }
            }
            ExchangeOutcome::Failed(message) => println!("\n⚠ {message}\n"),
            ExchangeOutcome::Superseded | ExchangeOutcome::Empty => {}
        }
    }

    cancel.cancel();
    runner.await?;
    Ok(())
}

/// Run one exchange, echoing the reply as it streams in.
///
/// The returned view records what reached the terminal.
async fn stream_reply(assistant: &Assistant, message: &str) -> (ExchangeOutcome, ReplyView) {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let printer = tokio::spawn(async move {
        let mut view = ReplyView::new();
        while let Some(update) = rx.recv().await {
            match update {
                ChatUpdate::Status(status) => eprintln!("… {status}"),
                ChatUpdate::Partial(text) => {
                    if let Some(fresh) = view.advance(&text) {
                        print!("{fresh}");
                        let _ = std::io::Write::flush(&mut std::io::stdout());
                    }
                }
            }
        }
        view
    });

    let outcome = assistant.chat(message, &tx).await;
    drop(tx);
    let view = printer.await.unwrap_or_default();
    (outcome, view)
}

/// Handle a slash command. Returns `false` to quit.
async fn run_command(assistant: &Assistant, store: &dyn Store, command: &str) -> anyhow::Result<bool> {
    let mut parts = command.split_whitespace();
    let name = parts.next().unwrap_or_default();
    let arg = parts.next();

    match (name, arg) {
        ("quit" | "exit", _) => return Ok(false),
        ("new", _) => {
            if let Err(e) = assistant.new_chat().await {
                warn!("backend history not cleared: {e}");
            }
            println!("Started a new chat.");
        }
        ("alarm", Some(time)) => match time.parse::<AlarmTime>() {
            Ok(time) => match assistant.add_alarm(time).await {
                Ok(alarm) => println!("Alarm #{} set for {}", alarm.id, alarm.label),
                Err(e) => println!("⚠ {}", e.message()),
            },
            Err(e) => println!("⚠ {}", e.message()),
        },
        ("timer", Some(minutes)) => match minutes.parse::<u32>() {
            Ok(minutes) => match assistant.add_timer(minutes).await {
                Ok(alarm) => println!("Timer #{} set for {}", alarm.id, alarm.label),
                Err(e) => println!("⚠ {}", e.message()),
            },
            Err(_) => println!("⚠ timer takes a whole number of minutes"),
        },
        ("remove", Some(id)) => match id.parse::<i64>() {
            Ok(id) => match assistant.remove_alarm(AlarmId(id)).await {
                Ok(()) => println!("Removed #{id}"),
                Err(e) => println!("⚠ {}", e.message()),
            },
            Err(_) => println!("⚠ alarm ids are numbers"),
        },
        ("alarms", _) => {
            let scheduler = assistant.scheduler();
            let scheduler = scheduler.lock().await;
            if scheduler.is_empty() {
                println!("No alarms set.");
            }
            for alarm in scheduler.alarms() {
                let prepared = if alarm.prepared { " (briefing ready)" } else { "" };
                println!("{:>4}  {}{prepared}", alarm.id, alarm.label);
            }
        }
        ("notes", _) => {
            print_notes(store, Some(DateKey::today(&SystemClock.now()))).await?;
        }
        _ => println!("Unknown command: /{command}"),
    }
    Ok(true)
}
