use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use clap::{Args, Parser, Subcommand, ValueEnum};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use recite::config::{capture_path, database_path, default_data_dir};
use recite::{
    AiGateway, AudioPipeline, DeviceAudio, HistoryStore, OpenAIGateway, PracticeDifficulty,
    PracticeItem, PracticeMode, PracticeSessionEngine, SessionCommand, SessionConfig,
    SessionPhase, SessionState, Storage, SystemVoice,
};

/// Practice reciting prayers aloud, with AI feedback
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory holding history and the last recording
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Read phrases aloud and get pronunciation feedback
    Speak(PracticeArgs),

    /// Listen to prayers and answer comprehension questions
    Listen(PracticeArgs),

    /// Show practice statistics
    Stats,
}

#[derive(Args, Debug)]
struct PracticeArgs {
    /// Language code of the practice material
    #[arg(short, long, default_value = "en")]
    language: String,

    /// Prayer tradition to draw from
    #[arg(short, long, default_value = "Christian")]
    tradition: String,

    #[arg(short, long, value_enum, default_value_t = Level::Beginner)]
    difficulty: Level,

    /// Number of items to practice
    #[arg(short, long, default_value_t = 5)]
    count: usize,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Level {
    Beginner,
    Intermediate,
    Advanced,
}

impl From<Level> for PracticeDifficulty {
    fn from(level: Level) -> Self {
        match level {
            Level::Beginner => PracticeDifficulty::Beginner,
            Level::Intermediate => PracticeDifficulty::Intermediate,
            Level::Advanced => PracticeDifficulty::Advanced,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "recite=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let data_dir = match cli.data_dir {
        Some(dir) => dir,
        None => default_data_dir()?,
    };

    match cli.command {
        Command::Stats => {
            let storage = Arc::new(Storage::open(database_path(&data_dir))?);
            print_stats(&HistoryStore::open(storage)?);
        }
        Command::Speak(args) => {
            let history = practice_history(&data_dir)?;
            practice(PracticeMode::Speaking, args, history, &data_dir).await?
        }
        Command::Listen(args) => {
            let history = practice_history(&data_dir)?;
            practice(PracticeMode::Listening, args, history, &data_dir).await?
        }
    }

    Ok(())
}

/// History for a practice session. When the stored history cannot be
/// loaded it is left untouched and results go to an in-memory store.
fn practice_history(data_dir: &Path) -> Result<Arc<HistoryStore>> {
    let opened = Storage::open(database_path(data_dir))
        .and_then(|storage| HistoryStore::open(Arc::new(storage)));

    match opened {
        Ok(history) => Ok(Arc::new(history)),
        Err(e) => {
            warn!("Could not load practice history: {}", e);
            println!("Practice history is unavailable; results will not be saved.");
            let storage = Arc::new(Storage::in_memory()?);
            Ok(Arc::new(HistoryStore::open(storage)?))
        }
    }
}

fn print_stats(history: &HistoryStore) {
    let stats = history.stats();
    if stats.count == 0 {
        println!("No practice recorded yet.");
        return;
    }

    println!("Attempts:   {}", stats.count);
    println!("Mean score: {}", stats.mean_score);
    println!("Best score: {}", stats.best_score);
    for level in &stats.by_difficulty {
        println!(
            "  {:<12} {:>4} attempts, mean {}",
            level.difficulty.label(),
            level.count,
            level.mean_score
        );
    }

    println!("\nRecent:");
    for result in history.recent(5) {
        println!(
            "  {}  {:>3}  {}",
            result.timestamp.format("%Y-%m-%d %H:%M"),
            result.score,
            result.text
        );
    }
}

async fn practice(
    mode: PracticeMode,
    args: PracticeArgs,
    history: Arc<HistoryStore>,
    data_dir: &Path,
) -> Result<()> {
    let gateway: Arc<dyn AiGateway> = Arc::new(OpenAIGateway::from_env()?);
    if !gateway.is_configured() {
        warn!("No API key configured; using built-in content and the system voice");
    }

    let pipeline = AudioPipeline::new(
        Arc::new(DeviceAudio::new()),
        Arc::clone(&gateway),
        Arc::new(SystemVoice::new()),
        capture_path(data_dir),
    );

    let config = SessionConfig::new(mode)
        .with_language(args.language)
        .with_tradition(args.tradition)
        .with_difficulty(args.difficulty.into())
        .with_item_count(args.count);

    let handle = PracticeSessionEngine::new(config, gateway, pipeline, history).spawn();
    info!("Session ready");

    let mut updates = handle.subscribe();
    let printer = tokio::spawn(async move {
        let mut last = None;
        loop {
            let state = updates.borrow_and_update().clone();
            render(&state, &mut last);
            if updates.changed().await.is_err() {
                break;
            }
        }
    });

    print_help(mode);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let command = match line.trim() {
            "q" | "quit" => break,
            "r" => {
                if handle.state().phase == SessionPhase::Recording {
                    SessionCommand::StopRecording
                } else {
                    SessionCommand::StartRecording
                }
            }
            "p" => SessionCommand::PlayPrompt,
            "c" => SessionCommand::PlayCapture,
            "s" => SessionCommand::StopAudio,
            "n" => SessionCommand::Next,
            "b" => SessionCommand::Previous,
            "g" => SessionCommand::Regenerate { difficulty: None },
            other => match other.parse::<usize>() {
                Ok(choice) if choice > 0 => SessionCommand::SelectAnswer(choice - 1),
                _ => {
                    print_help(mode);
                    continue;
                }
            },
        };
        handle.send(command).await?;
    }

    handle.shutdown().await;
    printer.abort();
    Ok(())
}

fn print_help(mode: PracticeMode) {
    match mode {
        PracticeMode::Speaking => {
            println!("r: record/stop  p: hear phrase  c: hear yourself  s: stop audio")
        }
        PracticeMode::Listening => println!("p: hear prayer  1-9: answer  s: stop audio"),
    }
    println!("n: next  b: back  g: new set  q: quit");
}

/// Print the parts of `state` that changed since the last call
fn render(state: &SessionState, last: &mut Option<(SessionPhase, usize, Option<String>)>) {
    let key = (state.phase, state.current_index, state.error.clone());
    if last.as_ref() == Some(&key) {
        return;
    }
    let item_changed = last
        .as_ref()
        .is_none_or(|(_, index, _)| *index != state.current_index);
    *last = Some(key);

    if let Some(error) = &state.error {
        println!("! {error}");
    }

    match state.phase {
        SessionPhase::LoadingContent => println!("Preparing practice..."),
        SessionPhase::Ready if item_changed => print_item(state),
        SessionPhase::Ready => {}
        SessionPhase::Recording => println!("Recording... (r to stop)"),
        SessionPhase::Playing => println!("Playing..."),
        SessionPhase::Answering => {
            if let Some(item) = state.current_item().and_then(|i| i.as_listening()) {
                println!("{}", item.question);
                for (i, option) in item.options.iter().enumerate() {
                    println!("  {}. {}", i + 1, option);
                }
            }
        }
        SessionPhase::Evaluating => println!("Scoring..."),
        SessionPhase::ResultShown => print_result(state),
    }
}

fn print_item(state: &SessionState) {
    let Some(item) = state.current_item() else {
        return;
    };

    println!("\n[{}/{}]", state.current_index + 1, state.total());
    match item {
        PracticeItem::Speaking(item) => {
            println!("{}", item.text);
            if let Some(translation) = &item.translation {
                println!("({translation})");
            }
        }
        PracticeItem::Listening(item) => {
            println!("Press p to hear the prayer.");
            println!("{}", item.question);
            for (i, option) in item.options.iter().enumerate() {
                println!("  {}. {}", i + 1, option);
            }
        }
    }
}

fn print_result(state: &SessionState) {
    if let Some(answer) = state.answer {
        if answer.is_correct {
            println!("Correct!");
        } else {
            println!("Not quite. The answer was {}.", answer.correct_index + 1);
        }
        if let Some(item) = state.current_item() {
            println!("{}", item.text());
        }
        return;
    }

    if let Some(feedback) = &state.feedback {
        println!("Score: {} ({:?})", feedback.score, feedback.accuracy);
        if let Some(transcript) = &state.transcript {
            println!("Heard: {transcript}");
        }
        println!("{}", feedback.feedback);
        if !feedback.improvements.is_empty() {
            println!("Work on: {}", feedback.improvements.join(", "));
        }
        println!("Tip: {}", feedback.tips);
    }
}
