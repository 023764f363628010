//! `switchyard chat` — Interactive or single-message chat.

use async_trait::async_trait;
use std::io::Write;
use std::sync::{Arc, PoisonError};
use switchyard_agent::{
    CompactionGate, CompactionSettings, RequestAssembler, TurnConfig, TurnOrchestrator,
    TurnOutcome, TurnRequest,
};
use switchyard_config::AppConfig;
use switchyard_history::ConversationHistory;
use switchyard_providers::ModelRegistries;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use super::build_registries;

/// Stdin line reader shared by the chat loop and the compaction prompt.
struct Terminal {
    lines: Mutex<Lines<BufReader<Stdin>>>,
}

impl Terminal {
    fn new() -> Self {
        Self {
            lines: Mutex::new(BufReader::new(tokio::io::stdin()).lines()),
        }
    }

    /// Print `label` and read one line. `None` at end of input.
    async fn prompt(&self, label: &str) -> std::io::Result<Option<String>> {
        print!("{label}");
        std::io::stdout().flush()?;
        self.lines.lock().await.next_line().await
    }
}

/// Asks on the terminal before compacting.
struct StdinGate {
    terminal: Arc<Terminal>,
}

#[async_trait]
impl CompactionGate for StdinGate {
    async fn confirm(&self, tokens_used: u64, context_length: u64) -> bool {
        let percent = tokens_used as f64 / context_length as f64 * 100.0;
        let question = format!(
            "  Context is {percent:.0}% full ({tokens_used}/{context_length} tokens). \
                 Compact now? [y/N] "
        );
        match self.terminal.prompt(&question).await {
            Ok(Some(answer)) => is_yes(&answer),
            Ok(None) => false,
            Err(e) => {
                warn!(error = %e, "Could not read compaction answer");
                false
            }
        }
    }
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

/// One line of interactive input.
#[derive(Debug, PartialEq)]
enum Input {
    Exit,
    Undo,
    Blank,
    Say(String),
}

fn parse_input(line: &str) -> Input {
    match line.trim() {
        "" => Input::Blank,
        "/exit" | "/quit" | "exit" => Input::Exit,
        "/undo" => Input::Undo,
        text => Input::Say(text.to_string()),
    }
}

/// An orchestrator over the chat registry with a fresh in-memory history.
pub fn build_orchestrator(
    config: &AppConfig,
    registries: &ModelRegistries,
    gate: Arc<dyn CompactionGate>,
) -> TurnOrchestrator {
    TurnOrchestrator::new(
        registries.chat.clone(),
        Arc::new(ConversationHistory::in_memory()),
        RequestAssembler::without_providers(),
    )
    .with_compaction(CompactionSettings {
        auto_compact: config.compaction.auto_compact,
        threshold: config.compaction.threshold,
    })
    .with_gate(gate)
}

/// Routes Ctrl+C for the whole session: it cancels the turn in flight, or
/// exits when there is none.
#[derive(Default)]
struct Interrupts {
    in_flight: std::sync::Mutex<Option<CancellationToken>>,
}

impl Interrupts {
    /// Install the session's single SIGINT listener.
    fn install() -> Arc<Self> {
        let interrupts = Arc::new(Self::default());
        let listener = interrupts.clone();
        tokio::spawn(async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                if !listener.interrupt() {
                    println!();
                    std::process::exit(130);
                }
            }
        });
        interrupts
    }

    /// A fresh abort token registered as the turn in flight.
    fn begin(&self) -> CancellationToken {
        let token = CancellationToken::new();
        *self.lock() = Some(token.clone());
        token
    }

    fn finish(&self) {
        self.lock().take();
    }

    /// Cancel the turn in flight; `false` when idle.
    fn interrupt(&self) -> bool {
        match self.lock().take() {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<CancellationToken>> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Run one turn, abortable through `interrupts`.
async fn send(
    orchestrator: &TurnOrchestrator,
    interrupts: &Interrupts,
    config: &AppConfig,
    model: &str,
    text: String,
) -> switchyard_core::Result<TurnOutcome> {
    let request = TurnRequest::new(model, TurnConfig::from_chat_config(&config.chat, text))
        .with_abort(interrupts.begin());
    let result = orchestrator.run_turn(request).await;
    interrupts.finish();
    result
}

fn print_reply(outcome: &TurnOutcome) {
    println!();
    for line in outcome.text.lines() {
        println!("  Assistant > {line}");
    }
    let response = outcome.exchange.response.as_ref();
    if let Some(error) = response.and_then(|r| r.error.as_deref()) {
        println!("  (the model reported an error: {error}; it will not see this reply again)");
    }
    if outcome.compacted.is_some() {
        println!("  (conversation compacted; /undo restores the full history)");
    }
    println!();
}

pub async fn run(
    config: &AppConfig,
    model: Option<String>,
    message: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let registries = build_registries(config)?;
    let model = model.unwrap_or_else(|| config.default_model.clone());
    let terminal = Arc::new(Terminal::new());
    let gate = Arc::new(StdinGate {
        terminal: terminal.clone(),
    });
    let orchestrator = build_orchestrator(config, &registries, gate);
    let interrupts = Interrupts::install();

    if let Some(msg) = message {
        // Single message mode
        let outcome = send(&orchestrator, &interrupts, config, &model, msg).await?;
        println!("{}", outcome.text);
        return Ok(());
    }

    println!();
    println!("  Switchyard chat");
    println!();
    println!("  Requirement: {model}");
    println!("  Models:      {}", registries.chat.list_names().join(", "));
    println!();
    println!("  Type your message and press Enter.");
    println!("  /undo reverts the last turn, /exit quits.");
    println!();

    while let Some(line) = terminal.prompt("  You > ").await? {
        match parse_input(&line) {
            Input::Blank => continue,
            Input::Exit => break,
            Input::Undo => match orchestrator.history().undo() {
                Some(current) => println!("  Undone. Now at exchange {}.", current.id),
                None => println!("  Undone. The conversation is empty."),
            },
            Input::Say(text) => match send(&orchestrator, &interrupts, config, &model, text).await {
                Ok(outcome) => print_reply(&outcome),
                Err(e) => {
                    eprintln!("  [Error] {e}");
                    println!();
                }
            },
        }
    }

    println!();
    println!("  Goodbye!");
    println!();
    Ok(())
}
