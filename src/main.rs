//! coach-chat - terminal client for the homeownership coach
//!
//! Each input line is one turn. Replies stream to stdout as they arrive;
//! Ctrl-C aborts the reply in flight, or exits when idle.

use async_trait::async_trait;
use coach_chat::client::{fallback_questions, LoggingBackend};
use coach_chat::{
    classify, ChatBackend, ChatError, ChatEventHandler, ChatRequest, ChatSession, ClientConfig,
    CoachApi, MarketplaceClient, StreamOutcome, StreamingChatClient, TurnOutcome,
};
use std::io::Write;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let config = ClientConfig::from_env();
    tracing::info!(
        base_url = %config.base_url,
        persona = %config.persona_id,
        "Starting coach chat"
    );

    let backend = Echo(LoggingBackend::new(StreamingChatClient::new(&config)?));
    let marketplace = MarketplaceClient::new(config.clone())?;
    let mut session = ChatSession::new(backend, config.persona_id.clone());

    print_starter_questions(&marketplace, session.persona_id()).await;

    // Ctrl-C cancels the turn in flight; with none in flight it ends the loop
    let in_flight: Arc<Mutex<Option<CancellationToken>>> = Arc::new(Mutex::new(None));
    let shutdown = CancellationToken::new();
    tokio::spawn(watch_interrupts(Arc::clone(&in_flight), shutdown.clone()));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        prompt(session.persona_id());
        let line = tokio::select! {
            () = shutdown.cancelled() => break,
            line = lines.next_line() => match line? {
                Some(line) => line,
                None => break,
            },
        };

        match Command::parse(&line) {
            Command::Quit => break,
            Command::Clear => {
                session.clear();
                println!("(conversation cleared)");
            }
            Command::Persona(Some(id)) => {
                if session.switch_persona(id) {
                    println!("(now chatting as {id})");
                    print_starter_questions(&marketplace, id).await;
                }
            }
            Command::Persona(None) => println!("usage: /persona <id>"),
            Command::Empty => {}
            Command::Say(text) => {
                let cancel = CancellationToken::new();
                set_in_flight(&in_flight, Some(cancel.clone()));
                let report = session.send_message(text, &cancel).await;
                set_in_flight(&in_flight, None);

                let Ok(report) = report else { continue };
                println!();
                match &report.outcome {
                    TurnOutcome::Completed => {}
                    TurnOutcome::Cancelled => println!("(cancelled)"),
                    TurnOutcome::Failed(_) => {
                        if let Some(message) = session.store().get(&report.message_id) {
                            println!("{}", message.content);
                        }
                    }
                }
                print_turn_summary(&session, &report.message_id);
            }
        }
    }

    tracing::info!("Coach chat exiting");
    Ok(())
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "coach_chat=info".into());
    let json = std::env::var("COACH_LOG_JSON").is_ok_and(|v| v == "1");

    // Logs go to stderr so they never interleave with the reply on stdout
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(false)
                    .with_span_list(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

async fn watch_interrupts(in_flight: Arc<Mutex<Option<CancellationToken>>>, shutdown: CancellationToken) {
    while tokio::signal::ctrl_c().await.is_ok() {
        let current = in_flight.lock().ok().and_then(|slot| slot.clone());
        match current {
            Some(token) => {
                tracing::debug!("Interrupt: cancelling current turn");
                token.cancel();
            }
            None => {
                shutdown.cancel();
                return;
            }
        }
    }
}

fn set_in_flight(slot: &Mutex<Option<CancellationToken>>, token: Option<CancellationToken>) {
    if let Ok(mut slot) = slot.lock() {
        *slot = token;
    }
}

fn prompt(persona_id: &str) {
    print!("[{persona_id}] > ");
    let _ = std::io::stdout().flush();
}

async fn print_starter_questions(marketplace: &impl CoachApi, persona_id: &str) {
    let questions = match marketplace.get_personalized_questions(persona_id, &[]).await {
        Ok(questions) if !questions.is_empty() => questions,
        Ok(_) => fallback_questions(),
        Err(e) => {
            tracing::debug!(error = %e, "Using fallback starter questions");
            fallback_questions()
        }
    };
    println!("Try asking:");
    for question in questions {
        println!("  - {question}");
    }
}

fn print_turn_summary<B: ChatBackend>(session: &ChatSession<B>, message_id: &coach_chat::MessageId) {
    let store = session.store();
    if let Some(result) = store
        .get(message_id)
        .and_then(|m| m.calculation_result.as_ref())
    {
        let kinds: Vec<&str> = result.kinds().into_iter().map(|k| k.label()).collect();
        let primary = classify(result).map_or("unknown", |k| k.label());
        println!("  calculation: {primary} ({})", kinds.join(", "));
    }
    if !store.suggested_follow_ups().is_empty() {
        println!("  follow-ups:");
        for suggestion in store.suggested_follow_ups() {
            println!("    * {suggestion}");
        }
    }
}

// ============================================================================
// Input
// ============================================================================

#[derive(Debug, PartialEq, Eq)]
enum Command<'a> {
    Say(&'a str),
    Persona(Option<&'a str>),
    Clear,
    Quit,
    Empty,
}

impl<'a> Command<'a> {
    fn parse(line: &'a str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return Command::Empty;
        }
        let mut words = line.splitn(2, char::is_whitespace);
        match words.next() {
            Some("/quit" | "/exit") => Command::Quit,
            Some("/clear") => Command::Clear,
            Some("/persona") => Command::Persona(words.next().map(str::trim).filter(|s| !s.is_empty())),
            _ => Command::Say(line),
        }
    }
}

// ============================================================================
// Echo
// ============================================================================

/// Prints text deltas to stdout on their way to the session
struct Echo<B>(B);

struct EchoHandler<'a> {
    inner: &'a mut dyn ChatEventHandler,
}

impl ChatEventHandler for EchoHandler<'_> {
    fn on_chunk(&mut self, delta: &str) {
        let mut stdout = std::io::stdout();
        let _ = stdout.write_all(delta.as_bytes());
        let _ = stdout.flush();
        self.inner.on_chunk(delta);
    }

    fn on_calculation(&mut self, result: coach_chat::CalculationResult) {
        self.inner.on_calculation(result);
    }

    fn on_suggestions(&mut self, suggestions: Vec<String>) {
        self.inner.on_suggestions(suggestions);
    }

    fn on_error(&mut self, error: &ChatError) {
        self.inner.on_error(error);
    }

    fn on_done(&mut self) {
        self.inner.on_done();
    }
}

#[async_trait]
impl<B: ChatBackend> ChatBackend for Echo<B> {
    async fn send(
        &self,
        request: &ChatRequest,
        handler: &mut dyn ChatEventHandler,
        cancel: &CancellationToken,
    ) -> Result<StreamOutcome, ChatError> {
        let mut echo = EchoHandler { inner: handler };
        self.0.send(request, &mut echo, cancel).await
    }
}
