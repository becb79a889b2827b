//! Callback seam between the stream relay and its consumer

use crate::calculation::CalculationResult;
use crate::wire::ChatError;

/// Receives the events of one chat call, in wire order
///
/// After `on_error` no further method is called for that call.
pub trait ChatEventHandler: Send {
    /// A text delta; concatenating all deltas gives the full reply
    fn on_chunk(&mut self, delta: &str);

    /// A partial calculation result, to be merged rather than replaced
    fn on_calculation(&mut self, _result: CalculationResult) {}

    /// Follow-up suggestions, replacing earlier ones
    fn on_suggestions(&mut self, _suggestions: Vec<String>) {}

    fn on_error(&mut self, _error: &ChatError) {}

    /// The server signalled the end of the reply
    fn on_done(&mut self) {}
}

type ChunkFn<'a> = Box<dyn FnMut(&str) + Send + 'a>;
type CalculationFn<'a> = Box<dyn FnMut(CalculationResult) + Send + 'a>;
type SuggestionsFn<'a> = Box<dyn FnMut(Vec<String>) + Send + 'a>;
type ErrorFn<'a> = Box<dyn FnMut(&ChatError) + Send + 'a>;
type DoneFn<'a> = Box<dyn FnMut() + Send + 'a>;

/// Closure-based handler
///
/// ```ignore
/// let mut reply = String::new();
/// let mut callbacks = ChatCallbacks::new().chunk(|d| reply.push_str(d));
/// client.send(&request, &mut callbacks, &cancel).await?;
/// ```
#[derive(Default)]
pub struct ChatCallbacks<'a> {
    chunk: Option<ChunkFn<'a>>,
    calculation: Option<CalculationFn<'a>>,
    suggestions: Option<SuggestionsFn<'a>>,
    error: Option<ErrorFn<'a>>,
    done: Option<DoneFn<'a>>,
}

impl<'a> ChatCallbacks<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn chunk(mut self, f: impl FnMut(&str) + Send + 'a) -> Self {
        self.chunk = Some(Box::new(f));
        self
    }

    #[must_use]
    pub fn calculation(mut self, f: impl FnMut(CalculationResult) + Send + 'a) -> Self {
        self.calculation = Some(Box::new(f));
        self
    }

    #[must_use]
    pub fn suggestions(mut self, f: impl FnMut(Vec<String>) + Send + 'a) -> Self {
        self.suggestions = Some(Box::new(f));
        self
    }

    #[must_use]
    pub fn error(mut self, f: impl FnMut(&ChatError) + Send + 'a) -> Self {
        self.error = Some(Box::new(f));
        self
    }

    #[must_use]
    pub fn done(mut self, f: impl FnMut() + Send + 'a) -> Self {
        self.done = Some(Box::new(f));
        self
    }
}

impl ChatEventHandler for ChatCallbacks<'_> {
    fn on_chunk(&mut self, delta: &str) {
        if let Some(f) = self.chunk.as_mut() {
            f(delta);
        }
    }

    fn on_calculation(&mut self, result: CalculationResult) {
        if let Some(f) = self.calculation.as_mut() {
            f(result);
        }
    }

    fn on_suggestions(&mut self, suggestions: Vec<String>) {
        if let Some(f) = self.suggestions.as_mut() {
            f(suggestions);
        }
    }

    fn on_error(&mut self, error: &ChatError) {
        if let Some(f) = self.error.as_mut() {
            f(error);
        }
    }

    fn on_done(&mut self) {
        if let Some(f) = self.done.as_mut() {
            f();
        }
    }
}
