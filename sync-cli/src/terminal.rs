//! Line-oriented terminal front end.
//!
//! The terminal plays the editor: it prints what the session shows and turns
//! typed lines into address submissions or field edits.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use sync_client::{EditorFields, Presenter};
use sync_core::{ConnectionEvent, Document, FieldValue, ViewState};
use sync_types::Selection;

/// One parsed input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// `:connect <address>`, or any text while the prompt is showing.
    Connect(String),
    /// `:title <text>`.
    Title(String),
    /// `:select <start> <end>`.
    Select(u32, u32),
    /// `:show`.
    Show,
    /// `:help`.
    Help,
    /// `:quit`.
    Quit,
    /// A line of text appended to the content.
    Append(String),
    /// Unrecognized command.
    Unknown(String),
}

impl Input {
    /// Parse a line typed while `view` is showing.
    pub fn parse(line: &str, view: ViewState) -> Self {
        let Some(command) = line.strip_prefix(':') else {
            return if view == ViewState::AwaitingConnection {
                Input::Connect(line.trim().to_string())
            } else {
                Input::Append(line.to_string())
            };
        };

        let (name, rest) = command
            .split_once(char::is_whitespace)
            .unwrap_or((command, ""));
        let rest = rest.trim();
        match name {
            "c" | "connect" => Input::Connect(rest.to_string()),
            "t" | "title" => Input::Title(rest.to_string()),
            "s" | "select" => {
                let mut bounds = rest.split_whitespace().map(str::parse::<u32>);
                match (bounds.next(), bounds.next(), bounds.next()) {
                    (Some(Ok(start)), Some(Ok(end)), None) => Input::Select(start, end),
                    (Some(Ok(at)), None, None) => Input::Select(at, at),
                    _ => Input::Unknown(line.to_string()),
                }
            }
            "show" => Input::Show,
            "h" | "help" => Input::Help,
            "q" | "quit" => Input::Quit,
            _ => Input::Unknown(line.to_string()),
        }
    }
}

/// Help text for interactive mode.
pub const HELP: &str = "\
Commands:
  :connect <address>   connect to the phone (bare text also works at the prompt)
  :title <text>        rename the document
  :select <start> [end]  move the selection
  :show                print the document
  :quit                exit
Any other line is appended to the document.";

/// State shared by the presenter and the input loop.
#[derive(Debug, Default)]
pub struct Screen {
    editor: EditorFields,
    view: ViewState,
}

/// Shared handle to the screen.
#[derive(Debug, Clone, Default)]
pub struct SharedScreen(Arc<Mutex<Screen>>);

impl SharedScreen {
    fn lock(&self) -> MutexGuard<'_, Screen> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Screen currently showing.
    pub fn view(&self) -> ViewState {
        self.lock().view
    }

    /// Document currently shown.
    pub fn document(&self) -> Document {
        self.lock().editor.current().clone()
    }

    /// Turn an edit command into the field value the editor now holds.
    pub fn edit(&self, input: &Input) -> Option<FieldValue> {
        let mut screen = self.lock();
        let value = match input {
            Input::Title(title) => FieldValue::Title(title.clone()),
            Input::Select(start, end) => FieldValue::Selection(Selection::new(*start, *end)),
            Input::Append(line) => {
                let current = &screen.editor.current().content;
                let content = if current.is_empty() {
                    line.clone()
                } else {
                    format!("{current}\n{line}")
                };
                FieldValue::Content(content)
            }
            _ => return None,
        };
        Some(screen.editor.edit(value))
    }
}

/// Presenter printing to stdout.
#[derive(Debug, Clone)]
pub struct TerminalPresenter {
    screen: SharedScreen,
}

impl TerminalPresenter {
    /// Presenter drawing into `screen`.
    pub fn new(screen: SharedScreen) -> Self {
        Self { screen }
    }
}

impl Presenter for TerminalPresenter {
    fn show_view(&mut self, view: ViewState) {
        self.screen.lock().view = view;
        match view {
            ViewState::AwaitingConnection => {
                println!();
                println!("Not connected. Enter the address shown on the phone:");
            }
            ViewState::Empty => println!("(no document open on the phone)"),
            ViewState::Editing => println!("Editing. Type to append, :help for commands."),
        }
    }

    fn set_window_title(&mut self, title: &str) {
        println!("== {} ==", title);
    }

    fn render(&mut self, document: &Document) -> Vec<FieldValue> {
        let fired = self.screen.lock().editor.apply(document);
        if !document.content.is_empty() {
            print_document(document);
        }
        fired
    }

    fn prefill_address(&mut self, address: &str) {
        println!("  Last used: {} (type it again to reconnect)", address);
    }

    fn connection_changed(&mut self, event: &ConnectionEvent) {
        match event {
            ConnectionEvent::Connected { address } => {
                println!("Connected to {}. Waiting for the document...", address)
            }
            ConnectionEvent::RetryScheduled { address, .. } => {
                println!("Could not reach {}, trying once more...", address)
            }
            ConnectionEvent::ConnectFailed { address, error } => {
                println!("Could not connect to {}: {}", address, error)
            }
            ConnectionEvent::Disconnected { address } => println!("Disconnected from {}", address),
        }
    }
}

/// Print a document with its selection.
pub fn print_document(document: &Document) {
    println!("---");
    println!("{}", document.content);
    println!(
        "--- selection {}..{}",
        document.selection.start, document.selection.end
    );
}
