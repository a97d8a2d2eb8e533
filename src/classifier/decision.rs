// src/classifier/decision.rs
//
// Gray-zone labelers used in data-collection mode.

use log::{info, warn};
use std::collections::HashMap;
use std::io::{self, BufRead, Write};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use crate::matching::deep::SharedField;
use crate::models::matching::Label;

/// Everything a labeler sees about a pair waiting for review.
#[derive(Debug, Clone)]
pub struct ReviewContext<'a> {
    pub left_id: &'a str,
    pub right_id: &'a str,
    pub summed_error: f64,
    pub shared_fields: Vec<SharedField<'a>>,
    /// Pairs processed so far and the total, for progress display.
    pub position: usize,
    pub total: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Label(Label),
    /// Leave the pair unlabeled.
    Defer,
    /// Stop asking; every remaining gray-zone pair is deferred.
    Abort,
}

pub trait DecisionProvider: Send {
    fn decide(&mut self, context: &ReviewContext<'_>) -> Decision;
}

/// Always gives the same answer. `FixedDecision::defer()` mirrors having no labeler.
#[derive(Debug, Clone, Copy)]
pub struct FixedDecision(pub Decision);

impl FixedDecision {
    pub fn accept_all() -> Self {
        Self(Decision::Label(Label::Duplicate))
    }

    pub fn reject_all() -> Self {
        Self(Decision::Label(Label::Unique))
    }

    pub fn defer() -> Self {
        Self(Decision::Defer)
    }
}

impl DecisionProvider for FixedDecision {
    fn decide(&mut self, _context: &ReviewContext<'_>) -> Decision {
        self.0
    }
}

/// Pre-recorded answers keyed by unordered id pair. Unknown pairs are deferred.
#[derive(Debug, Clone, Default)]
pub struct RecordedDecisions {
    answers: HashMap<(String, String), Label>,
    asked: Vec<(String, String)>,
}

impl RecordedDecisions {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(a: &str, b: &str) -> (String, String) {
        if a <= b {
            (a.to_string(), b.to_string())
        } else {
            (b.to_string(), a.to_string())
        }
    }

    pub fn with_answer(mut self, left_id: &str, right_id: &str, label: Label) -> Self {
        self.answers.insert(Self::key(left_id, right_id), label);
        self
    }

    /// Pairs the provider was consulted about, in order.
    pub fn asked(&self) -> &[(String, String)] {
        &self.asked
    }
}

impl DecisionProvider for RecordedDecisions {
    fn decide(&mut self, context: &ReviewContext<'_>) -> Decision {
        let key = Self::key(context.left_id, context.right_id);
        let decision = match self.answers.get(&key) {
            Some(label) => Decision::Label(*label),
            None => Decision::Defer,
        };
        self.asked.push(key);
        decision
    }
}

/// Asks a human on the console. Input is read on a dedicated thread so a
/// review can time out; a timed-out pair is deferred and end of input aborts.
pub struct InteractiveReviewer {
    timeout: Option<Duration>,
    lines: Receiver<String>,
}

impl InteractiveReviewer {
    pub fn new(timeout: Option<Duration>) -> Self {
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let stdin = io::stdin();
            for line in stdin.lock().lines() {
                match line {
                    Ok(l) => {
                        if tx.send(l).is_err() {
                            break;
                        }
                    }
                    Err(_) => break,
                }
            }
        });
        Self { timeout, lines: rx }
    }

    fn print_context(context: &ReviewContext<'_>) {
        println!("\n{}", "=".repeat(72));
        println!(
            "Pair {}/{}: {} <-> {}   (summed field error {:.3})",
            context.position, context.total, context.left_id, context.right_id, context.summed_error
        );
        println!("{}", "-".repeat(72));
        for field in &context.shared_fields {
            println!("{:<14} | {}", field.name, field.left);
            println!("{:<14} | {}", "", field.right);
        }
        println!("{}", "-".repeat(72));
    }

    fn next_line(&self) -> Result<String, RecvTimeoutError> {
        match self.timeout {
            Some(t) => self.lines.recv_timeout(t),
            None => self
                .lines
                .recv()
                .map_err(|_| RecvTimeoutError::Disconnected),
        }
    }
}

impl DecisionProvider for InteractiveReviewer {
    fn decide(&mut self, context: &ReviewContext<'_>) -> Decision {
        Self::print_context(context);
        loop {
            print!("Duplicate? (y)es, (n)o, (s)kip, (q)uit: ");
            let _ = io::stdout().flush();

            match self.next_line() {
                Ok(line) => match line.trim().to_lowercase().as_str() {
                    "y" | "yes" => return Decision::Label(Label::Duplicate),
                    "n" | "no" => return Decision::Label(Label::Unique),
                    "s" | "skip" => return Decision::Defer,
                    "q" | "quit" => {
                        info!("Reviewer quit; remaining gray-zone pairs will be deferred");
                        return Decision::Abort;
                    }
                    other => println!("Unrecognised answer {:?}", other),
                },
                Err(RecvTimeoutError::Timeout) => {
                    warn!(
                        "No answer for {} <-> {} within the review timeout; deferring",
                        context.left_id, context.right_id
                    );
                    return Decision::Defer;
                }
                Err(RecvTimeoutError::Disconnected) => {
                    warn!("Console input closed; stopping review");
                    return Decision::Abort;
                }
            }
        }
    }
}
