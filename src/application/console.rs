use crate::application::focus_timer::{SessionReviewer, TimerCommand};
use crate::application::forms::{SessionReviewForm, parse_rating};
use crate::domain::models::EndFocusSession;
use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, warn};

const RATING_ATTEMPTS: usize = 3;

pub type PromptWriter = Arc<dyn Fn(&str) + Send + Sync>;

/// Splits console lines between the running timer and the review prompt.
/// While a review is open every line is an answer; otherwise `p`, `r` and
/// `s` drive the timer.
pub struct ConsoleRouter {
    commands: mpsc::Sender<TimerCommand>,
    answers: mpsc::Sender<String>,
    awaiting_review: Arc<AtomicBool>,
}

pub struct PromptReviewer {
    answers: Mutex<mpsc::Receiver<String>>,
    awaiting_review: Arc<AtomicBool>,
    write_prompt: PromptWriter,
}

pub fn console_channels(
    capacity: usize,
    write_prompt: PromptWriter,
) -> (ConsoleRouter, mpsc::Receiver<TimerCommand>, PromptReviewer) {
    let (command_sender, command_receiver) = mpsc::channel(capacity);
    let (answer_sender, answer_receiver) = mpsc::channel(capacity);
    let awaiting_review = Arc::new(AtomicBool::new(false));

    let router = ConsoleRouter {
        commands: command_sender,
        answers: answer_sender,
        awaiting_review: Arc::clone(&awaiting_review),
    };
    let reviewer = PromptReviewer {
        answers: Mutex::new(answer_receiver),
        awaiting_review,
        write_prompt,
    };
    (router, command_receiver, reviewer)
}

pub fn parse_timer_command(line: &str) -> Option<TimerCommand> {
    match line.trim().to_ascii_lowercase().as_str() {
        "p" | "pause" => Some(TimerCommand::Pause),
        "r" | "resume" => Some(TimerCommand::Resume),
        "s" | "stop" | "q" | "quit" => Some(TimerCommand::Stop),
        _ => None,
    }
}

impl ConsoleRouter {
    /// Returns false once the receiving side is gone.
    pub async fn route(&self, line: &str) -> bool {
        if self.awaiting_review.load(Ordering::SeqCst) {
            return self.answers.send(line.trim().to_string()).await.is_ok();
        }
        match parse_timer_command(line) {
            Some(command) => self.send_command(command).await,
            None => {
                debug!(line, "ignoring console input");
                true
            }
        }
    }

    pub async fn send_command(&self, command: TimerCommand) -> bool {
        self.commands.send(command).await.is_ok()
    }
}

impl PromptReviewer {
    async fn next_answer(&self) -> Option<String> {
        self.answers.lock().await.recv().await
    }

    async fn ask_rating(&self) -> Option<u8> {
        for _ in 0..RATING_ATTEMPTS {
            (self.write_prompt)("Productivity rating 1-5 (blank to skip): ");
            let answer = self.next_answer().await?;
            match parse_rating(&answer) {
                Ok(rating) => return rating,
                Err(message) => (self.write_prompt)(&format!("{message}\n")),
            }
        }
        None
    }
}

#[async_trait]
impl SessionReviewer for PromptReviewer {
    async fn review(&self, session_id: &str) -> EndFocusSession {
        self.awaiting_review.store(true, Ordering::SeqCst);
        (self.write_prompt)("\nSession complete.\n");

        let rating = self.ask_rating().await;
        (self.write_prompt)("Notes (blank to skip): ");
        let notes = self.next_answer().await.unwrap_or_default();
        self.awaiting_review.store(false, Ordering::SeqCst);

        let form = SessionReviewForm { rating, notes };
        form.validate().unwrap_or_else(|message| {
            warn!(session_id, %message, "dropping notes from review");
            EndFocusSession {
                productivity_rating: rating,
                notes: None,
            }
        })
    }
}
