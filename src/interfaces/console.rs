use crate::domain::ports::{Confirm, NoticeId, NoticeKind, Notifier};
use async_trait::async_trait;
use std::io::{self, BufRead, Write};
use std::sync::atomic::{AtomicU64, Ordering};

/// Prints notifications to stderr so stdout stays machine-readable.
#[derive(Default)]
pub struct ConsoleNotifier {
    next_id: AtomicU64,
}

impl ConsoleNotifier {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Notifier for ConsoleNotifier {
    fn notify(&self, kind: NoticeKind, message: &str) {
        let prefix = match kind {
            NoticeKind::Info => "",
            NoticeKind::Positive => "OK: ",
            NoticeKind::Warning => "WARNING: ",
            NoticeKind::Negative => "ERROR: ",
        };
        eprintln!("{prefix}{message}");
    }

    fn show_waiting(&self, message: &str) -> NoticeId {
        eprintln!("{message}");
        NoticeId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    fn dismiss(&self, _id: NoticeId) {}
}

/// Asks on the terminal; anything but `y`/`yes` declines.
pub struct PromptConfirm;

#[async_trait]
impl Confirm for PromptConfirm {
    async fn confirm(&self, prompt: &str) -> bool {
        let prompt = prompt.to_string();
        tokio::task::spawn_blocking(move || {
            eprint!("{prompt} [y/N] ");
            io::stderr().flush().ok();
            let mut answer = String::new();
            io::stdin().lock().read_line(&mut answer).ok();
            is_yes(&answer)
        })
        .await
        .unwrap_or(false)
    }
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}
