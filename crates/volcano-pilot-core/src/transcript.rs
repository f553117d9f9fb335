//! Command transcript and recall history for the remote terminal.
//!
//! The transcript interleaves what the operator typed with what the agent
//! logged. Polled log output does not append: each non-empty poll *replaces*
//! everything after the most recent command with a single output entry, so
//! the transcript reads command, latest-output, command, latest-output
//! rather than accumulating every poll.

use chrono::Local;

use crate::constants::COMMAND_HISTORY_CAP;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    /// A command the operator submitted, echoed optimistically.
    Command,
    /// Agent log output.
    Output,
    /// A failure surfaced inline.
    Error,
    /// Console annotations (auto-poll toggled, transcript cleared).
    Info,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptLine {
    pub kind: LineKind,
    pub text: String,
    /// Wall-clock stamp captured when the line was appended.
    pub stamp: String,
}

fn now_stamp() -> String {
    Local::now().format("%H:%M:%S").to_string()
}

#[derive(Debug, Clone, Default)]
pub struct Transcript {
    lines: Vec<TranscriptLine>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> &[TranscriptLine] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    fn push(&mut self, kind: LineKind, text: String) {
        self.lines.push(TranscriptLine {
            kind,
            text,
            stamp: now_stamp(),
        });
    }

    /// Echoes a submitted command before the gateway answers.
    pub fn push_command(&mut self, command: &str) {
        self.push(LineKind::Command, format!("$ {command}"));
    }

    pub fn push_output(&mut self, text: &str) {
        self.push(LineKind::Output, text.to_string());
    }

    pub fn push_error(&mut self, text: &str) {
        self.push(LineKind::Error, text.to_string());
    }

    pub fn push_info(&mut self, text: &str) {
        self.push(LineKind::Info, text.to_string());
    }

    /// Installs polled log output: drops everything after the most recent
    /// command and appends `text` as the single output entry. With no
    /// command in the transcript the whole thing is replaced. Empty polls
    /// change nothing.
    pub fn replace_tail_output(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        match self
            .lines
            .iter()
            .rposition(|line| line.kind == LineKind::Command)
        {
            Some(last_command) => self.lines.truncate(last_command + 1),
            None => self.lines.clear(),
        }
        self.push(LineKind::Output, text.to_string());
    }

    /// Wipes the transcript, leaving a single annotation so the view is
    /// visibly intentional rather than broken.
    pub fn clear(&mut self) {
        self.lines.clear();
        self.push_info("Transcript cleared");
    }
}

/// Recall ring for submitted commands, most recent first.
#[derive(Debug, Clone, Default)]
pub struct CommandHistory {
    entries: Vec<String>,
    cursor: Option<usize>,
}

impl CommandHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Records a submitted command and resets the recall cursor.
    pub fn push(&mut self, command: &str) {
        self.entries.insert(0, command.to_string());
        self.entries.truncate(COMMAND_HISTORY_CAP);
        self.cursor = None;
    }

    /// Steps to the next-older command. At the oldest entry it stays put.
    pub fn prev(&mut self) -> Option<&str> {
        if self.entries.is_empty() {
            return None;
        }
        let index = match self.cursor {
            None => 0,
            Some(at) if at + 1 < self.entries.len() => at + 1,
            Some(at) => at,
        };
        self.cursor = Some(index);
        self.entries.get(index).map(String::as_str)
    }

    /// Steps back toward the newest command. Past the newest entry the
    /// prompt should be restored to empty, signalled by `None`.
    pub fn next(&mut self) -> Option<&str> {
        match self.cursor {
            None => None,
            Some(0) => {
                self.cursor = None;
                None
            }
            Some(at) => {
                self.cursor = Some(at - 1);
                self.entries.get(at - 1).map(String::as_str)
            }
        }
    }

    pub fn reset_cursor(&mut self) {
        self.cursor = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(transcript: &Transcript) -> Vec<LineKind> {
        transcript.lines().iter().map(|line| line.kind).collect()
    }

    #[test]
    fn commands_echo_with_a_prompt() {
        let mut transcript = Transcript::new();
        transcript.push_command("nvidia-smi");
        assert_eq!(transcript.lines()[0].text, "$ nvidia-smi");
        assert_eq!(transcript.lines()[0].kind, LineKind::Command);
        assert!(!transcript.lines()[0].stamp.is_empty());
    }

    #[test]
    fn polls_collapse_into_one_output_entry() {
        let mut transcript = Transcript::new();
        transcript.push_command("tail -f job.log");
        transcript.replace_tail_output("epoch 1");
        transcript.replace_tail_output("epoch 1\nepoch 2");

        assert_eq!(kinds(&transcript), [LineKind::Command, LineKind::Output]);
        assert_eq!(transcript.lines()[1].text, "epoch 1\nepoch 2");
    }

    #[test]
    fn poll_replaces_errors_after_the_command_too() {
        let mut transcript = Transcript::new();
        transcript.push_command("run.sh");
        transcript.push_error("gateway timeout");
        transcript.replace_tail_output("job started");

        assert_eq!(kinds(&transcript), [LineKind::Command, LineKind::Output]);
    }

    #[test]
    fn empty_poll_changes_nothing() {
        let mut transcript = Transcript::new();
        transcript.push_command("ls");
        transcript.replace_tail_output("files");
        let before = transcript.lines().to_vec();
        transcript.replace_tail_output("");
        assert_eq!(transcript.lines(), before.as_slice());
    }

    #[test]
    fn poll_without_any_command_replaces_the_whole_transcript() {
        let mut transcript = Transcript::new();
        transcript.push_info("Auto-refresh enabled (2s)");
        transcript.replace_tail_output("agent booted");

        assert_eq!(kinds(&transcript), [LineKind::Output]);
    }

    #[test]
    fn earlier_exchanges_are_untouched_by_polls() {
        let mut transcript = Transcript::new();
        transcript.push_command("first");
        transcript.replace_tail_output("first output");
        transcript.push_command("second");
        transcript.replace_tail_output("second output");

        assert_eq!(
            kinds(&transcript),
            [
                LineKind::Command,
                LineKind::Output,
                LineKind::Command,
                LineKind::Output
            ]
        );
        assert_eq!(transcript.lines()[0].text, "$ first");
        assert_eq!(transcript.lines()[1].text, "first output");
    }

    #[test]
    fn clear_leaves_a_single_annotation() {
        let mut transcript = Transcript::new();
        transcript.push_command("ls");
        transcript.push_output("files");
        transcript.clear();

        assert_eq!(kinds(&transcript), [LineKind::Info]);
    }

    #[test]
    fn history_is_bounded() {
        let mut history = CommandHistory::new();
        for i in 0..60 {
            history.push(&format!("cmd {i}"));
        }
        assert_eq!(history.len(), COMMAND_HISTORY_CAP);
        // Newest first; the oldest ten fell off.
        assert_eq!(history.entries()[0], "cmd 59");
        assert_eq!(history.entries().last().map(String::as_str), Some("cmd 10"));
    }

    #[test]
    fn recall_walks_newest_to_oldest_and_back() {
        let mut history = CommandHistory::new();
        history.push("alpha");
        history.push("beta");
        history.push("gamma");

        assert_eq!(history.prev(), Some("gamma"));
        assert_eq!(history.prev(), Some("beta"));
        assert_eq!(history.prev(), Some("alpha"));
        // Pinned at the oldest.
        assert_eq!(history.prev(), Some("alpha"));

        assert_eq!(history.next(), Some("beta"));
        assert_eq!(history.next(), Some("gamma"));
        // Walking past the newest restores an empty prompt.
        assert_eq!(history.next(), None);
        assert_eq!(history.next(), None);
    }

    #[test]
    fn push_resets_the_recall_cursor() {
        let mut history = CommandHistory::new();
        history.push("alpha");
        history.push("beta");
        assert_eq!(history.prev(), Some("beta"));

        history.push("gamma");
        assert_eq!(history.prev(), Some("gamma"));
    }

    #[test]
    fn recall_on_empty_history_is_silent() {
        let mut history = CommandHistory::new();
        assert_eq!(history.prev(), None);
        assert_eq!(history.next(), None);
    }
}
