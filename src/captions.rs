//! Caption normalization and selection.
//!
//! A photo can carry the same text in several metadata fields (`Title`,
//! `ObjectName`, `Headline`, …), often with different casing or stray
//! whitespace. [`normalize_captions`] reduces them to a clean candidate list;
//! [`select_caption`] picks one.
//!
//! Picking between genuinely different candidates is the only place a human
//! can be asked anything. That decision sits behind [`CaptionChooser`] so the
//! rest of the pipeline never touches the console:
//!
//! - [`FirstCaption`]: always the first candidate. Used for automation.
//! - [`PromptCaption`]: lists the candidates and reads a choice from any
//!   `BufRead`. Empty or unrecognised input means the first candidate.

use std::collections::HashSet;
use std::io::{self, BufRead, Write};
use std::path::Path;

/// Trim, drop empties, and remove case-insensitive duplicates, keeping the
/// first-seen spelling and order.
pub fn normalize_captions<I, S>(raw: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for item in raw {
        let trimmed = item.as_ref().trim();
        if trimmed.is_empty() {
            continue;
        }
        if seen.insert(trimmed.to_lowercase()) {
            out.push(trimmed.to_string());
        }
    }
    out
}

/// Policy for choosing among two or more caption candidates.
pub trait CaptionChooser {
    /// `candidates` always holds at least two entries. Returns an index into it.
    fn choose(&mut self, source: &Path, candidates: &[String]) -> usize;
}

/// Non-interactive policy: the first candidate wins.
#[derive(Debug, Default, Clone, Copy)]
pub struct FirstCaption;

impl CaptionChooser for FirstCaption {
    fn choose(&mut self, _source: &Path, _candidates: &[String]) -> usize {
        0
    }
}

/// Interactive policy: print numbered options and read a 1-based choice.
pub struct PromptCaption<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> PromptCaption<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    fn prompt(&mut self, source: &Path, candidates: &[String]) -> io::Result<String> {
        writeln!(self.output, "Captions for {}:", source.display())?;
        for (i, c) in candidates.iter().enumerate() {
            writeln!(self.output, "  [{}] {}", i + 1, c)?;
        }
        write!(self.output, "Choose caption [1]: ")?;
        self.output.flush()?;
        let mut line = String::new();
        self.input.read_line(&mut line)?;
        Ok(line)
    }
}

impl PromptCaption<io::StdinLock<'static>, io::Stdout> {
    /// Prompt on the process console.
    pub fn console() -> Self {
        Self::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> CaptionChooser for PromptCaption<R, W> {
    fn choose(&mut self, source: &Path, candidates: &[String]) -> usize {
        let answer = match self.prompt(source, candidates) {
            Ok(line) => line,
            Err(e) => {
                log::warn!("caption prompt failed for {}: {e}", source.display());
                return 0;
            }
        };
        match answer.trim().parse::<usize>() {
            Ok(n) if (1..=candidates.len()).contains(&n) => n - 1,
            _ => 0,
        }
    }
}

/// Pick one caption: none for zero candidates, the only one for one, the
/// chooser's pick otherwise.
pub fn select_caption(
    chooser: &mut dyn CaptionChooser,
    source: &Path,
    candidates: &[String],
) -> Option<String> {
    match candidates {
        [] => None,
        [only] => Some(only.clone()),
        many => {
            let idx = chooser.choose(source, many).min(many.len() - 1);
            Some(many[idx].clone())
        }
    }
}
