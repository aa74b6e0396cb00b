// Interactive question loop


use std::io::{BufRead, Write};

use async_trait::async_trait;
use tracing::{debug, error};

use crate::Result;
use crate::chain::Answer;

/// Typing this (in any case) ends the session
pub const EXIT_COMMAND: &str = "exit";

const PROMPT: &str = "Your question: ";

/// Anything that can answer a free-text question, usually a [`crate::chain::RetrievalChain`]
#[async_trait]
pub trait QuestionAnswerer: Send + Sync {
    async fn answer(&self, question: &str) -> Result<Answer>;
}

/// Counters for a finished session
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SessionStats {
    pub answered: usize,
    pub failed: usize,
}

#[inline]
pub fn is_exit_command(line: &str) -> bool {
    line.trim().eq_ignore_ascii_case(EXIT_COMMAND)
}

#[inline]
pub fn write_banner<W: Write>(output: &mut W) -> Result<()> {
    writeln!(output)?;
    writeln!(output, "###########################################")?;
    writeln!(output, "AI RAG Assistant is ready! Ask your question.")?;
    writeln!(output, "Type '{}' to quit.", EXIT_COMMAND)?;
    writeln!(output, "###########################################")?;
    Ok(())
}

/// Read questions from `input` until `exit` or end of input, writing answers to `output`.
///
/// A failed question is reported on `output` and the loop carries on with the next one.
#[inline]
pub async fn run_repl<R, W>(
    answerer: &dyn QuestionAnswerer,
    mut input: R,
    mut output: W,
    show_sources: bool,
) -> Result<SessionStats>
where
    R: BufRead + Send,
    W: Write + Send,
{
    let mut stats = SessionStats::default();
    let mut line = String::new();

    loop {
        write!(output, "\n{}", PROMPT)?;
        output.flush()?;

        line.clear();
        if input.read_line(&mut line)? == 0 {
            debug!("End of input, leaving assistant");
            writeln!(output)?;
            break;
        }

        if is_exit_command(&line) {
            break;
        }
        let question = line.trim();
        if question.is_empty() {
            continue;
        }

        match answerer.answer(question).await {
            Ok(answer) => {
                write_answer(&mut output, &answer, show_sources)?;
                stats.answered += 1;
            }
            Err(e) => {
                error!("Question failed: {}", e);
                writeln!(output, "An error occurred: {}", e)?;
                writeln!(
                    output,
                    "Please ensure your OpenAI API key is correct and you have an internet connection."
                )?;
                stats.failed += 1;
            }
        }
    }

    writeln!(output, "Exiting assistant.")?;
    output.flush()?;
    Ok(stats)
}

fn write_answer<W: Write>(output: &mut W, answer: &Answer, show_sources: bool) -> Result<()> {
    writeln!(output, "\nAI Answer:")?;
    writeln!(output, "{}", answer.text.trim())?;

    if show_sources && !answer.sources.is_empty() {
        writeln!(output, "\nSources:")?;
        for (i, source) in answer.sources.iter().enumerate() {
            writeln!(output, "Source {}: {}", i + 1, source.metadata.citation())?;
        }
    }
    Ok(())
}
