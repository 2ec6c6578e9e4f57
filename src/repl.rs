//! The read-evaluate-print loop shared by the programs.

use std::{fmt::Display, future::Future, io};

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader, Lines, Stdin};

pub const DEFAULT_EXIT_WORDS: [&str; 3] = ["quit", "exit", "q"];
pub const GOODBYE: &str = "Goodbye!";

pub struct Repl<R> {
    lines: Lines<BufReader<R>>,
    prompt: String,
    goodbye: String,
    exit_words: Vec<String>,
}

impl Repl<Stdin> {
    pub fn stdin(prompt: impl Into<String>) -> Self {
        Self::new(tokio::io::stdin(), prompt)
    }
}

impl<R: AsyncRead + Unpin> Repl<R> {
    pub fn new(reader: R, prompt: impl Into<String>) -> Self {
        Self {
            lines: BufReader::new(reader).lines(),
            prompt: prompt.into(),
            goodbye: GOODBYE.to_owned(),
            exit_words: DEFAULT_EXIT_WORDS.map(String::from).to_vec(),
        }
    }

    pub fn goodbye(mut self, goodbye: impl Into<String>) -> Self {
        self.goodbye = goodbye.into();
        self
    }

    pub fn exit_words(mut self, words: &[&str]) -> Self {
        self.exit_words = words.iter().map(|word| (*word).to_owned()).collect();
        self
    }

    pub fn is_exit(&self, input: &str) -> bool {
        self.exit_words
            .iter()
            .any(|word| word.eq_ignore_ascii_case(input.trim()))
    }

    /// Show `prompt` and read one trimmed line. `None` on end of input or Ctrl-C.
    pub async fn read_line(&mut self, prompt: &str) -> io::Result<Option<String>> {
        let mut stdout = tokio::io::stdout();
        stdout.write_all(prompt.as_bytes()).await?;
        stdout.flush().await?;

        tokio::select! {
            line = self.lines.next_line() => Ok(line?.map(|line| line.trim().to_owned())),
            _ = tokio::signal::ctrl_c() => {
                println!();
                Ok(None)
            }
        }
    }

    /// Feed every non-empty line to `handler` until an exit word, end of input or Ctrl-C.
    /// Handler errors are printed and the loop carries on.
    pub async fn run<F, Fut, E>(mut self, mut handler: F) -> io::Result<()>
    where
        F: FnMut(String) -> Fut,
        Fut: Future<Output = Result<(), E>>,
        E: Display,
    {
        let prompt = self.prompt.clone();
        while let Some(input) = self.read_line(&prompt).await? {
            if input.is_empty() {
                continue;
            }
            if self.is_exit(&input) {
                break;
            }
            if let Err(err) = handler(input).await {
                println!("❌ Error: {err}");
            }
        }
        println!("{}", self.goodbye);
        Ok(())
    }
}
