use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Write;

use crate::domain::ThreadId;
use crate::images::ImageSource;
use crate::symbolization::Resolver;
use crate::thread::MainThread;

use super::stack_symbol::{symbolicate, StackSymbol};

/// The symbolicated frames of one thread
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Backtrace {
    pub thread: ThreadId,
    pub is_main_thread: bool,
    pub frames: Vec<StackSymbol>,
}

impl Backtrace {
    /// Symbolicate `addresses`, captured on `thread`.
    pub fn new<S: ImageSource>(
        resolver: &Resolver<S>,
        main: &MainThread,
        thread: ThreadId,
        addresses: &[u64],
    ) -> Self {
        Self { thread, is_main_thread: main.is(thread), frames: symbolicate(resolver, addresses) }
    }

    /// Heading printed above the frames.
    #[must_use]
    pub fn label(&self) -> String {
        if self.is_main_thread {
            format!("Thread {} (main thread):", self.thread.0)
        } else {
            format!("Thread {}:", self.thread.0)
        }
    }

    /// Write the report as pretty-printed JSON.
    ///
    /// # Errors
    /// Returns an error if serialization or the write fails
    pub fn export<W: Write>(&self, writer: W) -> Result<()> {
        serde_json::to_writer_pretty(writer, self).context("Failed to write backtrace JSON")?;
        Ok(())
    }
}

impl fmt::Display for Backtrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.label())?;
        for frame in &self.frames {
            writeln!(f, "{frame}")?;
        }
        Ok(())
    }
}
