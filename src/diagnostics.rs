use std::thread;
use std::thread::JoinHandle;

use anyhow::Context;
use crossbeam_channel::{bounded, Receiver, Sender};
use log::Level;

#[derive(Debug)]
pub(crate) struct Diagnostic {
    level: Level,
    message: String,
}

/// Producer side of the diagnostics channel. Cheap to clone, one clone per worker.
///
/// Workers never write to the log directly, every message goes through the channel and is
/// written by a single consumer thread, one line at a time.
#[derive(Clone, Debug)]
pub(crate) struct Diagnostics {
    sender: Sender<Diagnostic>,
}

impl Diagnostics {
    pub(crate) fn info(&self, message: String) {
        self.send(Level::Info, message)
    }

    pub(crate) fn warn(&self, message: String) {
        self.send(Level::Warn, message)
    }

    pub(crate) fn error(&self, message: String) {
        self.send(Level::Error, message)
    }

    fn send(&self, level: Level, message: String) {
        if let Err(e) = self.sender.send(Diagnostic { level, message }) {
            // consumer is gone
            let diagnostic = e.into_inner();
            log::log!(diagnostic.level, "{}", diagnostic.message);
        }
    }
}

/// Counts of the messages that went through the diagnostics channel
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct DiagnosticSummary {
    pub(crate) warnings: usize,
    pub(crate) errors: usize,
}

pub(crate) struct DiagnosticsConsumer {
    handle: JoinHandle<DiagnosticSummary>,
}

impl DiagnosticsConsumer {
    /// Wait until every [Diagnostics] clone is dropped and all messages are written
    pub(crate) fn finish(self) -> DiagnosticSummary {
        self.handle.join().unwrap_or_else(|_| {
            log::error!("Diagnostics consumer panicked");
            DiagnosticSummary::default()
        })
    }
}

pub(crate) fn channel(capacity: usize) -> Result<(Diagnostics, DiagnosticsConsumer), anyhow::Error> {
    let (sender, receiver) = bounded(capacity);
    let handle = thread::Builder::new()
        .name("diagnostics".to_string())
        .spawn(move || consume(receiver))
        .with_context(|| "spawn diagnostics consumer")?;
    Ok((Diagnostics { sender }, DiagnosticsConsumer { handle }))
}

fn consume(receiver: Receiver<Diagnostic>) -> DiagnosticSummary {
    let mut summary = DiagnosticSummary::default();
    for diagnostic in receiver.iter() {
        match diagnostic.level {
            Level::Error => summary.errors += 1,
            Level::Warn => summary.warnings += 1,
            _ => {}
        }
        log::log!(diagnostic.level, "{}", diagnostic.message);
    }
    summary
}

#[cfg(test)]
mod tests {
    use std::thread;

    use crate::diagnostics::{channel, DiagnosticSummary};

    #[test]
    fn test_counts_from_many_producers() -> Result<(), anyhow::Error> {
        let (diagnostics, consumer) = channel(4)?;
        let mut handles = Vec::new();
        for i in 0..8 {
            let diagnostics = diagnostics.clone();
            handles.push(thread::spawn(move || {
                for j in 0..10 {
                    diagnostics.warn(format!("worker {i}, warning {j}"));
                }
                diagnostics.error(format!("worker {i}, error"));
                diagnostics.info(format!("worker {i}, done"));
            }));
        }
        for handle in handles {
            handle.join().expect("producer panicked");
        }
        drop(diagnostics);
        let summary = consumer.finish();
        assert_eq!(summary, DiagnosticSummary { warnings: 80, errors: 8 });
        Ok(())
    }

    #[test]
    fn test_no_messages() -> Result<(), anyhow::Error> {
        let (diagnostics, consumer) = channel(1)?;
        drop(diagnostics);
        assert_eq!(consumer.finish(), DiagnosticSummary::default());
        Ok(())
    }
}
