//! Pipeline logger: an mpsc-backed append-only log of job lifecycle steps,
//! keyed by an arbitrary subject string (a job ID or round ID) rather than
//! a chain tx hash, since not every step here is chain-anchored.

use chrono::Utc;
use eyre::Result;
use std::path::PathBuf;
use tokio::{
    fs::OpenOptions,
    io::AsyncWriteExt,
    sync::mpsc::{self, Sender},
};
use tracing::error;

#[derive(Debug, Clone)]
pub enum PipelineStep {
    EventReceived { kind: String, subject: String },
    JobDispatched { kind: String, subject: String },
    ProofGenerated { circuit: String, duration_ms: u64 },
    TransactionSubmitted { tx_hash: String, method: String },
    TransactionVerified { tx_hash: String, status: String },
    TransactionFailed { subject: String, error: String },
    OcrRoundSealed { round: u64, feed_id: String, count: usize },
    JobDeadLettered { subject: String, reason: String },
}

#[derive(Debug)]
struct LogEvent {
    subject: String,
    step: PipelineStep,
}

#[derive(Clone)]
pub struct PipelineLogger {
    event_sender: Sender<LogEvent>,
    log_path: PathBuf,
}

impl PipelineLogger {
    pub async fn new(file_path: PathBuf) -> Result<Self> {
        let (event_sender, event_receiver) = mpsc::channel(100);
        let writer_path = file_path.clone();

        tokio::spawn(async move {
            if let Err(e) = Self::log_writer(event_receiver, writer_path).await {
                error!("pipeline logger task failed: {}", e);
            }
        });

        Ok(Self {
            event_sender,
            log_path: file_path,
        })
    }

    pub async fn log_step(&self, subject: impl Into<String>, step: PipelineStep) -> Result<()> {
        let event = LogEvent {
            subject: subject.into(),
            step,
        };
        self.event_sender
            .send(event)
            .await
            .map_err(|e| eyre::eyre!("failed to send log event: {e}"))
    }

    async fn log_writer(mut receiver: mpsc::Receiver<LogEvent>, file_path: PathBuf) -> Result<()> {
        while let Some(event) = receiver.recv().await {
            let line = render(&event);
            let mut file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&file_path)
                .await?;
            file.write_all(line.as_bytes()).await?;
        }
        Ok(())
    }
}

fn render(event: &LogEvent) -> String {
    let ts = Utc::now().format("%Y-%m-%d %H:%M:%S");
    match &event.step {
        PipelineStep::EventReceived { kind, subject } => {
            format!("{ts}, subject={subject}, EventReceived kind={kind}\n")
        }
        PipelineStep::JobDispatched { kind, subject } => {
            format!("{ts}, subject={subject}, JobDispatched kind={kind}\n")
        }
        PipelineStep::ProofGenerated { circuit, duration_ms } => format!(
            "{ts}, subject={}, ProofGenerated circuit={circuit} duration_ms={duration_ms}\n",
            event.subject
        ),
        PipelineStep::TransactionSubmitted { tx_hash, method } => format!(
            "{ts}, subject={}, TransactionSubmitted method={method} tx={tx_hash}\n",
            event.subject
        ),
        PipelineStep::TransactionVerified { tx_hash, status } => format!(
            "{ts}, subject={}, TransactionVerified tx={tx_hash} status={status}\n",
            event.subject
        ),
        PipelineStep::TransactionFailed { subject, error } => {
            format!("{ts}, subject={subject}, TransactionFailed error={error}\n")
        }
        PipelineStep::OcrRoundSealed { round, feed_id, count } => format!(
            "{ts}, subject={}, OcrRoundSealed round={round} feed={feed_id} signatures={count}\n",
            event.subject
        ),
        PipelineStep::JobDeadLettered { subject, reason } => {
            format!("{ts}, subject={subject}, JobDeadLettered reason={reason}\n")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::fs;

    #[tokio::test]
    async fn logs_are_appended_to_the_file() {
        let test_file = std::env::temp_dir().join("oracle_node_pipeline_test.log");
        let _ = fs::remove_file(&test_file).await;

        let logger = PipelineLogger::new(test_file.clone()).await.unwrap();
        logger
            .log_step(
                "job-1",
                PipelineStep::JobDispatched {
                    kind: "DataFeed".into(),
                    subject: "job-1".into(),
                },
            )
            .await
            .unwrap();

        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

        let contents = fs::read_to_string(&test_file).await.unwrap();
        assert!(contents.contains("JobDispatched"));

        let _ = fs::remove_file(&test_file).await;
    }
}
