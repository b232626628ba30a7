//! Tabular (CSV) reports.
//!
//! [`ReportWriter`] appends rows to a caller-owned sink. When rows come from
//! concurrent tasks, [`ReportSink`] moves the writer onto one dedicated
//! blocking task that drains a queue; workers only hold a cloneable
//! [`ReportHandle`].

use std::io::Write;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::{Error, Result};
use crate::object::{BucketDescriptor, ObjectDescriptor};

/// Rows buffered between workers and the writer task.
const QUEUE_DEPTH: usize = 256;

/// Report layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    /// `Name, Creation Date`
    BucketListing,
    /// `Key, Size, Storage Class, Last Modified`
    ObjectInventory,
    /// `Key, Restorable, Deleted, Error, Delete Error`
    Verification,
}

impl ReportKind {
    /// Column headers, in order.
    #[must_use]
    pub const fn header(self) -> &'static [&'static str] {
        match self {
            Self::BucketListing => &["Name", "Creation Date"],
            Self::ObjectInventory => &["Key", "Size", "Storage Class", "Last Modified"],
            Self::Verification => &["Key", "Restorable", "Deleted", "Error", "Delete Error"],
        }
    }
}

/// A value that renders as one report row.
pub trait ReportRow {
    /// Text fields, in header order.
    fn fields(&self) -> Vec<String>;
}

/// Formats a timestamp in RFC 822 layout (`02 Jan 06 15:04 UTC`).
#[must_use]
pub fn format_timestamp(ts: Option<DateTime<Utc>>) -> String {
    ts.map(|t| t.format("%d %b %y %H:%M UTC").to_string())
        .unwrap_or_default()
}

impl ReportRow for BucketDescriptor {
    fn fields(&self) -> Vec<String> {
        vec![self.name.clone(), format_timestamp(self.created)]
    }
}

impl ReportRow for ObjectDescriptor {
    fn fields(&self) -> Vec<String> {
        vec![
            self.key.clone(),
            self.size.to_string(),
            self.storage_class.to_string(),
            format_timestamp(self.last_modified),
        ]
    }
}

fn csv_error(err: csv::Error) -> Error {
    Error::Report {
        message: err.to_string(),
        source: Some(Box::new(err)),
    }
}

/// CSV writer for one report.
pub struct ReportWriter<W: Write> {
    inner: csv::Writer<W>,
    kind: ReportKind,
    rows: usize,
}

impl<W: Write> ReportWriter<W> {
    /// Wraps `sink` and writes the header for `kind`.
    ///
    /// # Errors
    ///
    /// Returns a report error if the header cannot be written.
    pub fn new(sink: W, kind: ReportKind) -> Result<Self> {
        let mut inner = csv::WriterBuilder::new().flexible(false).from_writer(sink);
        inner.write_record(kind.header()).map_err(csv_error)?;
        Ok(Self {
            inner,
            kind,
            rows: 0,
        })
    }

    /// Layout of this report.
    #[must_use]
    pub fn kind(&self) -> ReportKind {
        self.kind
    }

    /// Data rows written so far.
    #[must_use]
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Appends one row.
    ///
    /// # Errors
    ///
    /// Returns a report error if the row does not match the header width or
    /// the sink fails.
    pub fn write_row(&mut self, row: &impl ReportRow) -> Result<()> {
        self.write_fields(&row.fields())
    }

    fn write_fields(&mut self, fields: &[String]) -> Result<()> {
        self.inner.write_record(fields).map_err(csv_error)?;
        self.rows += 1;
        Ok(())
    }

    /// Flushes and returns the sink.
    ///
    /// # Errors
    ///
    /// Returns a report error if the final flush fails.
    pub fn finish(mut self) -> Result<W> {
        self.inner.flush().map_err(|e| Error::Report {
            message: format!("flushing report: {e}"),
            source: Some(Box::new(e)),
        })?;
        self.inner.into_inner().map_err(|e| Error::Report {
            message: format!("flushing report: {}", e.error()),
            source: None,
        })
    }
}

impl<W: Write> std::fmt::Debug for ReportWriter<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReportWriter")
            .field("kind", &self.kind)
            .field("rows", &self.rows)
            .finish_non_exhaustive()
    }
}

/// Sender side of a [`ReportSink`].
#[derive(Debug, Clone)]
pub struct ReportHandle {
    tx: mpsc::Sender<Vec<String>>,
}

impl ReportHandle {
    /// Queues one row for the writer task.
    ///
    /// # Errors
    ///
    /// Returns a report error if the writer task has stopped.
    pub async fn send(&self, row: &impl ReportRow) -> Result<()> {
        self.tx.send(row.fields()).await.map_err(|_| Error::Report {
            message: "report writer has stopped".to_string(),
            source: None,
        })
    }
}

/// A report writer running on its own task, fed through a queue.
#[derive(Debug)]
pub struct ReportSink<W: Write> {
    handle: ReportHandle,
    task: JoinHandle<Result<ReportWriter<W>>>,
}

impl<W: Write + Send + 'static> ReportSink<W> {
    /// Moves `writer` onto a dedicated blocking task.
    #[must_use]
    pub fn spawn(mut writer: ReportWriter<W>) -> Self {
        let (tx, mut rx) = mpsc::channel::<Vec<String>>(QUEUE_DEPTH);
        let task = tokio::task::spawn_blocking(move || {
            while let Some(fields) = rx.blocking_recv() {
                writer.write_fields(&fields)?;
            }
            Ok(writer)
        });
        Self {
            handle: ReportHandle { tx },
            task,
        }
    }

    /// Returns a sender for worker tasks.
    #[must_use]
    pub fn handle(&self) -> ReportHandle {
        self.handle.clone()
    }

    /// Closes the queue, waits for queued rows to be written, and returns the
    /// flushed sink with the number of data rows.
    ///
    /// Every cloned [`ReportHandle`] must be dropped first.
    ///
    /// # Errors
    ///
    /// Returns a report error if any row failed to write or the writer task
    /// panicked.
    pub async fn finish(self) -> Result<(W, usize)> {
        drop(self.handle);
        let writer = self.task.await.map_err(|e| Error::Report {
            message: format!("report writer task failed: {e}"),
            source: None,
        })??;
        let rows = writer.rows();
        Ok((writer.finish()?, rows))
    }
}
