//! Streaming ZIP assembly.
//!
//! Objects are fetched in descriptor order and copied into the archive one
//! at a time in fixed-size chunks. Nothing larger than a chunk is held in
//! memory, and writes block when the sink is slow.
//!
//! ```text
//!   descriptors ──> open (up to `prefetch` ahead, yielded in order)
//!                     │
//!                     ├─ NotFound / Other ──> log, skip
//!                     └─ reader ──> entry header ──> chunked copy ──> close entry
//!   end of list ──> central directory ──> sink closed
//! ```
//!
//! Only a failing sink ends the build early. Everything that goes wrong with
//! an individual object is logged and counted in the [`ArchiveReport`].

use async_zip::base::write::ZipFileWriter;
use async_zip::{Compression, ZipDateTime, ZipEntryBuilder};
use futures::io::{AsyncWrite as FuturesAsyncWrite, AsyncWriteExt as _};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use thiserror::Error;
use tokio::io::{AsyncReadExt as _, AsyncWrite};
use tokio_util::compat::TokioAsyncWriteCompatExt;
use tracing::{debug, warn};

use super::FileDescriptor;
use super::path::build_entry_path;
use crate::s3::{FetchError, ObjectFetcher, ObjectReader};

/// Size of the buffer used to copy an object into its entry
pub const COPY_CHUNK_SIZE: usize = 64 * 1024;

/// Tuning for [`ArchiveStreamer`]
#[derive(Debug, Clone)]
pub struct StreamerOptions {
    /// How many objects may be opened ahead of the one being copied.
    /// `1` opens each object only when its turn comes.
    pub prefetch: usize,
}

impl Default for StreamerOptions {
    fn default() -> Self {
        StreamerOptions { prefetch: 1 }
    }
}

/// Summary of a finished archive
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveReport {
    /// Entries written to the archive, including truncated ones
    pub entries_written: usize,
    /// Descriptors skipped because the object does not exist
    pub not_found: usize,
    /// Descriptors skipped because the object could not be opened
    pub fetch_failed: usize,
    /// Entries whose source stream failed part-way through
    pub truncated: usize,
    /// Uncompressed bytes copied into entries
    pub bytes_copied: u64,
}

impl ArchiveReport {
    pub fn skipped(&self) -> usize {
        self.not_found + self.fetch_failed
    }
}

/// The archive could not be written to its destination
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("archive write failed: {0}")]
    Zip(#[from] async_zip::error::ZipError),

    #[error("archive write failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Assembles archives from objects opened through an [`ObjectFetcher`]
pub struct ArchiveStreamer {
    fetcher: Arc<dyn ObjectFetcher>,
    options: StreamerOptions,
}

impl ArchiveStreamer {
    pub fn new(fetcher: Arc<dyn ObjectFetcher>) -> Self {
        Self::with_options(fetcher, StreamerOptions::default())
    }

    pub fn with_options(fetcher: Arc<dyn ObjectFetcher>, options: StreamerOptions) -> Self {
        ArchiveStreamer { fetcher, options }
    }

    async fn open<'a>(
        &self,
        descriptor: &'a FileDescriptor,
    ) -> (&'a FileDescriptor, Result<ObjectReader, FetchError>) {
        let fetched = self.fetcher.open(&descriptor.storage_path).await;
        (descriptor, fetched)
    }

    /// Write a ZIP archive of `descriptors` to `sink`, in list order.
    ///
    /// Missing or unreadable objects are skipped. The archive is always
    /// finalized, so an empty list yields a valid empty archive. The only
    /// error returned is a failure to write to `sink`, after which no further
    /// objects are opened.
    pub async fn build<W>(
        &self,
        descriptors: &[FileDescriptor],
        sink: W,
    ) -> Result<ArchiveReport, SinkError>
    where
        W: AsyncWrite + Unpin + Send,
    {
        let mut writer = ZipFileWriter::new(sink.compat_write());
        let mut report = ArchiveReport::default();
        debug!(files = descriptors.len(), "archive streaming started");

        // Collect first: a lazily mapped stream here makes this future !Send.
        let opens: Vec<_> = descriptors
            .iter()
            .map(|descriptor| self.open(descriptor))
            .collect();
        let mut opened = stream::iter(opens).buffered(self.options.prefetch.max(1));

        while let Some((descriptor, fetched)) = opened.next().await {
            let entry_path = build_entry_path(descriptor);

            let reader = match fetched {
                Ok(reader) => reader,
                Err(err) if err.is_not_found() => {
                    warn!(storage_path = %err.path(), entry = %entry_path, "File not found");
                    report.not_found += 1;
                    continue;
                }
                Err(err) => {
                    warn!(
                        storage_path = %descriptor.storage_path,
                        entry = %entry_path,
                        error = %err,
                        "Error downloading file"
                    );
                    report.fetch_failed += 1;
                    continue;
                }
            };

            let builder = entry_builder(descriptor, &entry_path);
            copy_entry(&mut writer, builder, reader, descriptor, &entry_path, &mut report).await?;
        }

        let mut sink = writer.close().await?;
        sink.close().await?;

        debug!(
            entries = report.entries_written,
            skipped = report.skipped(),
            bytes = report.bytes_copied,
            "archive finalized"
        );
        Ok(report)
    }
}

/// Entry header: deflated, UTF-8 name, modification time when it parses
fn entry_builder(descriptor: &FileDescriptor, entry_path: &str) -> ZipEntryBuilder {
    let builder = ZipEntryBuilder::new(entry_path.to_string().into(), Compression::Deflate);

    match descriptor.modified_time() {
        Ok(Some(modified)) => builder.last_modification_date(ZipDateTime::from_chrono(&modified)),
        Ok(None) => builder,
        Err(err) => {
            warn!(
                storage_path = %descriptor.storage_path,
                modified = ?descriptor.modified_at,
                error = %err,
                "Ignoring unparsable modification time"
            );
            builder
        }
    }
}

/// Copy one object into a new entry.
///
/// A read failure closes the entry with what was copied so far. Any write
/// failure is returned.
async fn copy_entry<W>(
    writer: &mut ZipFileWriter<W>,
    builder: ZipEntryBuilder,
    mut reader: ObjectReader,
    descriptor: &FileDescriptor,
    entry_path: &str,
    report: &mut ArchiveReport,
) -> Result<(), SinkError>
where
    W: FuturesAsyncWrite + Unpin,
{
    let mut entry = writer.write_entry_stream(builder).await?;
    let mut buf = vec![0u8; COPY_CHUNK_SIZE];
    let mut copied = 0u64;

    loop {
        let n = match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(err) => {
                warn!(
                    storage_path = %descriptor.storage_path,
                    entry = %entry_path,
                    copied,
                    error = %err,
                    "Source stream failed, entry truncated"
                );
                report.truncated += 1;
                break;
            }
        };
        entry.write_all(&buf[..n]).await?;
        copied += n as u64;
    }
    drop(reader);

    entry.close().await?;
    report.entries_written += 1;
    report.bytes_copied += copied;
    Ok(())
}
