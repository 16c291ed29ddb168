#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::io::{Cursor, Read};
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

use s3zipper::archive::FileDescriptor;
use s3zipper::resolver::{FileSetResolver, LookupError};
use s3zipper::s3::{FetchError, ObjectFetcher, ObjectReader};

/// What an in-memory object does when opened
#[derive(Clone)]
pub enum StoredObject {
    Data(Bytes),
    /// Opens, yields the bytes, then fails the next read
    Truncated(Bytes),
    /// Fails to open with a non-404 error
    Broken,
    /// Opens, yields the bytes, then never produces more
    Stalled(Bytes),
}

/// Object store double; unknown keys are `NotFound`
#[derive(Default)]
pub struct MemoryFetcher {
    objects: HashMap<String, StoredObject>,
    opened: Mutex<Vec<String>>,
}

impl MemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, data: impl Into<Bytes>) -> Self {
        self.objects
            .insert(key.to_string(), StoredObject::Data(data.into()));
        self
    }

    pub fn with_truncated(mut self, key: &str, data: impl Into<Bytes>) -> Self {
        self.objects
            .insert(key.to_string(), StoredObject::Truncated(data.into()));
        self
    }

    pub fn with_broken(mut self, key: &str) -> Self {
        self.objects.insert(key.to_string(), StoredObject::Broken);
        self
    }

    pub fn with_stalled(mut self, key: &str, data: impl Into<Bytes>) -> Self {
        self.objects
            .insert(key.to_string(), StoredObject::Stalled(data.into()));
        self
    }

    /// Keys passed to `open`, in call order
    pub fn opened(&self) -> Vec<String> {
        self.opened.lock().unwrap().clone()
    }
}

#[async_trait]
impl ObjectFetcher for MemoryFetcher {
    async fn open(&self, storage_path: &str) -> Result<ObjectReader, FetchError> {
        self.opened.lock().unwrap().push(storage_path.to_string());
        match self.objects.get(storage_path) {
            Some(StoredObject::Data(data)) => Ok(Box::pin(Cursor::new(data.clone()))),
            Some(StoredObject::Truncated(data)) => Ok(Box::pin(TruncatedReader {
                data: Some(data.clone()),
            })),
            Some(StoredObject::Stalled(data)) => Ok(Box::pin(StalledReader {
                data: Some(data.clone()),
            })),
            Some(StoredObject::Broken) => Err(FetchError::other(storage_path, "access denied")),
            None => Err(FetchError::NotFound {
                path: storage_path.to_string(),
            }),
        }
    }
}

/// Yields its data once, then errors
pub struct TruncatedReader {
    data: Option<Bytes>,
}

impl AsyncRead for TruncatedReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        match self.data.take() {
            Some(data) => {
                buf.put_slice(&data[..data.len().min(buf.remaining())]);
                Poll::Ready(Ok(()))
            }
            None => Poll::Ready(Err(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "connection reset by peer",
            ))),
        }
    }
}

/// Yields its data once, then stays pending
pub struct StalledReader {
    data: Option<Bytes>,
}

impl AsyncRead for StalledReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        match self.data.take() {
            Some(data) => {
                buf.put_slice(&data[..data.len().min(buf.remaining())]);
                Poll::Ready(Ok(()))
            }
            None => Poll::Pending,
        }
    }
}

/// Collects formatted log output for assertions
#[derive(Clone, Default)]
pub struct LogCapture(Arc<Mutex<Vec<u8>>>);

impl LogCapture {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl std::io::Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for LogCapture {
    type Writer = LogCapture;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Deterministic bytes that deflate barely shrinks
pub fn noise(len: usize, seed: u32) -> Vec<u8> {
    let mut state = seed.wrapping_mul(2_654_435_761).wrapping_add(1);
    (0..len)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            (state >> 24) as u8
        })
        .collect()
}

/// Sink that accepts `budget` bytes and then reports a broken pipe
pub struct FailingSink {
    pub budget: usize,
    pub written: Vec<u8>,
}

impl FailingSink {
    pub fn new(budget: usize) -> Self {
        FailingSink {
            budget,
            written: Vec::new(),
        }
    }
}

impl AsyncWrite for FailingSink {
    fn poll_write(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        if self.budget == 0 {
            return Poll::Ready(Err(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "client went away",
            )));
        }
        let n = buf.len().min(self.budget);
        self.budget -= n;
        self.written.extend_from_slice(&buf[..n]);
        Poll::Ready(Ok(n))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

/// Resolver double backed by a map of reference -> file list
#[derive(Default)]
pub struct MemoryResolver {
    lists: HashMap<String, Vec<FileDescriptor>>,
}

impl MemoryResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, reference: &str, files: Vec<FileDescriptor>) -> Self {
        self.lists.insert(reference.to_string(), files);
        self
    }
}

#[async_trait]
impl FileSetResolver for MemoryResolver {
    async fn resolve(&self, reference: &str) -> Result<Vec<FileDescriptor>, LookupError> {
        self.lists
            .get(reference)
            .cloned()
            .ok_or_else(|| LookupError::NotFound {
                reference: reference.to_string(),
            })
    }
}

/// Entry names and contents of an archive, in central directory order
pub fn read_archive(bytes: &[u8]) -> Vec<(String, Vec<u8>)> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).expect("valid zip archive");
    let mut entries = Vec::new();
    for i in 0..archive.len() {
        let mut file = archive.by_index(i).unwrap();
        let mut content = Vec::new();
        file.read_to_end(&mut content).unwrap();
        entries.push((file.name().to_string(), content));
    }
    entries
}

/// Total entry count from the end of central directory record.
/// Assumes no archive comment, so the record is the last 22 bytes.
pub fn eocd_entry_count(bytes: &[u8]) -> u16 {
    let eocd = &bytes[bytes.len() - 22..];
    assert_eq!(&eocd[..4], &[0x50, 0x4b, 0x05, 0x06], "missing EOCD record");
    u16::from_le_bytes([eocd[10], eocd[11]])
}

/// Fields of the local file header at `offset`: (flags, dos time, dos date)
pub fn local_header_fields(bytes: &[u8], offset: usize) -> (u16, u16, u16) {
    let header = &bytes[offset..offset + 30];
    assert_eq!(&header[..4], &[0x50, 0x4b, 0x03, 0x04], "missing local header");
    let flags = u16::from_le_bytes([header[6], header[7]]);
    let time = u16::from_le_bytes([header[10], header[11]]);
    let date = u16::from_le_bytes([header[12], header[13]]);
    (flags, time, date)
}

/// Entry names as listed in the central directory, duplicates included
pub fn central_directory_names(bytes: &[u8]) -> Vec<String> {
    let eocd = &bytes[bytes.len() - 22..];
    let count = u16::from_le_bytes([eocd[10], eocd[11]]) as usize;
    let cd_offset = u32::from_le_bytes([eocd[16], eocd[17], eocd[18], eocd[19]]) as usize;

    let mut names = Vec::with_capacity(count);
    let mut pos = cd_offset;
    for _ in 0..count {
        let header = &bytes[pos..];
        assert_eq!(&header[..4], &[0x50, 0x4b, 0x01, 0x02], "missing central header");
        let name_len = u16::from_le_bytes([header[28], header[29]]) as usize;
        let extra_len = u16::from_le_bytes([header[30], header[31]]) as usize;
        let comment_len = u16::from_le_bytes([header[32], header[33]]) as usize;
        names.push(String::from_utf8(header[46..46 + name_len].to_vec()).unwrap());
        pos += 46 + name_len + extra_len + comment_len;
    }
    names
}
