//! Chunked File Transfer
//!
//! Files travel as a run of [`ChunkFrame`]s on the ordered channel. The
//! sender splits a file into payloads of at most [`MAX_CHUNK_PAYLOAD`]
//! bytes; the receiver stages chunks into a file and reports the finished
//! path when the last chunk lands.
//!
//! Only one transfer is open per receiver. Two concurrent transfers with the
//! same filename would write the same staging file.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::network::frame::{ChunkFrame, FourCc};
use crate::network::transport::TransportSession;

/// Largest payload carried by one chunk.
pub const MAX_CHUNK_PAYLOAD: usize = 1200;

/// Transfer errors.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    /// No peer to send to.
    #[error("no peer connected")]
    NotConnected,

    /// Filename has no usable final component.
    #[error("invalid transfer filename: {0:?}")]
    InvalidFilename(String),

    /// Continuation chunk arrived with no transfer open.
    #[error("chunk for {0:?} without an open transfer")]
    NoOpenTransfer(String),

    /// Link dropped the chunk mid-transfer.
    #[error("link dropped chunk {index} of {filename:?}")]
    Interrupted {
        /// File being sent.
        filename: String,
        /// Index of the chunk that failed.
        index: usize,
    },

    /// Filesystem error.
    #[error("transfer I/O: {0}")]
    Io(#[from] std::io::Error),
}

/// Receives finished session data files.
pub trait ImportSink {
    /// Hand a fully staged file to the backend.
    fn import_session_data(&mut self, path: &Path);
}

/// Reduce `name` to its final path component, accepting either separator.
pub fn final_component(name: &str) -> Option<&str> {
    name.rsplit(['/', '\\'])
        .next()
        .filter(|c| !c.is_empty() && *c != "." && *c != "..")
}

/// Split `data` into frames of at most `max_payload` bytes.
///
/// `is_first` is set on the first frame only and `is_last` once the
/// cumulative size reaches `data.len()`. Empty input yields no frames.
pub fn split_chunks(format: FourCc, filename: &str, data: &[u8], max_payload: usize) -> Vec<ChunkFrame> {
    let size = max_payload.max(1);
    let mut sent = 0usize;

    data.chunks(size)
        .map(|payload| {
            let is_first = sent == 0;
            sent += payload.len();
            ChunkFrame {
                format,
                filename: filename.to_string(),
                is_first,
                is_last: sent == data.len(),
                payload: payload.to_vec(),
            }
        })
        .collect()
}

/// Send the file at `path` to the connected peer. Returns the number of
/// chunks written.
pub fn send_file(transport: &mut TransportSession, path: &Path, format: FourCc) -> Result<usize, TransferError> {
    if !transport.is_connected() {
        return Err(TransferError::NotConnected);
    }

    let display = path.to_string_lossy();
    let filename = final_component(&display)
        .ok_or_else(|| TransferError::InvalidFilename(display.to_string()))?
        .to_string();

    let data = fs::read(path)?;
    let frames = split_chunks(format, &filename, &data, MAX_CHUNK_PAYLOAD);

    for (index, frame) in frames.iter().enumerate() {
        if !transport.send_chunk(frame) {
            return Err(TransferError::Interrupted { filename, index });
        }
    }

    debug!("Sent {} ({} bytes, {} chunks)", filename, data.len(), frames.len());
    Ok(frames.len())
}

/// Upload a profiler output file and delete it once sent.
///
/// Returns `false` when the file is missing or the send fails; the file is
/// kept in that case.
pub fn send_profile_data(transport: &mut TransportSession, path: &Path) -> bool {
    if !path.exists() {
        return false;
    }

    match send_file(transport, path, FourCc::PROFILE_DATA) {
        Ok(_) => {
            if let Err(e) = fs::remove_file(path) {
                warn!("Sent profile data but could not remove {}: {}", path.display(), e);
            }
            true
        }
        Err(e) => {
            warn!("Profile data upload failed for {}: {}", path.display(), e);
            false
        }
    }
}

struct OpenTransfer {
    path: PathBuf,
    file: File,
    written: u64,
}

/// Stages inbound chunks into files under a directory.
pub struct ChunkReceiver {
    staging_dir: PathBuf,
    open: Option<OpenTransfer>,
}

impl ChunkReceiver {
    /// Stage files under `staging_dir`.
    pub fn new(staging_dir: impl Into<PathBuf>) -> Self {
        Self {
            staging_dir: staging_dir.into(),
            open: None,
        }
    }

    /// Staging directory.
    pub fn staging_dir(&self) -> &Path {
        &self.staging_dir
    }

    /// Whether a transfer is in progress.
    pub fn is_open(&self) -> bool {
        self.open.is_some()
    }

    /// Consume one chunk. Returns the staged path when `frame` completes a
    /// transfer.
    pub fn accept(&mut self, frame: ChunkFrame) -> Result<Option<PathBuf>, TransferError> {
        if frame.is_first {
            let name = final_component(&frame.filename)
                .ok_or_else(|| TransferError::InvalidFilename(frame.filename.clone()))?;

            if let Some(abandoned) = self.open.take() {
                warn!("Abandoning partial transfer {}", abandoned.path.display());
            }

            fs::create_dir_all(&self.staging_dir)?;
            let path = self.staging_dir.join(name);
            let file = File::create(&path)?;
            info!("Receiving {} into {}", frame.format, path.display());
            self.open = Some(OpenTransfer { path, file, written: 0 });
        }

        let Some(open) = self.open.as_mut() else {
            return Err(TransferError::NoOpenTransfer(frame.filename));
        };

        if let Err(e) = open.file.write_all(&frame.payload) {
            self.open = None;
            return Err(e.into());
        }
        open.written += frame.payload.len() as u64;

        if !frame.is_last {
            return Ok(None);
        }

        let Some(mut done) = self.open.take() else {
            return Ok(None);
        };
        done.file.flush()?;
        info!("Received {} ({} bytes)", done.path.display(), done.written);
        Ok(Some(done.path))
    }
}
