use crate::action::finder::chunks::{chunks, ChunksConfig};
use crate::action::finder::request::{DownloadActionOptions, DownloadOversizedFilePolicy};
use crate::session::{self, Blob, Session};
use sha2::Digest as _;
use std::io::{Read, Seek};

/// What the download action does with a file of a given size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Nothing is transferred.
    Skip,
    /// The file is hashed instead, up to the given number of bytes.
    Hash(u64),
    /// The file is downloaded, up to the given number of bytes.
    Download(u64),
}

/// Decides how a file of the given size is handled by the download action.
pub fn decide(size: u64, options: &DownloadActionOptions) -> Decision {
    if size <= options.max_size {
        return Decision::Download(u64::MAX);
    }

    match options.oversized_file_policy {
        DownloadOversizedFilePolicy::Skip => Decision::Skip,
        DownloadOversizedFilePolicy::DownloadTruncated => Decision::Download(options.max_size),
        DownloadOversizedFilePolicy::HashTruncated => Decision::Hash(options.max_size),
    }
}

/// Blob image of a downloaded file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadEntry {
    pub chunk_size: u64,
    /// Uploaded chunks, ordered by offset.
    pub chunks: Vec<BlobChunk>,
}

impl DownloadEntry {

    /// Total number of bytes transferred.
    pub fn len(&self) -> u64 {
        self.chunks.iter().map(|chunk| chunk.length).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

/// Reference to a single uploaded chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobChunk {
    pub offset: u64,
    pub length: u64,
    /// SHA-256 of the chunk, the address of the blob.
    pub digest: Vec<u8>,
}

/// An error that can occur while transferring a file.
#[derive(Debug)]
pub enum TransferError {
    /// The file could not be read.
    Read(std::io::Error),
    /// The session refused the blob or cancelled the action.
    Session(session::Error),
}

impl From<std::io::Error> for TransferError {

    fn from(error: std::io::Error) -> TransferError {
        TransferError::Read(error)
    }
}

impl From<session::Error> for TransferError {

    fn from(error: session::Error) -> TransferError {
        TransferError::Session(error)
    }
}

/// Uploads at most `amount` bytes of `reader`, one blob per chunk.
///
/// A heartbeat is sent before every chunk, only one chunk is kept in memory
/// at a time.
pub fn download<R, S>(
    session: &mut S,
    reader: R,
    config: ChunksConfig,
    amount: u64,
) -> Result<DownloadEntry, TransferError>
where
    R: Read + Seek,
    S: Session,
{
    let mut entry = DownloadEntry {
        chunk_size: config.bytes_per_chunk(),
        chunks: vec![],
    };

    for chunk in chunks(reader, config, 0, amount)? {
        session.heartbeat()?;

        let chunk = chunk?;
        let digest = sha2::Sha256::digest(&chunk.data).to_vec();

        entry.chunks.push(BlobChunk {
            offset: chunk.offset,
            length: chunk.data.len() as u64,
            digest: digest.clone(),
        });

        session.upload(Blob {
            digest,
            data: chunk.data,
        })?;
    }

    Ok(entry)
}
