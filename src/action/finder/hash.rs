use crate::action::finder::request::{HashActionOptions, HashOversizedFilePolicy};
use crypto::digest::Digest as _;
use sha2::Digest as _;
use std::io::Read;

/// Size of the buffer the hashed data is streamed through.
const HASH_BUFFER_SIZE: usize = 1024 * 1024;

/// Digests of the (possibly truncated) file contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHash {
    pub md5: Vec<u8>,
    pub sha1: Vec<u8>,
    pub sha256: Vec<u8>,
    /// Number of bytes the digests were computed over.
    pub num_bytes: u64,
}

/// Decides how many bytes of a file of the given size are hashed.
///
/// Returns `None` if the file should not be hashed at all.
pub fn hash_amount(size: u64, options: &HashActionOptions) -> Option<u64> {
    if size <= options.max_size {
        return Some(u64::MAX);
    }

    match options.oversized_file_policy {
        HashOversizedFilePolicy::Skip => None,
        HashOversizedFilePolicy::HashTruncated => Some(options.max_size),
    }
}

/// Computes digests of at most `amount` bytes of `reader`.
///
/// Data is streamed through a fixed-size buffer, so memory usage does not
/// depend on the size of the input.
pub fn hash<R: Read>(reader: R, amount: u64) -> std::io::Result<FileHash> {
    let mut reader = reader.take(amount);

    let mut md5 = crypto::md5::Md5::new();
    let mut sha1 = crypto::sha1::Sha1::new();
    let mut sha256 = sha2::Sha256::new();
    let mut num_bytes = 0;

    let mut buf = vec![0; HASH_BUFFER_SIZE];
    loop {
        let len = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(len) => len,
            Err(ref err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        };

        md5.input(&buf[..len]);
        sha1.input(&buf[..len]);
        sha256.input(&buf[..len]);
        num_bytes += len as u64;
    }

    Ok(FileHash {
        md5: crypto_result(&mut md5),
        sha1: crypto_result(&mut sha1),
        sha256: sha256.result().to_vec(),
        num_bytes,
    })
}

fn crypto_result<D: crypto::digest::Digest>(digest: &mut D) -> Vec<u8> {
    let mut result = vec![0; digest.output_bytes()];
    digest.result(&mut result);
    result
}

/// Formats bytes as a lowercase hex string.
pub fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|byte| format!("{:02x}", byte)).collect()
}
