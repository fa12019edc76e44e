// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Recording materialization and transparent decompression.
//!
//! A [`Recording`] owns its backing temp file; dropping it deletes the file.
//! That makes cleanup a scope-exit guarantee: whichever way a request
//! terminates (success, timeout, error, or the handler future being dropped
//! on client disconnect), no request-owned file survives.
//!
//! Compression is detected by file signature, never by extension. Gzip and
//! zip wrapping are unwrapped into a fresh temp file; the compressed
//! original is deleted immediately since it may be large and is no longer
//! needed.

use std::io::{Read, Seek, SeekFrom};

use flate2::read::GzDecoder;
use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::Error;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
const ZIP_MAGIC: [u8; 4] = [0x50, 0x4b, 0x03, 0x04];

/// Create a temp file with the server's recognizable prefix.
pub fn new_temp_file() -> std::io::Result<NamedTempFile> {
    tempfile::Builder::new().prefix("flightscope-").tempfile()
}

/// A recording materialized on disk, deleted when dropped.
pub struct Recording {
    file: NamedTempFile,
    byte_len: u64,
}

impl Recording {
    /// Take ownership of a materialized temp file.
    pub fn from_temp_file(file: NamedTempFile) -> std::io::Result<Self> {
        let byte_len = file.as_file().metadata()?.len();
        Ok(Self { file, byte_len })
    }

    /// Path of the backing file.
    pub fn path(&self) -> &std::path::Path {
        self.file.path()
    }

    /// Size of the materialized recording in bytes.
    pub fn byte_len(&self) -> u64 {
        self.byte_len
    }

    /// Read the full recording into memory.
    pub async fn read(&self) -> std::io::Result<Vec<u8>> {
        tokio::fs::read(self.path()).await
    }
}

/// Unwrap a compressed recording if its signature says it is one.
///
/// Returns the (possibly new) recording and whether decompression happened.
/// On decompression the original file is deleted immediately; on failure any
/// partially written output temp file is deleted as well.
pub fn maybe_decompress(recording: Recording) -> Result<(Recording, bool), Error> {
    let mut src = recording.file.reopen()?;
    let mut magic = [0u8; 4];
    let read = read_prefix(&mut src, &mut magic)?;
    src.seek(SeekFrom::Start(0))?;

    if read >= GZIP_MAGIC.len() && magic[..GZIP_MAGIC.len()] == GZIP_MAGIC {
        debug!(bytes = recording.byte_len(), "Recording is gzip compressed");
        let unwrapped = decompress_gzip(src)?;
        // `recording` drops here, deleting the compressed original.
        return Ok((unwrapped, true));
    }
    if read >= ZIP_MAGIC.len() && magic == ZIP_MAGIC {
        debug!(bytes = recording.byte_len(), "Recording is zip wrapped");
        let unwrapped = decompress_zip(src)?;
        return Ok((unwrapped, true));
    }
    Ok((recording, false))
}

fn read_prefix(src: &mut std::fs::File, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = src.read(&mut buf[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

fn decompress_gzip(src: std::fs::File) -> Result<Recording, Error> {
    let mut out = new_temp_file()?;
    let mut decoder = GzDecoder::new(std::io::BufReader::new(src));
    std::io::copy(&mut decoder, out.as_file_mut())?;
    Recording::from_temp_file(out).map_err(Error::Io)
}

fn decompress_zip(src: std::fs::File) -> Result<Recording, Error> {
    let mut archive = zip::ZipArchive::new(src)
        .map_err(|e| Error::Internal(format!("Failed to open zip wrapper: {e}")))?;
    let mut out = new_temp_file()?;
    // The archive is treated as a wrapper around a single recording; take
    // the first file entry.
    let mut unwrapped = None;
    for index in 0..archive.len() {
        let entry = archive
            .by_index(index)
            .map_err(|e| Error::Internal(format!("Failed to read zip entry {index}: {e}")))?;
        if !entry.is_dir() {
            unwrapped = Some(index);
            break;
        }
    }
    let index = unwrapped
        .ok_or_else(|| Error::Internal("Zip wrapper contains no file entries".to_string()))?;
    let mut entry = archive
        .by_index(index)
        .map_err(|e| Error::Internal(format!("Failed to read zip entry {index}: {e}")))?;
    std::io::copy(&mut entry, out.as_file_mut())?;
    Recording::from_temp_file(out).map_err(Error::Io)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn materialize(bytes: &[u8]) -> Recording {
        let mut file = new_temp_file().unwrap();
        file.write_all(bytes).unwrap();
        file.flush().unwrap();
        Recording::from_temp_file(file).unwrap()
    }

    fn gzip(bytes: &[u8]) -> Vec<u8> {
        let mut encoder =
            flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(bytes).unwrap();
        encoder.finish().unwrap()
    }

    fn zip_wrap(bytes: &[u8]) -> Vec<u8> {
        let mut cursor = std::io::Cursor::new(Vec::new());
        {
            let mut writer = zip::ZipWriter::new(&mut cursor);
            writer
                .start_file("sample.jfr", zip::write::SimpleFileOptions::default())
                .unwrap();
            writer.write_all(bytes).unwrap();
            writer.finish().unwrap();
        }
        cursor.into_inner()
    }

    #[test]
    fn plain_recording_passes_through_untouched() {
        let payload = b"FLR\0plain recording bytes";
        let recording = materialize(payload);
        let original_path = recording.path().to_path_buf();

        let (recording, decompressed) = maybe_decompress(recording).unwrap();
        assert!(!decompressed);
        assert_eq!(recording.path(), original_path);
        assert_eq!(std::fs::read(recording.path()).unwrap(), payload);
    }

    #[test]
    fn gzip_recording_round_trips_and_original_is_deleted() {
        let payload = b"FLR\0recording payload that was gzipped";
        let recording = materialize(&gzip(payload));
        let compressed_path = recording.path().to_path_buf();

        let (recording, decompressed) = maybe_decompress(recording).unwrap();
        assert!(decompressed);
        assert_eq!(recording.byte_len(), payload.len() as u64);
        assert_eq!(std::fs::read(recording.path()).unwrap(), payload);
        assert!(!compressed_path.exists());
    }

    #[test]
    fn zip_wrapped_recording_unwraps_first_entry() {
        let payload = b"FLR\0recording payload inside a zip";
        let recording = materialize(&zip_wrap(payload));

        let (recording, decompressed) = maybe_decompress(recording).unwrap();
        assert!(decompressed);
        assert_eq!(std::fs::read(recording.path()).unwrap(), payload);
    }

    #[test]
    fn truncated_gzip_fails_and_consumes_the_input() {
        let mut compressed = gzip(b"FLR\0payload");
        compressed.truncate(compressed.len() / 2);
        let recording = materialize(&compressed);
        let input_path = recording.path().to_path_buf();

        // The input recording is consumed either way; the partially written
        // output temp file is deleted by its own drop.
        assert!(maybe_decompress(recording).is_err());
        assert!(!input_path.exists());
    }

    #[test]
    fn dropping_a_recording_deletes_its_file() {
        let recording = materialize(b"bytes");
        let path = recording.path().to_path_buf();
        assert!(path.exists());
        drop(recording);
        assert!(!path.exists());
    }

    #[test]
    fn tiny_file_is_not_mistaken_for_compressed() {
        let recording = materialize(b"x");
        let (recording, decompressed) = maybe_decompress(recording).unwrap();
        assert!(!decompressed);
        assert_eq!(recording.byte_len(), 1);
    }
}
