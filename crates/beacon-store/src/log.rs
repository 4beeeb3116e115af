use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use beacon_types::Record;
use tracing::{debug, warn};

use crate::error::{StoreError, StoreResult};

/// Header size: 4 bytes length + 4 bytes CRC.
const HEADER_SIZE: u64 = 8;

/// Upper bound on a single frame payload. Anything larger is a damaged
/// length field, not a record.
const MAX_PAYLOAD: u32 = 1024 * 1024;

/// Append-only, crash-recoverable record log.
///
/// On-disk format, one frame per committed record:
/// ```text
/// [4 bytes: payload length (little-endian u32)]
/// [4 bytes: CRC32 of payload (little-endian u32)]
/// [N bytes: payload (bincode-serialized Record)]
/// ```
///
/// Every append is `fsync`ed before it returns. A frame cut short by a
/// crash can only be the last one in the file; recovery truncates it.
/// Damage anywhere else is reported, never skipped.
pub(crate) struct RecordLog {
    path: PathBuf,
    file: File,
    /// End of the last complete frame.
    offset: u64,
}

impl RecordLog {
    /// Open (or create) the log and replay every committed record.
    pub(crate) fn open(path: &Path) -> StoreResult<(Self, Vec<Record>)> {
        let parent = path.parent().filter(|p| !p.as_os_str().is_empty());
        if let Some(parent) = parent {
            fs::create_dir_all(parent)?;
        }

        let created = !path.exists();
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(path)?;
        if created {
            // The new directory entry must be durable before any record is.
            file.sync_all()?;
            sync_dir(parent.unwrap_or_else(|| Path::new(".")))?;
        }

        let (records, good_len) = Self::replay(path)?;
        let file_len = file.metadata()?.len();
        if good_len < file_len {
            warn!(
                path = %path.display(),
                good_len,
                file_len,
                "truncating torn tail of record log"
            );
            file.set_len(good_len)?;
            file.sync_all()?;
        }

        debug!(path = %path.display(), records = records.len(), "record log replayed");
        Ok((
            Self {
                path: path.to_path_buf(),
                file,
                offset: good_len,
            },
            records,
        ))
    }

    /// Append one record. On failure the file is truncated back to where it
    /// was, so a failed append leaves no trace.
    pub(crate) fn append(&mut self, record: &Record) -> StoreResult<u64> {
        let payload =
            bincode::serialize(record).map_err(|e| StoreError::Serialization(e.to_string()))?;
        let length = payload.len() as u32;
        let crc = crc32fast::hash(&payload);

        let mut frame = Vec::with_capacity(HEADER_SIZE as usize + payload.len());
        frame.extend_from_slice(&length.to_le_bytes());
        frame.extend_from_slice(&crc.to_le_bytes());
        frame.extend_from_slice(&payload);

        let entry_offset = self.offset;
        if let Err(e) = self.write_durably(&frame) {
            self.truncate_to(entry_offset)?;
            return Err(e.into());
        }
        self.offset += frame.len() as u64;

        debug!(offset = entry_offset, id = record.id, len = payload.len(), "record log append");
        Ok(entry_offset)
    }

    pub(crate) fn sync(&self) -> StoreResult<()> {
        self.file.sync_all()?;
        Ok(())
    }

    fn write_durably(&mut self, frame: &[u8]) -> io::Result<()> {
        self.file.write_all(frame)?;
        self.file.flush()?;
        self.file.sync_data()
    }

    fn truncate_to(&mut self, offset: u64) -> StoreResult<()> {
        self.file
            .set_len(offset)
            .and_then(|()| self.file.sync_all())
            .map_err(|e| {
                StoreError::RollbackFailed(format!(
                    "truncate {} to {offset}: {e}",
                    self.path.display()
                ))
            })
    }

    /// Read the log front-to-back. Returns the records and the byte length
    /// covered by complete, valid frames.
    fn replay(path: &Path) -> StoreResult<(Vec<Record>, u64)> {
        let mut file = BufReader::new(File::open(path)?);
        let file_len = file.get_ref().metadata()?.len();
        let mut records: Vec<Record> = Vec::new();
        let mut offset: u64 = 0;

        while offset < file_len {
            if offset + HEADER_SIZE > file_len {
                // Header cut short by a crash.
                break;
            }
            file.seek(SeekFrom::Start(offset))?;

            let mut header = [0u8; HEADER_SIZE as usize];
            file.read_exact(&mut header)?;
            let length = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
            let expected_crc = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);

            if length == 0 && expected_crc == 0 && Self::zeroed_from(&mut file, offset, file_len)? {
                // Space allocated by a crash before the frame reached disk.
                break;
            }
            if length == 0 || length > MAX_PAYLOAD {
                return Err(StoreError::Corrupt {
                    offset,
                    reason: format!("invalid frame length {length}"),
                });
            }

            let frame_end = offset + HEADER_SIZE + length as u64;
            if frame_end > file_len {
                // Payload cut short by a crash.
                break;
            }

            let mut payload = vec![0u8; length as usize];
            file.read_exact(&mut payload)?;

            let actual_crc = crc32fast::hash(&payload);
            if actual_crc != expected_crc {
                if frame_end == file_len {
                    // Last frame, partially persisted.
                    break;
                }
                return Err(StoreError::Corrupt {
                    offset,
                    reason: format!(
                        "CRC mismatch: expected {expected_crc:#010x}, got {actual_crc:#010x}"
                    ),
                });
            }

            let record: Record = bincode::deserialize(&payload).map_err(|e| {
                StoreError::Corrupt {
                    offset,
                    reason: format!("undecodable record: {e}"),
                }
            })?;

            let expected_id = records.len() as u64 + 1;
            if record.id != expected_id {
                return Err(StoreError::Corrupt {
                    offset,
                    reason: format!("expected id {expected_id}, found {}", record.id),
                });
            }

            records.push(record);
            offset = frame_end;
        }

        Ok((records, offset))
    }

    /// Whether every byte from `offset` to `file_len` is zero.
    fn zeroed_from(file: &mut BufReader<File>, offset: u64, file_len: u64) -> StoreResult<bool> {
        file.seek(SeekFrom::Start(offset))?;
        let mut remaining = file_len - offset;
        let mut buf = [0u8; 4096];
        while remaining > 0 {
            let n = remaining.min(buf.len() as u64) as usize;
            file.read_exact(&mut buf[..n])?;
            if buf[..n].iter().any(|&b| b != 0) {
                return Ok(false);
            }
            remaining -= n as u64;
        }
        Ok(true)
    }
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> io::Result<()> {
    File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use beacon_types::{LinkHash, Timestamp};

    fn record(id: u64) -> Record {
        Record {
            id,
            bits: vec![id as u8; 64],
            time: Timestamp::from_millis(1_000 + id as i64),
            hash: LinkHash::from_bytes([id as u8; 32]),
            signature: vec![0x5a; 64],
        }
    }

    fn flip_byte(path: &Path, at: u64) {
        let mut file = OpenOptions::new().read(true).write(true).open(path).unwrap();
        file.seek(SeekFrom::Start(at)).unwrap();
        let mut buf = [0u8; 1];
        file.read_exact(&mut buf).unwrap();
        buf[0] ^= 0xFF;
        file.seek(SeekFrom::Start(at)).unwrap();
        file.write_all(&buf).unwrap();
        file.sync_all().unwrap();
    }

    #[test]
    fn append_and_replay_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.log");
        let (mut log, replayed) = RecordLog::open(&path).unwrap();
        assert!(replayed.is_empty());

        let off1 = log.append(&record(1)).unwrap();
        let off2 = log.append(&record(2)).unwrap();
        assert_eq!(off1, 0);
        assert!(off2 > off1);
        drop(log);

        let (_, replayed) = RecordLog::open(&path).unwrap();
        assert_eq!(replayed, vec![record(1), record(2)]);
    }

    #[test]
    fn creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("deeper").join("records.log");
        let (log, _) = RecordLog::open(&path).unwrap();
        assert_eq!(log.path, path);
        assert!(path.exists());
    }

    #[test]
    fn torn_tail_is_truncated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tail.log");
        let (mut log, _) = RecordLog::open(&path).unwrap();
        log.append(&record(1)).unwrap();
        let first_end = log.offset;
        log.append(&record(2)).unwrap();
        let total = log.offset;
        drop(log);

        let file = OpenOptions::new().write(true).open(&path).unwrap();
        file.set_len(total - 4).unwrap();
        drop(file);

        let (log, replayed) = RecordLog::open(&path).unwrap();
        assert_eq!(replayed, vec![record(1)]);
        assert_eq!(log.offset, first_end);
        assert_eq!(fs::metadata(&path).unwrap().len(), first_end);
    }

    #[test]
    fn torn_header_is_truncated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("header.log");
        let (mut log, _) = RecordLog::open(&path).unwrap();
        log.append(&record(1)).unwrap();
        let end = log.offset;
        drop(log);

        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(&[1, 2, 3]).unwrap();
        drop(file);

        let (_, replayed) = RecordLog::open(&path).unwrap();
        assert_eq!(replayed.len(), 1);
        assert_eq!(fs::metadata(&path).unwrap().len(), end);
    }

    #[test]
    fn zero_filled_tail_is_truncated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("zeros.log");
        let (mut log, _) = RecordLog::open(&path).unwrap();
        log.append(&record(1)).unwrap();
        let end = log.offset;
        drop(log);

        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(&[0u8; 16]).unwrap();
        drop(file);

        let (mut log, replayed) = RecordLog::open(&path).unwrap();
        assert_eq!(replayed, vec![record(1)]);
        assert_eq!(fs::metadata(&path).unwrap().len(), end);
        assert_eq!(log.append(&record(2)).unwrap(), end);
    }

    #[test]
    fn zero_length_before_data_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("zerolen.log");
        let (mut log, _) = RecordLog::open(&path).unwrap();
        log.append(&record(1)).unwrap();
        let end = log.offset;
        drop(log);

        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(&[0u8; 8]).unwrap();
        file.write_all(&[0xAB; 8]).unwrap();
        drop(file);

        let err = RecordLog::open(&path).err().unwrap();
        assert!(matches!(err, StoreError::Corrupt { offset, .. } if offset == end));
    }

    #[test]
    fn corrupt_last_frame_is_treated_as_torn() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lastcrc.log");
        let (mut log, _) = RecordLog::open(&path).unwrap();
        log.append(&record(1)).unwrap();
        let second = log.append(&record(2)).unwrap();
        drop(log);

        flip_byte(&path, second + HEADER_SIZE + 3);

        let (_, replayed) = RecordLog::open(&path).unwrap();
        assert_eq!(replayed, vec![record(1)]);
    }

    #[test]
    fn corruption_before_the_tail_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mid.log");
        let (mut log, _) = RecordLog::open(&path).unwrap();
        log.append(&record(1)).unwrap();
        log.append(&record(2)).unwrap();
        drop(log);

        flip_byte(&path, HEADER_SIZE + 3);

        let err = RecordLog::open(&path).err().unwrap();
        assert!(matches!(err, StoreError::Corrupt { offset: 0, .. }));
    }

    #[test]
    fn out_of_sequence_id_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seq.log");
        let (mut log, _) = RecordLog::open(&path).unwrap();
        log.append(&record(1)).unwrap();
        let second = log.append(&record(3)).unwrap();
        drop(log);

        let err = RecordLog::open(&path).err().unwrap();
        assert!(matches!(err, StoreError::Corrupt { offset, .. } if offset == second));
    }
}
