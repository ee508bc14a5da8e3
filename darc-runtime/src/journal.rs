use darc_core::{ExecutionError, Program, ProgramHash};
use log::warn;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};

/// Size of the little-endian length prefix in front of every frame
const FRAME_HEADER_LEN: u64 = 8;

/// One committed program as recorded in the journal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    /// Number of programs committed before this one
    pub commit_index: u64,

    /// Hash of the program, checked again on replay
    pub program_hash: ProgramHash,

    /// Commit time in milliseconds since the Unix epoch
    pub timestamp: i64,

    pub program: Program,
}

/// Append-only record of committed programs
pub trait ProgramJournal: Send {
    /// Durably record a committed program.
    ///
    /// On error nothing of the entry may remain in the journal.
    fn append(&mut self, entry: &JournalEntry) -> Result<(), ExecutionError>;

    /// Read back every recorded entry in commit order
    fn entries(&self) -> Result<Vec<JournalEntry>, ExecutionError>;
}

/// File-backed journal of length-prefixed bincode frames
pub struct FileProgramJournal {
    /// Path to the journal file
    path: PathBuf,

    /// File handle for appending, unbuffered so a failed append leaves no bytes behind
    file: File,
}

impl FileProgramJournal {
    /// Open a journal file, creating it if needed; existing entries are kept
    pub fn open(path: &Path) -> Result<Self, ExecutionError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| {
                ExecutionError::Journal(format!(
                    "Failed to open journal file {}: {}",
                    path.display(),
                    e
                ))
            })?;

        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_frame(&mut self, frame: &[u8]) -> std::io::Result<()> {
        self.file.write_all(frame)?;
        self.file.sync_data()
    }
}

impl ProgramJournal for FileProgramJournal {
    fn append(&mut self, entry: &JournalEntry) -> Result<(), ExecutionError> {
        let serialized = bincode::serialize(entry)?;

        // Length prefix and data go out in a single write
        let mut frame = Vec::with_capacity(FRAME_HEADER_LEN as usize + serialized.len());
        frame.extend_from_slice(&(serialized.len() as u64).to_le_bytes());
        frame.extend_from_slice(&serialized);

        let start = self.file.metadata()?.len();
        if let Err(e) = self.write_frame(&frame) {
            // drop whatever part of the frame reached the file
            if let Err(truncate_err) = self.file.set_len(start) {
                warn!(
                    "failed to truncate journal {} to {} bytes: {}",
                    self.path.display(),
                    start,
                    truncate_err
                );
            }
            return Err(e.into());
        }

        Ok(())
    }

    fn entries(&self) -> Result<Vec<JournalEntry>, ExecutionError> {
        let file = File::open(&self.path)?;
        let remaining = file.metadata()?.len();
        JournalFrames {
            reader: BufReader::new(file),
            remaining,
        }
        .collect()
    }
}

/// Iterator over the frames of a journal file
struct JournalFrames {
    reader: BufReader<File>,

    /// Bytes of the file not read yet
    remaining: u64,
}

impl Iterator for JournalFrames {
    type Item = Result<JournalEntry, ExecutionError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        if self.remaining < FRAME_HEADER_LEN {
            return Some(Err(ExecutionError::Journal(format!(
                "Truncated journal frame header of {} bytes",
                self.remaining
            ))));
        }

        // Read the entry length
        let mut len_buf = [0u8; 8];
        if let Err(e) = self.reader.read_exact(&mut len_buf) {
            return Some(Err(e.into()));
        }
        self.remaining -= FRAME_HEADER_LEN;

        let entry_len = u64::from_le_bytes(len_buf);
        if entry_len > self.remaining {
            return Some(Err(ExecutionError::Journal(format!(
                "Journal frame of {} bytes exceeds the {} bytes left in the file",
                entry_len, self.remaining
            ))));
        }
        self.remaining -= entry_len;
        let Ok(entry_len) = usize::try_from(entry_len) else {
            return Some(Err(ExecutionError::Journal(format!(
                "Journal frame of {} bytes is too large",
                entry_len
            ))));
        };

        // Read the entry data
        let mut entry_data = vec![0u8; entry_len];
        if let Err(e) = self.reader.read_exact(&mut entry_data) {
            return Some(Err(ExecutionError::Journal(format!(
                "Truncated journal frame: {}",
                e
            ))));
        }

        Some(bincode::deserialize(&entry_data).map_err(ExecutionError::from))
    }
}

/// Journal kept in memory; useful for tests and ephemeral executors
#[derive(Debug, Default)]
pub struct MemoryProgramJournal {
    entries: Vec<JournalEntry>,
}

impl MemoryProgramJournal {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProgramJournal for MemoryProgramJournal {
    fn append(&mut self, entry: &JournalEntry) -> Result<(), ExecutionError> {
        self.entries.push(entry.clone());
        Ok(())
    }

    fn entries(&self) -> Result<Vec<JournalEntry>, ExecutionError> {
        Ok(self.entries.clone())
    }
}
