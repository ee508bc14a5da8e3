use anyhow::{bail, Context};
use chrono::Utc;
use darc_core::{Address, Amount, ExecutionError, Program, TokenClassId, TokenLedger};
use log::{debug, info, warn};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use crate::dispatcher::dispatch_instruction;
use crate::journal::{JournalEntry, ProgramJournal};
use crate::receipt::{InMemoryReceiptStorage, ProgramReceipt, ReceiptStorage};

/// State owned by whichever program currently holds the write lock
struct WriterState {
    /// Sequence number of the next run, committed or not
    next_sequence: u64,

    /// Number of programs committed so far
    commit_count: u64,

    journal: Option<Box<dyn ProgramJournal>>,
}

/// Runs programs against the ledger with all-or-nothing semantics.
///
/// At most one program applies mutations at a time. Each program runs on a
/// private copy of the last committed ledger; the copy replaces the committed
/// ledger only after every instruction succeeded, so readers only ever see
/// committed state.
pub struct ProgramExecutor {
    committed: RwLock<Arc<TokenLedger>>,
    writer: Mutex<WriterState>,
    receipts: Arc<dyn ReceiptStorage>,
}

impl Default for ProgramExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgramExecutor {
    /// Create an executor over an empty ledger
    pub fn new() -> Self {
        Self::with_ledger(TokenLedger::new())
    }

    /// Create an executor whose committed state starts as `ledger`
    pub fn with_ledger(ledger: TokenLedger) -> Self {
        Self {
            committed: RwLock::new(Arc::new(ledger)),
            writer: Mutex::new(WriterState {
                next_sequence: 0,
                commit_count: 0,
                journal: None,
            }),
            receipts: Arc::new(InMemoryReceiptStorage::new()),
        }
    }

    /// Record every committed program in `journal` from now on
    pub fn with_journal(mut self, journal: Box<dyn ProgramJournal>) -> Self {
        self.writer
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .journal = Some(journal);
        self
    }

    /// Store receipts in `storage` instead of the default in-memory store
    pub fn with_receipt_storage(mut self, storage: Arc<dyn ReceiptStorage>) -> Self {
        self.receipts = storage;
        self
    }

    pub fn receipts(&self) -> &dyn ReceiptStorage {
        self.receipts.as_ref()
    }

    /// The last committed ledger state
    pub fn snapshot(&self) -> Arc<TokenLedger> {
        Arc::clone(&self.committed.read().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn balance_of(&self, class_id: TokenClassId, owner: &Address) -> Amount {
        self.snapshot().balance_of(class_id, owner)
    }

    pub fn owners_of(&self, class_id: TokenClassId) -> Vec<Address> {
        self.snapshot().owners_of(class_id)
    }

    /// Number of programs committed so far
    pub fn commit_count(&self) -> u64 {
        self.writer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .commit_count
    }

    /// Run a program to completion, committing all of its effects or none.
    ///
    /// Instructions run in order and the first failure stops the program;
    /// the returned error names the failing instruction. Structural checks
    /// such as rejecting empty programs belong to the entrance.
    pub fn execute(&self, program: &Program) -> Result<ProgramReceipt, ExecutionError> {
        let program_hash = program.hash()?;

        let mut guard = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let writer = &mut *guard;

        let sequence = writer.next_sequence;
        writer.next_sequence += 1;
        let mut receipt =
            ProgramReceipt::processing(program_hash, sequence, program.operations.len());

        let mut working = TokenLedger::clone(&self.snapshot());
        if let Err(err) = Self::apply(&mut working, program, &mut receipt) {
            return Err(self.roll_back(receipt, err));
        }

        if let Some(journal) = writer.journal.as_mut() {
            let entry = JournalEntry {
                commit_index: writer.commit_count,
                program_hash,
                timestamp: Utc::now().timestamp_millis(),
                program: program.clone(),
            };
            if let Err(err) = journal.append(&entry) {
                return Err(self.roll_back(receipt, err));
            }
        }

        *self.committed.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(working);
        writer.commit_count += 1;
        receipt.commit();

        info!(
            "committed program {} (sequence {}, {} instructions, {} balance changes)",
            receipt.program_hash_hex(),
            sequence,
            receipt.operation_count,
            receipt.effects.len()
        );
        if let Err(err) = self.receipts.store_receipt(&receipt) {
            warn!("failed to store receipt for sequence {}: {}", sequence, err);
        }

        Ok(receipt)
    }

    /// Rebuild an executor by re-running every program recorded in a journal
    pub fn replay(journal: &dyn ProgramJournal) -> anyhow::Result<Self> {
        let executor = Self::new();
        let entries = journal
            .entries()
            .context("Failed to read program journal")?;

        for entry in entries {
            let expected_index = executor.commit_count();
            if entry.commit_index != expected_index {
                bail!(
                    "Journal entry {} is out of order, expected commit index {}",
                    entry.commit_index,
                    expected_index
                );
            }
            if entry.program.hash()? != entry.program_hash {
                bail!("Journal entry {} does not match its hash", entry.commit_index);
            }

            executor
                .execute(&entry.program)
                .with_context(|| format!("Failed to replay journal entry {}", entry.commit_index))?;
        }

        info!("replayed {} programs from journal", executor.commit_count());
        Ok(executor)
    }

    fn apply(
        ledger: &mut TokenLedger,
        program: &Program,
        receipt: &mut ProgramReceipt,
    ) -> Result<(), ExecutionError> {
        for (index, instruction) in program.operations.iter().enumerate() {
            debug!(
                "applying instruction {} (opcode {}) of program {}",
                index,
                instruction.opcode,
                receipt.program_hash_hex()
            );

            let outcome = dispatch_instruction(ledger, instruction)
                .map_err(|e| e.at_instruction(index, instruction.opcode))?;
            receipt.record(outcome);
        }
        Ok(())
    }

    fn roll_back(&self, mut receipt: ProgramReceipt, err: ExecutionError) -> ExecutionError {
        warn!(
            "rolled back program {} (sequence {}): {}",
            receipt.program_hash_hex(),
            receipt.sequence,
            err
        );

        receipt.roll_back(&err);
        if let Err(store_err) = self.receipts.store_receipt(&receipt) {
            warn!(
                "failed to store receipt for sequence {}: {}",
                receipt.sequence, store_err
            );
        }
        err
    }
}
