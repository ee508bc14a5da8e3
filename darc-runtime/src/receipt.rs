use chrono::{DateTime, Utc};
use darc_core::{CommitmentLevel, ExecutionError, LedgerEffect, ProgramHash, TokenClassId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use crate::dispatcher::InstructionOutcome;

/// Record of one program run, committed or rolled back
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramReceipt {
    /// Hash of the program that was run
    pub program_hash: ProgramHash,

    /// Position of this run among all runs of the executor
    pub sequence: u64,

    /// When the run started
    pub timestamp: DateTime<Utc>,

    /// Where the run ended up
    pub commitment_level: CommitmentLevel,

    /// Number of instructions in the program
    pub operation_count: usize,

    /// Balance changes of a committed run; empty after a rollback
    pub effects: Vec<LedgerEffect>,

    /// Token classes created by a committed run
    pub created_classes: Vec<TokenClassId>,

    /// Index of the instruction that failed, if any
    pub failed_instruction: Option<usize>,

    /// Why the run was rolled back
    pub error_message: Option<String>,
}

impl ProgramReceipt {
    /// Create a receipt for a run that is about to start
    pub fn processing(program_hash: ProgramHash, sequence: u64, operation_count: usize) -> Self {
        Self {
            program_hash,
            sequence,
            timestamp: Utc::now(),
            commitment_level: CommitmentLevel::Processing,
            operation_count,
            effects: Vec::new(),
            created_classes: Vec::new(),
            failed_instruction: None,
            error_message: None,
        }
    }

    /// Fold the outcome of one instruction into the receipt
    pub fn record(&mut self, outcome: InstructionOutcome) {
        self.effects.extend(outcome.effects);
        self.created_classes.extend(outcome.created_classes);
    }

    /// Mark the run as committed
    pub fn commit(&mut self) {
        self.commitment_level = CommitmentLevel::Committed;
    }

    /// Mark the run as rolled back, dropping any recorded effects
    pub fn roll_back(&mut self, error: &ExecutionError) {
        self.commitment_level = CommitmentLevel::RolledBack;
        self.effects.clear();
        self.created_classes.clear();
        self.failed_instruction = error.instruction_index();
        self.error_message = Some(error.to_string());
    }

    pub fn is_committed(&self) -> bool {
        self.commitment_level == CommitmentLevel::Committed
    }

    /// Render the program hash as hex
    pub fn program_hash_hex(&self) -> String {
        hex::encode(self.program_hash)
    }
}

/// Storage interface for program receipts
pub trait ReceiptStorage: Send + Sync {
    /// Store a receipt, replacing any receipt with the same sequence number
    fn store_receipt(&self, receipt: &ProgramReceipt) -> Result<(), ExecutionError>;

    /// Get the receipt of a run by its sequence number
    fn get_receipt(&self, sequence: u64) -> Option<ProgramReceipt>;

    /// Get every receipt for a program hash, oldest first
    fn receipts_for_program(&self, hash: &ProgramHash) -> Vec<ProgramReceipt>;
}

/// In-memory receipt storage.
///
/// Keeps every receipt, rolled back runs included, until it is dropped with
/// `prune_before`; long-running executors should prune or install their own
/// `ReceiptStorage`.
#[derive(Debug, Default)]
pub struct InMemoryReceiptStorage {
    inner: Mutex<ReceiptIndex>,
}

#[derive(Debug, Default)]
struct ReceiptIndex {
    // Mapping from sequence number to receipt
    by_sequence: HashMap<u64, ProgramReceipt>,

    // Mapping from program hash to the sequence numbers of its runs
    by_program: HashMap<ProgramHash, Vec<u64>>,
}

impl InMemoryReceiptStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .by_sequence
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every receipt whose sequence number is below `sequence`,
    /// returning how many were removed
    pub fn prune_before(&self, sequence: u64) -> usize {
        let mut index = self.inner.lock().unwrap_or_else(PoisonError::into_inner);

        let before = index.by_sequence.len();
        index.by_sequence.retain(|seq, _| *seq >= sequence);
        index.by_program.retain(|_, runs| {
            runs.retain(|seq| *seq >= sequence);
            !runs.is_empty()
        });

        before - index.by_sequence.len()
    }
}

impl ReceiptStorage for InMemoryReceiptStorage {
    fn store_receipt(&self, receipt: &ProgramReceipt) -> Result<(), ExecutionError> {
        let mut index = self.inner.lock().unwrap_or_else(PoisonError::into_inner);

        let previous = index.by_sequence.insert(receipt.sequence, receipt.clone());
        if previous.is_none() {
            let runs = index.by_program.entry(receipt.program_hash).or_default();
            runs.push(receipt.sequence);
            runs.sort_unstable();
        }
        Ok(())
    }

    fn get_receipt(&self, sequence: u64) -> Option<ProgramReceipt> {
        let index = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        index.by_sequence.get(&sequence).cloned()
    }

    fn receipts_for_program(&self, hash: &ProgramHash) -> Vec<ProgramReceipt> {
        let index = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        index
            .by_program
            .get(hash)
            .map(|sequences| {
                sequences
                    .iter()
                    .filter_map(|sequence| index.by_sequence.get(sequence).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }
}
