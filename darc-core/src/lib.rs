pub mod address;
pub mod error;
pub mod ledger;
pub mod operation;
pub mod params;
pub mod program;

// Re-export the main types for convenience
pub use address::{Address, AddressParseError, ADDRESS_LENGTH};
pub use error::ExecutionError;
pub use ledger::{Amount, LedgerEffect, OwnershipChange, TokenClass, TokenClassId, TokenLedger};
pub use operation::{ClassAmount, NewTokenClass, Opcode, Operation, TokenBatch, TransferPair};
pub use params::{BundleField, MachineParameter, ParameterBundle, Plugin, VotingRule};
pub use program::{CommitmentLevel, Instruction, Program, ProgramHash};
