use crate::address::Address;
use crate::ledger::{Amount, TokenClassId};
use thiserror::Error;

/// Represents all possible reasons a program can be rejected by the engine
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecutionError {
    /// The opcode is not in the dispatch table
    #[error("Unknown opcode: {0}")]
    UnknownOpcode(u32),

    /// A referenced token class was never created
    #[error("Unknown token class: {0}")]
    UnknownTokenClass(TokenClassId),

    /// A burn or transfer asked for more than the current balance
    #[error("Insufficient balance of class {class_id} for {address}: have {balance}, need {requested}")]
    InsufficientBalance {
        class_id: TokenClassId,
        address: Address,
        balance: Amount,
        requested: Amount,
    },

    /// A mint would push a balance past the representable maximum
    #[error("Balance overflow of class {class_id} for {address}")]
    BalanceOverflow {
        class_id: TokenClassId,
        address: Address,
    },

    /// The parameter bundle does not match the shape the opcode expects
    #[error("Malformed parameter bundle: {0}")]
    MalformedParameterBundle(String),

    /// The authorization policy rejected the submitter or an operator
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The program carries no operations
    #[error("Program contains no operations")]
    EmptyProgram,

    /// The program carries more operations than the gateway accepts
    #[error("Program contains {count} operations, limit is {limit}")]
    TooManyOperations { count: usize, limit: usize },

    /// A program or journal frame could not be encoded or decoded
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// The committed program could not be written to the journal
    #[error("Journal error: {0}")]
    Journal(String),

    /// A failure raised while running a specific instruction of a program
    #[error("Instruction {index} (opcode {opcode}) failed: {source}")]
    Instruction {
        index: usize,
        opcode: u32,
        #[source]
        source: Box<ExecutionError>,
    },
}

impl ExecutionError {
    /// Wrap an error with the position and opcode of the failing instruction
    pub fn at_instruction(self, index: usize, opcode: u32) -> Self {
        ExecutionError::Instruction {
            index,
            opcode,
            source: Box::new(self),
        }
    }

    /// The underlying cause, with any instruction context stripped
    pub fn root(&self) -> &ExecutionError {
        match self {
            ExecutionError::Instruction { source, .. } => source.root(),
            other => other,
        }
    }

    /// Index of the failing instruction, when known
    pub fn instruction_index(&self) -> Option<usize> {
        match self {
            ExecutionError::Instruction { index, .. } => Some(*index),
            _ => None,
        }
    }

    /// Shorthand for a `MalformedParameterBundle` error
    pub fn malformed(message: impl Into<String>) -> Self {
        ExecutionError::MalformedParameterBundle(message.into())
    }
}

impl From<bincode::Error> for ExecutionError {
    fn from(err: bincode::Error) -> Self {
        ExecutionError::Encoding(err.to_string())
    }
}

impl From<std::io::Error> for ExecutionError {
    fn from(err: std::io::Error) -> Self {
        ExecutionError::Journal(err.to_string())
    }
}
