use crate::address::Address;
use crate::error::ExecutionError;
use crate::operation::{Opcode, Operation};
use crate::params::ParameterBundle;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A program hash uniquely identifies a submitted program
pub type ProgramHash = [u8; 32];

/// Represents the commitment level of a program run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommitmentLevel {
    /// Instructions are being applied to the working ledger
    Processing,
    /// Every instruction succeeded and the working ledger replaced the committed one
    Committed,
    /// An instruction failed and the working ledger was discarded
    RolledBack,
}

impl Default for CommitmentLevel {
    fn default() -> Self {
        CommitmentLevel::Processing
    }
}

impl CommitmentLevel {
    /// Whether the run has reached a terminal state
    pub fn is_final(&self) -> bool {
        !matches!(self, CommitmentLevel::Processing)
    }
}

/// A single instruction within a program
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Instruction {
    /// Who is attributed as issuing this instruction
    pub operator_address: Address,

    /// Raw opcode; unknown values are rejected at dispatch
    pub opcode: u32,

    /// Arguments, laid out according to the opcode's conventions
    pub param: ParameterBundle,
}

impl Instruction {
    pub fn new(operator_address: Address, opcode: u32, param: ParameterBundle) -> Self {
        Self {
            operator_address,
            opcode,
            param,
        }
    }

    /// Build an instruction from an already decoded operation
    pub fn from_operation(operator_address: Address, operation: &Operation) -> Self {
        Self::new(
            operator_address,
            operation.opcode().code(),
            operation.to_bundle(),
        )
    }

    /// Resolve the opcode and validate the parameter bundle against it
    pub fn decode(&self) -> Result<Operation, ExecutionError> {
        let opcode = Opcode::try_from(self.opcode)?;
        Operation::decode(opcode, &self.param)
    }
}

/// An ordered batch of instructions that is applied atomically
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Program {
    pub program_operator_address: Address,

    /// Free-form description; has no effect on execution
    #[serde(default)]
    pub notes: String,

    pub operations: Vec<Instruction>,
}

impl Program {
    pub fn new(
        program_operator_address: Address,
        notes: impl Into<String>,
        operations: Vec<Instruction>,
    ) -> Self {
        Self {
            program_operator_address,
            notes: notes.into(),
            operations,
        }
    }

    /// Deterministic hash of the program's canonical encoding
    pub fn hash(&self) -> Result<ProgramHash, ExecutionError> {
        let encoded = bincode::serialize(self)?;

        let mut hasher = Sha256::new();
        hasher.update(b"DARC_Program");
        hasher.update(&encoded);
        Ok(hasher.finalize().into())
    }

    /// Decode every instruction, reporting the first failure with its position
    pub fn decode_operations(&self) -> Result<Vec<Operation>, ExecutionError> {
        self.operations
            .iter()
            .enumerate()
            .map(|(index, instruction)| {
                instruction
                    .decode()
                    .map_err(|e| e.at_instruction(index, instruction.opcode))
            })
            .collect()
    }
}
