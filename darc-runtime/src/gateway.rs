use anyhow::Context;
use darc_core::{Address, Amount, ExecutionError, Program, TokenClassId};
use log::{debug, warn};
use std::sync::Arc;

use crate::config::{EntranceConfig, PolicyKind, DEFAULT_MAX_OPERATIONS};
use crate::executor::ProgramExecutor;
use crate::journal::FileProgramJournal;
use crate::policy::{AllowAll, AuthorizationPolicy, SubmitterIsOperator};
use crate::receipt::ProgramReceipt;

/// The single external entry point for programs.
///
/// The entrance checks that a program is well formed and that the submitter
/// may run it, then hands it to the executor and returns the executor's
/// result unchanged.
pub struct Entrance<P = SubmitterIsOperator> {
    executor: Arc<ProgramExecutor>,
    policy: P,
    max_operations: usize,
}

impl<P: AuthorizationPolicy> Entrance<P> {
    pub fn new(executor: Arc<ProgramExecutor>, policy: P) -> Self {
        Self {
            executor,
            policy,
            max_operations: DEFAULT_MAX_OPERATIONS,
        }
    }

    /// Reject programs with more than `limit` instructions
    pub fn with_max_operations(mut self, limit: usize) -> Self {
        self.max_operations = limit;
        self
    }

    pub fn executor(&self) -> &Arc<ProgramExecutor> {
        &self.executor
    }

    pub fn max_operations(&self) -> usize {
        self.max_operations
    }

    /// Structural checks that need no ledger state
    pub fn validate(&self, program: &Program) -> Result<(), ExecutionError> {
        let count = program.operations.len();
        if count == 0 {
            return Err(ExecutionError::EmptyProgram);
        }
        if count > self.max_operations {
            return Err(ExecutionError::TooManyOperations {
                count,
                limit: self.max_operations,
            });
        }

        program.decode_operations()?;
        Ok(())
    }

    /// Submit a program on behalf of `submitter`
    pub fn entrance(
        &self,
        submitter: &Address,
        program: &Program,
    ) -> Result<ProgramReceipt, ExecutionError> {
        debug!(
            "program from {} with {} instructions",
            submitter,
            program.operations.len()
        );
        self.validate(program)?;

        if let Err(reason) = self.policy.authorize(submitter, program) {
            warn!("rejected program from {}: {}", submitter, reason);
            return Err(ExecutionError::Unauthorized(reason));
        }

        self.executor.execute(program)
    }

    pub fn balance_of(&self, class_id: TokenClassId, owner: &Address) -> Amount {
        self.executor.balance_of(class_id, owner)
    }

    pub fn owners_of(&self, class_id: TokenClassId) -> Vec<Address> {
        self.executor.owners_of(class_id)
    }
}

impl Entrance<Box<dyn AuthorizationPolicy>> {
    /// Build an entrance and its executor from configuration.
    ///
    /// With a journal path, the journal is replayed first and every later
    /// commit is appended to it.
    pub fn from_config(config: &EntranceConfig) -> anyhow::Result<Self> {
        let executor = match &config.journal_path {
            Some(path) => {
                let journal = FileProgramJournal::open(path).with_context(|| {
                    format!("Failed to open program journal {}", path.display())
                })?;
                ProgramExecutor::replay(&journal)
                    .with_context(|| format!("Failed to replay {}", path.display()))?
                    .with_journal(Box::new(journal))
            }
            None => ProgramExecutor::new(),
        };

        let policy: Box<dyn AuthorizationPolicy> = match config.policy {
            PolicyKind::AllowAll => Box::new(AllowAll),
            PolicyKind::SubmitterIsOperator => Box::new(SubmitterIsOperator),
        };

        Ok(Entrance::new(Arc::new(executor), policy).with_max_operations(config.max_operations))
    }
}
