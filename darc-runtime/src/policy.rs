use darc_core::{Address, Program};

/// Decides whether a submitter may run a program.
///
/// This is the extension point for governance: voting rules, plugins and
/// rate limits live behind implementations of this trait. A rejection
/// carries a human-readable reason.
pub trait AuthorizationPolicy: Send + Sync {
    fn authorize(&self, submitter: &Address, program: &Program) -> Result<(), String>;
}

impl<P: AuthorizationPolicy + ?Sized> AuthorizationPolicy for Box<P> {
    fn authorize(&self, submitter: &Address, program: &Program) -> Result<(), String> {
        (**self).authorize(submitter, program)
    }
}

/// Accepts every program
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl AuthorizationPolicy for AllowAll {
    fn authorize(&self, _submitter: &Address, _program: &Program) -> Result<(), String> {
        Ok(())
    }
}

/// Requires the submitter to be the program operator and the operator of
/// every instruction
#[derive(Debug, Clone, Copy, Default)]
pub struct SubmitterIsOperator;

impl AuthorizationPolicy for SubmitterIsOperator {
    fn authorize(&self, submitter: &Address, program: &Program) -> Result<(), String> {
        if program.program_operator_address != *submitter {
            return Err(format!(
                "submitter {} is not the program operator {}",
                submitter, program.program_operator_address
            ));
        }

        if let Some((index, instruction)) = program
            .operations
            .iter()
            .enumerate()
            .find(|(_, instruction)| instruction.operator_address != *submitter)
        {
            return Err(format!(
                "instruction {} is attributed to {}, not the submitter {}",
                index, instruction.operator_address, submitter
            ));
        }

        Ok(())
    }
}
