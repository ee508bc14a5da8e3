use darc_core::{
    Address, ClassAmount, ExecutionError, Instruction, LedgerEffect, NewTokenClass, Operation,
    TokenBatch, TokenClassId, TokenLedger, TransferPair,
};
use log::debug;

/// What a single instruction did to the ledger
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstructionOutcome {
    /// Balance changes, in the order they were applied
    pub effects: Vec<LedgerEffect>,
    /// Token classes created by the instruction
    pub created_classes: Vec<TokenClassId>,
}

/// Decode an instruction and apply it to the ledger
pub fn dispatch_instruction(
    ledger: &mut TokenLedger,
    instruction: &Instruction,
) -> Result<InstructionOutcome, ExecutionError> {
    let operation = instruction.decode()?;
    dispatch(ledger, &instruction.operator_address, &operation)
}

/// Route a decoded operation to its handler.
///
/// The dispatcher itself never touches the ledger; each handler owns the
/// mutations for its opcode.
pub fn dispatch(
    ledger: &mut TokenLedger,
    operator: &Address,
    operation: &Operation,
) -> Result<InstructionOutcome, ExecutionError> {
    debug!("dispatching {} for operator {}", operation.opcode(), operator);

    match operation {
        Operation::MintTokens(batches) => mint_tokens(ledger, batches),
        Operation::CreateTokenClasses(classes) => create_token_classes(ledger, classes),
        Operation::TransferTokens(batches) => transfer_tokens(ledger, operator, batches),
        Operation::TransferTokensFromTo(pairs) => transfer_tokens_from_to(ledger, pairs),
        Operation::BurnTokens(columns) => burn_tokens(ledger, operator, columns),
        Operation::BurnTokensFrom(batches) => burn_tokens_from(ledger, batches),
    }
}

fn mint_tokens(
    ledger: &mut TokenLedger,
    batches: &[TokenBatch],
) -> Result<InstructionOutcome, ExecutionError> {
    let mut outcome = InstructionOutcome::default();
    for batch in batches {
        for target in &batch.targets {
            outcome
                .effects
                .push(ledger.mint(batch.class_id, *target, batch.amount)?);
        }
    }
    Ok(outcome)
}

fn create_token_classes(
    ledger: &mut TokenLedger,
    classes: &[NewTokenClass],
) -> Result<InstructionOutcome, ExecutionError> {
    let mut outcome = InstructionOutcome::default();
    for class in classes {
        let next_id = ledger.next_class_id();
        if let Some(expected_id) = class.expected_id {
            if expected_id != next_id {
                return Err(ExecutionError::malformed(format!(
                    "token class {:?} requested id {} but the next id is {}",
                    class.label, expected_id, next_id
                )));
            }
        }

        let id = ledger.create_token_class_with_weights(
            vec![class.label.clone()],
            class.voting_weight,
            class.dividend_weight,
        );
        outcome.created_classes.push(id);
    }
    Ok(outcome)
}

fn transfer_tokens(
    ledger: &mut TokenLedger,
    operator: &Address,
    batches: &[TokenBatch],
) -> Result<InstructionOutcome, ExecutionError> {
    let mut outcome = InstructionOutcome::default();
    for batch in batches {
        for target in &batch.targets {
            outcome.effects.extend(ledger.transfer(
                batch.class_id,
                *operator,
                *target,
                batch.amount,
            )?);
        }
    }
    Ok(outcome)
}

fn transfer_tokens_from_to(
    ledger: &mut TokenLedger,
    pairs: &[TransferPair],
) -> Result<InstructionOutcome, ExecutionError> {
    let mut outcome = InstructionOutcome::default();
    for pair in pairs {
        outcome
            .effects
            .extend(ledger.transfer(pair.class_id, pair.from, pair.to, pair.amount)?);
    }
    Ok(outcome)
}

fn burn_tokens(
    ledger: &mut TokenLedger,
    operator: &Address,
    columns: &[ClassAmount],
) -> Result<InstructionOutcome, ExecutionError> {
    let mut outcome = InstructionOutcome::default();
    for column in columns {
        outcome
            .effects
            .push(ledger.burn(column.class_id, *operator, column.amount)?);
    }
    Ok(outcome)
}

fn burn_tokens_from(
    ledger: &mut TokenLedger,
    batches: &[TokenBatch],
) -> Result<InstructionOutcome, ExecutionError> {
    let mut outcome = InstructionOutcome::default();
    for batch in batches {
        for target in &batch.targets {
            outcome
                .effects
                .push(ledger.burn(batch.class_id, *target, batch.amount)?);
        }
    }
    Ok(outcome)
}
