use darc::{
    Address, AllowAll, CommitmentLevel, Entrance, ExecutionError, Instruction, Opcode,
    ParameterBundle, Program, ProgramExecutor, SubmitterIsOperator,
};
use std::sync::Arc;

const OPERATOR: &str = "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266";
const TARGET_2: &str = "0x90F79bf6EB2c4f870365E785982E1f101E93b906";
const TARGET_3: &str = "0x15d34AAf54267DB7D7c367839AAf71A00a2C6A65";

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn addr(text: &str) -> Address {
    text.parse().unwrap()
}

fn operator() -> Address {
    addr(OPERATOR)
}

fn targets() -> Vec<Address> {
    vec![addr(TARGET_2), addr(TARGET_3)]
}

fn create_classes() -> Instruction {
    Instruction::new(
        operator(),
        Opcode::BatchCreateTokenClasses.code(),
        ParameterBundle::new().with_strings(vec!["Class1".into(), "Class2".into()]),
    )
}

fn column_instruction(opcode: Opcode, amounts: &[u128]) -> Instruction {
    Instruction::new(
        operator(),
        opcode.code(),
        ParameterBundle::with_class_amounts(&[0, 1], amounts).with_addresses(vec![targets()]),
    )
}

fn program(operations: Vec<Instruction>) -> Program {
    Program::new(operator(), "burn tokens", operations)
}

fn setup() -> Entrance {
    init_logging();
    let entrance = Entrance::new(Arc::new(ProgramExecutor::new()), SubmitterIsOperator);
    entrance
        .entrance(
            &operator(),
            &program(vec![
                create_classes(),
                column_instruction(Opcode::BatchMintTokens, &[100, 200]),
            ]),
        )
        .unwrap();
    entrance
}

fn balances(entrance: &Entrance) -> (u128, u128) {
    let targets = targets();
    (
        entrance.balance_of(0, &targets[0]),
        entrance.balance_of(1, &targets[1]),
    )
}

#[test]
fn partial_burn_keeps_owners() {
    let entrance = setup();
    assert_eq!(balances(&entrance), (100, 200));

    let receipt = entrance
        .entrance(
            &operator(),
            &program(vec![column_instruction(Opcode::BatchBurnTokensFrom, &[10, 40])]),
        )
        .unwrap();
    assert_eq!(receipt.commitment_level, CommitmentLevel::Committed);

    assert_eq!(balances(&entrance), (90, 160));
    assert_eq!(entrance.owners_of(0), vec![addr(TARGET_2)]);
    assert_eq!(entrance.owners_of(1), vec![addr(TARGET_3)]);
}

#[test]
fn mint_and_burn_in_one_program() {
    init_logging();
    let entrance = Entrance::new(Arc::new(ProgramExecutor::new()), SubmitterIsOperator);

    let receipt = entrance
        .entrance(
            &operator(),
            &program(vec![
                create_classes(),
                column_instruction(Opcode::BatchMintTokens, &[100, 200]),
                column_instruction(Opcode::BatchBurnTokensFrom, &[10, 40]),
            ]),
        )
        .unwrap();
    assert!(receipt.is_committed());
    assert_eq!(receipt.effects.len(), 4);

    assert_eq!(balances(&entrance), (90, 160));
    assert_eq!(entrance.owners_of(0), vec![addr(TARGET_2)]);
    assert_eq!(entrance.owners_of(1), vec![addr(TARGET_3)]);
}

#[test]
fn full_burn_removes_owners() {
    let entrance = setup();
    for amounts in [[10, 40], [90, 160]] {
        entrance
            .entrance(
                &operator(),
                &program(vec![column_instruction(Opcode::BatchBurnTokensFrom, &amounts)]),
            )
            .unwrap();
    }

    assert_eq!(balances(&entrance), (0, 0));
    assert!(entrance.owners_of(0).is_empty());
    assert!(entrance.owners_of(1).is_empty());
}

#[test]
fn over_burn_fails_and_leaves_balances() {
    let entrance = setup();

    let err = entrance
        .entrance(
            &operator(),
            &program(vec![column_instruction(Opcode::BatchBurnTokensFrom, &[101, 1])]),
        )
        .unwrap_err();
    assert_eq!(err.instruction_index(), Some(0));
    assert_eq!(
        err.root(),
        &ExecutionError::InsufficientBalance {
            class_id: 0,
            address: addr(TARGET_2),
            balance: 100,
            requested: 101,
        }
    );

    assert_eq!(balances(&entrance), (100, 200));
    assert_eq!(entrance.owners_of(0), vec![addr(TARGET_2)]);
}

#[test]
fn failure_after_successful_instructions_rolls_everything_back() {
    let entrance = setup();
    let before = entrance.executor().snapshot();

    let err = entrance
        .entrance(
            &operator(),
            &program(vec![
                column_instruction(Opcode::BatchBurnTokensFrom, &[100, 200]),
                column_instruction(Opcode::BatchMintTokens, &[5, 5]),
                column_instruction(Opcode::BatchBurnTokensFrom, &[6, 6]),
            ]),
        )
        .unwrap_err();

    assert_eq!(err.instruction_index(), Some(2));
    assert_eq!(*entrance.executor().snapshot(), *before);
    assert_eq!(entrance.owners_of(1), vec![addr(TARGET_3)]);
}

#[test]
fn burning_zero_changes_nothing() {
    let entrance = setup();
    entrance
        .entrance(
            &operator(),
            &program(vec![column_instruction(Opcode::BatchBurnTokensFrom, &[0, 0])]),
        )
        .unwrap();

    assert_eq!(balances(&entrance), (100, 200));
    assert_eq!(entrance.owners_of(0), vec![addr(TARGET_2)]);

    // zero burn against an address holding nothing is still fine
    let stranger = Address::from_seed(b"stranger");
    entrance
        .entrance(
            &operator(),
            &program(vec![Instruction::new(
                operator(),
                Opcode::BatchBurnTokensFrom.code(),
                ParameterBundle::with_class_amounts(&[0], &[0])
                    .with_addresses(vec![vec![stranger]]),
            )]),
        )
        .unwrap();
    assert!(!entrance.owners_of(0).contains(&stranger));
}

#[test]
fn program_submitted_as_json() {
    init_logging();
    let entrance = Entrance::new(Arc::new(ProgramExecutor::new()), AllowAll);

    let json = format!(
        r#"{{
            "programOperatorAddress": "{OPERATOR}",
            "notes": "create and mint",
            "operations": [
                {{
                    "operatorAddress": "{OPERATOR}",
                    "opcode": 2,
                    "param": {{ "STRING_ARRAY": ["Class1", "Class2"] }}
                }},
                {{
                    "operatorAddress": "{OPERATOR}",
                    "opcode": 1,
                    "param": {{
                        "UINT256_2DARRAY": [[0, 1], [100, 200]],
                        "ADDRESS_2DARRAY": [["{TARGET_2}", "{TARGET_3}"]]
                    }}
                }}
            ]
        }}"#
    );
    let program: Program = serde_json::from_str(&json).unwrap();

    let receipt = entrance
        .entrance(&Address::from_seed(b"anyone"), &program)
        .unwrap();
    assert_eq!(receipt.created_classes, vec![0, 1]);
    assert_eq!(entrance.balance_of(0, &addr(TARGET_2)), 100);
    assert_eq!(entrance.balance_of(1, &addr(TARGET_3)), 200);

    let encoded = serde_json::to_value(&receipt).unwrap();
    assert_eq!(encoded["commitment_level"], "Committed");
}
