use crate::address::Address;
use crate::error::ExecutionError;
use crate::ledger::{Amount, TokenClassId};
use crate::params::{to_class_id, BundleField, ParameterBundle};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Ledger operations the engine knows how to execute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum Opcode {
    BatchMintTokens = 1,
    BatchCreateTokenClasses = 2,
    BatchTransferTokens = 3,
    BatchTransferTokensFromTo = 4,
    BatchBurnTokens = 5,
    BatchBurnTokensFrom = 6,
}

impl Opcode {
    pub const ALL: [Opcode; 6] = [
        Opcode::BatchMintTokens,
        Opcode::BatchCreateTokenClasses,
        Opcode::BatchTransferTokens,
        Opcode::BatchTransferTokensFromTo,
        Opcode::BatchBurnTokens,
        Opcode::BatchBurnTokensFrom,
    ];

    pub fn code(self) -> u32 {
        self as u32
    }

    pub fn name(self) -> &'static str {
        match self {
            Opcode::BatchMintTokens => "BATCH_MINT_TOKENS",
            Opcode::BatchCreateTokenClasses => "BATCH_CREATE_TOKEN_CLASSES",
            Opcode::BatchTransferTokens => "BATCH_TRANSFER_TOKENS",
            Opcode::BatchTransferTokensFromTo => "BATCH_TRANSFER_TOKENS_FROM_TO",
            Opcode::BatchBurnTokens => "BATCH_BURN_TOKENS",
            Opcode::BatchBurnTokensFrom => "BATCH_BURN_TOKENS_FROM",
        }
    }
}

impl TryFrom<u32> for Opcode {
    type Error = ExecutionError;

    fn try_from(code: u32) -> Result<Self, Self::Error> {
        Opcode::ALL
            .into_iter()
            .find(|opcode| opcode.code() == code)
            .ok_or(ExecutionError::UnknownOpcode(code))
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), self.code())
    }
}

/// One column of a batch: an amount of a class applied to each target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenBatch {
    pub class_id: TokenClassId,
    pub amount: Amount,
    pub targets: Vec<Address>,
}

/// One column of a from-to transfer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferPair {
    pub class_id: TokenClassId,
    pub amount: Amount,
    pub from: Address,
    pub to: Address,
}

/// One column of a burn from the instruction operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassAmount {
    pub class_id: TokenClassId,
    pub amount: Amount,
}

/// A token class requested by `BatchCreateTokenClasses`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTokenClass {
    /// Id the caller expects the class to receive, if one was supplied
    pub expected_id: Option<TokenClassId>,
    pub label: String,
    pub voting_weight: Amount,
    pub dividend_weight: Amount,
}

/// A decoded instruction: one variant per opcode, carrying only the fields
/// that opcode consumes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    MintTokens(Vec<TokenBatch>),
    CreateTokenClasses(Vec<NewTokenClass>),
    TransferTokens(Vec<TokenBatch>),
    TransferTokensFromTo(Vec<TransferPair>),
    BurnTokens(Vec<ClassAmount>),
    BurnTokensFrom(Vec<TokenBatch>),
}

impl Operation {
    /// Decode and validate a parameter bundle for the given opcode.
    ///
    /// All shape checks happen here, so a decoded operation never needs to
    /// look at the raw bundle again.
    pub fn decode(opcode: Opcode, bundle: &ParameterBundle) -> Result<Self, ExecutionError> {
        match opcode {
            Opcode::BatchMintTokens => decode_batches(bundle).map(Operation::MintTokens),
            Opcode::BatchCreateTokenClasses => {
                decode_new_classes(bundle).map(Operation::CreateTokenClasses)
            }
            Opcode::BatchTransferTokens => decode_batches(bundle).map(Operation::TransferTokens),
            Opcode::BatchTransferTokensFromTo => {
                decode_transfer_pairs(bundle).map(Operation::TransferTokensFromTo)
            }
            Opcode::BatchBurnTokens => {
                bundle.require_only(&[BundleField::Uint2DArray])?;
                let columns = bundle.class_amount_columns()?;
                Ok(Operation::BurnTokens(
                    columns
                        .into_iter()
                        .map(|(class_id, amount)| ClassAmount { class_id, amount })
                        .collect(),
                ))
            }
            Opcode::BatchBurnTokensFrom => decode_batches(bundle).map(Operation::BurnTokensFrom),
        }
    }

    pub fn opcode(&self) -> Opcode {
        match self {
            Operation::MintTokens(_) => Opcode::BatchMintTokens,
            Operation::CreateTokenClasses(_) => Opcode::BatchCreateTokenClasses,
            Operation::TransferTokens(_) => Opcode::BatchTransferTokens,
            Operation::TransferTokensFromTo(_) => Opcode::BatchTransferTokensFromTo,
            Operation::BurnTokens(_) => Opcode::BatchBurnTokens,
            Operation::BurnTokensFrom(_) => Opcode::BatchBurnTokensFrom,
        }
    }

    /// Pack the operation back into the row-aligned bundle layout
    pub fn to_bundle(&self) -> ParameterBundle {
        match self {
            Operation::MintTokens(batches)
            | Operation::TransferTokens(batches)
            | Operation::BurnTokensFrom(batches) => {
                let class_ids: Vec<TokenClassId> = batches.iter().map(|b| b.class_id).collect();
                let amounts: Vec<Amount> = batches.iter().map(|b| b.amount).collect();

                let rows = if batches.iter().all(|b| b.targets.len() == 1) {
                    vec![batches.iter().map(|b| b.targets[0]).collect()]
                } else {
                    batches.iter().map(|b| b.targets.clone()).collect()
                };
                ParameterBundle::with_class_amounts(&class_ids, &amounts).with_addresses(rows)
            }
            Operation::CreateTokenClasses(classes) => ParameterBundle {
                string_array: classes.iter().map(|c| c.label.clone()).collect(),
                uint256_2darray: create_class_rows(classes),
                ..ParameterBundle::default()
            },
            Operation::TransferTokensFromTo(pairs) => {
                let class_ids: Vec<TokenClassId> = pairs.iter().map(|p| p.class_id).collect();
                let amounts: Vec<Amount> = pairs.iter().map(|p| p.amount).collect();
                ParameterBundle::with_class_amounts(&class_ids, &amounts).with_addresses(vec![
                    pairs.iter().map(|p| p.from).collect(),
                    pairs.iter().map(|p| p.to).collect(),
                ])
            }
            Operation::BurnTokens(columns) => {
                let class_ids: Vec<TokenClassId> = columns.iter().map(|c| c.class_id).collect();
                let amounts: Vec<Amount> = columns.iter().map(|c| c.amount).collect();
                ParameterBundle::with_class_amounts(&class_ids, &amounts)
            }
        }
    }
}

/// Resolve the address rows of a batch into per-column target lists.
///
/// A single row as long as the column count pairs one address with each
/// column. Otherwise there must be one row per column, and every address in
/// row `i` is a target of column `i`.
fn column_targets(
    rows: &[Vec<Address>],
    columns: usize,
) -> Result<Vec<Vec<Address>>, ExecutionError> {
    match rows {
        [row] if row.len() == columns => Ok(row.iter().map(|address| vec![*address]).collect()),
        rows if rows.len() == columns => {
            if let Some(index) = rows.iter().position(Vec::is_empty) {
                return Err(ExecutionError::malformed(format!(
                    "ADDRESS_2DARRAY row {} has no addresses",
                    index
                )));
            }
            Ok(rows.to_vec())
        }
        _ => Err(ExecutionError::malformed(format!(
            "ADDRESS_2DARRAY has {} rows which cannot be aligned with {} columns",
            rows.len(),
            columns
        ))),
    }
}

fn decode_batches(bundle: &ParameterBundle) -> Result<Vec<TokenBatch>, ExecutionError> {
    bundle.require_only(&[BundleField::Uint2DArray, BundleField::Address2DArray])?;
    let columns = bundle.class_amount_columns()?;
    let targets = column_targets(&bundle.address_2darray, columns.len())?;

    Ok(columns
        .into_iter()
        .zip(targets)
        .map(|((class_id, amount), targets)| TokenBatch {
            class_id,
            amount,
            targets,
        })
        .collect())
}

fn decode_transfer_pairs(bundle: &ParameterBundle) -> Result<Vec<TransferPair>, ExecutionError> {
    bundle.require_only(&[BundleField::Uint2DArray, BundleField::Address2DArray])?;
    let columns = bundle.class_amount_columns()?;

    let [senders, recipients] = bundle.address_2darray.as_slice() else {
        return Err(ExecutionError::malformed(format!(
            "ADDRESS_2DARRAY must have 2 rows (from, to), got {}",
            bundle.address_2darray.len()
        )));
    };
    if senders.len() != columns.len() || recipients.len() != columns.len() {
        return Err(ExecutionError::malformed(format!(
            "ADDRESS_2DARRAY rows must each have {} addresses",
            columns.len()
        )));
    }

    Ok(columns
        .into_iter()
        .zip(senders.iter().zip(recipients))
        .map(|((class_id, amount), (from, to))| TransferPair {
            class_id,
            amount,
            from: *from,
            to: *to,
        })
        .collect())
}

fn decode_new_classes(bundle: &ParameterBundle) -> Result<Vec<NewTokenClass>, ExecutionError> {
    bundle.require_only(&[BundleField::StringArray, BundleField::Uint2DArray])?;

    let labels = &bundle.string_array;
    if labels.is_empty() {
        return Err(ExecutionError::malformed(
            "STRING_ARRAY must name at least one token class",
        ));
    }

    let rows = &bundle.uint256_2darray;
    if rows.len() > 3 {
        return Err(ExecutionError::malformed(format!(
            "UINT256_2DARRAY has {} rows, at most 3 (ids, voting weights, dividend weights) allowed",
            rows.len()
        )));
    }
    if let Some(index) = rows.iter().position(|row| row.len() != labels.len()) {
        return Err(ExecutionError::malformed(format!(
            "UINT256_2DARRAY row {} must have one entry per label ({})",
            index,
            labels.len()
        )));
    }

    labels
        .iter()
        .enumerate()
        .map(|(column, label)| {
            let expected_id = rows
                .first()
                .map(|ids| to_class_id(ids[column]))
                .transpose()?;
            Ok(NewTokenClass {
                expected_id,
                label: label.clone(),
                voting_weight: rows.get(1).map(|row| row[column]).unwrap_or(0),
                dividend_weight: rows.get(2).map(|row| row[column]).unwrap_or(0),
            })
        })
        .collect()
}

/// Auxiliary rows for `BatchCreateTokenClasses`.
///
/// The rows are positional with ids first, so they are only emitted when
/// every class carries an expected id. Otherwise the bundle has no rows and
/// the weights default to 0 when decoded.
fn create_class_rows(classes: &[NewTokenClass]) -> Vec<Vec<Amount>> {
    let Some(ids) = classes
        .iter()
        .map(|c| c.expected_id.map(Amount::from))
        .collect::<Option<Vec<_>>>()
    else {
        return Vec::new();
    };

    vec![
        ids,
        classes.iter().map(|c| c.voting_weight).collect(),
        classes.iter().map(|c| c.dividend_weight).collect(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(seed: &str) -> Address {
        Address::from_seed(seed.as_bytes())
    }

    #[test]
    fn test_opcode_from_code() {
        assert_eq!(Opcode::try_from(1), Ok(Opcode::BatchMintTokens));
        assert_eq!(Opcode::try_from(6), Ok(Opcode::BatchBurnTokensFrom));
        assert_eq!(Opcode::try_from(0), Err(ExecutionError::UnknownOpcode(0)));
        assert_eq!(Opcode::try_from(99), Err(ExecutionError::UnknownOpcode(99)));
        assert_eq!(
            Opcode::BatchBurnTokensFrom.to_string(),
            "BATCH_BURN_TOKENS_FROM (6)"
        );
    }

    #[test]
    fn test_single_row_pairs_addresses_with_columns() {
        let bundle = ParameterBundle::with_class_amounts(&[0, 1], &[100, 200])
            .with_addresses(vec![vec![addr("t2"), addr("t3")]]);

        let operation = Operation::decode(Opcode::BatchMintTokens, &bundle).unwrap();
        assert_eq!(
            operation,
            Operation::MintTokens(vec![
                TokenBatch {
                    class_id: 0,
                    amount: 100,
                    targets: vec![addr("t2")]
                },
                TokenBatch {
                    class_id: 1,
                    amount: 200,
                    targets: vec![addr("t3")]
                },
            ])
        );
    }

    #[test]
    fn test_row_per_column_targets_every_address_in_row() {
        let bundle = ParameterBundle::with_class_amounts(&[0, 1], &[5, 7]).with_addresses(vec![
            vec![addr("a"), addr("b"), addr("c")],
            vec![addr("d")],
        ]);

        let Operation::BurnTokensFrom(batches) =
            Operation::decode(Opcode::BatchBurnTokensFrom, &bundle).unwrap()
        else {
            panic!("wrong variant");
        };
        assert_eq!(batches[0].targets, vec![addr("a"), addr("b"), addr("c")]);
        assert_eq!(batches[1].targets, vec![addr("d")]);
    }

    #[test]
    fn test_single_column_broadcasts_whole_row() {
        let bundle = ParameterBundle::with_class_amounts(&[0], &[5])
            .with_addresses(vec![vec![addr("a"), addr("b")]]);

        let Operation::MintTokens(batches) =
            Operation::decode(Opcode::BatchMintTokens, &bundle).unwrap()
        else {
            panic!("wrong variant");
        };
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].targets, vec![addr("a"), addr("b")]);
    }

    #[test]
    fn test_misaligned_addresses_are_malformed() {
        let cases = vec![
            vec![],
            vec![vec![addr("a")], vec![addr("b")], vec![addr("c")]],
            vec![vec![addr("a"), addr("b"), addr("c")]],
            vec![vec![addr("a")], vec![]],
        ];

        for rows in cases {
            let bundle =
                ParameterBundle::with_class_amounts(&[0, 1], &[5, 7]).with_addresses(rows.clone());
            assert!(
                matches!(
                    Operation::decode(Opcode::BatchMintTokens, &bundle),
                    Err(ExecutionError::MalformedParameterBundle(_))
                ),
                "rows {:?} should be rejected",
                rows
            );
        }
    }

    #[test]
    fn test_unused_fields_must_be_empty() {
        let mut bundle = ParameterBundle::with_class_amounts(&[0], &[5])
            .with_addresses(vec![vec![addr("a")]]);
        bundle.bool_array = vec![true];

        assert!(matches!(
            Operation::decode(Opcode::BatchMintTokens, &bundle),
            Err(ExecutionError::MalformedParameterBundle(_))
        ));

        let bundle = ParameterBundle::with_class_amounts(&[0], &[5])
            .with_addresses(vec![vec![addr("a")]]);
        assert!(matches!(
            Operation::decode(Opcode::BatchBurnTokens, &bundle),
            Err(ExecutionError::MalformedParameterBundle(_))
        ));
    }

    #[test]
    fn test_create_token_classes_reads_auxiliary_rows() {
        let bundle = ParameterBundle {
            string_array: vec!["Class1".into(), "Class2".into()],
            uint256_2darray: vec![vec![0, 1], vec![10, 1], vec![10, 1]],
            ..ParameterBundle::default()
        };

        let operation = Operation::decode(Opcode::BatchCreateTokenClasses, &bundle).unwrap();
        assert_eq!(
            operation,
            Operation::CreateTokenClasses(vec![
                NewTokenClass {
                    expected_id: Some(0),
                    label: "Class1".into(),
                    voting_weight: 10,
                    dividend_weight: 10,
                },
                NewTokenClass {
                    expected_id: Some(1),
                    label: "Class2".into(),
                    voting_weight: 1,
                    dividend_weight: 1,
                },
            ])
        );
        assert_eq!(operation.to_bundle(), bundle);
    }

    #[test]
    fn test_create_token_classes_without_rows() {
        let bundle = ParameterBundle::new().with_strings(vec!["Only".into()]);
        let Operation::CreateTokenClasses(classes) =
            Operation::decode(Opcode::BatchCreateTokenClasses, &bundle).unwrap()
        else {
            panic!("wrong variant");
        };
        assert_eq!(classes[0].expected_id, None);
        assert_eq!(classes[0].voting_weight, 0);

        let empty = ParameterBundle::new();
        assert!(Operation::decode(Opcode::BatchCreateTokenClasses, &empty).is_err());

        let short_row = ParameterBundle {
            string_array: vec!["A".into(), "B".into()],
            uint256_2darray: vec![vec![0]],
            ..ParameterBundle::default()
        };
        assert!(Operation::decode(Opcode::BatchCreateTokenClasses, &short_row).is_err());
    }

    #[test]
    fn test_create_token_classes_with_partial_ids_encodes_without_rows() {
        let operation = Operation::CreateTokenClasses(vec![
            NewTokenClass {
                expected_id: Some(0),
                label: "Class1".into(),
                voting_weight: 10,
                dividend_weight: 10,
            },
            NewTokenClass {
                expected_id: None,
                label: "Class2".into(),
                voting_weight: 1,
                dividend_weight: 1,
            },
        ]);

        let bundle = operation.to_bundle();
        assert!(bundle.uint256_2darray.is_empty());

        let Operation::CreateTokenClasses(classes) =
            Operation::decode(Opcode::BatchCreateTokenClasses, &bundle).unwrap()
        else {
            panic!("wrong variant");
        };
        assert_eq!(classes.len(), 2);
        assert!(classes.iter().all(|c| c.expected_id.is_none()));
    }

    #[test]
    fn test_transfer_from_to_needs_two_aligned_rows() {
        let bundle = ParameterBundle::with_class_amounts(&[0], &[3])
            .with_addresses(vec![vec![addr("from")], vec![addr("to")]]);
        assert_eq!(
            Operation::decode(Opcode::BatchTransferTokensFromTo, &bundle).unwrap(),
            Operation::TransferTokensFromTo(vec![TransferPair {
                class_id: 0,
                amount: 3,
                from: addr("from"),
                to: addr("to"),
            }])
        );

        let one_row = ParameterBundle::with_class_amounts(&[0], &[3])
            .with_addresses(vec![vec![addr("from")]]);
        assert!(Operation::decode(Opcode::BatchTransferTokensFromTo, &one_row).is_err());
    }

    #[test]
    fn test_to_bundle_uses_single_row_when_possible() {
        let bundle = ParameterBundle::with_class_amounts(&[0, 1], &[90, 160])
            .with_addresses(vec![vec![addr("t2"), addr("t3")]]);
        let operation = Operation::decode(Opcode::BatchBurnTokensFrom, &bundle).unwrap();

        assert_eq!(operation.opcode(), Opcode::BatchBurnTokensFrom);
        assert_eq!(operation.to_bundle(), bundle);
    }
}
