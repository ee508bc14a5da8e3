use crate::address::Address;
use crate::error::ExecutionError;
use crate::ledger::{Amount, TokenClassId};
use serde::{Deserialize, Serialize};

/// Encoded voting rule; evaluated by governance layers outside the engine
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VotingRule {
    pub encoded: Vec<u8>,
}

/// Encoded machine parameter; interpreted outside the engine
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineParameter {
    pub encoded: Vec<u8>,
}

/// Encoded plugin definition; executed by plugin hosts outside the engine
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plugin {
    pub encoded: Vec<u8>,
}

/// Generic argument container every instruction's parameters are packed into.
///
/// Ledger opcodes use two conventions:
/// * `uint256_2darray`: row 0 holds token class ids, row 1 the matching amounts
/// * `address_2darray`: row 0 holds the target addresses
///
/// Fields an opcode does not consume must be left empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", default)]
pub struct ParameterBundle {
    pub string_array: Vec<String>,
    pub bool_array: Vec<bool>,
    pub voting_rule_array: Vec<VotingRule>,
    pub parameter_array: Vec<MachineParameter>,
    pub plugin_array: Vec<Plugin>,
    #[serde(rename = "UINT256_2DARRAY")]
    pub uint256_2darray: Vec<Vec<Amount>>,
    #[serde(rename = "ADDRESS_2DARRAY")]
    pub address_2darray: Vec<Vec<Address>>,
    pub bytes: Vec<u8>,
}

/// Names of the bundle fields, used in validation messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BundleField {
    StringArray,
    BoolArray,
    VotingRuleArray,
    ParameterArray,
    PluginArray,
    Uint2DArray,
    Address2DArray,
    Bytes,
}

impl BundleField {
    pub fn name(&self) -> &'static str {
        match self {
            BundleField::StringArray => "STRING_ARRAY",
            BundleField::BoolArray => "BOOL_ARRAY",
            BundleField::VotingRuleArray => "VOTING_RULE_ARRAY",
            BundleField::ParameterArray => "PARAMETER_ARRAY",
            BundleField::PluginArray => "PLUGIN_ARRAY",
            BundleField::Uint2DArray => "UINT256_2DARRAY",
            BundleField::Address2DArray => "ADDRESS_2DARRAY",
            BundleField::Bytes => "BYTES",
        }
    }

    pub const ALL: [BundleField; 8] = [
        BundleField::StringArray,
        BundleField::BoolArray,
        BundleField::VotingRuleArray,
        BundleField::ParameterArray,
        BundleField::PluginArray,
        BundleField::Uint2DArray,
        BundleField::Address2DArray,
        BundleField::Bytes,
    ];
}

impl ParameterBundle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bundle with class ids and amounts in the 2-D integer array
    pub fn with_class_amounts(class_ids: &[TokenClassId], amounts: &[Amount]) -> Self {
        Self {
            uint256_2darray: vec![
                class_ids.iter().map(|id| Amount::from(*id)).collect(),
                amounts.to_vec(),
            ],
            ..Self::default()
        }
    }

    /// Builder-style setter for the address rows
    pub fn with_addresses(mut self, rows: Vec<Vec<Address>>) -> Self {
        self.address_2darray = rows;
        self
    }

    /// Builder-style setter for the string array
    pub fn with_strings(mut self, strings: Vec<String>) -> Self {
        self.string_array = strings;
        self
    }

    pub fn is_field_empty(&self, field: BundleField) -> bool {
        match field {
            BundleField::StringArray => self.string_array.is_empty(),
            BundleField::BoolArray => self.bool_array.is_empty(),
            BundleField::VotingRuleArray => self.voting_rule_array.is_empty(),
            BundleField::ParameterArray => self.parameter_array.is_empty(),
            BundleField::PluginArray => self.plugin_array.is_empty(),
            BundleField::Uint2DArray => self.uint256_2darray.is_empty(),
            BundleField::Address2DArray => self.address_2darray.is_empty(),
            BundleField::Bytes => self.bytes.is_empty(),
        }
    }

    /// Check that every field outside `consumed` is empty
    pub fn require_only(&self, consumed: &[BundleField]) -> Result<(), ExecutionError> {
        for field in BundleField::ALL {
            if !consumed.contains(&field) && !self.is_field_empty(field) {
                return Err(ExecutionError::malformed(format!(
                    "{} must be empty for this opcode",
                    field.name()
                )));
            }
        }
        Ok(())
    }

    /// Read rows 0 and 1 of the 2-D integer array as (class id, amount) columns.
    ///
    /// Both rows must be present and of equal, non-zero length, and every
    /// class id must fit a `TokenClassId`. Extra rows are rejected.
    pub fn class_amount_columns(&self) -> Result<Vec<(TokenClassId, Amount)>, ExecutionError> {
        let [class_ids, amounts] = self.uint256_2darray.as_slice() else {
            return Err(ExecutionError::malformed(format!(
                "UINT256_2DARRAY must have 2 rows (class ids, amounts), got {}",
                self.uint256_2darray.len()
            )));
        };

        if class_ids.len() != amounts.len() {
            return Err(ExecutionError::malformed(format!(
                "UINT256_2DARRAY rows are misaligned: {} class ids, {} amounts",
                class_ids.len(),
                amounts.len()
            )));
        }
        if class_ids.is_empty() {
            return Err(ExecutionError::malformed("UINT256_2DARRAY has no columns"));
        }

        class_ids
            .iter()
            .zip(amounts)
            .map(|(class_id, amount)| Ok((to_class_id(*class_id)?, *amount)))
            .collect()
    }
}

/// Narrow a 2-D array entry to a token class id
pub fn to_class_id(value: Amount) -> Result<TokenClassId, ExecutionError> {
    TokenClassId::try_from(value)
        .map_err(|_| ExecutionError::malformed(format!("token class id {} is out of range", value)))
}
