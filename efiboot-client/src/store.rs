use anyhow::Result;
use efiboot_shared::Uuid;
use std::fmt::Display;

/// Access mode used when a variable is written back.
pub const VARIABLE_MODE: u32 = 0o644;

/// A firmware variable is identified by its vendor GUID and its name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VariableName {
    pub vendor: Uuid,
    pub name: String,
}

impl Display for VariableName {
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(fmt, "{}-{}", self.name, self.vendor.hyphenated())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variable {
    pub attributes: u32,
    pub data: Vec<u8>,
}

/// The firmware variable store.
///
/// There are no transactions: every write is applied immediately.
pub trait VariableStore {
    /// Advances the cursor over all variables, returning `None` after the last one.
    ///
    /// The order is decided by the firmware.
    fn next_variable(&mut self) -> Result<Option<VariableName>>;

    fn read(&mut self, var: &VariableName) -> Result<Variable>;

    /// Replaces the contents of `var`. `data` must have the length returned by
    /// [`VariableStore::read`] and `attributes` must be the ones read.
    fn write(&mut self, var: &VariableName, data: &[u8], attributes: u32, mode: u32) -> Result<()>;
}
