//! Core types used throughout ecrlib.
//!
//! Datecs-family fiscal printers share a common status block layout. These
//! types give a device-agnostic name to each fault and advisory condition
//! that block can report, independent of which bit carries it on a given
//! model.

use std::collections::BTreeSet;
use std::collections::btree_set;
use std::fmt;

/// A fault reported by the device for the command it just executed.
///
/// Faults belong to one of two groups: fatal command errors and fiscal
/// memory errors. Any fault fails the request, except [`Fault::OutOfPaper`],
/// which the protocol engines surface as a qualified success.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Fault {
    /// The command code is not recognised.
    InvalidCommand,
    /// The command payload is malformed.
    SyntaxError,
    /// The command is not allowed in the current fiscal mode.
    NotAllowedInMode,
    /// An amount or counter overflowed.
    ArithmeticOverflow,
    /// The paper roll is exhausted.
    OutOfPaper,
    /// Writing to the fiscal memory failed.
    FiscalMemoryWriteError,
    /// The fiscal memory has no free blocks left.
    FiscalMemoryFull,
    /// The fiscal memory is in read-only mode.
    FiscalMemoryReadOnly,
}

impl Fault {
    /// Returns `true` for faults in the fiscal memory group.
    pub fn is_fiscal_memory(&self) -> bool {
        matches!(
            self,
            Fault::FiscalMemoryWriteError | Fault::FiscalMemoryFull | Fault::FiscalMemoryReadOnly
        )
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Fault::InvalidCommand => "invalid command",
            Fault::SyntaxError => "syntax error",
            Fault::NotAllowedInMode => "command not allowed in the current fiscal mode",
            Fault::ArithmeticOverflow => "arithmetic overflow",
            Fault::OutOfPaper => "out of paper",
            Fault::FiscalMemoryWriteError => "error writing to the fiscal memory",
            Fault::FiscalMemoryFull => "fiscal memory full",
            Fault::FiscalMemoryReadOnly => "fiscal memory is read only",
        };
        write!(f, "{s}")
    }
}

/// An advisory condition reported alongside a reply. Never an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Condition {
    /// The customer display is not connected.
    DisplayDisconnected,
    /// The real-time clock has not been set.
    DateTimeNotSet,
    /// Fewer than 50 free blocks remain in the fiscal memory.
    FiscalMemoryLow,
    /// The IBFM flag is set.
    IbfmSet,
    /// The PIB flag is set.
    PibSet,
    /// A non-fiscal receipt is open.
    NonFiscalReceiptOpen,
    /// A fiscal receipt is open.
    FiscalReceiptOpen,
    /// Tax groups have been configured.
    TaxGroupsSet,
    /// The register is in fiscal mode.
    FiscalMode,
    /// The fiscal memory has been formatted.
    FiscalMemoryFormatted,
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Condition::DisplayDisconnected => "display not connected",
            Condition::DateTimeNotSet => "date and time not set",
            Condition::FiscalMemoryLow => "less than 50 free blocks left in fiscal memory",
            Condition::IbfmSet => "IBFM is set",
            Condition::PibSet => "PIB is set",
            Condition::NonFiscalReceiptOpen => "non fiscal receipt open",
            Condition::FiscalReceiptOpen => "fiscal receipt open",
            Condition::TaxGroupsSet => "tax groups are set",
            Condition::FiscalMode => "register is in fiscal mode",
            Condition::FiscalMemoryFormatted => "fiscal memory is formatted",
        };
        write!(f, "{s}")
    }
}

/// An unordered set of status flags with a stable iteration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlagSet<T: Ord>(BTreeSet<T>);

/// The faults decoded from one status block.
pub type FaultSet = FlagSet<Fault>;

/// The advisory conditions decoded from one status block.
pub type ConditionSet = FlagSet<Condition>;

impl<T: Ord> FlagSet<T> {
    /// Create an empty set.
    pub fn new() -> Self {
        FlagSet(BTreeSet::new())
    }

    /// Add a flag. Returns `false` if it was already present.
    pub fn insert(&mut self, flag: T) -> bool {
        self.0.insert(flag)
    }

    /// Check whether a flag is present.
    pub fn contains(&self, flag: &T) -> bool {
        self.0.contains(flag)
    }

    /// Number of flags in the set.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> btree_set::Iter<'_, T> {
        self.0.iter()
    }
}

impl<T: Ord> Default for FlagSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Ord> FromIterator<T> for FlagSet<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        FlagSet(iter.into_iter().collect())
    }
}

impl<T: Ord> IntoIterator for FlagSet<T> {
    type Item = T;
    type IntoIter = btree_set::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a, T: Ord> IntoIterator for &'a FlagSet<T> {
    type Item = &'a T;
    type IntoIter = btree_set::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl<T: Ord + fmt::Display> fmt::Display for FlagSet<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "none");
        }
        for (i, flag) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{flag}")?;
        }
        Ok(())
    }
}
