//! Status block decoding.
//!
//! Every response carries six status bytes. Two bits act as gates: byte 0
//! bit `0x20` says "a command error is reported" and byte 4 bit `0x20` says
//! "a fiscal memory error is reported". The individual fault bits are only
//! meaningful while their group's gate is set. Condition bits are advisory
//! and read unconditionally.

use ecrlib_core::{Condition, ConditionSet, Fault, FaultSet};

use crate::frame::STATUS_LEN;

const FATAL_GATE: (usize, u8) = (0, 0x20);
const FISCAL_MEMORY_GATE: (usize, u8) = (4, 0x20);

const FATAL_BITS: &[(usize, u8, Fault)] = &[
    (0, 0x02, Fault::InvalidCommand),
    (0, 0x01, Fault::SyntaxError),
    (1, 0x02, Fault::NotAllowedInMode),
    (1, 0x01, Fault::ArithmeticOverflow),
    (2, 0x01, Fault::OutOfPaper),
];

const FISCAL_MEMORY_BITS: &[(usize, u8, Fault)] = &[
    (4, 0x01, Fault::FiscalMemoryWriteError),
    (4, 0x10, Fault::FiscalMemoryFull),
    (5, 0x01, Fault::FiscalMemoryReadOnly),
];

const CONDITION_BITS: &[(usize, u8, Condition)] = &[
    (0, 0x08, Condition::DisplayDisconnected),
    (0, 0x04, Condition::DateTimeNotSet),
    (4, 0x08, Condition::FiscalMemoryLow),
    (4, 0x04, Condition::IbfmSet),
    (4, 0x02, Condition::PibSet),
    (2, 0x20, Condition::NonFiscalReceiptOpen),
    (2, 0x08, Condition::FiscalReceiptOpen),
    (5, 0x10, Condition::TaxGroupsSet),
    (5, 0x08, Condition::FiscalMode),
    (5, 0x02, Condition::FiscalMemoryFormatted),
];

/// Structured view of one status block.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StatusReport {
    /// Command error gate (byte 0, `0x20`).
    pub fatal: bool,
    /// Fiscal memory error gate (byte 4, `0x20`).
    pub fiscal_memory: bool,
    /// Faults from whichever groups are gated on.
    pub faults: FaultSet,
    /// Advisory conditions.
    pub conditions: ConditionSet,
}

impl StatusReport {
    /// `true` when either fault group is gated on, even if no individual
    /// fault bit accompanies the gate.
    pub fn is_error(&self) -> bool {
        self.fatal || self.fiscal_memory
    }

    /// `true` when the device reported that it ran out of paper.
    pub fn out_of_paper(&self) -> bool {
        self.faults.contains(&Fault::OutOfPaper)
    }
}

fn bit(status: &[u8; STATUS_LEN], (byte, mask): (usize, u8)) -> bool {
    status[byte] & mask != 0
}

/// Decode a status block. Defined for every possible input.
///
/// # Example
///
/// ```
/// use ecrlib_core::Fault;
/// use ecrlib_dp25::status::decode;
///
/// let report = decode(&[0x21, 0, 0, 0, 0, 0]);
/// assert!(report.is_error());
/// assert!(report.faults.contains(&Fault::SyntaxError));
/// ```
pub fn decode(status: &[u8; STATUS_LEN]) -> StatusReport {
    let mut report = StatusReport {
        fatal: bit(status, FATAL_GATE),
        fiscal_memory: bit(status, FISCAL_MEMORY_GATE),
        ..Default::default()
    };

    let gated = [
        (report.fatal, FATAL_BITS),
        (report.fiscal_memory, FISCAL_MEMORY_BITS),
    ];
    for (_, table) in gated.iter().filter(|(on, _)| *on) {
        for &(byte, mask, fault) in table.iter() {
            if bit(status, (byte, mask)) {
                report.faults.insert(fault);
            }
        }
    }

    for &(byte, mask, condition) in CONDITION_BITS {
        if bit(status, (byte, mask)) {
            report.conditions.insert(condition);
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clear_status_has_nothing() {
        let report = decode(&[0; 6]);
        assert!(!report.is_error());
        assert!(report.faults.is_empty());
        assert!(report.conditions.is_empty());
        assert!(!report.out_of_paper());
    }

    #[test]
    fn syntax_error() {
        let report = decode(&[0x21, 0, 0, 0, 0, 0]);
        assert!(report.fatal);
        assert!(!report.fiscal_memory);
        assert_eq!(report.faults.iter().copied().collect::<Vec<_>>(), vec![Fault::SyntaxError]);
    }

    #[test]
    fn out_of_paper_alone() {
        let report = decode(&[0x20, 0, 0x01, 0, 0, 0]);
        assert!(report.is_error());
        assert!(report.out_of_paper());
        assert_eq!(report.faults.len(), 1);
    }

    #[test]
    fn fault_bits_ignored_without_gate() {
        let report = decode(&[0x03, 0x03, 0x01, 0, 0x11, 0x01]);
        assert!(!report.is_error());
        assert!(report.faults.is_empty());
    }

    #[test]
    fn gate_without_fault_bits_is_still_an_error() {
        let report = decode(&[0x20, 0, 0, 0, 0, 0]);
        assert!(report.is_error());
        assert!(report.faults.is_empty());
    }

    #[test]
    fn every_fatal_fault() {
        let report = decode(&[0x23, 0x03, 0x01, 0, 0, 0]);
        for fault in [
            Fault::InvalidCommand,
            Fault::SyntaxError,
            Fault::NotAllowedInMode,
            Fault::ArithmeticOverflow,
            Fault::OutOfPaper,
        ] {
            assert!(report.faults.contains(&fault), "missing {fault:?}");
        }
        assert_eq!(report.faults.len(), 5);
    }

    #[test]
    fn fiscal_memory_group() {
        let report = decode(&[0, 0, 0, 0, 0x31, 0x01]);
        assert!(!report.fatal);
        assert!(report.fiscal_memory);
        assert!(report.faults.iter().all(Fault::is_fiscal_memory));
        assert_eq!(report.faults.len(), 3);
    }

    #[test]
    fn fiscal_memory_gate_does_not_enable_fatal_bits() {
        let report = decode(&[0x02, 0, 0x01, 0, 0x20, 0]);
        assert!(report.is_error());
        assert!(report.faults.is_empty());
    }

    #[test]
    fn conditions_are_independent_of_gates() {
        let report = decode(&[0x0C, 0, 0x28, 0, 0x0E, 0x1A]);
        assert!(!report.is_error());
        assert_eq!(report.conditions.len(), 10);
    }

    #[test]
    fn typical_idle_printer() {
        // High bits are always set on real hardware and carry no meaning.
        let report = decode(&[0x80, 0x80, 0x88, 0x80, 0x86, 0x9A]);
        assert!(!report.is_error());
        let conditions: Vec<_> = report.conditions.iter().copied().collect();
        assert_eq!(
            conditions,
            vec![
                Condition::IbfmSet,
                Condition::PibSet,
                Condition::FiscalReceiptOpen,
                Condition::TaxGroupsSet,
                Condition::FiscalMode,
                Condition::FiscalMemoryFormatted,
            ]
        );
    }

    #[test]
    fn decode_is_total() {
        for value in 0..=u8::MAX {
            for position in 0..STATUS_LEN {
                let mut status = [0u8; STATUS_LEN];
                status[position] = value;
                let report = decode(&status);
                assert!(report.faults.len() <= 8);
                assert!(report.conditions.len() <= 10);
            }
        }
    }
}
