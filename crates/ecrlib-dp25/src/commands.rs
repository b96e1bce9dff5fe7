//! DP-25 command builders and reply parsers.
//!
//! Builders produce a [`Command`] (code plus ASCII payload) and parsers
//! interpret the comma-separated payload of a settled [`Response`]. Nothing
//! here performs I/O; [`Dp25`](crate::Dp25) glues the two together.
//!
//! Numeric values are passed through as the device formats them (for
//! example `"12.50"`), except where a reply is documented to carry integer
//! minor units.

use std::str::Split;

use ecrlib_core::{Error, Result};

use crate::queue::Response;

// ---------------------------------------------------------------
// Command codes
// ---------------------------------------------------------------

/// Clear the customer display (cmd 0x21).
pub const CMD_CLEAR_DISPLAY: u8 = 0x21;

/// Show text on the lower display line (cmd 0x23).
pub const CMD_DISPLAY_BOTTOM: u8 = 0x23;

/// Show text on the upper display line (cmd 0x2F).
pub const CMD_DISPLAY_TOP: u8 = 0x2F;

/// No-op round trip (cmd 0x2D).
pub const CMD_TEST_COMMUNICATION: u8 = 0x2D;

/// Open a fiscal receipt (cmd 0x30).
pub const CMD_OPEN_FISCAL_RECEIPT: u8 = 0x30;

/// Subtotal of the open receipt (cmd 0x33).
pub const CMD_SUBTOTAL: u8 = 0x33;

/// Register a sale on the open receipt (cmd 0x34).
pub const CMD_REGISTER_SALE: u8 = 0x34;

/// Total and payment (cmd 0x35).
pub const CMD_TOTAL: u8 = 0x35;

/// Close the open fiscal receipt (cmd 0x38).
pub const CMD_CLOSE_FISCAL_RECEIPT: u8 = 0x38;

/// Daily totals by payment type (cmd 0x41).
pub const CMD_GET_TOTALS: u8 = 0x41;

/// Status of the current receipt (cmd 0x4C).
pub const CMD_RECEIPT_STATUS: u8 = 0x4C;

/// PLU programming and sold-item enumeration (cmd 0x6B).
pub const CMD_PROGRAM_ITEMS: u8 = 0x6B;

/// Characters per display line.
pub const DISPLAY_WIDTH: usize = 20;

/// Payload of a totals query: sums by payment type.
const TOTALS_BY_PAYMENT: &str = "4";

/// First field of a reply the device marks as failed.
const FAILED: &str = "F";

/// A command code and its payload, ready for [`Dp25::execute`](crate::Dp25::execute).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub code: u8,
    pub data: Vec<u8>,
}

impl Command {
    fn new(code: u8, data: impl Into<Vec<u8>>) -> Self {
        Command {
            code,
            data: data.into(),
        }
    }
}

// ---------------------------------------------------------------
// Builders
// ---------------------------------------------------------------

pub fn clear_display() -> Command {
    Command::new(CMD_CLEAR_DISPLAY, Vec::new())
}

/// Text for the lower display line, cut to [`DISPLAY_WIDTH`] characters.
pub fn display_bottom(text: &str) -> Command {
    Command::new(CMD_DISPLAY_BOTTOM, display_line(text))
}

/// Text for the upper display line, cut to [`DISPLAY_WIDTH`] characters.
pub fn display_top(text: &str) -> Command {
    Command::new(CMD_DISPLAY_TOP, display_line(text))
}

fn display_line(text: &str) -> String {
    text.chars().take(DISPLAY_WIDTH).collect()
}

pub fn test_communication() -> Command {
    Command::new(CMD_TEST_COMMUNICATION, Vec::new())
}

/// Open a fiscal receipt for an operator: `op;password,till`.
pub fn open_fiscal_receipt(operator: u32, password: &str, till: u32) -> Command {
    Command::new(
        CMD_OPEN_FISCAL_RECEIPT,
        format!("{operator};{password},{till}"),
    )
}

/// Register a sale of a programmed item: `S{sign}{plu}*{quantity}#{price}`.
///
/// `sign` is empty for a sale and `-` for a void.
pub fn register_sale(sign: &str, plu: &str, quantity: &str, price: &str) -> Command {
    Command::new(
        CMD_REGISTER_SALE,
        format!("S{sign}{plu}*{quantity}#{price}"),
    )
}

/// Subtotal; `display` asks the device to show it on the customer display.
pub fn subtotal(display: bool) -> Command {
    Command::new(CMD_SUBTOTAL, if display { "1" } else { "0" })
}

/// Total the receipt with a payment mode letter and amount.
pub fn total(mode: &str, amount: &str) -> Command {
    Command::new(CMD_TOTAL, format!("{mode}{amount}"))
}

pub fn close_fiscal_receipt() -> Command {
    Command::new(CMD_CLOSE_FISCAL_RECEIPT, Vec::new())
}

/// Query the current receipt. `option` is passed through unchanged.
pub fn receipt_status(option: &str) -> Command {
    Command::new(CMD_RECEIPT_STATUS, option)
}

pub fn get_totals() -> Command {
    Command::new(CMD_GET_TOTALS, TOTALS_BY_PAYMENT)
}

/// Read a programmed item: `R,plu`.
pub fn program_read(plu: &str) -> Command {
    Command::new(CMD_PROGRAM_ITEMS, format!("R,{plu}"))
}

/// Fields of a PLU to program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluProgram<'a> {
    pub tax_group: &'a str,
    pub plu: &'a str,
    pub price_type: &'a str,
    pub price: &'a str,
    pub ean: &'a str,
    pub pack: &'a str,
    pub name: &'a str,
}

/// Program an item: `P,tax,plu,ptype,price,ean,0,pack,name`.
pub fn program_write(item: &PluProgram<'_>) -> Command {
    Command::new(
        CMD_PROGRAM_ITEMS,
        format!(
            "P,{},{},{},{},{},0,{},{}",
            item.tax_group, item.plu, item.price_type, item.price, item.ean, item.pack, item.name
        ),
    )
}

/// Start enumerating sold items, optionally from a given PLU.
pub fn first_sold_item(from: &str) -> Command {
    Command::new(CMD_PROGRAM_ITEMS, format!("f{from}"))
}

pub fn next_sold_item() -> Command {
    Command::new(CMD_PROGRAM_ITEMS, "n")
}

// ---------------------------------------------------------------
// Reply types
// ---------------------------------------------------------------

/// Reply to opening a fiscal receipt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiptCounters {
    pub receipts: String,
    pub fiscal_receipts: String,
    pub out_of_paper: bool,
}

/// Reply to closing a fiscal receipt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClosedReceipt {
    pub all_receipts: String,
    pub fiscal_receipts: String,
    pub total: String,
    pub out_of_paper: bool,
}

/// Reply to a receipt status query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiptStatus {
    pub open: String,
    pub items: String,
    pub amount: String,
    pub tender: String,
    pub out_of_paper: bool,
}

/// Reply to a total/payment command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payment {
    /// Payment result code reported by the device.
    pub code: String,
    /// Remaining or change amount, depending on `code`.
    pub amount: String,
    pub out_of_paper: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subtotal {
    pub subtotal: String,
    /// Per-tax-group sums, in device order.
    pub taxes: Vec<String>,
    pub out_of_paper: bool,
}

/// Daily totals by payment type, in minor currency units.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Totals {
    pub status: String,
    pub cash: i64,
    pub check: i64,
    pub card: i64,
    pub out_of_paper: bool,
}

/// A programmed item as the device reports it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluRecord {
    pub plu: String,
    pub tax_group: String,
    pub price_type: String,
    pub price: String,
    pub total: String,
    pub sold: String,
    pub ean: String,
    pub ean2: String,
    pub pack: String,
    pub name: String,
}

/// Reply to a PLU read. `record` is `None` when the device only returned a
/// status code, e.g. for an unknown PLU.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluRead {
    pub status: String,
    pub record: Option<PluRecord>,
    pub out_of_paper: bool,
}

/// Status code returned by a PLU write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramStatus {
    pub status: String,
    pub out_of_paper: bool,
}

/// One entry of the sold-items enumeration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoldItem {
    pub plu: String,
    pub tax_group: String,
    pub price: String,
    pub sold: String,
    pub total: String,
    pub name: String,
}

// ---------------------------------------------------------------
// Parsers
// ---------------------------------------------------------------

/// Cursor over the comma-separated fields of a reply.
struct Fields<'a> {
    inner: Split<'a, char>,
    reply: &'static str,
}

impl<'a> Fields<'a> {
    fn new(text: &'a str, reply: &'static str) -> Self {
        Fields {
            inner: text.split(','),
            reply,
        }
    }

    fn next(&mut self, name: &str) -> Result<String> {
        self.inner.next().map(str::to_owned).ok_or_else(|| {
            Error::Protocol(format!("{} reply is missing the {name} field", self.reply))
        })
    }

    /// Whatever is left, commas included. Names may contain commas.
    fn rest(self) -> String {
        self.inner.collect::<Vec<_>>().join(",")
    }
}

fn parse_amount(value: &str, name: &str) -> Result<i64> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::Protocol(format!("invalid {name} amount {value:?}")))
}

pub fn parse_receipt_counters(response: &Response) -> Result<ReceiptCounters> {
    let text = response.text();
    let mut fields = Fields::new(&text, "open receipt");
    Ok(ReceiptCounters {
        receipts: fields.next("receipts")?,
        fiscal_receipts: fields.next("fiscal receipts")?,
        out_of_paper: response.out_of_paper,
    })
}

pub fn parse_closed_receipt(response: &Response) -> Result<ClosedReceipt> {
    let text = response.text();
    let mut fields = Fields::new(&text, "close receipt");
    Ok(ClosedReceipt {
        all_receipts: fields.next("all receipts")?,
        fiscal_receipts: fields.next("fiscal receipts")?,
        total: fields.next("total")?,
        out_of_paper: response.out_of_paper,
    })
}

pub fn parse_receipt_status(response: &Response) -> Result<ReceiptStatus> {
    let text = response.text();
    let mut fields = Fields::new(&text, "receipt status");
    Ok(ReceiptStatus {
        open: fields.next("open")?,
        items: fields.next("items")?,
        amount: fields.next("amount")?,
        tender: fields.next("tender")?,
        out_of_paper: response.out_of_paper,
    })
}

/// # Errors
///
/// Returns [`Error::Protocol`] if the device answered with an `F` code.
pub fn parse_payment(response: &Response) -> Result<Payment> {
    let text = response.text();
    let mut fields = Fields::new(&text, "total");
    let code = fields.next("payment code")?;
    if code == FAILED {
        return Err(Error::Protocol("device rejected the payment".into()));
    }
    Ok(Payment {
        code,
        amount: fields.inner.collect(),
        out_of_paper: response.out_of_paper,
    })
}

pub fn parse_subtotal(response: &Response) -> Result<Subtotal> {
    let text = response.text();
    let mut fields = Fields::new(&text, "subtotal");
    let subtotal = fields.next("subtotal")?;
    Ok(Subtotal {
        subtotal,
        taxes: fields.inner.map(str::to_owned).collect(),
        out_of_paper: response.out_of_paper,
    })
}

/// # Errors
///
/// Returns [`Error::Protocol`] if the device answered with an `F` status or
/// an amount is not an integer.
pub fn parse_totals(response: &Response) -> Result<Totals> {
    let text = response.text();
    let mut fields = Fields::new(&text, "totals");
    let status = fields.next("status")?;
    if status == FAILED {
        return Err(Error::Protocol("device rejected the totals query".into()));
    }
    Ok(Totals {
        status,
        cash: parse_amount(&fields.next("cash")?, "cash")?,
        check: parse_amount(&fields.next("check")?, "check")?,
        card: parse_amount(&fields.next("card")?, "card")?,
        out_of_paper: response.out_of_paper,
    })
}

pub fn parse_plu_read(response: &Response) -> Result<PluRead> {
    let text = response.text();
    let mut fields = Fields::new(&text, "PLU read");
    let status = fields.next("status")?;
    if !text.contains(',') {
        return Ok(PluRead {
            status,
            record: None,
            out_of_paper: response.out_of_paper,
        });
    }

    let record = PluRecord {
        plu: fields.next("PLU")?,
        tax_group: fields.next("tax group")?,
        price_type: fields.next("price type")?,
        price: fields.next("price")?,
        total: fields.next("total")?,
        sold: fields.next("sold")?,
        ean: fields.next("EAN")?,
        ean2: fields.next("second EAN")?,
        pack: fields.next("pack")?,
        name: fields.rest(),
    };
    Ok(PluRead {
        status,
        record: Some(record),
        out_of_paper: response.out_of_paper,
    })
}

pub fn parse_program_status(response: &Response) -> Result<ProgramStatus> {
    let text = response.text();
    let mut fields = Fields::new(&text, "PLU write");
    Ok(ProgramStatus {
        status: fields.next("status")?,
        out_of_paper: response.out_of_paper,
    })
}

/// Parse one sold-items reply. `None` marks the end of the enumeration.
///
/// The first field carries a one-character prefix before the PLU number.
pub fn parse_sold_item(response: &Response) -> Result<Option<SoldItem>> {
    let text = response.text();
    let mut fields = Fields::new(&text, "sold item");
    let first = fields.next("PLU")?;
    if first == FAILED {
        return Ok(None);
    }

    let plu = first.chars().skip(1).collect();
    Ok(Some(SoldItem {
        plu,
        tax_group: fields.next("tax group")?,
        price: fields.next("price")?,
        sold: fields.next("sold")?,
        total: fields.next("total")?,
        name: fields.rest(),
    }))
}
