//! Dp25 -- the device handle for a Datecs DP-25 fiscal printer.
//!
//! All traffic goes through the IO task, which owns the transport and the
//! protocol engine. Methods on [`Dp25`] take `&self`, so the handle can be
//! shared (e.g. behind an `Arc`) and commands from several callers are
//! queued and answered in the order they were issued.

use std::time::Duration;

use tracing::debug;

use ecrlib_core::error::Result;
use ecrlib_core::transport::Transport;

use crate::commands::{
    self, ClosedReceipt, Command, Payment, PluProgram, PluRead, ProgramStatus, ReceiptCounters,
    ReceiptStatus, SoldItem, Subtotal, Totals,
};
use crate::io::DeviceIo;
use crate::queue::Response;

/// A connected DP-25 fiscal printer.
///
/// Construct with [`Dp25Builder`](crate::Dp25Builder). Dropping the handle
/// stops the IO task; use [`shutdown`](Self::shutdown) to get the transport
/// back instead.
pub struct Dp25 {
    io: DeviceIo,
    response_timeout: Option<Duration>,
}

impl Drop for Dp25 {
    fn drop(&mut self) {
        // Graceful: signal the IO loop to exit at the next select iteration.
        self.io.cancel.cancel();
        // Abort in case the task is stuck inside a transport read.
        self.io.task.abort();
    }
}

impl Dp25 {
    pub(crate) fn new(io: DeviceIo, response_timeout: Option<Duration>) -> Self {
        Dp25 {
            io,
            response_timeout,
        }
    }

    /// Send a raw command and wait for its settled reply.
    ///
    /// Fails with [`Error::Device`](ecrlib_core::Error::Device) when the
    /// status block reports a fault. Out of paper is not a failure; check
    /// [`Response::out_of_paper`].
    pub async fn execute(&self, command: u8, data: &[u8]) -> Result<Response> {
        debug!(command, payload_len = data.len(), "executing command");
        self.io
            .command(command, data.to_vec(), self.response_timeout)
            .await
    }

    async fn run(&self, command: Command) -> Result<Response> {
        self.execute(command.code, &command.data).await
    }

    /// Stop the IO task and return the transport.
    ///
    /// Commands still queued fail with `ConnectionLost`.
    pub async fn shutdown(mut self) -> Result<Box<dyn Transport>> {
        self.io.shutdown().await
    }

    // -----------------------------------------------------------------
    // Display
    // -----------------------------------------------------------------

    pub async fn clear_display(&self) -> Result<Response> {
        self.run(commands::clear_display()).await
    }

    /// Show text on the lower line of the customer display.
    pub async fn display_bottom(&self, text: &str) -> Result<Response> {
        self.run(commands::display_bottom(text)).await
    }

    /// Show text on the upper line of the customer display.
    pub async fn display_top(&self, text: &str) -> Result<Response> {
        self.run(commands::display_top(text)).await
    }

    /// Round trip with no side effects.
    pub async fn test_communication(&self) -> Result<Response> {
        self.run(commands::test_communication()).await
    }

    // -----------------------------------------------------------------
    // Receipts
    // -----------------------------------------------------------------

    pub async fn open_fiscal_receipt(
        &self,
        operator: u32,
        password: &str,
        till: u32,
    ) -> Result<ReceiptCounters> {
        let response = self
            .run(commands::open_fiscal_receipt(operator, password, till))
            .await?;
        commands::parse_receipt_counters(&response)
    }

    /// Register a sale of a programmed item on the open receipt.
    pub async fn register_sale(
        &self,
        sign: &str,
        plu: &str,
        quantity: &str,
        price: &str,
    ) -> Result<Response> {
        self.run(commands::register_sale(sign, plu, quantity, price))
            .await
    }

    pub async fn subtotal(&self, display: bool) -> Result<Subtotal> {
        let response = self.run(commands::subtotal(display)).await?;
        commands::parse_subtotal(&response)
    }

    /// Total the receipt and register a payment.
    pub async fn total(&self, mode: &str, amount: &str) -> Result<Payment> {
        let response = self.run(commands::total(mode, amount)).await?;
        commands::parse_payment(&response)
    }

    pub async fn close_fiscal_receipt(&self) -> Result<ClosedReceipt> {
        let response = self.run(commands::close_fiscal_receipt()).await?;
        commands::parse_closed_receipt(&response)
    }

    pub async fn receipt_status(&self, option: &str) -> Result<ReceiptStatus> {
        let response = self.run(commands::receipt_status(option)).await?;
        commands::parse_receipt_status(&response)
    }

    /// Daily totals by payment type.
    pub async fn get_totals(&self) -> Result<Totals> {
        let response = self.run(commands::get_totals()).await?;
        commands::parse_totals(&response)
    }

    // -----------------------------------------------------------------
    // Items
    // -----------------------------------------------------------------

    pub async fn program_read(&self, plu: &str) -> Result<PluRead> {
        let response = self.run(commands::program_read(plu)).await?;
        commands::parse_plu_read(&response)
    }

    pub async fn program_write(&self, item: &PluProgram<'_>) -> Result<ProgramStatus> {
        let response = self.run(commands::program_write(item)).await?;
        commands::parse_program_status(&response)
    }

    /// Start the sold-items enumeration. `None` means nothing was sold.
    pub async fn first_sold_item(&self, from: &str) -> Result<Option<SoldItem>> {
        let response = self.run(commands::first_sold_item(from)).await?;
        commands::parse_sold_item(&response)
    }

    /// Continue the sold-items enumeration. `None` marks the end.
    pub async fn next_sold_item(&self) -> Result<Option<SoldItem>> {
        let response = self.run(commands::next_sold_item()).await?;
        commands::parse_sold_item(&response)
    }

    /// Walk the whole sold-items enumeration.
    pub async fn sold_items(&self, from: &str) -> Result<Vec<SoldItem>> {
        let mut items = Vec::new();
        let mut next = self.first_sold_item(from).await?;
        while let Some(item) = next {
            items.push(item);
            next = self.next_sold_item().await?;
        }
        debug!(count = items.len(), "sold items enumerated");
        Ok(items)
    }
}
