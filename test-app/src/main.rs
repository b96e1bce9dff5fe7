// ecrlib test application -- CLI tool for exercising a DP-25 fiscal printer
// against real hardware or a scripted mock transport.
//
// Usage:
//   ecrlib-test-app --port /dev/ttyUSB0 ping
//   ecrlib-test-app --port /dev/ttyUSB0 --baud 9600 totals
//   ecrlib-test-app --mock display top "HELLO"
//   ecrlib-test-app --mock plu-read 100
//   ecrlib-test-app --port COM3 --timeout-ms 2000 raw 0x4A

use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};

use ecrlib_core::Error;
use ecrlib_dp25::commands::{self, Command as DeviceCommand};
use ecrlib_dp25::frame::{SEQUENCE_MIN, encode_command, encode_response, next_sequence};
use ecrlib_dp25::{Dp25, Dp25Builder, Response};
use ecrlib_test_harness::MockTransport;
use ecrlib_transport::{SerialConfig, SerialTransport};

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// ecrlib test application -- talks to a DP-25 from the command line.
#[derive(Parser)]
#[command(name = "ecrlib-test-app", version, about)]
struct Cli {
    /// Serial port path (e.g. /dev/ttyUSB0, COM3). Required unless --mock
    /// is used.
    #[arg(long)]
    port: Option<String>,

    /// Baud rate of the serial link.
    #[arg(long, default_value_t = ecrlib_transport::serial::DEFAULT_BAUD_RATE)]
    baud: u32,

    /// Use a scripted mock transport instead of a real serial port.
    #[arg(long)]
    mock: bool,

    /// Reject replies whose checksum does not match.
    #[arg(long)]
    verify_checksum: bool,

    /// Give up waiting for a reply after this many milliseconds.
    #[arg(long)]
    timeout_ms: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

/// Parse a hex string like "0x4A" or "4A" into a u8.
fn parse_hex_u8(s: &str) -> std::result::Result<u8, String> {
    let s = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    u8::from_str_radix(s, 16).map_err(|e| format!("invalid hex byte: {e}"))
}

#[derive(Subcommand)]
enum Command {
    /// Round trip with no side effects.
    Ping,

    /// Customer display operations.
    Display {
        #[arg(value_enum)]
        line: DisplayLine,
        /// Text to show (cut to 20 characters). Ignored for `clear`.
        #[arg(default_value = "")]
        text: String,
    },

    /// Daily totals by payment type.
    Totals,

    /// Status of the current receipt.
    Status {
        #[arg(default_value = "T")]
        option: String,
    },

    /// Read a programmed item.
    PluRead { plu: String },

    /// List sold items.
    SoldItems {
        /// Start from this PLU.
        #[arg(long, default_value = "")]
        from: String,
    },

    /// Send a raw command code with an ASCII payload.
    Raw {
        #[arg(value_parser = parse_hex_u8)]
        code: u8,
        #[arg(default_value = "")]
        data: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum DisplayLine {
    Top,
    Bottom,
    Clear,
}

// ---------------------------------------------------------------------------
// Mock device script
// ---------------------------------------------------------------------------

/// Status block of an idle printer in fiscal mode.
const IDLE_STATUS: [u8; 6] = [0x80, 0x80, 0x80, 0x80, 0x80, 0x9A];

/// Canned replies for the requests `command` will send, in order.
fn mock_script(command: &Command) -> Vec<(DeviceCommand, Vec<u8>)> {
    match command {
        Command::Ping => vec![(commands::test_communication(), Vec::new())],
        Command::Display { line, text } => {
            vec![(display_command(*line, text), Vec::new())]
        }
        Command::Totals => vec![(commands::get_totals(), b"P,150000,0,2599".to_vec())],
        Command::Status { option } => {
            vec![(commands::receipt_status(option), b"0,0,0,0".to_vec())]
        }
        Command::PluRead { plu } => vec![(
            commands::program_read(plu),
            format!("P,{plu},B,0,1.20,0,0,0,0,1,MOCK ITEM").into_bytes(),
        )],
        Command::SoldItems { from } => vec![
            (
                commands::first_sold_item(from),
                b"P100,B,1.20,2,2.40,BREAD".to_vec(),
            ),
            (commands::next_sold_item(), b"F".to_vec()),
        ],
        Command::Raw { code, data } => vec![(
            DeviceCommand {
                code: *code,
                data: data.as_bytes().to_vec(),
            },
            Vec::new(),
        )],
    }
}

fn build_mock(command: &Command) -> Result<MockTransport> {
    let mut mock = MockTransport::new();
    let mut sequence = SEQUENCE_MIN;
    for (request, reply) in mock_script(command) {
        let frame = encode_command(sequence, request.code, &request.data)
            .context("mock request does not fit in a frame")?;
        let answer = encode_response(sequence, request.code, &reply, &IDLE_STATUS)
            .context("mock reply does not fit in a frame")?;
        mock.expect(&frame, &answer);
        sequence = next_sequence(sequence);
    }
    Ok(mock)
}

// ---------------------------------------------------------------------------
// Connection
// ---------------------------------------------------------------------------

async fn create_printer(cli: &Cli) -> Result<Dp25> {
    let mut builder = Dp25Builder::new()
        .baud_rate(cli.baud)
        .verify_checksum(cli.verify_checksum);
    if let Some(ms) = cli.timeout_ms {
        builder = builder.response_timeout(Duration::from_millis(ms));
    }

    if cli.mock {
        let mock = build_mock(&cli.command)?;
        let printer = builder
            .build_with_transport(Box::new(mock))
            .await
            .context("failed to build Dp25 with mock transport")?;
        println!("Connected (mock transport)");
        return Ok(printer);
    }

    let port = cli
        .port
        .as_deref()
        .context("--port is required when not using --mock")?;
    let config = SerialConfig {
        baud_rate: cli.baud,
        ..Default::default()
    };
    let transport = SerialTransport::open_with_config(port, config)
        .await
        .with_context(|| format!("failed to open serial port {port} at {} baud", cli.baud))?;

    let printer = builder
        .serial_port(port)
        .build_with_transport(Box::new(transport))
        .await
        .context("failed to build Dp25")?;
    println!("Connected to {port} at {} baud", cli.baud);
    Ok(printer)
}

fn display_command(line: DisplayLine, text: &str) -> DeviceCommand {
    match line {
        DisplayLine::Top => commands::display_top(text),
        DisplayLine::Bottom => commands::display_bottom(text),
        DisplayLine::Clear => commands::clear_display(),
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

fn print_response(response: &Response) {
    println!("Command:     0x{:02X}", response.frame.command);
    println!("Sequence:    0x{:02X}", response.frame.sequence);
    println!("Data:        {}", response.text());
    println!("Conditions:  {}", response.conditions);
    if response.out_of_paper {
        println!("WARNING: printer is out of paper");
    }
}

/// Format an amount in minor units as `units.cents`.
fn format_amount(minor: i64) -> String {
    let sign = if minor < 0 { "-" } else { "" };
    let abs = minor.unsigned_abs();
    format!("{sign}{}.{:02}", abs / 100, abs % 100)
}

async fn cmd_totals(printer: &Dp25) -> Result<()> {
    let totals = printer.get_totals().await.context("totals query failed")?;
    println!("Status: {}", totals.status);
    println!("Cash:   {}", format_amount(totals.cash));
    println!("Check:  {}", format_amount(totals.check));
    println!("Card:   {}", format_amount(totals.card));
    Ok(())
}

async fn cmd_plu_read(printer: &Dp25, plu: &str) -> Result<()> {
    let read = printer.program_read(plu).await.context("PLU read failed")?;
    match read.record {
        Some(record) => {
            println!("PLU:       {}", record.plu);
            println!("Name:      {}", record.name);
            println!("Price:     {}", record.price);
            println!("Tax group: {}", record.tax_group);
            println!("Sold:      {}", record.sold);
        }
        None => println!("No record (status {})", read.status),
    }
    Ok(())
}

async fn cmd_sold_items(printer: &Dp25, from: &str) -> Result<()> {
    let items = printer.sold_items(from).await.context("sold items query failed")?;
    if items.is_empty() {
        println!("Nothing sold");
    }
    for item in items {
        println!(
            "{:>8}  {:<24} {:>8} x {:>6} = {:>10}",
            item.plu, item.name, item.price, item.sold, item.total
        );
    }
    Ok(())
}

async fn run(printer: &Dp25, command: &Command) -> Result<()> {
    match command {
        Command::Ping => {
            let started = std::time::Instant::now();
            let response = printer.test_communication().await?;
            println!("Reply in {:?}", started.elapsed());
            print_response(&response);
        }
        Command::Display { line, text } => {
            let cmd = display_command(*line, text);
            let response = printer.execute(cmd.code, &cmd.data).await?;
            print_response(&response);
        }
        Command::Totals => cmd_totals(printer).await?,
        Command::Status { option } => {
            let status = printer.receipt_status(option).await?;
            println!("Open:   {}", status.open);
            println!("Items:  {}", status.items);
            println!("Amount: {}", status.amount);
            println!("Tender: {}", status.tender);
        }
        Command::PluRead { plu } => cmd_plu_read(printer, plu).await?,
        Command::SoldItems { from } => cmd_sold_items(printer, from).await?,
        Command::Raw { code, data } => {
            let response = printer.execute(*code, data.as_bytes()).await?;
            print_response(&response);
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.mock && cli.port.is_some() {
        bail!("--mock and --port are mutually exclusive");
    }

    let printer = create_printer(&cli).await?;
    let result = run(&printer, &cli.command).await;

    if let Err(e) = &result {
        if let Some(Error::Device(faults)) = e.downcast_ref::<Error>() {
            eprintln!("Device reported: {faults}");
        }
    }

    let mut transport = printer.shutdown().await.context("failed to stop IO task")?;
    transport.close().await.ok();
    result
}
