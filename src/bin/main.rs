// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

use bank_ledger_rs::{AccountId, Ledger, LedgerConfig, TransactionKind, TransactionRequest};
use clap::Parser;
use csv::{ReaderBuilder, Trim, Writer};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::process;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Bank Ledger - Move money between in-memory accounts
///
/// Without FILE, runs an interactive menu. With FILE, queues every
/// transaction in the CSV, drains the queue and prints final balances.
#[derive(Parser, Debug)]
#[command(name = "bank-ledger")]
#[command(about = "An in-memory bank ledger with a background transaction queue", long_about = None)]
struct Args {
    /// Path to a CSV file with transactions (batch mode)
    ///
    /// Expected format: type,source,destination,amount
    /// Example: cargo run -- transactions.csv > balances.csv
    #[arg(value_name = "FILE")]
    input: Option<PathBuf>,

    /// Account to open before processing, as ID=BALANCE (repeatable)
    ///
    /// Defaults to 1=1000, 2=500 and 3=2000 when omitted.
    #[arg(long = "account", value_name = "ID=BALANCE", value_parser = parse_account)]
    accounts: Vec<(AccountId, Decimal)>,

    /// Maximum number of pending transactions [env: LEDGER_QUEUE_CAPACITY]
    #[arg(long, value_name = "N")]
    queue_capacity: Option<usize>,

    /// Drop queued transactions not processed within this many milliseconds
    /// [env: LEDGER_TX_TIMEOUT_MS]
    #[arg(long, value_name = "MS")]
    timeout_ms: Option<u64>,
}

fn parse_account(value: &str) -> Result<(AccountId, Decimal), String> {
    let (id, balance) = value
        .split_once('=')
        .ok_or_else(|| format!("expected ID=BALANCE, got '{value}'"))?;
    let id = id
        .trim()
        .parse::<u32>()
        .map_err(|e| format!("invalid account id '{id}': {e}"))?;
    let balance = balance
        .trim()
        .parse::<Decimal>()
        .map_err(|e| format!("invalid balance '{balance}': {e}"))?;
    Ok((AccountId(id), balance))
}

fn default_accounts() -> Vec<(AccountId, Decimal)> {
    vec![
        (AccountId(1), Decimal::from(1000)),
        (AccountId(2), Decimal::from(500)),
        (AccountId(3), Decimal::from(2000)),
    ]
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();

    let ledger = match build_ledger(&args) {
        Ok(ledger) => ledger,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    if let Err(e) = ledger.start() {
        eprintln!("Error starting transaction processor: {}", e);
        process::exit(1);
    }

    match &args.input {
        Some(path) => run_batch(&ledger, path),
        None => {
            let stdin = io::stdin();
            if let Err(e) = run_menu(&ledger, stdin.lock(), io::stdout()) {
                eprintln!("Error reading input: {}", e);
            }
            println!("Exiting...");
            ledger.shutdown();
        }
    }
}

fn build_ledger(args: &Args) -> Result<Ledger, String> {
    let mut config = LedgerConfig::from_env().map_err(|e| e.to_string())?;
    if let Some(capacity) = args.queue_capacity {
        config = config.with_queue_capacity(capacity);
    }
    if let Some(millis) = args.timeout_ms {
        config = config.with_transaction_timeout(Duration::from_millis(millis));
    }

    let ledger = Ledger::with_config(config).map_err(|e| e.to_string())?;

    let accounts = if args.accounts.is_empty() {
        default_accounts()
    } else {
        args.accounts.clone()
    };
    for (id, balance) in accounts {
        ledger
            .add_account(id, balance)
            .map_err(|e| format!("cannot open account {id}: {e}"))?;
    }
    info!(accounts = ledger.accounts().len(), "ledger ready");

    Ok(ledger)
}

fn run_batch(ledger: &Ledger, path: &Path) {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Error opening file '{}': {}", path.display(), e);
            process::exit(1);
        }
    };

    if let Err(e) = enqueue_transactions(ledger, BufReader::new(file)) {
        eprintln!("Error processing transactions: {}", e);
        process::exit(1);
    }

    ledger.shutdown();

    if let Err(e) = write_accounts(ledger, io::stdout()) {
        eprintln!("Error writing output: {}", e);
        process::exit(1);
    }
}

/// Raw CSV record matching the input format.
///
/// Fields: `type, source, destination, amount`
#[derive(Debug, Deserialize)]
struct CsvRecord {
    #[serde(rename = "type")]
    kind: TransactionKind,
    source: Option<u32>,
    destination: Option<u32>,
    amount: Decimal,
}

impl CsvRecord {
    fn into_request(self) -> TransactionRequest {
        TransactionRequest {
            kind: self.kind,
            source: self.source.map(AccountId),
            destination: self.destination.map(AccountId),
            amount: self.amount,
        }
    }
}

/// Queues every transaction from a CSV reader, in file order.
///
/// # CSV Format
///
/// Expected columns: `type, source, destination, amount`
/// - `type`: deposit, withdraw or transfer
/// - `source`: Account debited (withdraw, transfer)
/// - `destination`: Account credited (deposit, transfer)
/// - `amount`: Non-negative decimal amount
///
/// # Example
///
/// ```csv
/// type,source,destination,amount
/// deposit,,1,100.0
/// withdraw,1,,50.0
/// transfer,1,2,25.0
/// ```
///
/// Malformed rows are logged and skipped. Returns the number of queued
/// transactions.
fn enqueue_transactions<R: Read>(ledger: &Ledger, reader: R) -> Result<usize, String> {
    let mut rdr = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .has_headers(true)
        .from_reader(reader);

    let mut queued = 0;
    for result in rdr.deserialize::<CsvRecord>() {
        match result {
            Ok(record) => {
                ledger
                    .enqueue(record.into_request())
                    .map_err(|e| e.to_string())?;
                queued += 1;
            }
            Err(e) => {
                warn!(error = %e, "skipping malformed row");
            }
        }
    }

    Ok(queued)
}

/// Writes account balances as CSV.
///
/// Columns: `account, balance`
fn write_accounts<W: Write>(ledger: &Ledger, writer: W) -> Result<(), csv::Error> {
    let mut wtr = Writer::from_writer(writer);

    for account in ledger.accounts() {
        wtr.serialize(account)?;
    }

    wtr.flush()?;
    Ok(())
}

/// Reads one trimmed line, or `None` at end of input.
fn read_line<R: BufRead>(input: &mut R) -> io::Result<Option<String>> {
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}

/// Prompts until the user enters a value that parses, or input ends.
fn prompt<R, W, T>(input: &mut R, output: &mut W, message: &str) -> io::Result<Option<T>>
where
    R: BufRead,
    W: Write,
    T: std::str::FromStr,
{
    loop {
        write!(output, "{message}")?;
        output.flush()?;
        let Some(line) = read_line(input)? else {
            return Ok(None);
        };
        match line.parse() {
            Ok(value) => return Ok(Some(value)),
            Err(_) => writeln!(output, "Invalid value '{line}', try again.")?,
        }
    }
}

fn show_menu<W: Write>(output: &mut W) -> io::Result<()> {
    writeln!(output)?;
    writeln!(output, "=== Bank Menu ===")?;
    writeln!(output, "1. Deposit money")?;
    writeln!(output, "2. Withdraw money")?;
    writeln!(output, "3. Transfer money")?;
    writeln!(output, "4. Show account balance")?;
    writeln!(output, "5. Exit")?;
    write!(output, "Select an option: ")?;
    output.flush()
}

/// Interactive menu. Options 1-3 queue a transaction, 4 reads a balance
/// directly. Returns on option 5 or end of input.
fn run_menu<R: BufRead, W: Write>(ledger: &Ledger, mut input: R, mut output: W) -> io::Result<()> {
    loop {
        show_menu(&mut output)?;
        let Some(choice) = read_line(&mut input)? else {
            return Ok(());
        };

        let request = match choice.as_str() {
            "1" => {
                let Some(id) = prompt::<_, _, u32>(&mut input, &mut output, "Account to deposit into: ")? else {
                    return Ok(());
                };
                let Some(amount) = prompt::<_, _, Decimal>(&mut input, &mut output, "Amount to deposit: ")? else {
                    return Ok(());
                };
                TransactionRequest::deposit(AccountId(id), amount)
            }
            "2" => {
                let Some(id) = prompt::<_, _, u32>(&mut input, &mut output, "Account to withdraw from: ")? else {
                    return Ok(());
                };
                let Some(amount) = prompt::<_, _, Decimal>(&mut input, &mut output, "Amount to withdraw: ")? else {
                    return Ok(());
                };
                TransactionRequest::withdraw(AccountId(id), amount)
            }
            "3" => {
                let Some(source) = prompt::<_, _, u32>(&mut input, &mut output, "Source account: ")? else {
                    return Ok(());
                };
                let Some(destination) = prompt::<_, _, u32>(&mut input, &mut output, "Destination account: ")? else {
                    return Ok(());
                };
                let Some(amount) = prompt::<_, _, Decimal>(&mut input, &mut output, "Amount to transfer: ")? else {
                    return Ok(());
                };
                TransactionRequest::transfer(AccountId(source), AccountId(destination), amount)
            }
            "4" => {
                let Some(id) = prompt::<_, _, u32>(&mut input, &mut output, "Account to show: ")? else {
                    return Ok(());
                };
                match ledger.get_balance(AccountId(id)) {
                    Ok(balance) => writeln!(output, "Balance of account {id}: {:.2}", balance)?,
                    Err(e) => writeln!(output, "{e}")?,
                }
                continue;
            }
            "5" => return Ok(()),
            _ => {
                writeln!(output, "Invalid option, try again.")?;
                continue;
            }
        };

        if let Err(e) = ledger.enqueue(request) {
            writeln!(output, "Transaction not queued: {e}")?;
        }
    }
}
