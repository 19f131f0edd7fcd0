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

use anyhow::{Context, Result};
use clap::Parser;
use csv::{ReaderBuilder, Trim, Writer};
use moneyjar_rs::{
    CanonicalBalance, Config, Currency, Ledger, LedgerError, Message, RateSource, Store, MemoryStore,
    TargetSelector, UserId,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Moneyjar - Replay shared-debt commands from a CSV file
///
/// Reads commands from a CSV file and prints one reply per command to stdout.
/// Supports registering users, posting debts, and balance and history queries.
#[derive(Parser, Debug)]
#[command(name = "moneyjar")]
#[command(about = "A shared-debt ledger that replays command CSVs", long_about = None)]
struct Args {
    /// Path to CSV file with commands
    ///
    /// Expected format: op,user,name,amount,currency,targets,comment,page
    /// Example: cargo run -- commands.csv
    #[arg(value_name = "FILE")]
    input: PathBuf,

    /// Path to a TOML configuration file
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "warn")]
    log_level: String,

    /// Write the final pair balances as CSV to this file
    #[arg(long, value_name = "FILE")]
    balances: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(&args.log_level);

    let config = match &args.config {
        Some(path) => Config::load(path).with_context(|| format!("loading config '{}'", path.display()))?,
        None => Config::default(),
    };
    let rates = config.rate_source().context("building rate source")?;
    let store = MemoryStore::with_lock_timeout(config.store_timeout());
    let ledger = Ledger::new(store, rates, &config);

    let file = File::open(&args.input).with_context(|| format!("opening '{}'", args.input.display()))?;
    let users = process_commands(&ledger, BufReader::new(file), std::io::stdout().lock())
        .context("processing commands")?;

    if let Some(path) = &args.balances {
        let file = File::create(path).with_context(|| format!("creating '{}'", path.display()))?;
        write_balances(&ledger, &users, file).context("writing balances")?;
    }
    Ok(())
}

fn init_tracing(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Raw CSV record matching the input format.
///
/// Fields: `op, user, name, amount, currency, targets, comment, page`
#[derive(Debug, Deserialize)]
struct CsvRecord {
    op: String,
    user: i64,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    name: Option<String>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    amount: Option<Decimal>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    currency: Option<String>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    targets: Option<String>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    comment: Option<String>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    page: Option<u32>,
}

#[derive(Debug, Clone, PartialEq)]
enum Command {
    Register {
        user: UserId,
        name: String,
    },
    Debt {
        user: UserId,
        target: TargetSelector,
        amount: Decimal,
        currency: Currency,
        comment: String,
    },
    Balance {
        user: UserId,
    },
    History {
        user: UserId,
        page: u32,
    },
    /// Well-formed row the ledger rejects before running it.
    Rejected(LedgerError),
}

impl CsvRecord {
    /// Converts the record into a command.
    ///
    /// Fails for unknown ops and missing required fields.
    fn into_command(self) -> Result<Command, String> {
        let user = UserId(self.user);

        match self.op.to_lowercase().as_str() {
            "register" => {
                let name = self.name.filter(|n| !n.is_empty()).ok_or("register needs a name")?;
                Ok(Command::Register { user, name })
            }
            "debt" => {
                let amount = self.amount.ok_or("debt needs an amount")?;
                let currency = match self.currency.as_deref() {
                    Some(raw) if !raw.is_empty() => match raw.parse::<Currency>() {
                        Ok(currency) => currency,
                        Err(e) => return Ok(Command::Rejected(e)),
                    },
                    _ => Currency::Usd,
                };
                let target = TargetSelector::parse(self.targets.as_deref().unwrap_or_default());
                Ok(Command::Debt {
                    user,
                    target,
                    amount,
                    currency,
                    comment: self.comment.unwrap_or_default(),
                })
            }
            "balance" => Ok(Command::Balance { user }),
            "history" => Ok(Command::History {
                user,
                page: self.page.unwrap_or(1),
            }),
            other => Err(format!("unknown op '{other}'")),
        }
    }
}

fn execute<S: Store, R: RateSource>(ledger: &Ledger<S, R>, command: Command) -> Message {
    let result = match command {
        Command::Register { user, name } => ledger
            .register(user, &name)
            .map(|user| Message::UserRegistered { username: user.name }),
        Command::Debt {
            user,
            target,
            amount,
            currency,
            comment,
        } => ledger
            .post_debt(user, &target, amount, currency, &comment)
            .map(Message::posted),
        Command::Balance { user } => ledger.balances(user).map(|balances| Message::Balances { balances }),
        Command::History { user, page } => ledger
            .history(user, page)
            .map(|entries| Message::History { page, entries }),
        Command::Rejected(error) => Err(error),
    };
    result.unwrap_or_else(|e| Message::from_error(&e))
}

/// Replays commands from a CSV reader, writing one reply per command.
///
/// Malformed rows are skipped with a warning. Returns the ids of every user
/// registered along the way.
///
/// # CSV Format
///
/// Expected columns: `op, user, name, amount, currency, targets, comment, page`
/// - `op`: register, debt, balance or history
/// - `user`: acting user id (i64)
/// - `targets`: `all` or space separated usernames (debt only)
///
/// ```csv
/// op,user,name,amount,currency,targets,comment,page
/// register,1,alice,,,,,
/// register,2,bob,,,,,
/// debt,1,,30,usd,@bob,dinner,
/// balance,2,,,,,,
/// ```
///
/// # Errors
///
/// Returns a CSV error if the reader fails, or an I/O error if a reply cannot be written.
fn process_commands<S, R, I, W>(ledger: &Ledger<S, R>, reader: I, mut out: W) -> Result<Vec<UserId>>
where
    S: Store,
    R: RateSource,
    I: Read,
    W: Write,
{
    let mut rdr = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .has_headers(true)
        .from_reader(reader);

    let mut users = Vec::new();
    for (line, result) in rdr.deserialize::<CsvRecord>().enumerate() {
        let command = match result.map_err(|e| e.to_string()).and_then(CsvRecord::into_command) {
            Ok(command) => command,
            Err(reason) => {
                warn!(row = line + 1, %reason, "skipping malformed row");
                continue;
            }
        };

        let registering = match &command {
            Command::Register { user, .. } => Some(*user),
            _ => None,
        };
        let reply = execute(ledger, command);
        if let (Some(user), Message::UserRegistered { .. }) = (registering, &reply) {
            users.push(user);
        }
        writeln!(out, "{reply}")?;
    }

    info!(users = users.len(), "replayed commands");
    Ok(users)
}

/// Writes the merged balance of every pair among `users` as CSV.
///
/// Columns: `from, from_name, to, to_name, balance`
fn write_balances<S: Store, R: RateSource, W: Write>(
    ledger: &Ledger<S, R>,
    users: &[UserId],
    writer: W,
) -> Result<()> {
    let mut pairs: BTreeMap<(UserId, UserId), CanonicalBalance> = BTreeMap::new();
    for user in users {
        for balance in ledger.balances(*user)? {
            pairs.entry((balance.from_user, balance.to_user)).or_insert(balance);
        }
    }

    let mut wtr = Writer::from_writer(writer);
    for balance in pairs.values() {
        wtr.serialize(balance)?;
    }
    wtr.flush()?;
    Ok(())
}
