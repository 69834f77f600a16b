//! Register output parsing.
//!
//! Every line has the shape `<date> <account> <amount> <total> <payee>`, with
//! the payee absorbing whatever is left on the line. Parsing is all or
//! nothing: a single malformed line fails the whole batch.
use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::{EngineError, ResultEngine, Transaction, transactions::DATE_FORMAT};

const FIELDS: usize = 5;

/// Parses a single register line into a [`Transaction`].
pub fn parse_line(line: &str) -> ResultEngine<Transaction> {
    parse_numbered(1, line)
}

/// Parses every line of one account's register.
///
/// Fails on the first malformed line and returns nothing in that case.
pub fn parse_account<S: AsRef<str>>(lines: &[S]) -> ResultEngine<Vec<Transaction>> {
    lines
        .iter()
        .enumerate()
        .map(|(index, line)| parse_numbered(index + 1, line.as_ref()))
        .collect()
}

/// Splits raw tool output into lines. Blank output means no lines at all.
pub fn split_output(output: &str) -> Vec<String> {
    let trimmed = output.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }
    trimmed.lines().map(str::to_string).collect()
}

fn parse_numbered(line_no: usize, line: &str) -> ResultEngine<Transaction> {
    let fields = split_fields(line);
    let [date, account, amount, total, payee] = fields[..] else {
        return Err(EngineError::format(
            line_no,
            line,
            format!("expected {FIELDS} fields, found {}", fields.len()),
        ));
    };

    let time = NaiveDate::parse_from_str(date, DATE_FORMAT)
        .map_err(|err| EngineError::format(line_no, line, format!("bad date {date:?}: {err}")))?;
    let amount = parse_decimal(line_no, line, "amount", amount)?;
    let total = parse_decimal(line_no, line, "total", total)?;

    Ok(Transaction {
        time,
        account: account.to_string(),
        payee: payee.to_string(),
        amount,
        total,
    })
}

/// Whitespace split capped at [`FIELDS`]; the last field keeps its inner
/// whitespace.
fn split_fields(line: &str) -> Vec<&str> {
    let mut fields = Vec::with_capacity(FIELDS);
    let mut rest = line.trim();

    while !rest.is_empty() {
        if fields.len() == FIELDS - 1 {
            fields.push(rest);
            break;
        }
        match rest.split_once(char::is_whitespace) {
            Some((field, tail)) => {
                fields.push(field);
                rest = tail.trim_start();
            }
            None => {
                fields.push(rest);
                break;
            }
        }
    }

    fields
}

fn parse_decimal(line_no: usize, line: &str, name: &str, raw: &str) -> ResultEngine<Decimal> {
    Decimal::from_str(raw)
        .map_err(|err| EngineError::format(line_no, line, format!("bad {name} {raw:?}: {err}")))
}
