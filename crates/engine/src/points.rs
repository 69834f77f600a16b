use std::{collections::HashSet, fmt, str::FromStr};

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::Transaction;

/// The two values a transaction contributes to the time-series store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Field {
    Amount,
    Total,
}

impl Field {
    pub const ALL: [Field; 2] = [Field::Amount, Field::Total];

    pub const fn as_str(self) -> &'static str {
        match self {
            Field::Amount => "amount",
            Field::Total => "total",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Field {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "amount" => Ok(Field::Amount),
            "total" => Ok(Field::Total),
            other => Err(format!("unknown field {other:?}")),
        }
    }
}

/// A single time-series observation.
///
/// Two points are the same point only when all five components match. The
/// value is normalized on construction so `100.00` and `100` compare equal.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Point {
    pub time: NaiveDate,
    pub account: String,
    pub payee: String,
    pub field: Field,
    pub value: Decimal,
}

impl Point {
    pub fn new(
        time: NaiveDate,
        account: impl Into<String>,
        payee: impl Into<String>,
        field: Field,
        value: Decimal,
    ) -> Self {
        Self {
            time,
            account: account.into(),
            payee: payee.into(),
            field,
            value: value.normalize(),
        }
    }
}

impl Transaction {
    /// Projects the transaction onto its two points, `amount` first.
    pub fn to_points(&self) -> [Point; 2] {
        Field::ALL.map(|field| {
            let value = match field {
                Field::Amount => self.amount,
                Field::Total => self.total,
            };
            Point::new(self.time, &self.account, &self.payee, field, value)
        })
    }
}

/// Point set of a whole batch; duplicates collapse.
pub fn point_set(transactions: &[Transaction]) -> HashSet<Point> {
    transactions.iter().flat_map(Transaction::to_points).collect()
}

/// Points present in `actual` but not yet in `existing`.
pub fn missing_points(actual: &HashSet<Point>, existing: &HashSet<Point>) -> HashSet<Point> {
    actual.difference(existing).cloned().collect()
}
