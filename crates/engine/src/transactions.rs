use std::{fmt, str::FromStr};

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::{EngineError, parser};

/// Date pattern the register is printed with.
pub const DATE_FORMAT: &str = "%Y/%m/%d";

/// One posting of the register: a dated change of one account.
///
/// `total` is the running balance as reported by the accounting tool, it is
/// never recomputed here.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Transaction {
    pub time: NaiveDate,
    pub account: String,
    pub payee: String,
    pub amount: Decimal,
    pub total: Decimal,
}

/// Prints the transaction back in the register line layout, so that
/// `line.parse::<Transaction>()` reads it again.
impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} {}",
            self.time.format(DATE_FORMAT),
            self.account,
            self.amount,
            self.total,
            self.payee
        )
    }
}

impl FromStr for Transaction {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parser::parse_line(s)
    }
}
