use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub mod transaction {
    use rust_decimal::Decimal;

    use super::*;

    /// One register posting as served by `GET /data`.
    ///
    /// `time` is an ISO-8601 date (`2024-01-15`); `amount` and `total` are
    /// JSON numbers.
    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    pub struct TransactionView {
        pub time: NaiveDate,
        pub account: String,
        pub payee: String,
        #[serde(with = "rust_decimal::serde::float")]
        pub amount: Decimal,
        #[serde(with = "rust_decimal::serde::float")]
        pub total: Decimal,
    }
}
