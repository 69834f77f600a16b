//! Relational sink: the whole register replaces the `ledger` table at once.
//!
//! A staging table is built and filled, then renamed over the live one, all in
//! a single database transaction. Readers of `ledger` see either the previous
//! snapshot or the new one.
use std::time::Duration;

use sea_orm::{
    ConnectionTrait, Database, DatabaseBackend, DatabaseConnection, DatabaseTransaction, DbErr,
    Statement, TransactionTrait,
    sea_query::{Alias, ColumnDef, Query, Table, TableCreateStatement, TableDropStatement},
};

use crate::{ResultEngine, Transaction, error::with_deadline};

pub const LIVE_TABLE: &str = "ledger";
pub const STAGING_TABLE: &str = "newledger";
pub const OLD_TABLE: &str = "oldledger";

const COLUMNS: [&str; 5] = ["date", "account", "payee", "amount", "total"];

/// Rows per `INSERT` statement; keeps bound parameters under backend limits.
const INSERT_CHUNK: usize = 500;

/// PostgreSQL connection parameters, assembled into a `postgres://` URL.
#[derive(Clone, Debug)]
pub struct PostgresTarget<'a> {
    pub host: &'a str,
    pub user: &'a str,
    pub password: &'a str,
    pub database: &'a str,
    pub sslmode: &'a str,
}

impl PostgresTarget<'_> {
    pub fn url(&self) -> String {
        format!(
            "postgres://{}:{}@{}/{}?sslmode={}",
            urlencoding::encode(self.user),
            urlencoding::encode(self.password),
            self.host,
            self.database,
            self.sslmode
        )
    }
}

pub async fn connect(url: &str) -> ResultEngine<DatabaseConnection> {
    Ok(Database::connect(url).await?)
}

#[derive(Clone, Debug)]
pub struct RelationalSink {
    db: DatabaseConnection,
    timeout: Option<Duration>,
}

impl RelationalSink {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db, timeout: None }
    }

    /// Deadline of the whole swap; on expiry the transaction is rolled back.
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Replaces the live table with `transactions`, returning the rows loaded.
    pub async fn publish(&self, transactions: &[Transaction]) -> ResultEngine<u64> {
        let rows = with_deadline("relational publish", self.timeout, self.swap(transactions)).await?;
        tracing::info!("published {rows} rows to `{LIVE_TABLE}`");
        Ok(rows)
    }

    async fn swap(&self, transactions: &[Transaction]) -> ResultEngine<u64> {
        // Dropped without commit on any early return, which rolls back.
        let db_tx = self.db.begin().await?;
        let backend = db_tx.get_database_backend();

        // Leftovers of an interrupted run.
        for stale in [STAGING_TABLE, OLD_TABLE] {
            db_tx.execute(backend.build(&drop_if_exists(stale))).await?;
        }

        db_tx.execute(backend.build(&staging_table())).await?;
        let rows = insert_rows(&db_tx, backend, transactions).await?;

        if table_exists(&db_tx, backend, LIVE_TABLE).await? {
            let retire = Table::rename()
                .table(Alias::new(LIVE_TABLE), Alias::new(OLD_TABLE))
                .to_owned();
            db_tx.execute(backend.build(&retire)).await?;
        }

        let promote = Table::rename()
            .table(Alias::new(STAGING_TABLE), Alias::new(LIVE_TABLE))
            .to_owned();
        db_tx.execute(backend.build(&promote)).await?;

        db_tx.execute(backend.build(&drop_if_exists(OLD_TABLE))).await?;

        db_tx.commit().await?;
        Ok(rows)
    }
}

fn drop_if_exists(name: &str) -> TableDropStatement {
    Table::drop().table(Alias::new(name)).if_exists().to_owned()
}

fn staging_table() -> TableCreateStatement {
    Table::create()
        .table(Alias::new(STAGING_TABLE))
        .col(ColumnDef::new(Alias::new("date")).date().not_null())
        .col(ColumnDef::new(Alias::new("account")).text().not_null())
        .col(ColumnDef::new(Alias::new("payee")).text().not_null())
        .col(ColumnDef::new(Alias::new("amount")).decimal().not_null())
        .col(ColumnDef::new(Alias::new("total")).decimal().not_null())
        .to_owned()
}

async fn insert_rows(
    db_tx: &DatabaseTransaction,
    backend: DatabaseBackend,
    transactions: &[Transaction],
) -> ResultEngine<u64> {
    let mut rows = 0;
    for chunk in transactions.chunks(INSERT_CHUNK) {
        let mut insert = Query::insert();
        insert
            .into_table(Alias::new(STAGING_TABLE))
            .columns(COLUMNS.map(Alias::new));
        for tx in chunk {
            insert
                .values([
                    tx.time.into(),
                    tx.account.clone().into(),
                    tx.payee.clone().into(),
                    tx.amount.into(),
                    tx.total.into(),
                ])
                .map_err(|err| DbErr::Custom(err.to_string()))?;
        }
        rows += db_tx.execute(backend.build(&insert)).await?.rows_affected();
    }
    Ok(rows)
}

async fn table_exists(
    db_tx: &DatabaseTransaction,
    backend: DatabaseBackend,
    name: &str,
) -> ResultEngine<bool> {
    let sql = match backend {
        DatabaseBackend::Postgres => {
            "SELECT COUNT(*) AS n FROM information_schema.tables \
             WHERE table_schema = current_schema() AND table_name = $1"
        }
        DatabaseBackend::Sqlite => {
            "SELECT COUNT(*) AS n FROM sqlite_master WHERE type = 'table' AND name = ?"
        }
        _ => {
            "SELECT COUNT(*) AS n FROM information_schema.tables \
             WHERE table_schema = DATABASE() AND table_name = ?"
        }
    };

    let row = db_tx
        .query_one(Statement::from_sql_and_values(backend, sql, [name.into()]))
        .await?;
    let count: i64 = match row {
        Some(row) => row.try_get("", "n")?,
        None => 0,
    };
    Ok(count > 0)
}
