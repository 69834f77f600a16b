//! Drives the `ledger` command line tool.
//!
//! Two fixed invocations are used: one listing accounts and one printing the
//! cleared register of a single account, sorted by date, in the line layout the
//! [`parser`](crate::parser) understands.
use std::{
    ffi::OsString,
    path::{Path, PathBuf},
    process::Stdio,
    time::Duration,
};

use futures::future::BoxFuture;
use tokio::process::Command;

use crate::{EngineError, ResultEngine, Transaction, error::with_deadline, parser};

const ACCOUNTS_ARGS: &[&str] = &["accounts", "--no-pager"];

const REGISTER_ARGS: &[&str] = &[
    "register",
    "--cleared",
    "--sort=date",
    "--no-pager",
    "--format=%(date) %(account) %(quantity(amount)) %(quantity(total)) %(payee)\n",
];

/// Anything able to produce a full transaction batch.
pub trait Extract: Send + Sync {
    fn extract(&self) -> BoxFuture<'_, ResultEngine<Vec<Transaction>>>;
}

/// Handle on the accounting tool and the ledger it reads.
#[derive(Clone, Debug)]
pub struct Ledger {
    binary: PathBuf,
    data_dir: PathBuf,
    data_file: Option<PathBuf>,
    timeout: Option<Duration>,
}

impl Ledger {
    /// Return a builder for `Ledger`.
    pub fn builder() -> LedgerBuilder {
        LedgerBuilder::default()
    }

    /// Names of every account known to the ledger.
    pub async fn list_accounts(&self) -> ResultEngine<Vec<String>> {
        self.run(ACCOUNTS_ARGS, None).await
    }

    /// Raw register lines of `account`, oldest first.
    pub async fn fetch_register(&self, account: &str) -> ResultEngine<Vec<String>> {
        self.run(REGISTER_ARGS, Some(account)).await
    }

    /// Parsed register of `account`.
    pub async fn account_transactions(&self, account: &str) -> ResultEngine<Vec<Transaction>> {
        tracing::debug!("loading transactions from account: {account}");
        let lines = self.fetch_register(account).await?;
        let transactions = parser::parse_account(&lines)?;
        tracing::debug!("found {} transactions on {account}", transactions.len());
        Ok(transactions)
    }

    /// Every account's register, concatenated in account order.
    pub async fn load(&self) -> ResultEngine<Vec<Transaction>> {
        let accounts = self.list_accounts().await?;
        tracing::debug!("found {} accounts", accounts.len());

        let mut transactions = Vec::new();
        for account in &accounts {
            transactions.extend(self.account_transactions(account).await?);
        }
        Ok(transactions)
    }

    fn args(&self, template: &[&str], account: Option<&str>) -> Vec<OsString> {
        let mut args = Vec::with_capacity(template.len() + 2);
        if let Some(file) = &self.data_file {
            let mut flag = OsString::from("--file=");
            flag.push(file);
            args.push(flag);
        }
        args.extend(template.iter().map(OsString::from));
        if let Some(account) = account {
            args.push(OsString::from(account));
        }
        args
    }

    async fn run(&self, template: &[&str], account: Option<&str>) -> ResultEngine<Vec<String>> {
        let args = self.args(template, account);
        let command = self.command_line(&args);

        with_deadline(&command, self.timeout, async {
            let output = Command::new(&self.binary)
                .args(&args)
                .current_dir(&self.data_dir)
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .kill_on_drop(true)
                .output()
                .await
                .map_err(|err| EngineError::execution(&command, err))?;

            if !output.status.success() {
                let stderr = String::from_utf8_lossy(&output.stderr);
                tracing::debug!("`{command}` stderr: {}", stderr.trim());
                return Err(EngineError::execution(&command, output.status));
            }

            let stdout = String::from_utf8(output.stdout)
                .map_err(|err| EngineError::execution(&command, err))?;
            Ok(parser::split_output(&stdout))
        })
        .await
    }

    fn command_line(&self, args: &[OsString]) -> String {
        let mut line = self.binary.display().to_string();
        for arg in args {
            line.push(' ');
            line.push_str(&arg.to_string_lossy());
        }
        line
    }
}

impl Extract for Ledger {
    fn extract(&self) -> BoxFuture<'_, ResultEngine<Vec<Transaction>>> {
        Box::pin(self.load())
    }
}

#[derive(Debug)]
pub struct LedgerBuilder {
    binary: PathBuf,
    data_dir: PathBuf,
    data_file: Option<PathBuf>,
    timeout: Option<Duration>,
}

impl Default for LedgerBuilder {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("ledger"),
            data_dir: PathBuf::from("."),
            data_file: None,
            timeout: None,
        }
    }
}

impl LedgerBuilder {
    /// Tool to invoke, `ledger` by default.
    pub fn binary(mut self, binary: impl AsRef<Path>) -> LedgerBuilder {
        self.binary = binary.as_ref().to_path_buf();
        self
    }

    /// Working directory of every invocation.
    pub fn data_dir(mut self, data_dir: impl AsRef<Path>) -> LedgerBuilder {
        self.data_dir = data_dir.as_ref().to_path_buf();
        self
    }

    /// Ledger file passed with `--file`; omitted when unset.
    pub fn data_file(mut self, data_file: impl AsRef<Path>) -> LedgerBuilder {
        self.data_file = Some(data_file.as_ref().to_path_buf());
        self
    }

    pub fn timeout(mut self, timeout: Option<Duration>) -> LedgerBuilder {
        self.timeout = timeout;
        self
    }

    /// Construct `Ledger`
    pub fn build(self) -> Ledger {
        Ledger {
            binary: self.binary,
            data_dir: self.data_dir,
            data_file: self.data_file,
            timeout: self.timeout,
        }
    }
}
