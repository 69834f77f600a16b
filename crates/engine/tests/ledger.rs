#![cfg(unix)]

use std::{
    fs,
    os::unix::fs::PermissionsExt,
    path::{Path, PathBuf},
    time::Duration,
};

use engine::{EngineError, Extract, Ledger};

/// Fake `ledger`: logs its arguments to `calls.log` in the working directory,
/// prints `accounts.txt` for `accounts` and `register-<account>.txt` for a
/// register (with `:` and `/` mapped to `_`).
const FAKE_LEDGER: &str = r#"
printf '%s|' "$@" >> calls.log
echo >> calls.log
for arg in "$@"; do last="$arg"; done
for arg in "$@"; do
  if [ "$arg" = "accounts" ]; then cat accounts.txt; exit 0; fi
done
cat "register-$(printf '%s' "$last" | tr ':/' '__').txt"
"#;

fn stub(dir: &Path, body: &str) -> PathBuf {
    let path = dir.join("ledger-stub");
    fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    let mut permissions = fs::metadata(&path).unwrap().permissions();
    permissions.set_mode(0o755);
    fs::set_permissions(&path, permissions).unwrap();
    path
}

fn books(accounts: &[(&str, &str)]) -> (tempfile::TempDir, Ledger) {
    let dir = tempfile::tempdir().unwrap();
    let names: Vec<_> = accounts.iter().map(|(name, _)| *name).collect();
    fs::write(dir.path().join("accounts.txt"), names.join("\n") + "\n").unwrap();
    for (name, register) in accounts {
        let file = format!("register-{}.txt", name.replace([':', '/'], "_"));
        fs::write(dir.path().join(file), register).unwrap();
    }

    let ledger = Ledger::builder()
        .binary(stub(dir.path(), FAKE_LEDGER))
        .data_dir(dir.path())
        .data_file("books.ledger")
        .build();
    (dir, ledger)
}

#[tokio::test]
async fn extracts_every_account_in_order() {
    let (dir, ledger) = books(&[
        (
            "Assets:Checking",
            "2024/01/15 Assets:Checking 100.00 500.00 Coffee Shop Purchase\n\
             2024/01/16 Assets:Checking -20 480 Bakery\n",
        ),
        ("Expenses/Food", "2024/01/16 Expenses/Food 20 20 Bakery\n"),
    ]);

    let txs = ledger.extract().await.unwrap();

    let summary: Vec<_> = txs
        .iter()
        .map(|tx| (tx.account.as_str(), tx.payee.as_str()))
        .collect();
    assert_eq!(
        summary,
        [
            ("Assets:Checking", "Coffee Shop Purchase"),
            ("Assets:Checking", "Bakery"),
            ("Expenses/Food", "Bakery"),
        ]
    );

    let calls = fs::read_to_string(dir.path().join("calls.log")).unwrap();
    let calls: Vec<_> = calls.lines().filter(|l| l.starts_with("--file=")).collect();
    assert_eq!(calls.len(), 3);
    assert!(calls[0].starts_with("--file=books.ledger|accounts|--no-pager|"));
    assert!(calls[1].starts_with("--file=books.ledger|register|--cleared|--sort=date|--no-pager|"));
}

#[tokio::test]
async fn list_accounts_returns_names() {
    let (_dir, ledger) = books(&[("Assets:Checking", ""), ("Liabilities:Card", "")]);

    let accounts = ledger.list_accounts().await.unwrap();

    assert_eq!(accounts, ["Assets:Checking", "Liabilities:Card"]);
}

#[tokio::test]
async fn blank_register_is_not_an_error() {
    let (_dir, ledger) = books(&[("Assets:Checking", "  \n\n")]);

    assert!(ledger.fetch_register("Assets:Checking").await.unwrap().is_empty());
    assert!(ledger.extract().await.unwrap().is_empty());
}

#[tokio::test]
async fn malformed_line_fails_whole_extraction() {
    let (_dir, ledger) = books(&[
        ("Assets:Checking", "2024/01/15 Assets:Checking 1 1 Fine\n"),
        ("Expenses:Food", "2024/01/16 Expenses:Food twenty 20 Broken\n"),
    ]);

    let err = ledger.extract().await.unwrap_err();

    assert!(matches!(err, EngineError::Format { line_no: 1, .. }));
}

#[tokio::test]
async fn non_zero_exit_is_an_execution_error() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = Ledger::builder()
        .binary(stub(dir.path(), "echo 'Error: no journal file' >&2\nexit 1"))
        .data_dir(dir.path())
        .build();

    let err = ledger.list_accounts().await.unwrap_err();

    match err {
        EngineError::Execution { command, reason } => {
            assert!(command.ends_with("ledger-stub accounts --no-pager"), "{command}");
            assert!(reason.contains("exit status: 1"), "{reason}");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn missing_tool_is_an_execution_error() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = Ledger::builder()
        .binary(dir.path().join("does-not-exist"))
        .data_dir(dir.path())
        .build();

    let err = ledger.extract().await.unwrap_err();

    assert!(matches!(err, EngineError::Execution { .. }));
}

#[tokio::test]
async fn hung_tool_hits_the_deadline() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = Ledger::builder()
        .binary(stub(dir.path(), "sleep 10"))
        .data_dir(dir.path())
        .timeout(Some(Duration::from_millis(200)))
        .build();

    let err = ledger.list_accounts().await.unwrap_err();

    assert!(matches!(err, EngineError::Timeout { .. }));
}
