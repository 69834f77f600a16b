//! Ledger data endpoint

use api_types::transaction::TransactionView;
use axum::{Json, extract::State};
use engine::Transaction;

use crate::{ServerError, server::ServerState};

fn view(tx: &Transaction) -> TransactionView {
    TransactionView {
        time: tx.time,
        account: tx.account.clone(),
        payee: tx.payee.clone(),
        amount: tx.amount,
        total: tx.total,
    }
}

/// Serves the cached register, loading it first when the cache is empty.
pub async fn get(State(state): State<ServerState>) -> Result<Json<Vec<TransactionView>>, ServerError> {
    let snapshot = state.cache.get_or_load().await?;
    Ok(Json(snapshot.iter().map(view).collect()))
}
