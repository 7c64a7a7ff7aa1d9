use axum::{
    Extension, Json,
    extract::{Query, State},
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;

use slimquest_types::api::{Claims, CoinLedgerResponse, CoinTransactionResponse, HistoryQuery};
use slimquest_types::models::TransactionKind;

use crate::convert;
use crate::error::ApiError;
use crate::state::{AppState, blocking};

/// GET /me/coins — balance plus the most recent ledger entries.
pub async fn ledger(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    WithRejection(Query(query), _): WithRejection<Query<HistoryQuery>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let uid = claims.sub.to_string();
    let limit = convert::page_limit(query.limit);

    let (user, rows) = blocking(&state, move |db| {
        let user = db.get_user_by_id(&uid)?;
        let rows = db.coin_transactions(&uid, limit)?;
        Ok((user, rows))
    })
    .await?;
    let user = user.ok_or_else(|| ApiError::NotFound("user not found".into()))?;

    let transactions = rows
        .into_iter()
        .map(|row| CoinTransactionResponse {
            id: convert::uuid(&row.id, "transaction id"),
            amount: row.amount,
            kind: convert::parse_enum(&row.kind, TransactionKind::Earned),
            description: row.description,
            created_at: convert::timestamp(&row.created_at),
        })
        .collect();

    Ok(Json(CoinLedgerResponse {
        balance: user.coins,
        transactions,
    }))
}
