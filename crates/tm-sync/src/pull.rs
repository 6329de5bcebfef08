use std::time::Duration;

use tm_schemas::{MarketSnapshot, Offer, Transfer};

use crate::{RemoteStore, RemoteSyncError};

/// Pull the full remote snapshot under one deadline.
///
/// All-or-nothing: any fetch or decode failure fails the pull, so the caller
/// never sees a partial snapshot.
pub async fn pull_snapshot(
    store: &dyn RemoteStore,
    timeout: Duration,
) -> Result<MarketSnapshot, RemoteSyncError> {
    let fetch = async {
        let offers = store.fetch_offers().await?;
        let transfers = store.fetch_transfers().await?;
        let market = store.fetch_market_status().await?;

        let offers = offers
            .into_iter()
            .map(|r| r.into_offer())
            .collect::<Result<Vec<Offer>, _>>()?;
        let transfers = transfers.into_iter().map(Transfer::from);

        Ok::<_, RemoteSyncError>(MarketSnapshot::from_parts(
            offers,
            transfers,
            market.map(Into::into),
        ))
    };

    match tokio::time::timeout(timeout, fetch).await {
        Ok(r) => r,
        Err(_) => Err(RemoteSyncError::Timeout(timeout)),
    }
}
