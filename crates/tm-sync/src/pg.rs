//! Postgres-backed remote store.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::rows::{MarketStatusRow, OfferRow, TransferRow, MARKET_STATUS_ROW_ID};
use crate::{RemoteStore, RemoteSyncError};

#[derive(Clone)]
pub struct PgRemoteStore {
    pool: PgPool,
}

impl PgRemoteStore {
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
            .context("failed to connect to Postgres")?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run embedded SQLx migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("db migrate failed")?;
        Ok(())
    }
}

fn offer_from_row(row: &PgRow) -> Result<OfferRow, sqlx::Error> {
    Ok(OfferRow {
        id: row.try_get("id")?,
        player_id: row.try_get("player_id")?,
        player_name: row.try_get("player_name")?,
        from_club: row.try_get("from_club")?,
        to_club: row.try_get("to_club")?,
        amount: row.try_get("amount")?,
        status: row.try_get("status")?,
        user_id: row.try_get("user_id")?,
        date: row.try_get("date")?,
        counter_amount: row.try_get("counter_amount")?,
        counter_message: row.try_get("counter_message")?,
    })
}

fn transfer_from_row(row: &PgRow) -> Result<TransferRow, sqlx::Error> {
    Ok(TransferRow {
        id: row.try_get("id")?,
        player_id: row.try_get("player_id")?,
        player_name: row.try_get("player_name")?,
        from_club: row.try_get("from_club")?,
        to_club: row.try_get("to_club")?,
        fee: row.try_get("fee")?,
        date: row.try_get("date")?,
    })
}

#[async_trait]
impl RemoteStore for PgRemoteStore {
    async fn upsert_offer(&self, row: &OfferRow) -> Result<(), RemoteSyncError> {
        sqlx::query(
            r#"
            insert into offers (
              id, player_id, player_name, from_club, to_club, amount, status,
              user_id, date, counter_amount, counter_message
            ) values (
              $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11
            )
            on conflict (id) do update set
              player_id = excluded.player_id,
              player_name = excluded.player_name,
              from_club = excluded.from_club,
              to_club = excluded.to_club,
              amount = excluded.amount,
              status = excluded.status,
              user_id = excluded.user_id,
              date = excluded.date,
              counter_amount = excluded.counter_amount,
              counter_message = excluded.counter_message
            "#,
        )
        .bind(row.id)
        .bind(&row.player_id)
        .bind(&row.player_name)
        .bind(&row.from_club)
        .bind(&row.to_club)
        .bind(row.amount)
        .bind(&row.status)
        .bind(row.user_id)
        .bind(row.date)
        .bind(row.counter_amount)
        .bind(&row.counter_message)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn upsert_transfer(&self, row: &TransferRow) -> Result<(), RemoteSyncError> {
        sqlx::query(
            r#"
            insert into transfers (
              id, player_id, player_name, from_club, to_club, fee, date
            ) values (
              $1, $2, $3, $4, $5, $6, $7
            )
            on conflict (id) do update set
              player_id = excluded.player_id,
              player_name = excluded.player_name,
              from_club = excluded.from_club,
              to_club = excluded.to_club,
              fee = excluded.fee,
              date = excluded.date
            "#,
        )
        .bind(row.id)
        .bind(&row.player_id)
        .bind(&row.player_name)
        .bind(&row.from_club)
        .bind(&row.to_club)
        .bind(row.fee)
        .bind(row.date)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_transfer(&self, id: Uuid) -> Result<(), RemoteSyncError> {
        sqlx::query("delete from transfers where id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn upsert_market_status(&self, row: &MarketStatusRow) -> Result<(), RemoteSyncError> {
        sqlx::query(
            r#"
            insert into market_status (id, is_open, updated_at)
            values ($1, $2, $3)
            on conflict (id) do update set
              is_open = excluded.is_open,
              updated_at = excluded.updated_at
            "#,
        )
        .bind(MARKET_STATUS_ROW_ID)
        .bind(row.is_open)
        .bind(row.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn fetch_offers(&self) -> Result<Vec<OfferRow>, RemoteSyncError> {
        let rows = sqlx::query(
            r#"
            select
              id, player_id, player_name, from_club, to_club, amount, status,
              user_id, date, counter_amount, counter_message
            from offers
            order by date asc, id asc
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|r| offer_from_row(r).map_err(RemoteSyncError::from))
            .collect()
    }

    async fn fetch_transfers(&self) -> Result<Vec<TransferRow>, RemoteSyncError> {
        let rows = sqlx::query(
            r#"
            select id, player_id, player_name, from_club, to_club, fee, date
            from transfers
            order by date desc, id asc
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|r| transfer_from_row(r).map_err(RemoteSyncError::from))
            .collect()
    }

    async fn fetch_market_status(&self) -> Result<Option<MarketStatusRow>, RemoteSyncError> {
        let row = sqlx::query("select id, is_open, updated_at from market_status where id = $1")
            .bind(MARKET_STATUS_ROW_ID)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            None => Ok(None),
            Some(r) => Ok(Some(MarketStatusRow {
                id: r.try_get("id")?,
                is_open: r.try_get("is_open")?,
                updated_at: r.try_get("updated_at")?,
            })),
        }
    }
}
