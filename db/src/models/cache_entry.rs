// db/models/cache_entry.rs
use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::sea_query::OnConflict;
use sea_orm::{ActiveValue::Set, DeleteResult};
use serde::{Deserialize, Serialize};

/// One TTL-scoped key/value pair. Rows past `expires_at` are dead and are
/// treated as absent by every query here.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "cache_entries")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub key: String,
    pub value: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }

    /// The live row for `key`, if any.
    pub async fn find_live<C>(db: &C, key: &str, now: DateTime<Utc>) -> Result<Option<Self>, DbErr>
    where
        C: ConnectionTrait,
    {
        Entity::find_by_id(key.to_owned())
            .filter(Column::ExpiresAt.gt(now))
            .one(db)
            .await
    }

    /// Writes `value` under `key`, replacing whatever was there.
    pub async fn upsert<C>(
        db: &C,
        key: &str,
        value: &str,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<(), DbErr>
    where
        C: ConnectionTrait,
    {
        let row = ActiveModel {
            key: Set(key.to_owned()),
            value: Set(value.to_owned()),
            expires_at: Set(expires_at),
            created_at: Set(now),
        };

        Entity::insert(row)
            .on_conflict(
                OnConflict::column(Column::Key)
                    .update_columns([Column::Value, Column::ExpiresAt, Column::CreatedAt])
                    .to_owned(),
            )
            .exec_without_returning(db)
            .await?;
        Ok(())
    }

    /// Inserts `key` only if no live row holds it. Returns `true` when this
    /// call created the row.
    ///
    /// A dead row for the same key is removed first; the insert itself relies
    /// on the primary key so two concurrent callers cannot both win.
    pub async fn insert_if_absent<C>(
        db: &C,
        key: &str,
        value: &str,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<bool, DbErr>
    where
        C: ConnectionTrait,
    {
        Entity::delete_many()
            .filter(Column::Key.eq(key))
            .filter(Column::ExpiresAt.lte(now))
            .exec(db)
            .await?;

        let row = ActiveModel {
            key: Set(key.to_owned()),
            value: Set(value.to_owned()),
            expires_at: Set(expires_at),
            created_at: Set(now),
        };

        let inserted = Entity::insert(row)
            .on_conflict(OnConflict::column(Column::Key).do_nothing().to_owned())
            .exec_without_returning(db)
            .await;

        match inserted {
            Ok(rows) => Ok(rows > 0),
            Err(DbErr::RecordNotInserted) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Deletes every dead row. Returns how many were removed.
    pub async fn purge_expired<C>(db: &C, now: DateTime<Utc>) -> Result<u64, DbErr>
    where
        C: ConnectionTrait,
    {
        let DeleteResult { rows_affected } = Entity::delete_many()
            .filter(Column::ExpiresAt.lte(now))
            .exec(db)
            .await?;
        Ok(rows_affected)
    }
}
