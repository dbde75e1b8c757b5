//! Authoritative score entity. One row per user, the leaderboard index is
//! a projection of this table and can always be rebuilt from it.

use crate::database::DbResult;
use crate::utils::types::UserId;
use chrono::Utc;
use sea_orm::sea_query::OnConflict;
use sea_orm::ActiveValue::Set;
use sea_orm::prelude::*;
use sea_orm::{DatabaseConnection, EntityTrait, InsertResult};
use serde::Serialize;
use std::future::Future;

#[derive(Serialize, Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "user_scores")]
pub struct Model {
    /// ID of the user this score belongs to
    #[sea_orm(primary_key, auto_increment = false)]
    pub user_id: UserId,
    /// The current rating of the user
    pub rating: i32,
    /// When the rating last changed
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::UserId",
        to = "super::users::Column::Id"
    )]
    User,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Conflict handling for score upserts, replaces the rating and
    /// updated time when the user already has a score row
    #[inline(always)]
    fn conflict_handle() -> OnConflict {
        OnConflict::column(Column::UserId)
            .update_columns([Column::Rating, Column::UpdatedAt])
            .to_owned()
    }

    /// Writes the rating for the provided user, inserting the score row
    /// if it doesn't exist yet
    ///
    /// `db`      The database connection
    /// `user_id` The ID of the user the score belongs to
    /// `rating`  The rating to store
    pub fn upsert(
        db: &DatabaseConnection,
        user_id: UserId,
        rating: i32,
    ) -> impl Future<Output = DbResult<InsertResult<ActiveModel>>> + Send + '_ {
        Entity::insert(ActiveModel {
            user_id: Set(user_id),
            rating: Set(rating),
            updated_at: Set(Utc::now()),
        })
        .on_conflict(Self::conflict_handle())
        .exec(db)
    }

    /// Collects every score row. The simulation samples from this set and
    /// index rebuilds stream it in full.
    ///
    /// `db` The database connection
    pub fn all(db: &DatabaseConnection) -> impl Future<Output = DbResult<Vec<Self>>> + Send + '_ {
        Entity::find().all(db)
    }
}
