//! User profile entity. Profiles are immutable after creation, only the
//! associated score row changes over a user's lifetime.

use crate::database::DbResult;
use crate::utils::types::UserId;
use chrono::Utc;
use sea_orm::prelude::*;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect,
};
use serde::Serialize;
use std::{future::Future, pin::Pin};

#[derive(Serialize, Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "users")]
pub struct Model {
    /// Unique identifier for the user
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: UserId,
    /// Display name, unique across all users
    pub username: String,
    /// When the profile was created
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_one = "super::user_scores::Entity")]
    Score,
}

impl Related<super::user_scores::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Score.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

type DbFuture<'a, T> = Pin<Box<dyn Future<Output = DbResult<T>> + Send + 'a>>;

impl Model {
    /// Creates a new user profile with a generated identifier and inserts
    /// it into the database
    ///
    /// `db`       The database connection
    /// `username` The display name for the new user
    pub fn create(db: &DatabaseConnection, username: String) -> DbFuture<'_, Self> {
        ActiveModel {
            id: Set(UserId::new_v4()),
            username: Set(username),
            created_at: Set(Utc::now()),
        }
        .insert(db)
    }

    /// Attempts to find a user with the provided ID, returning None when
    /// no user has that ID
    ///
    /// `db` The database connection
    /// `id` The ID of the user to find
    pub fn by_id(
        db: &DatabaseConnection,
        id: UserId,
    ) -> impl Future<Output = DbResult<Option<Self>>> + Send + '_ {
        Entity::find_by_id(id).one(db)
    }

    /// Attempts to find a user with the provided username
    ///
    /// `db`       The database connection
    /// `username` The username to search for
    pub fn by_username<'a>(
        db: &'a DatabaseConnection,
        username: &str,
    ) -> impl Future<Output = DbResult<Option<Self>>> + Send + 'a {
        Entity::find()
            .filter(Column::Username.eq(username))
            .one(db)
    }

    /// Collects the users matching any of the provided IDs. Used to join
    /// profile details onto a page of index members in one query.
    ///
    /// `db`  The database connection
    /// `ids` The user IDs to collect
    pub fn by_ids(
        db: &DatabaseConnection,
        ids: Vec<UserId>,
    ) -> impl Future<Output = DbResult<Vec<Self>>> + Send + '_ {
        Entity::find().filter(Column::Id.is_in(ids)).all(db)
    }

    /// Finds up to `limit` users whose username contains the provided
    /// query string, ordered by username
    ///
    /// `db`    The database connection
    /// `query` The substring to match against usernames
    /// `limit` The maximum number of users to return
    pub fn search<'a>(
        db: &'a DatabaseConnection,
        query: &str,
        limit: u64,
    ) -> impl Future<Output = DbResult<Vec<Self>>> + Send + 'a {
        Entity::find()
            .filter(Column::Username.contains(query))
            .order_by_asc(Column::Username)
            .limit(limit)
            .all(db)
    }
}
