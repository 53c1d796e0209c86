//! Push subscription entity.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Push subscription entity for Web Push notifications.
///
/// A user may hold several subscriptions (one per device). The endpoint is
/// the unique key: re-registration replaces key material and transfers
/// ownership rather than inserting a second row.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "push_subscription")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// Owning user.
    #[sea_orm(indexed)]
    pub user_id: String,

    /// Auth session that registered this subscription. Subscriptions are
    /// removed when their session terminates.
    #[sea_orm(indexed, nullable)]
    pub session_id: Option<String>,

    /// Push subscription endpoint URL.
    #[sea_orm(unique, column_type = "Text")]
    pub endpoint: String,

    /// Auth secret for payload encryption.
    pub auth: String,

    /// P256DH public key for payload encryption.
    pub p256dh: String,

    /// Timestamp when the subscription was created.
    pub created_at: DateTimeWithTimeZone,

    /// Timestamp when the subscription was last re-registered.
    #[sea_orm(nullable)]
    pub updated_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    User,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
