//! User entity.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "user")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    #[sea_orm(unique)]
    pub email: String,

    /// Display name
    #[sea_orm(nullable)]
    pub name: Option<String>,

    /// Opaque API token issued by the auth provider
    #[sea_orm(unique, nullable)]
    pub token: Option<String>,

    /// IANA timezone identifier (e.g. "Europe/Amsterdam")
    pub timezone: String,

    /// Last time a check-in prompt was pushed to this user
    #[sea_orm(nullable)]
    pub last_notified_at: Option<DateTimeWithTimeZone>,

    /// Personal prompt cadence, only consulted when the user has no
    /// active group (1 = daily, 2 = every 2 days, 3 = every 3 days,
    /// 7 = weekly)
    #[sea_orm(default_value = 1)]
    pub notification_frequency: i32,

    /// Group the user currently checks in with, if any
    #[sea_orm(nullable)]
    pub active_group_id: Option<String>,

    pub created_at: DateTimeWithTimeZone,

    #[sea_orm(nullable)]
    pub updated_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::push_subscription::Entity")]
    PushSubscriptions,

    #[sea_orm(has_many = "super::group_member::Entity")]
    Memberships,
}

impl Related<super::push_subscription::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PushSubscriptions.def()
    }
}

impl Related<super::group_member::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Memberships.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
