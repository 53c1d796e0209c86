//! Group entity for shared check-in circles.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// How the next ping instant for a group is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
pub enum IntervalMode {
    /// Exponentially distributed intervals around the weekly frequency.
    #[sea_orm(string_value = "random")]
    Random,
    /// Explicit weekday + hour slots in the owner's timezone.
    #[sea_orm(string_value = "fixed")]
    Fixed,
}

impl Default for IntervalMode {
    fn default() -> Self {
        Self::Random
    }
}

/// Group entity - a circle of users prompted to check in together.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "group")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// User who owns the group.
    #[sea_orm(indexed)]
    pub owner_id: String,

    /// Group name.
    pub name: String,

    /// Desired pings per week (positive).
    #[sea_orm(default_value = 2)]
    pub frequency: i32,

    /// Scheduling mode.
    pub interval_mode: IntervalMode,

    /// Explicit weekday indices 0-6 (Sunday-Saturday) for fixed mode.
    /// Empty/NULL means derive days from `frequency`.
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub schedule_days: Option<Json>,

    /// Explicit hours of day 0-23 for fixed mode. Empty/NULL means 09:00.
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub schedule_times: Option<Json>,

    /// Quiet hours start (hour 0-23), evaluated in each member's timezone.
    #[sea_orm(nullable)]
    pub quiet_hours_start: Option<i32>,

    /// Quiet hours end (hour 0-23).
    #[sea_orm(nullable)]
    pub quiet_hours_end: Option<i32>,

    /// Override title for the check-in prompt.
    #[sea_orm(nullable)]
    pub notification_title: Option<String>,

    /// Override body for the check-in prompt.
    #[sea_orm(nullable)]
    pub notification_body: Option<String>,

    /// Owner's IANA timezone, anchors fixed-mode slots.
    pub owner_timezone: String,

    /// When the group was last pinged.
    #[sea_orm(nullable)]
    pub last_ping_time: Option<DateTimeWithTimeZone>,

    /// When the group is next due. NULL until initialized by the cron pass;
    /// always in the future relative to the last computation.
    #[sea_orm(indexed, nullable)]
    pub next_ping_time: Option<DateTimeWithTimeZone>,

    /// When the group was created.
    pub created_at: DateTimeWithTimeZone,

    /// When the group was last updated.
    #[sea_orm(nullable)]
    pub updated_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::OwnerId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    Owner,
    #[sea_orm(has_many = "super::group_member::Entity")]
    Members,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Owner.def()
    }
}

impl Related<super::group_member::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Members.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
