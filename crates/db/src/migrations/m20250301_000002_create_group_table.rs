//! Create group table with schedule configuration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Group::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Group::Id).string().not_null().primary_key())
                    .col(ColumnDef::new(Group::OwnerId).string().not_null())
                    .col(ColumnDef::new(Group::Name).string().not_null())
                    .col(
                        ColumnDef::new(Group::Frequency)
                            .integer()
                            .not_null()
                            .default(2),
                    )
                    .col(
                        ColumnDef::new(Group::IntervalMode)
                            .string_len(20)
                            .not_null()
                            .default("random"),
                    )
                    .col(ColumnDef::new(Group::ScheduleDays).json_binary().null())
                    .col(ColumnDef::new(Group::ScheduleTimes).json_binary().null())
                    .col(ColumnDef::new(Group::QuietHoursStart).integer().null())
                    .col(ColumnDef::new(Group::QuietHoursEnd).integer().null())
                    .col(ColumnDef::new(Group::NotificationTitle).string().null())
                    .col(ColumnDef::new(Group::NotificationBody).string().null())
                    .col(
                        ColumnDef::new(Group::OwnerTimezone)
                            .string()
                            .not_null()
                            .default("UTC"),
                    )
                    .col(
                        ColumnDef::new(Group::LastPingTime)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Group::NextPingTime)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Group::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Group::UpdatedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_group_owner")
                            .from(Group::Table, Group::OwnerId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // The cron pass scans by due time
        manager
            .create_index(
                Index::create()
                    .name("idx_group_next_ping_time")
                    .table(Group::Table)
                    .col(Group::NextPingTime)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_group_owner_id")
                    .table(Group::Table)
                    .col(Group::OwnerId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Group::Table).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(Iden)]
enum Group {
    Table,
    Id,
    OwnerId,
    Name,
    Frequency,
    IntervalMode,
    ScheduleDays,
    ScheduleTimes,
    QuietHoursStart,
    QuietHoursEnd,
    NotificationTitle,
    NotificationBody,
    OwnerTimezone,
    LastPingTime,
    NextPingTime,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum User {
    Table,
    Id,
}
