//! Database migrations.
//!
//! Schema migrations for the database.

#![allow(missing_docs)]

use sea_orm_migration::prelude::*;

mod m20250301_000001_create_user_table;
mod m20250301_000002_create_group_table;
mod m20250301_000003_create_group_member_table;
mod m20250301_000004_create_push_subscription_table;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250301_000001_create_user_table::Migration),
            Box::new(m20250301_000002_create_group_table::Migration),
            Box::new(m20250301_000003_create_group_member_table::Migration),
            Box::new(m20250301_000004_create_push_subscription_table::Migration),
        ]
    }
}
