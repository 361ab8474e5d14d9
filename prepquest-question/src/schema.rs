use sqlx::migrate::Migrator;

pub static POSTGRES_MIGRATOR: Migrator =
    sqlx::migrate!("./migrations/postgres");

pub static SQLITE_MIGRATOR: Migrator = sqlx::migrate!("./migrations/sqlite");
