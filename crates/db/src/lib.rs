use std::str::FromStr;

use sqlx::{
    sqlite::SqliteConnectOptions, Error, Pool, Sqlite, SqlitePool, Transaction,
};

pub mod models;
pub mod sync;

pub type Tx<'a> = Transaction<'a, Sqlite>;

pub async fn start_db(database_url: &str) -> Result<Pool<Sqlite>, Error> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true);
    let pool = SqlitePool::connect_with(options).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    Ok(pool)
}
