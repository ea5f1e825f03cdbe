//! Relational probe: fetch the target's password from the vault, write the
//! sample table, read it back, and compare row-for-row.

use serde_json::json;
use sqlx::Row;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use std::time::Instant;
use tracing::{info, instrument};

use super::ProbeReport;
use crate::clients::vault::SecretClient;
use crate::config::{Config, SqlTarget};
use crate::credentials::TokenCredential;
use crate::errors::{Error, Result};
use crate::table::Table;

/// Table and column names are interpolated into DDL (identifiers cannot be
/// bound), so they are restricted to plain identifier characters.
fn check_identifier(kind: &'static str, name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid_start = chars.next().is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    if !valid_start || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(Error::config(format!(
            "{kind} {name:?} must be a plain identifier (letters, digits, underscores)"
        )));
    }
    Ok(())
}

/// Connection options for a target, with the password fetched at probe time.
fn connect_options(target: &SqlTarget, password: &str) -> PgConnectOptions {
    PgConnectOptions::new()
        .host(&target.host)
        .port(target.port)
        .database(&target.database)
        .username(&target.user)
        .password(password)
}

/// Drop/recreate the probe table, insert `written`, and select it back.
///
/// Split out from [`run`] so the round-trip is testable against a plain
/// pool without a vault in the loop.
pub(crate) async fn write_then_read_back(pool: &PgPool, table_name: &str, written: &Table) -> Result<Table> {
    check_identifier("table name", table_name)?;
    for column in written.columns() {
        check_identifier("column name", column)?;
    }

    sqlx::query(&format!("DROP TABLE IF EXISTS \"{table_name}\""))
        .execute(pool)
        .await?;

    let columns_ddl: Vec<String> = written.columns().iter().map(|c| format!("\"{c}\" TEXT")).collect();
    sqlx::query(&format!("CREATE TABLE \"{table_name}\" ({})", columns_ddl.join(", ")))
        .execute(pool)
        .await?;

    let column_list: Vec<String> = written.columns().iter().map(|c| format!("\"{c}\"")).collect();
    let placeholders: Vec<String> = (1..=written.columns().len()).map(|i| format!("${i}")).collect();
    let insert = format!(
        "INSERT INTO \"{table_name}\" ({}) VALUES ({})",
        column_list.join(", "),
        placeholders.join(", ")
    );
    for row in written.rows() {
        let mut query = sqlx::query(&insert);
        for cell in row {
            query = query.bind(cell);
        }
        query.execute(pool).await?;
    }

    let select = format!("SELECT {} FROM \"{table_name}\"", column_list.join(", "));
    let rows = sqlx::query(&select).fetch_all(pool).await?;

    let mut read_back = Table::new(written.columns().to_vec());
    for row in rows {
        let mut cells = Vec::with_capacity(written.columns().len());
        for i in 0..written.columns().len() {
            cells.push(row.try_get::<String, _>(i)?);
        }
        read_back.push_row(cells);
    }
    Ok(read_back)
}

/// Run the relational probe against the named target.
#[instrument(skip(config, credential))]
pub async fn run(config: &Config, credential: &dyn TokenCredential, target_name: &str) -> Result<ProbeReport> {
    let target = config.sql.target(target_name)?;
    target.validate(target_name)?;
    config.vault.validate_url()?;

    // The password lives in the vault, never in configuration
    let token = credential.get_token(&config.vault.scope).await?;
    let vault = SecretClient::new(&config.vault.url, config.request_timeout)?;
    let password = vault.get_secret(&token, &target.password_secret).await?.value;

    let pool = PgPoolOptions::new()
        .max_connections(1)
        .connect_with(connect_options(target, &password))
        .await?;

    let written = Table::sample();

    let started = Instant::now();
    let read_back = write_then_read_back(&pool, &target.table, &written).await?;
    info!(sql_target = target_name, table = %target.table, rows = read_back.rows().len(), "table round-trip complete");
    pool.close().await;

    let response = json!({
        "target": target_name,
        "table": target.table,
        "written": written.to_json(),
        "read_back": read_back.to_json(),
    });

    if written.rows_match_unordered(&read_back) {
        Ok(ProbeReport::success("sql", started, response))
    } else {
        Ok(ProbeReport::failure(
            "sql",
            started,
            "read-back rows differ from the written sample".to_string(),
            response,
        ))
    }
}
