use crate::core::config::DatabaseConfig;
use crate::core::error::{CrmError, CrmResult};
use diesel::r2d2::{ConnectionManager, CustomizeConnection, Pool};
use diesel::{PgConnection, RunQueryDsl};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use std::time::Duration;

pub type DbPool = Pool<ConnectionManager<PgConnection>>;

/// Bounds every statement run on a pooled connection.
#[derive(Debug, Clone, Copy)]
struct StatementTimeout(u64);

impl CustomizeConnection<PgConnection, diesel::r2d2::Error> for StatementTimeout {
    fn on_acquire(&self, conn: &mut PgConnection) -> Result<(), diesel::r2d2::Error> {
        diesel::sql_query(format!("SET statement_timeout = {}", self.0))
            .execute(conn)
            .map(|_| ())
            .map_err(diesel::r2d2::Error::QueryError)
    }
}

pub fn create_conn(config: &DatabaseConfig) -> Result<DbPool, diesel::r2d2::PoolError> {
    let manager = ConnectionManager::<PgConnection>::new(config.url.as_str());
    Pool::builder()
        .max_size(config.max_connections.max(1))
        .connection_timeout(Duration::from_secs(config.connection_timeout_secs.max(1)))
        .connection_customizer(Box::new(StatementTimeout(config.statement_timeout_ms)))
        .build(manager)
}

/// Builds a pool without opening any connection. Checkouts fail after the
/// configured timeout when the database is unreachable.
pub fn create_lazy_conn(config: &DatabaseConfig) -> DbPool {
    let manager = ConnectionManager::<PgConnection>::new(config.url.as_str());
    Pool::builder()
        .max_size(config.max_connections.max(1))
        .min_idle(Some(0))
        .connection_timeout(Duration::from_secs(config.connection_timeout_secs.max(1)))
        .build_unchecked(manager)
}

/// Run database migrations
pub fn run_migrations(pool: &DbPool) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};

    const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

    let mut conn = pool.get()?;
    conn.run_pending_migrations(MIGRATIONS).map_err(
        |e| -> Box<dyn std::error::Error + Send + Sync> {
            Box::new(std::io::Error::other(format!("Migration error: {}", e)))
        },
    )?;
    Ok(())
}

/// Escapes `%`, `_` and `\` so user text matches literally inside ILIKE.
pub fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Decodes a JSON request body, reporting shape errors as validation failures.
pub fn parse_json_body<T: DeserializeOwned>(body: serde_json::Value) -> CrmResult<T> {
    serde_json::from_value(body).map_err(|e| CrmError::invalid("body", e.to_string()))
}

/// Keeps an explicit `null` apart from an absent key: with
/// `#[serde(default)]` a missing field is `None` and `null` is `Some(None)`.
pub fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Treats empty query-string values such as `?status=` as absent.
pub fn empty_string_as_none<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => value.parse().map(Some).map_err(serde::de::Error::custom),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("ali"), "ali");
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
    }

    #[derive(Deserialize)]
    struct Params {
        #[serde(default, deserialize_with = "empty_string_as_none")]
        page: Option<i64>,
    }

    #[test]
    fn test_empty_string_as_none() {
        let params: Params = serde_json::from_str(r#"{"page": ""}"#).unwrap();
        assert_eq!(params.page, None);
        let params: Params = serde_json::from_str(r#"{"page": "3"}"#).unwrap();
        assert_eq!(params.page, Some(3));
        let params: Params = serde_json::from_str("{}").unwrap();
        assert_eq!(params.page, None);
        assert!(serde_json::from_str::<Params>(r#"{"page": "x"}"#).is_err());
    }

    #[test]
    fn test_parse_json_body_maps_to_validation() {
        #[derive(Debug, Deserialize)]
        #[serde(deny_unknown_fields)]
        struct Body {
            #[allow(dead_code)]
            name: String,
        }
        assert!(parse_json_body::<Body>(serde_json::json!({"name": "x"})).is_ok());
        let err = parse_json_body::<Body>(serde_json::json!({"name": "x", "extra": 1})).unwrap_err();
        assert!(matches!(err, CrmError::Validation(ref f) if f[0].field == "body"));
    }
}
