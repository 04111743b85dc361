//! Conversions between application scalars and nullable columns.
//!
//! On the application side absence is the type's zero value; on the storage
//! side it is SQL `NULL` (`None` when bound through sqlx). Both directions are
//! total.

/// Zero value becomes `None`, anything else `Some(value)`.
pub fn to_nullable<T>(value: T) -> Option<T>
where
    T: Default + PartialEq,
{
    if value == T::default() {
        None
    } else {
        Some(value)
    }
}

/// `None` becomes the zero value.
pub fn from_nullable<T: Default>(value: Option<T>) -> T {
    value.unwrap_or_default()
}

/// Nullable `BIGINT`: `0` is stored as `NULL`.
pub fn null_i64(value: i64) -> Option<i64> {
    to_nullable(value)
}

/// Nullable `INTEGER`: `0` is stored as `NULL`.
pub fn null_i32(value: i32) -> Option<i32> {
    to_nullable(value)
}

/// Nullable text: the empty string is stored as `NULL`.
pub fn null_string(value: impl Into<String>) -> Option<String> {
    to_nullable(value.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    #[test]
    fn test_null_i64() {
        assert_eq!(null_i64(23), Some(23));
        assert_eq!(null_i64(0), None);
    }

    #[test]
    fn test_null_i32() {
        assert_eq!(null_i32(-7), Some(-7));
        assert_eq!(null_i32(0), None);
    }

    #[test]
    fn test_null_string() {
        assert_eq!(null_string("not null"), Some("not null".to_string()));
        assert_eq!(null_string(""), None);
    }

    #[test]
    fn test_from_nullable() {
        assert_eq!(from_nullable(Some(42i64)), 42);
        assert_eq!(from_nullable::<i64>(None), 0);
        assert_eq!(from_nullable::<String>(None), "");
        assert!(!from_nullable::<bool>(None));
    }

    #[test]
    fn test_round_trip_includes_zero_value() {
        for v in [0i64, 1, -1, i64::MAX, i64::MIN] {
            assert_eq!(from_nullable(to_nullable(v)), v);
        }
        for s in ["", "Alex Cox"] {
            assert_eq!(from_nullable(to_nullable(s.to_string())), s);
        }
        assert_eq!(from_nullable(to_nullable(0.0f64)), 0.0);
    }

    #[tokio::test]
    async fn test_zero_value_is_stored_as_null() {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::query("CREATE TABLE person (name TEXT, age INTEGER)")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("INSERT INTO person (name, age) VALUES (?, ?)")
            .bind(null_string(""))
            .bind(null_i64(0))
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("INSERT INTO person (name, age) VALUES (?, ?)")
            .bind(null_string("Repo"))
            .bind(null_i64(31))
            .execute(&pool)
            .await
            .unwrap();

        let nulls: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM person WHERE name IS NULL AND age IS NULL")
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(nulls.0, 1);

        let rows: Vec<(Option<String>, Option<i64>)> =
            sqlx::query_as("SELECT name, age FROM person ORDER BY rowid")
                .fetch_all(&pool)
                .await
                .unwrap();
        let decoded: Vec<(String, i64)> = rows
            .into_iter()
            .map(|(name, age)| (from_nullable(name), from_nullable(age)))
            .collect();
        assert_eq!(
            decoded,
            vec![(String::new(), 0), ("Repo".to_string(), 31)]
        );
    }
}
