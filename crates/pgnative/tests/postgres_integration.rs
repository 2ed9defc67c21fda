//! End-to-end scenarios against a live PostgreSQL server.
//!
//! These require a running server and are skipped unless `PG_TEST_HOST`
//! is set; run with `PG_TEST_HOST=localhost cargo test -- --ignored`.
//! Connection parameters mirror `PgConfig`'s fields so any of them can be
//! overridden from the environment.

use std::env;
use std::time::Duration;

use pgnative::{Connection, PgConfig, PostgresValue};

fn test_config() -> Option<PgConfig> {
    let host = env::var("PG_TEST_HOST").ok()?;
    let mut config = PgConfig::new(
        host,
        env::var("PG_TEST_USER").unwrap_or_else(|_| "postgres".to_string()),
        env::var("PG_TEST_DB").unwrap_or_else(|_| "postgres".to_string()),
    )
    .connect_timeout(Duration::from_secs(5));

    if let Ok(port) = env::var("PG_TEST_PORT") {
        config = config.port(port.parse().expect("PG_TEST_PORT must be a u16"));
    }
    if let Ok(password) = env::var("PG_TEST_PASSWORD") {
        config = config.password(password);
    }

    Some(config)
}

fn connect() -> Connection {
    Connection::connect(test_config().expect("PG_TEST_HOST not set")).expect("connect")
}

fn int(v: &PostgresValue) -> i64 {
    match v {
        PostgresValue::Integer(i) => *i,
        other => panic!("expected Integer, got {other:?}"),
    }
}

#[test]
#[ignore]
fn weather_round_trip_in_a_transaction() {
    let mut conn = connect();

    {
        let mut stmt = conn
            .prepare(
                "CREATE TEMPORARY TABLE weather (
                    city text, temp_lo int, temp_hi int, prcp numeric, date date
                )",
            )
            .unwrap();
        let mut cursor = stmt.execute(&[]).unwrap();
        assert!(cursor.next().is_none());
    }

    {
        let mut begin = conn.prepare("BEGIN").unwrap();
        assert!(begin.execute(&[]).unwrap().next().is_none());
    }

    {
        let mut insert = conn
            .prepare(
                "INSERT INTO weather (city, temp_lo, temp_hi, prcp, date)
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .unwrap();
        for i in 0..1000i64 {
            let mut cursor = insert
                .execute(&[
                    PostgresValue::String(format!("city-{i}")),
                    PostgresValue::Integer(i),
                    PostgresValue::Integer(i + 10),
                    PostgresValue::Decimal("0.25".to_string()),
                    PostgresValue::Date(pgnative::Date {
                        year: 2024,
                        month: 1,
                        day: 1,
                    }),
                ])
                .unwrap();
            assert!(cursor.next().is_none());
            assert_eq!(cursor.row_count(), Some(1));
        }
    }

    {
        let mut commit = conn.prepare("COMMIT").unwrap();
        assert!(commit.execute(&[]).unwrap().next().is_none());
    }

    {
        let mut select = conn
            .prepare("SELECT city, temp_lo, temp_hi, prcp, date FROM weather ORDER BY date")
            .unwrap();
        let mut cursor = select.execute(&[]).unwrap();
        let mut count = 0;
        while let Some(row) = cursor.next() {
            let row = row.unwrap();
            let temp_lo = int(row.get(1).unwrap());
            let temp_hi = int(row.get(2).unwrap());
            assert_eq!(temp_hi, temp_lo + 10);
            count += 1;
        }
        assert_eq!(count, 1000);
        assert_eq!(cursor.row_count(), Some(1000));
    }
}

#[test]
#[ignore]
fn update_with_parameterized_where() {
    let mut conn = connect();
    let mut create = conn
        .prepare("CREATE TEMPORARY TABLE weather (city text, temp_hi int)")
        .unwrap();
    assert!(create.execute(&[]).unwrap().next().is_none());

    let mut insert = conn
        .prepare("INSERT INTO weather (city, temp_hi) VALUES ($1, $2)")
        .unwrap();
    assert!(
        insert
            .execute(&[PostgresValue::String("sf".into()), PostgresValue::Integer(70)])
            .unwrap()
            .next()
            .is_none()
    );

    let mut update = conn
        .prepare("UPDATE weather SET temp_hi = $1 WHERE city = $2")
        .unwrap();
    let mut cursor = update
        .execute(&[PostgresValue::Integer(75), PostgresValue::String("sf".into())])
        .unwrap();
    assert!(cursor.next().is_none());
    assert_eq!(cursor.row_count(), Some(1));
}

#[test]
#[ignore]
fn delete_then_count_is_zero() {
    let mut conn = connect();
    let mut create = conn
        .prepare("CREATE TEMPORARY TABLE weather (city text)")
        .unwrap();
    assert!(create.execute(&[]).unwrap().next().is_none());

    let mut insert = conn.prepare("INSERT INTO weather (city) VALUES ($1)").unwrap();
    for _ in 0..1000 {
        assert!(
            insert
                .execute(&[PostgresValue::String("sf".into())])
                .unwrap()
                .next()
                .is_none()
        );
    }

    let mut delete = conn
        .prepare("DELETE FROM weather WHERE city = $1")
        .unwrap();
    let mut cursor = delete
        .execute(&[PostgresValue::String("sf".into())])
        .unwrap();
    assert!(cursor.next().is_none());
    assert_eq!(cursor.row_count(), Some(1000));

    let mut count = conn.prepare("SELECT COUNT(*) FROM weather").unwrap();
    let mut cursor = count.execute(&[]).unwrap();
    let row = cursor.next().unwrap().unwrap();
    assert_eq!(int(row.get(0).unwrap()), 0);
}

#[test]
#[ignore]
fn empty_statement_prepare_and_execute_yields_no_rows_and_no_error() {
    let mut conn = connect();
    let mut stmt = conn.prepare("").unwrap();
    let mut cursor = stmt.execute(&[]).unwrap();
    assert!(cursor.next().is_none());
}

#[test]
#[ignore]
fn empty_result_set_column_metadata_presence_tracks_the_flag() {
    let mut conn = connect();
    let mut stmt = conn
        .prepare("SELECT city, temp_lo FROM weather WHERE false")
        .unwrap();

    {
        let mut cursor = stmt.execute(&[]).unwrap();
        assert!(cursor.columns().is_none());
        assert!(cursor.next().is_none());
        assert_eq!(cursor.row_count(), Some(0));
    }
    {
        let mut cursor = stmt.execute_with_column_metadata(&[]).unwrap();
        let columns = cursor.columns().expect("column metadata requested");
        assert_eq!(columns.len(), 2);
        assert_eq!(columns[0].name, "city");
        assert_eq!(columns[1].name, "temp_lo");
        assert!(cursor.next().is_none());
        assert_eq!(cursor.row_count(), Some(0));
    }
}

#[test]
#[ignore]
fn held_cursor_resynchronizes_across_repeated_fetches() {
    let mut conn = connect();
    let mut create = conn
        .prepare("CREATE TEMPORARY TABLE weather (city text)")
        .unwrap();
    assert!(create.execute(&[]).unwrap().next().is_none());

    let mut insert = conn.prepare("INSERT INTO weather (city) VALUES ($1)").unwrap();
    for i in 0..5 {
        assert!(
            insert
                .execute(&[PostgresValue::String(format!("city-{i}"))])
                .unwrap()
                .next()
                .is_none()
        );
    }

    let mut declare = conn
        .prepare("DECLARE wc CURSOR WITH HOLD FOR SELECT city FROM weather ORDER BY city")
        .unwrap();
    assert!(declare.execute(&[]).unwrap().next().is_none());

    let mut fetch = conn.prepare("FETCH FORWARD 2 FROM wc").unwrap();
    let mut total = 0;
    loop {
        let mut cursor = fetch.execute(&[]).unwrap();
        let mut fetched = 0;
        while cursor.next().is_some() {
            fetched += 1;
        }
        if fetched == 0 {
            break;
        }
        total += fetched;
    }
    assert_eq!(total, 5);

    let mut close = conn.prepare("CLOSE wc").unwrap();
    assert!(close.execute(&[]).unwrap().next().is_none());
}
