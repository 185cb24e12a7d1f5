//! Session state: autocommit, default database, escaping, character set.

mod common;

use common::{TestDatabase, get_conn};

#[tokio::test]
async fn autocommit_toggle() {
    let mut conn = get_conn().await;
    // Connections start with autocommit off.
    assert!(!conn.get_autocommit());
    let row: Option<(i64,)> = conn.query_first("SELECT @@AUTOCOMMIT").await.unwrap();
    assert_eq!(row, Some((0,)));

    conn.autocommit(true).await.unwrap();
    assert!(conn.get_autocommit());
    let row: Option<(i64,)> = conn.query_first("SELECT @@AUTOCOMMIT").await.unwrap();
    assert_eq!(row, Some((1,)));

    conn.query_drop("SET AUTOCOMMIT=0").await.unwrap();
    assert!(!conn.get_autocommit());
    conn.query_drop("SET AUTOCOMMIT=1").await.unwrap();
    assert!(conn.get_autocommit());

    conn.close().await.unwrap();
}

#[tokio::test]
async fn select_db() {
    let mut conn = get_conn().await;
    let first = TestDatabase::new(&mut conn, "select_db_a").await;
    let second = TestDatabase::new(&mut conn, "select_db_b").await;

    for db in [&first, &second] {
        conn.select_db(&db.name).await.unwrap();
        assert_eq!(conn.current_database(), Some(db.name.as_str()));
        let row: Option<(String,)> = conn.query_first("SELECT DATABASE()").await.unwrap();
        assert_eq!(row, Some((db.name.clone(),)));
    }

    first.cleanup(&mut conn).await;
    second.cleanup(&mut conn).await;
    conn.close().await.unwrap();
}

#[tokio::test]
async fn escape_modes() {
    let mut conn = get_conn().await;
    conn.query_drop("SET sql_mode = ''").await.unwrap();
    assert_eq!(conn.escape("foo'bar"), "'foo\\'bar'");
    let sql = format!("SELECT {}", conn.escape("foo'bar\\baz"));
    let row: Option<(String,)> = conn.query_first(&sql).await.unwrap();
    assert_eq!(row, Some(("foo'bar\\baz".to_string(),)));

    conn.query_drop("SET sql_mode = 'NO_BACKSLASH_ESCAPES'")
        .await
        .unwrap();
    assert_eq!(conn.escape("foo'bar"), "'foo''bar'");
    let sql = format!("SELECT {}", conn.escape("foo'bar\\baz"));
    let row: Option<(String,)> = conn.query_first(&sql).await.unwrap();
    assert_eq!(row, Some(("foo'bar\\baz".to_string(),)));

    conn.close().await.unwrap();
}

#[tokio::test]
async fn utf8mb4_round_trip() {
    let mut conn = get_conn().await;
    assert_eq!(conn.charset(), "utf8mb4");
    let text = "caf\u{e9} \u{1F600} \u{1F680}";
    let sql = format!("SELECT {}", conn.escape(text));
    let row: Option<(String,)> = conn.query_first(&sql).await.unwrap();
    assert_eq!(row, Some((text.to_string(),)));

    let stmt = conn.prepare("SELECT ?").await.unwrap();
    let row: Option<(String,)> = conn.exec_first(&stmt, (text,)).await.unwrap();
    assert_eq!(row, Some((text.to_string(),)));
    conn.close_statement(stmt).await.unwrap();

    conn.close().await.unwrap();
}

#[tokio::test]
async fn ping_and_reset() {
    let mut conn = get_conn().await;
    conn.ping().await.unwrap();
    conn.query_drop("SET @marker = 7").await.unwrap();
    conn.reset_connection().await.unwrap();
    let row: Option<(Option<i64>,)> = conn.query_first("SELECT @marker").await.unwrap();
    assert_eq!(row, Some((None,)));
    conn.close().await.unwrap();
}
