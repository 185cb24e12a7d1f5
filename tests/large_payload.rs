//! Payloads at and around the 16 MiB frame boundary.

mod common;

use common::get_conn;
use zero_mysql::protocol::packet::MAX_FRAME_LEN;
use zero_mysql::tokio::Conn;

/// `COM_QUERY` byte plus `SELECT '` plus the closing quote.
const QUERY_OVERHEAD: usize = 1 + 8 + 1;

const MAX_ALLOWED_PACKET: u64 = 64 * 1024 * 1024;

/// A connection whose `max_allowed_packet` fits several frames.
///
/// The global value only applies to new sessions, so the first connection is replaced.
async fn large_packet_conn() -> Conn {
    let mut conn = get_conn().await;
    let (max,): (u64,) = conn
        .query_first("SELECT @@GLOBAL.max_allowed_packet")
        .await
        .unwrap()
        .unwrap();
    if max >= MAX_ALLOWED_PACKET {
        return conn;
    }
    conn.query_drop(&format!(
        "SET GLOBAL max_allowed_packet = {MAX_ALLOWED_PACKET}"
    ))
    .await
    .expect("raising max_allowed_packet needs SUPER or SYSTEM_VARIABLES_ADMIN");
    conn.close().await.unwrap();

    let mut conn = get_conn().await;
    let (session,): (u64,) = conn
        .query_first("SELECT @@SESSION.max_allowed_packet")
        .await
        .unwrap()
        .unwrap();
    assert!(session >= MAX_ALLOWED_PACKET);
    conn
}

#[tokio::test]
async fn query_around_frame_boundary() {
    let mut conn = large_packet_conn().await;

    for payload_len in [MAX_FRAME_LEN - 1, MAX_FRAME_LEN, MAX_FRAME_LEN + 1] {
        let text = "a".repeat(payload_len - QUERY_OVERHEAD);
        let row: Option<(String,)> = conn
            .query_first(&format!("SELECT '{text}'"))
            .await
            .unwrap();
        let (echoed,) = row.unwrap();
        assert_eq!(echoed.len(), text.len());
        assert!(echoed == text);
    }

    conn.close().await.unwrap();
}

#[tokio::test]
async fn blob_parameter_over_frame_boundary() {
    let mut conn = large_packet_conn().await;

    let blob: Vec<u8> = (0..MAX_FRAME_LEN + 100).map(|i| (i % 251) as u8).collect();
    let stmt = conn.prepare("SELECT LENGTH(?), MD5(?) = MD5(?)").await.unwrap();
    let row: Option<(u64, i64)> = conn
        .exec_first(&stmt, (&blob, &blob, &blob))
        .await
        .unwrap();
    assert_eq!(row, Some((blob.len() as u64, 1)));

    conn.close().await.unwrap();
}

#[tokio::test]
async fn text_value_of_sixteen_mib() {
    let mut conn = large_packet_conn().await;

    let text = "a".repeat(16 * 1024 * 1024);
    let row: Option<(String,)> = conn
        .query_first(&format!("SELECT '{text}'"))
        .await
        .unwrap();
    let (echoed,) = row.unwrap();
    assert_eq!(echoed.len(), text.len());
    assert!(echoed == text);

    let row: Option<(u64, String)> = conn
        .query_first("SELECT LENGTH(REPEAT('b', 16777216)), REPEAT('b', 16777216)")
        .await
        .unwrap();
    let (len, repeated) = row.unwrap();
    assert_eq!(len, 16 * 1024 * 1024);
    assert!(repeated.bytes().all(|b| b == b'b'));

    conn.ping().await.unwrap();
    conn.close().await.unwrap();
}
