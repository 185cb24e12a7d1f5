//! Shared fixtures for integration tests.
//!
//! Tests run against the server in `DATABASE_URL`, falling back to a local root account.

#![allow(dead_code)]

use std::env;
use std::sync::atomic::{AtomicU32, Ordering};

use zero_mysql::tokio::Conn;
use zero_mysql::Opts;

static DATABASE_COUNTER: AtomicU32 = AtomicU32::new(0);

pub fn opts() -> Opts {
    let url = env::var("DATABASE_URL").unwrap_or_else(|_| "mysql://root@localhost/mysql".to_string());
    let mut opts = Opts::try_from(url.as_str()).expect("invalid DATABASE_URL");
    opts.ssl_mode = zero_mysql::SslMode::Disable;
    opts
}

pub async fn get_conn() -> Conn {
    Conn::new(opts()).await.expect("Failed to connect")
}

/// A uniquely named database, dropped by `cleanup`.
pub struct TestDatabase {
    pub name: String,
}

impl TestDatabase {
    pub async fn new(conn: &mut Conn, prefix: &str) -> Self {
        let id = DATABASE_COUNTER.fetch_add(1, Ordering::SeqCst);
        let name = format!("{prefix}_{}_{id}", std::process::id());
        conn.query_drop(&format!("DROP DATABASE IF EXISTS `{name}`"))
            .await
            .unwrap();
        conn.query_drop(&format!("CREATE DATABASE `{name}`"))
            .await
            .unwrap();
        Self { name }
    }

    pub async fn cleanup(&self, conn: &mut Conn) {
        let _ = conn
            .query_drop(&format!("DROP DATABASE IF EXISTS `{}`", self.name))
            .await;
    }
}
