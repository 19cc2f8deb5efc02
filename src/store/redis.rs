use anyhow::{anyhow, Context, Result};
use redis::{Commands, Connection, RedisResult};
use std::sync::Mutex;
use std::time::Duration;

use super::SharedStore;

/// Redis-backed shared store.
///
/// Holds one lazily opened connection. A failed command drops the
/// connection so the next call reconnects; callers see the failure once and
/// retry on their next cycle.
pub struct RedisStore {
    client: redis::Client,
    timeout: Duration,
    conn: Mutex<Option<Connection>>,
}

impl RedisStore {
    /// Parses the URL. No connection is made until the first command.
    pub fn open(url: &str, timeout: Duration) -> Result<Self> {
        let client =
            redis::Client::open(url).with_context(|| format!("invalid redis url {}", url))?;
        Ok(Self {
            client,
            timeout,
            conn: Mutex::new(None),
        })
    }

    pub fn ping(&self) -> Result<()> {
        let _: String = self.with_conn(|conn| redis::cmd("PING").query(conn))?;
        Ok(())
    }

    fn with_conn<T>(&self, op: impl FnOnce(&mut Connection) -> RedisResult<T>) -> Result<T> {
        let mut guard = self
            .conn
            .lock()
            .map_err(|_| anyhow!("redis connection lock poisoned"))?;
        if guard.is_none() {
            let conn = self
                .client
                .get_connection_with_timeout(self.timeout)
                .context("connect to redis")?;
            conn.set_read_timeout(Some(self.timeout))?;
            conn.set_write_timeout(Some(self.timeout))?;
            *guard = Some(conn);
        }
        let conn = guard
            .as_mut()
            .ok_or_else(|| anyhow!("redis connection unavailable"))?;
        match op(conn) {
            Ok(value) => Ok(value),
            Err(e) => {
                *guard = None;
                Err(anyhow!("redis command failed: {}", e))
            }
        }
    }
}

impl SharedStore for RedisStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        self.with_conn(|conn| conn.get(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.with_conn(|conn| conn.set(key, value))
    }

    fn exists(&self, key: &str) -> Result<bool> {
        self.with_conn(|conn| conn.exists(key))
    }

    fn flush_all(&self) -> Result<()> {
        self.with_conn(|conn| redis::cmd("FLUSHALL").query(conn))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_rejects_malformed_url() {
        assert!(RedisStore::open("not a url", Duration::from_millis(10)).is_err());
    }

    #[test]
    fn unreachable_server_is_an_error_not_a_panic() {
        // Port 1 on loopback is never a redis server.
        let store = RedisStore::open("redis://127.0.0.1:1/0", Duration::from_millis(200))
            .expect("url parses");
        assert!(store.get("trigger_status").is_err());
        assert!(store.ping().is_err());
    }
}
