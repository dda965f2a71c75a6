//! The store client.
//!
//! [`Store`] wraps a [`redis::Client`] plus one shared multiplexed
//! connection. The shared connection serves every non-blocking command;
//! blocking consumers (`BLPOP`) take a dedicated connection from
//! [`Store::dedicated`] so they never hold up unrelated traffic.

use std::collections::{HashMap, HashSet};

use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;

use crate::backoff::ExponentialBackoff;
use crate::error::{Result, StoreError};

/// Client for the shared coordination store.
///
/// Cheap to clone; clones share the same underlying connection.
#[derive(Clone)]
pub struct Store {
    client: redis::Client,
    conn: MultiplexedConnection,
}

impl Store {
    /// Connect to the store, retrying with exponential backoff until the
    /// first successful ping. Never gives up: a node is not considered
    /// started until its store connection is up.
    ///
    /// Accepts bare `host:port` addresses (`:6379` implies localhost) as
    /// well as full `redis://` URLs.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidAddress`] if the address cannot be
    /// parsed. Connection failures are retried, not returned.
    pub async fn connect(addr: &str) -> Result<Self> {
        let url = redis_url(addr);
        let client = redis::Client::open(url.as_str())
            .map_err(|_| StoreError::InvalidAddress(addr.to_string()))?;
        let conn = wait_for_connection(&client).await;
        Ok(Self { client, conn })
    }

    /// Open a dedicated connection for a blocking consumer.
    ///
    /// `BLPOP` parks the connection it runs on, so each consumer loop owns
    /// its own connection for its entire lifetime.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established.
    pub async fn dedicated(&self) -> Result<MultiplexedConnection> {
        Ok(self.client.get_multiplexed_async_connection().await?)
    }

    /// Ping the store.
    ///
    /// # Errors
    ///
    /// Returns an error if the store does not answer.
    pub async fn ping(&self) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }

    /// Get the string value at `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    /// Set `key` to `value`.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.set(key, value).await?;
        Ok(())
    }

    /// Delete `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn del(&self, key: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.del(key).await?;
        Ok(())
    }

    /// Delete several keys in one `MULTI`/`EXEC` transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction fails.
    pub async fn del_multi(&self, keys: &[String]) -> Result<()> {
        if keys.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn.clone();
        let mut pipe = redis::pipe();
        pipe.atomic();
        for key in keys {
            pipe.del(key).ignore();
        }
        let _: () = pipe.query_async(&mut conn).await?;
        Ok(())
    }

    /// Whether `key` exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn exists(&self, key: &str) -> Result<bool> {
        let mut conn = self.conn.clone();
        let exists: bool = conn.exists(key).await?;
        Ok(exists)
    }

    /// Refresh the TTL on `key`. Returns whether the key existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn expire(&self, key: &str, seconds: i64) -> Result<bool> {
        let mut conn = self.conn.clone();
        let existed: bool = conn.expire(key, seconds).await?;
        Ok(existed)
    }

    /// Atomically set `key` to `value` with a TTL, only if absent
    /// (`SET key value EX ttl NX`). Returns whether the key was acquired.
    ///
    /// This is the leader-lease acquisition primitive.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn set_if_absent_ttl(&self, key: &str, value: &str, ttl: i64) -> Result<bool> {
        let mut conn = self.conn.clone();
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("EX")
            .arg(ttl)
            .arg("NX")
            .query_async(&mut conn)
            .await?;
        Ok(reply.is_some())
    }

    /// Pipelined `GET`s under `MULTI`/`EXEC`; one slot per input key, in
    /// order, `None` for missing keys.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction fails.
    pub async fn mget(&self, keys: &[String]) -> Result<Vec<Option<String>>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.conn.clone();
        let mut pipe = redis::pipe();
        pipe.atomic();
        for key in keys {
            pipe.get(key);
        }
        let values: Vec<Option<String>> = pipe.query_async(&mut conn).await?;
        Ok(values)
    }

    /// Set a hash field.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn hset(&self, key: &str, field: &str, value: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.hset(key, field, value).await?;
        Ok(())
    }

    /// Atomically set several hash fields and a TTL on `key` in one
    /// `MULTI`/`EXEC` transaction. This is the cluster-join primitive.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction fails.
    pub async fn hset_with_expire(
        &self,
        key: &str,
        fields: &[(&str, String)],
        ttl: i64,
    ) -> Result<()> {
        let mut conn = self.conn.clone();
        let mut pipe = redis::pipe();
        pipe.atomic();
        pipe.hset_multiple(key, fields).ignore();
        pipe.expire(key, ttl).ignore();
        let _: () = pipe.query_async(&mut conn).await?;
        Ok(())
    }

    /// Get all fields and values of the hash at `key`. Missing keys yield an
    /// empty map.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn hget_all(&self, key: &str) -> Result<HashMap<String, String>> {
        let mut conn = self.conn.clone();
        let map: HashMap<String, String> = conn.hgetall(key).await?;
        Ok(map)
    }

    /// Pipelined `HGETALL`s under `MULTI`/`EXEC`; one map per input key, in
    /// order.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction fails.
    pub async fn hget_all_multi(&self, keys: &[String]) -> Result<Vec<HashMap<String, String>>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.conn.clone();
        let mut pipe = redis::pipe();
        pipe.atomic();
        for key in keys {
            pipe.hgetall(key);
        }
        let maps: Vec<HashMap<String, String>> = pipe.query_async(&mut conn).await?;
        Ok(maps)
    }

    /// Increment a hash field by `delta`, returning the new value.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn hincr_by(&self, key: &str, field: &str, delta: i64) -> Result<i64> {
        let mut conn = self.conn.clone();
        let value: i64 = conn.hincr(key, field, delta).await?;
        Ok(value)
    }

    /// Right-push `data` onto the list at `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn rpush(&self, key: &str, data: &[u8]) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.rpush(key, data).await?;
        Ok(())
    }

    /// Right-push `data` onto several lists in one `MULTI`/`EXEC`
    /// transaction. This is the broadcast primitive.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction fails.
    pub async fn rpush_multi(&self, keys: &[String], data: &[u8]) -> Result<()> {
        if keys.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn.clone();
        let mut pipe = redis::pipe();
        pipe.atomic();
        for key in keys {
            pipe.rpush(key, data).ignore();
        }
        let _: () = pipe.query_async(&mut conn).await?;
        Ok(())
    }

    /// Block on `BLPOP key 0` using a dedicated connection, returning the
    /// popped element.
    ///
    /// Blocks until data arrives; `None` is only seen if the server answers
    /// a nil reply (which the no-timeout form does not produce under normal
    /// operation).
    ///
    /// # Errors
    ///
    /// Returns an error if the connection drops, which consumers treat as
    /// terminal.
    pub async fn blpop(conn: &mut MultiplexedConnection, key: &str) -> Result<Option<Vec<u8>>> {
        let reply: Option<(String, Vec<u8>)> = conn.blpop(key, 0.0).await?;
        Ok(reply.map(|(_, data)| data))
    }

    /// Collect every key matching `pattern` via cursor-iterated `SCAN`,
    /// de-duplicated, terminating when the cursor returns to zero.
    ///
    /// # Errors
    ///
    /// Returns an error if a scan step fails.
    pub async fn scan_keys(&self, pattern: &str) -> Result<Vec<String>> {
        let mut conn = self.conn.clone();
        let mut cursor: u64 = 0;
        let mut keys = Vec::new();
        let mut seen = HashSet::new();

        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .query_async(&mut conn)
                .await?;

            for key in batch {
                if seen.insert(key.clone()) {
                    keys.push(key);
                }
            }

            cursor = next;
            if cursor == 0 {
                break;
            }
        }

        Ok(keys)
    }
}

/// Ping with exponential backoff until the store answers.
async fn wait_for_connection(client: &redis::Client) -> MultiplexedConnection {
    let mut backoff = ExponentialBackoff::new();

    loop {
        match client.get_multiplexed_async_connection().await {
            Ok(mut conn) => {
                let pong: redis::RedisResult<String> =
                    redis::cmd("PING").query_async(&mut conn).await;
                match pong {
                    Ok(_) => return conn,
                    Err(err) => {
                        tracing::warn!(error = %err, "store ping failed, retrying");
                    }
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "store connection failed, retrying");
            }
        }

        tokio::time::sleep(backoff.next_delay()).await;
    }
}

/// Normalize a configured address into a `redis://` URL.
///
/// `:6379` means localhost; `host:port` gets the scheme prepended; full
/// URLs pass through untouched.
fn redis_url(addr: &str) -> String {
    if addr.contains("://") {
        addr.to_string()
    } else if let Some(port) = addr.strip_prefix(':') {
        format!("redis://127.0.0.1:{port}")
    } else {
        format!("redis://{addr}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redis_url_bare_port() {
        assert_eq!(redis_url(":6379"), "redis://127.0.0.1:6379");
    }

    #[test]
    fn redis_url_host_port() {
        assert_eq!(redis_url("cache.internal:6380"), "redis://cache.internal:6380");
    }

    #[test]
    fn redis_url_passthrough() {
        assert_eq!(redis_url("redis://user@host:7000"), "redis://user@host:7000");
    }
}
