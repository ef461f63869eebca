//! Redis Session Store
//!
//! Key layout:
//!
//! | key                     | type   | contents                          |
//! |-------------------------|--------|-----------------------------------|
//! | `session_queue`         | list   | session ids, oldest first         |
//! | `session_files:{id}`    | list   | file names in upload order        |
//! | `session_marker:{id}`   | string | existence marker (lists can't be empty) |
//! | `pending_purges`        | list   | JSON-encoded [`PurgeIntent`]s     |
//!
//! `create`, `add_file` and `delete_session` are Lua scripts, so the cap
//! check, head pop, file-list drop, purge-intent push and registration happen
//! as one step for every client sharing the server.

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, RedisResult, Script};
use std::future::Future;
use std::time::Duration;

use super::{PurgeIntent, SessionId, SessionStore, StoreResult};
use crate::timeout::bounded;

const QUEUE_KEY: &str = "session_queue";
const PURGES_KEY: &str = "pending_purges";
const FILES_PREFIX: &str = "session_files:";
const MARKER_PREFIX: &str = "session_marker:";

const CREATE_SCRIPT: &str = r"
local queue = KEYS[1]
local purges = KEYS[2]
local id = ARGV[1]
local cap = tonumber(ARGV[2])
local files_prefix = ARGV[3]
local marker_prefix = ARGV[4]
local now = ARGV[5]

for _, existing in ipairs(redis.call('LRANGE', queue, 0, -1)) do
  if existing == id then
    redis.call('SET', marker_prefix .. id, '1')
    return false
  end
end

local evicted = false
while redis.call('LLEN', queue) > 0 and redis.call('LLEN', queue) >= cap do
  local oldest = redis.call('LPOP', queue)
  redis.call('DEL', files_prefix .. oldest, marker_prefix .. oldest)
  redis.call('RPUSH', purges, cjson.encode({session_id = oldest, recorded_at = now}))
  if not evicted then
    evicted = oldest
  end
end

redis.call('RPUSH', queue, id)
redis.call('SET', marker_prefix .. id, '1')
return evicted
";

const ADD_FILE_SCRIPT: &str = r"
if redis.call('EXISTS', KEYS[1]) == 0 then
  return 0
end
local files = redis.call('LRANGE', KEYS[2], 0, -1)
if #files >= tonumber(ARGV[2]) then
  return 0
end
for _, f in ipairs(files) do
  if f == ARGV[1] then
    return 1
  end
end
redis.call('RPUSH', KEYS[2], ARGV[1])
return 1
";

const DELETE_SESSION_SCRIPT: &str = r"
redis.call('LREM', KEYS[1], 0, ARGV[1])
redis.call('DEL', KEYS[2], KEYS[3])
return 1
";

fn files_key(session_id: &str) -> String {
    format!("{FILES_PREFIX}{session_id}")
}

fn marker_key(session_id: &str) -> String {
    format!("{MARKER_PREFIX}{session_id}")
}

/// Shared session store backed by a Redis server
pub struct RedisSessionStore {
    connection: MultiplexedConnection,
    max_sessions: usize,
    max_files: usize,
    timeout: Duration,
    create_script: Script,
    add_file_script: Script,
    delete_session_script: Script,
}

impl RedisSessionStore {
    /// Connect to `url` (`redis://host:port/db`)
    pub async fn connect(
        url: &str,
        max_sessions: usize,
        max_files: usize,
        timeout: Duration,
    ) -> StoreResult<Self> {
        let client = redis::Client::open(url)?;
        let connection =
            bounded("redis connect", timeout, client.get_multiplexed_async_connection()).await??;

        Ok(RedisSessionStore {
            connection,
            max_sessions,
            max_files,
            timeout,
            create_script: Script::new(CREATE_SCRIPT),
            add_file_script: Script::new(ADD_FILE_SCRIPT),
            delete_session_script: Script::new(DELETE_SESSION_SCRIPT),
        })
    }

    async fn run<T, F>(&self, operation: &'static str, fut: F) -> StoreResult<T>
    where
        F: Future<Output = RedisResult<T>>,
    {
        Ok(bounded(operation, self.timeout, fut).await??)
    }

    /// Raw ledger entries alongside their decoded form
    async fn raw_purges(&self) -> StoreResult<Vec<(String, Option<PurgeIntent>)>> {
        let mut con = self.connection.clone();
        let raw: Vec<String> = self
            .run("redis pending_purges", con.lrange(PURGES_KEY, 0, -1))
            .await?;

        Ok(raw
            .into_iter()
            .map(|entry| {
                let decoded = serde_json::from_str::<PurgeIntent>(&entry)
                    .map_err(|e| {
                        tracing::warn!(entry = %entry, error = %e, "skipping undecodable purge intent");
                    })
                    .ok();
                (entry, decoded)
            })
            .collect())
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    fn backend_name(&self) -> &'static str {
        "redis"
    }

    fn max_sessions(&self) -> usize {
        self.max_sessions
    }

    fn max_files_per_session(&self) -> usize {
        self.max_files
    }

    async fn is_valid(&self, session_id: &str) -> StoreResult<bool> {
        let mut con = self.connection.clone();
        self.run("redis is_valid", con.exists(marker_key(session_id)))
            .await
    }

    async fn create(&self, session_id: &str) -> StoreResult<Option<SessionId>> {
        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true);
        let mut invocation = self.create_script.prepare_invoke();
        invocation
            .key(QUEUE_KEY)
            .key(PURGES_KEY)
            .arg(session_id)
            .arg(self.max_sessions)
            .arg(FILES_PREFIX)
            .arg(MARKER_PREFIX)
            .arg(now);

        let mut con = self.connection.clone();
        let evicted: Option<String> = self
            .run("redis create", invocation.invoke_async(&mut con))
            .await?;
        Ok(evicted)
    }

    async fn add_file(&self, session_id: &str, file_name: &str) -> StoreResult<bool> {
        let mut invocation = self.add_file_script.prepare_invoke();
        invocation
            .key(marker_key(session_id))
            .key(files_key(session_id))
            .arg(file_name)
            .arg(self.max_files);

        let mut con = self.connection.clone();
        let added: i64 = self
            .run("redis add_file", invocation.invoke_async(&mut con))
            .await?;
        Ok(added == 1)
    }

    async fn remove_file(&self, session_id: &str, file_name: &str) -> StoreResult<()> {
        let mut con = self.connection.clone();
        let _removed: i64 = self
            .run(
                "redis remove_file",
                con.lrem(files_key(session_id), 0, file_name),
            )
            .await?;
        Ok(())
    }

    async fn list_files(&self, session_id: &str) -> StoreResult<Vec<String>> {
        let mut con = self.connection.clone();
        self.run("redis list_files", con.lrange(files_key(session_id), 0, -1))
            .await
    }

    async fn delete_session(&self, session_id: &str) -> StoreResult<()> {
        let mut invocation = self.delete_session_script.prepare_invoke();
        invocation
            .key(QUEUE_KEY)
            .key(files_key(session_id))
            .key(marker_key(session_id))
            .arg(session_id);

        let mut con = self.connection.clone();
        let _: i64 = self
            .run("redis delete_session", invocation.invoke_async(&mut con))
            .await?;
        Ok(())
    }

    async fn queue(&self) -> StoreResult<Vec<SessionId>> {
        let mut con = self.connection.clone();
        self.run("redis queue", con.lrange(QUEUE_KEY, 0, -1)).await
    }

    async fn record_purge(&self, intent: PurgeIntent) -> StoreResult<()> {
        let entry = serde_json::to_string(&intent)?;
        let mut con = self.connection.clone();
        let _len: i64 = self
            .run("redis record_purge", con.rpush(PURGES_KEY, entry))
            .await?;
        Ok(())
    }

    async fn pending_purges(&self) -> StoreResult<Vec<PurgeIntent>> {
        let mut intents: Vec<PurgeIntent> = Vec::new();
        for (_, decoded) in self.raw_purges().await? {
            if let Some(intent) = decoded {
                if !intents.iter().any(|p| p.same_target(&intent)) {
                    intents.push(intent);
                }
            }
        }
        Ok(intents)
    }

    async fn ack_purge(&self, intent: &PurgeIntent) -> StoreResult<()> {
        for (raw, decoded) in self.raw_purges().await? {
            if decoded.is_some_and(|p| p.same_target(intent)) {
                let mut con = self.connection.clone();
                let _removed: i64 = self
                    .run("redis ack_purge", con.lrem(PURGES_KEY, 1, raw))
                    .await?;
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for RedisSessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisSessionStore")
            .field("max_sessions", &self.max_sessions)
            .field("max_files", &self.max_files)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}
