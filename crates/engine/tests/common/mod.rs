#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use scripthub_core::command::CommandStatus;
use scripthub_core::memory::MemoryCommandStore;
use scripthub_core::store::CommandStore;
use scripthub_core::types::DbId;
use scripthub_engine::{Engine, EngineConfig, Job};
use tokio::time::Instant;

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Start an engine over a fresh in-memory store.
pub fn start_engine(
    workers: usize,
    working_dir: Option<PathBuf>,
) -> (Engine, Arc<MemoryCommandStore>) {
    let store = Arc::new(MemoryCommandStore::new());
    let config = EngineConfig {
        workers,
        queue_capacity: 0,
        working_dir,
    };
    let engine = Engine::start(config, store.clone()).expect("engine should start");
    (engine, store)
}

/// Create the record and submit the job, the way the request layer does.
pub async fn submit(
    engine: &Engine,
    store: &MemoryCommandStore,
    name: &str,
    script: &str,
) -> DbId {
    let id = store
        .create(name, script)
        .await
        .expect("record should be created");
    engine
        .submit(Job::new(id, name, script))
        .await
        .expect("job should be accepted");
    id
}

/// Poll until the record for `name` reaches `status`.
pub async fn wait_for_status(
    store: &MemoryCommandStore,
    name: &str,
    status: CommandStatus,
    within: Duration,
) -> bool {
    let deadline = Instant::now() + within;
    loop {
        if store.status_of(name).await == Some(status) {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

/// Poll until the stored output for `name` equals `expected`.
pub async fn wait_for_output(
    store: &MemoryCommandStore,
    name: &str,
    expected: &str,
    within: Duration,
) -> bool {
    let deadline = Instant::now() + within;
    loop {
        if store.output_of(name).await.as_deref() == Some(expected) {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

/// Poll until the registry holds (or no longer holds) an entry for `name`.
pub async fn wait_for_registration(
    engine: &Engine,
    name: &str,
    registered: bool,
    within: Duration,
) -> bool {
    let deadline = Instant::now() + within;
    loop {
        if engine.registry().contains(name).await == registered {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}
