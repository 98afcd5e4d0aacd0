use futures_throttler::{TaskHandle, Throttler, ThrottlerConfig};
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::info;

async fn fetch(kind: &'static str, id: usize) -> String {
  info!("{} request {} starting", kind, id);
  tokio::time::sleep(Duration::from_millis(300)).await;
  format!("{} request {} finished", kind, id)
}

#[tokio::main]
async fn main() {
  tracing_subscriber::fmt()
    .with_max_level(tracing::Level::DEBUG)
    .with_target(false)
    .init();

  info!("--- Typed Pools Example (default: 1, db: 2, api: 3) ---");

  let config = ThrottlerConfig::new(1).with_type_capacity("db", 2).with_type_capacity("api", 3);
  let throttler = Throttler::new(config, Handle::current(), "typed_pools");

  let mut handles: Vec<TaskHandle<String>> = Vec::new();
  for i in 0..4 {
    handles.push(throttler.enqueue(move || fetch("untyped", i)));
    handles.push(throttler.enqueue_with_types("db", move || fetch("db", i)));
    handles.push(throttler.enqueue_with_types("api", move || fetch("api", i)));
  }
  // Needs a db slot and an api slot at the same time.
  handles.push(throttler.enqueue_with_types(["db", "api"], || fetch("db+api", 0)));

  info!(
    "Enqueued {} tasks: {} running, {} queued.",
    handles.len(),
    throttler.running_task_count(),
    throttler.queued_task_count()
  );

  for handle in handles {
    let task_id = handle.id();
    match handle.await_result().await {
      Ok(result) => info!("Task {} main: Received result: {}", task_id, result),
      Err(e) => info!("Task {} main: Received error: {:?}", task_id, e),
    }
  }

  for pool in throttler.pools() {
    info!("Pool {}: {}/{} in use", pool.key, pool.used, pool.capacity);
  }

  info!("Aborting (nothing left to discard) and waiting for drain.");
  throttler.abort().await;
  info!("--- Typed Pools Example End ---");
}
