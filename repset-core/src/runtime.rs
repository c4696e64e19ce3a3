use anyhow::Result;
use log::debug;
use tokio::runtime::Runtime;
use tokio::sync::OnceCell;

static GLOBAL_RUNTIME: OnceCell<Runtime> = OnceCell::const_new();

/// Shared runtime for background work started from foreign threads, such as
/// the scheduler driver of a workout opened through the mobile bindings.
pub async fn init_global_runtime() -> Result<&'static Runtime> {
    GLOBAL_RUNTIME
        .get_or_try_init(|| async {
            let threads = std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(2);
            let threads = std::cmp::max(threads, 2);
            debug!("Initializing global runtime with {} threads", threads);
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .worker_threads(threads)
                .thread_name("repset-worker")
                .enable_all()
                .build()?;
            Ok(runtime)
        })
        .await
}
