use std::sync::Mutex;
use std::time::Duration;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tracing::trace;

/// How often histogram buckets are compacted.
const UPKEEP_INTERVAL: Duration = Duration::from_secs(5);

// Installing a recorder is fallible and can happen only once per process, while tests
// call `init_metrics_handle` many times. The handle is cached behind a mutex because
// `OnceLock::get_or_try_init` is not stable yet.
static PROMETHEUS_HANDLE: Mutex<Option<PrometheusHandle>> = Mutex::new(None);

/// Installs the Prometheus recorder and returns a handle for rendering.
///
/// Repeated calls return clones of the first handle. When called from inside a Tokio
/// runtime, a background task runs periodic upkeep on the recorder.
pub fn init_metrics_handle() -> Result<PrometheusHandle, BuildError> {
    // A poisoned lock still holds a usable handle.
    let mut cached = PROMETHEUS_HANDLE
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());

    if let Some(handle) = &*cached {
        return Ok(handle.clone());
    }

    let handle = PrometheusBuilder::new().install_recorder()?;
    *cached = Some(handle.clone());

    if let Ok(runtime) = tokio::runtime::Handle::try_current() {
        let upkeep_handle = handle.clone();
        runtime.spawn(async move {
            loop {
                tokio::time::sleep(UPKEEP_INTERVAL).await;
                trace!("running metrics upkeep");
                upkeep_handle.run_upkeep();
            }
        });
    }

    Ok(handle)
}

/// Renders every recorded metric in the Prometheus text format.
///
/// Returns `None` when no recorder was installed through [`init_metrics_handle`].
pub fn render_metrics() -> Option<String> {
    let cached = PROMETHEUS_HANDLE
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());

    cached.as_ref().map(PrometheusHandle::render)
}
