use netprov_core::config::AppConfig;
use netprov_core::service::Platform;

// 默认后端是 nmcli；显式选择 netsh 或 mock 时覆盖默认值，但两者只能选一个
const EXPLICIT_BACKENDS: usize =
    cfg!(feature = "backend_netsh") as usize + cfg!(feature = "backend_mock") as usize;
const _: () = assert!(
    EXPLICIT_BACKENDS <= 1,
    "Select at most ONE of backend_netsh / backend_mock."
);
const _: () = assert!(
    EXPLICIT_BACKENDS == 1 || cfg!(feature = "backend_nmcli"),
    "No backend selected: enable backend_nmcli (default), backend_netsh or backend_mock."
);

#[cfg(any(
    all(feature = "backend_nmcli", not(feature = "backend_mock")),
    all(feature = "backend_netsh", not(feature = "backend_mock"))
))]
fn reachability(config: &AppConfig) -> netprov_core::probe::Reachability {
    netprov_core::probe::Reachability::new(
        config.connect.probe_target.clone(),
        config.connect.probe_timeout,
    )
}

#[cfg(all(
    feature = "backend_nmcli",
    not(any(feature = "backend_netsh", feature = "backend_mock"))
))]
pub fn build_platform(config: &AppConfig) -> Platform {
    use netprov_core::backends::{nmcli::NmcliBackend, SystemRunner};
    use std::sync::Arc;

    tracing::info!("🚀 Using nmcli backend on {}", config.backend.wifi_iface);
    let backend = NmcliBackend::new(
        Arc::new(SystemRunner),
        config.backend.clone(),
        reachability(config),
    );
    Platform::from_backend(Arc::new(backend))
}

#[cfg(all(feature = "backend_netsh", not(feature = "backend_mock")))]
pub fn build_platform(config: &AppConfig) -> Platform {
    use netprov_core::backends::{netsh::NetshBackend, SystemRunner};
    use std::sync::Arc;

    tracing::info!("🚀 Using netsh backend");
    let backend = NetshBackend::new(Arc::new(SystemRunner), reachability(config));
    Platform::from_backend(Arc::new(backend))
}

#[cfg(feature = "backend_mock")]
pub fn build_platform(_config: &AppConfig) -> Platform {
    use netprov_core::backends::mock::MockBackend;
    use std::sync::Arc;

    tracing::info!("🚀 Using mock backend");
    Platform::from_backend(Arc::new(MockBackend::new()))
}
