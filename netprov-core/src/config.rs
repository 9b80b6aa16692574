use crate::{Error, Result};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// 顶层应用配置
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub service: ServiceConfig,
    pub hotspot: HotspotConfig,
    pub connect: ConnectConfig,
    pub watchdog: WatchdogConfig,
    pub backend: BackendConfig,
}

/// 用于解析 TOML 的临时结构
#[derive(Deserialize, Default)]
#[serde(default)]
struct AppConfigFile {
    service: ServiceConfigToml,
    hotspot: HotspotConfigToml,
    connect: ConnectConfigToml,
    watchdog: WatchdogConfigToml,
    backend: BackendConfig,
}

// ============= 服务配置 =============

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub bind_addr: SocketAddr,
    /// 设备数据目录（热点身份文件和待注册的 profile 都放在这里）
    pub data_dir: PathBuf,
}

#[derive(Deserialize)]
#[serde(default)]
struct ServiceConfigToml {
    bind_addr: String,
    data_dir: Option<PathBuf>,
    app_folder: String,
}

impl Default for ServiceConfigToml {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:3000".to_string(),
            data_dir: None,
            app_folder: "netprov".to_string(),
        }
    }
}

impl TryFrom<ServiceConfigToml> for ServiceConfig {
    type Error = Error;

    fn try_from(t: ServiceConfigToml) -> Result<Self> {
        let bind_addr = SocketAddr::from_str(&t.bind_addr)
            .map_err(|e| Error::Config(format!("invalid bind_addr '{}': {}", t.bind_addr, e)))?;
        let data_dir = match t.data_dir {
            Some(dir) => dir,
            None => app_data_root().join(&t.app_folder).join("Device"),
        };
        Ok(ServiceConfig { bind_addr, data_dir })
    }
}

/// Per-user application-data root: `APPDATA`, then `XDG_DATA_HOME`, then
/// `$HOME/.local/share`, finally the working directory.
fn app_data_root() -> PathBuf {
    let non_empty = |key: &str| std::env::var_os(key).filter(|v| !v.is_empty());
    if let Some(dir) = non_empty("APPDATA") {
        return PathBuf::from(dir);
    }
    if let Some(dir) = non_empty("XDG_DATA_HOME") {
        return PathBuf::from(dir);
    }
    match non_empty("HOME") {
        Some(home) => PathBuf::from(home).join(".local").join("share"),
        None => PathBuf::from("."),
    }
}

// ============= 热点配置 =============

#[derive(Debug, Clone)]
pub struct HotspotConfig {
    pub ssid_prefix: String,
    pub password_prefix: String,
    /// 连接成功后延迟多久关闭热点
    pub shutdown_delay: Duration,
}

#[derive(Deserialize)]
#[serde(default)]
struct HotspotConfigToml {
    ssid_prefix: String,
    password_prefix: String,
    shutdown_delay_secs: u64,
}

impl Default for HotspotConfigToml {
    fn default() -> Self {
        Self {
            ssid_prefix: "PRINTER_".to_string(),
            password_prefix: "wenyinyi:".to_string(),
            shutdown_delay_secs: 5 * 60,
        }
    }
}

impl From<HotspotConfigToml> for HotspotConfig {
    fn from(t: HotspotConfigToml) -> Self {
        HotspotConfig {
            ssid_prefix: t.ssid_prefix,
            password_prefix: t.password_prefix,
            shutdown_delay: Duration::from_secs(t.shutdown_delay_secs),
        }
    }
}

// ============= 连接配置 =============

#[derive(Debug, Clone)]
pub struct ConnectConfig {
    pub poll_interval: Duration,
    pub poll_window: Duration,
    /// 外网探测目标，`host:port`
    pub probe_target: String,
    pub probe_timeout: Duration,
    /// 每次确认探测的重试次数
    pub probe_attempts: u32,
}

#[derive(Deserialize)]
#[serde(default)]
struct ConnectConfigToml {
    poll_interval_ms: u64,
    poll_window_ms: u64,
    probe_target: String,
    probe_timeout_ms: u64,
    probe_attempts: u32,
}

impl Default for ConnectConfigToml {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1000,
            poll_window_ms: 5000,
            probe_target: "www.baidu.com:80".to_string(),
            probe_timeout_ms: 800,
            probe_attempts: 1,
        }
    }
}

impl From<ConnectConfigToml> for ConnectConfig {
    fn from(t: ConnectConfigToml) -> Self {
        // 窗口至少容纳一次探测
        let poll_interval = Duration::from_millis(t.poll_interval_ms.max(1));
        ConnectConfig {
            poll_interval,
            poll_window: Duration::from_millis(t.poll_window_ms).max(poll_interval),
            probe_target: t.probe_target,
            probe_timeout: Duration::from_millis(t.probe_timeout_ms),
            probe_attempts: t.probe_attempts.max(1),
        }
    }
}

// ============= 看门狗配置 =============

#[derive(Debug, Clone)]
pub struct WatchdogConfig {
    pub interval: Duration,
}

#[derive(Deserialize)]
#[serde(default)]
struct WatchdogConfigToml {
    interval_secs: u64,
}

impl Default for WatchdogConfigToml {
    fn default() -> Self {
        Self { interval_secs: 60 }
    }
}

impl From<WatchdogConfigToml> for WatchdogConfig {
    fn from(t: WatchdogConfigToml) -> Self {
        WatchdogConfig {
            interval: Duration::from_secs(t.interval_secs.max(1)),
        }
    }
}

// ============= 后端配置 =============

/// 平台后端使用的接口名等参数（不同后端只读取自己需要的字段）
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub wifi_iface: String,
    pub hotspot_connection: String,
    pub hotspot_gateway_cidr: String,
    /// NetworkManager keyfile 目录
    pub keyfile_dir: PathBuf,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            wifi_iface: "wlan0".to_string(),
            hotspot_connection: "netprov-hotspot".to_string(),
            hotspot_gateway_cidr: "192.168.4.1/24".to_string(),
            keyfile_dir: PathBuf::from("/etc/NetworkManager/system-connections"),
        }
    }
}

// ============= 配置加载函数 =============

/// 从 TOML 字符串加载应用配置，缺省的键使用推荐值
pub fn load_config_from_toml_str(s: &str) -> Result<AppConfig> {
    let parsed: AppConfigFile = toml::from_str(s).map_err(|e| Error::Config(e.to_string()))?;

    Ok(AppConfig {
        service: ServiceConfig::try_from(parsed.service)?,
        hotspot: HotspotConfig::from(parsed.hotspot),
        connect: ConnectConfig::from(parsed.connect),
        watchdog: WatchdogConfig::from(parsed.watchdog),
        backend: parsed.backend,
    })
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            service: ServiceConfig {
                bind_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
                data_dir: app_data_root().join("netprov").join("Device"),
            },
            hotspot: HotspotConfigToml::default().into(),
            connect: ConnectConfigToml::default().into(),
            watchdog: WatchdogConfigToml::default().into(),
            backend: BackendConfig::default(),
        }
    }
}
