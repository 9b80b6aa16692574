use crate::identity::{HotspotIdentity, MacAddress};
use async_trait::async_trait;
use serde::Serialize;
use std::path::Path;

// 在这里定义所有后端共享的数据结构，以及编排层依赖的能力接口。
// 编排层只通过这些接口和操作系统打交道，不解析任何命令输出。

/// Represents a single Wi-Fi network found during a scan.
/// Wi-Fi 扫描时单个网络的具体信息。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Network {
    pub ssid: String,
    pub signal: u8,       // 信号强度，0到100
    pub security: String, // 无线网络安全性 "WPA2", "WEP", "Open"
}

/// Class of network adapter a probe or address lookup is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AdapterClass {
    Wired,
    Wireless,
}

/// Result of running one OS command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// Turns a non-zero exit into `Error::CommandFailed`, otherwise yields stdout.
    pub fn checked(self, what: &str) -> crate::Result<String> {
        if self.success {
            return Ok(self.stdout);
        }
        let detail = if self.stderr.trim().is_empty() {
            self.stdout.trim().to_string()
        } else {
            self.stderr.trim().to_string()
        };
        Err(crate::Error::CommandFailed(format!("{}: {}", what, detail)))
    }
}

/// 执行系统命令的能力。输出已经按本机编码解码为文本。
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, program: &str, args: &[&str]) -> crate::Result<CommandOutput>;
}

/// 连通性探测：有线链路是否存在、外网是否可达。
#[async_trait]
pub trait NetworkProbe: Send + Sync {
    /// Whether any adapter of `class` currently has a live link.
    async fn is_link_up(&self, class: AdapterClass) -> crate::Result<bool>;

    /// Round-trip reachability check, retried up to `attempts` times.
    async fn is_internet_reachable(&self, attempts: u32) -> bool;
}

/// 查询网卡硬件地址，用于首次运行时生成热点身份。
#[async_trait]
pub trait AdapterInventory: Send + Sync {
    /// The first non-internal hardware address of an adapter of `class`, if any.
    async fn hardware_address(&self, class: AdapterClass) -> crate::Result<Option<MacAddress>>;
}

/// 承载网络（热点）的系统操作。
#[async_trait]
pub trait HostedNetwork: Send + Sync {
    /// Configures the access point with `identity`. Does not start it.
    async fn configure(&self, identity: &HotspotIdentity) -> crate::Result<()>;

    /// Removes the configuration written by [`HostedNetwork::configure`].
    async fn unconfigure(&self) -> crate::Result<()>;

    async fn start(&self) -> crate::Result<()>;

    async fn stop(&self) -> crate::Result<()>;
}

/// 主机上已保存的无线网络配置（profile）。
#[async_trait]
pub trait ProfileRegistry: Send + Sync {
    /// Names of every wireless profile the host knows, in host order.
    async fn known_profiles(&self) -> crate::Result<Vec<String>>;

    /// File name of the staged record for `ssid`, relative to the staging directory.
    fn profile_file_name(&self, ssid: &str) -> String;

    /// Renders the host-native credential record for `ssid`.
    fn render_profile(&self, ssid: &str, password: &str) -> String;

    /// Adopts the staged record at `path` as a known network.
    async fn add(&self, path: &Path) -> crate::Result<()>;

    /// Removes the known network named `name`.
    async fn delete(&self, name: &str) -> crate::Result<()>;

    /// Issues a connection to the known network `name`. Returns once issued,
    /// not once the link is up.
    async fn connect(&self, name: &str) -> crate::Result<()>;
}

/// 扫描周围的 Wi-Fi 网络。
#[async_trait]
pub trait WifiScanner: Send + Sync {
    async fn scan(&self) -> crate::Result<Vec<Network>>;
}
