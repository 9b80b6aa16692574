// 后端：通过 nmcli 命令行工具操作 NetworkManager，适用于使用 NetworkManager 管理网络的 Linux 设备。
// 热点是一个 mode=ap 的连接；用户的 Wi-Fi 凭据以 keyfile 的形式暂存后再由 NetworkManager 加载。

use crate::backends::utils::{security_label, strongest_per_ssid};
use crate::config::BackendConfig;
use crate::identity::{HotspotIdentity, MacAddress};
use crate::probe::Reachability;
use crate::traits::{
    AdapterClass, AdapterInventory, CommandRunner, HostedNetwork, Network, NetworkProbe,
    ProfileRegistry, WifiScanner,
};
use crate::{Error, Result};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

const WIFI_CONNECTION_TYPE: &str = "802-11-wireless";

pub struct NmcliBackend {
    runner: Arc<dyn CommandRunner>,
    config: BackendConfig,
    reachability: Reachability,
}

/// One row of `nmcli -t -f DEVICE,TYPE,STATE device`.
#[derive(Debug, Clone, PartialEq, Eq)]
struct DeviceState {
    device: String,
    kind: String,
    state: String,
}

impl DeviceState {
    fn is_class(&self, class: AdapterClass) -> bool {
        match class {
            AdapterClass::Wired => self.kind == "ethernet",
            AdapterClass::Wireless => self.kind == "wifi",
        }
    }

    // "connected" 或 "connected (externally)"
    fn is_connected(&self) -> bool {
        self.state.starts_with("connected")
    }
}

impl NmcliBackend {
    pub fn new(runner: Arc<dyn CommandRunner>, config: BackendConfig, reachability: Reachability) -> Self {
        Self {
            runner,
            config,
            reachability,
        }
    }

    async fn nmcli(&self, args: &[&str], what: &str) -> Result<String> {
        self.runner.run("nmcli", args).await?.checked(what)
    }

    async fn load_keyfile(&self, dest: &Path) -> Result<()> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(dest, std::fs::Permissions::from_mode(0o600)).await?;
        }
        let dest = dest.to_string_lossy();
        self.nmcli(&["connection", "load", &dest], "Failed to load profile")
            .await?;
        Ok(())
    }

    async fn devices(&self) -> Result<Vec<DeviceState>> {
        let output = self
            .nmcli(&["-t", "-f", "DEVICE,TYPE,STATE", "device"], "nmcli device list")
            .await?;
        Ok(parse_devices(&output))
    }
}

/// Splits one line of `nmcli -t` output on unescaped `:` and unescapes `\:` and `\\`.
fn split_terse(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut chars = line.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => current.extend(chars.next()),
            ':' => fields.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    fields.push(current);
    fields
}

fn parse_devices(output: &str) -> Vec<DeviceState> {
    output
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| {
            let mut parts = split_terse(line).into_iter();
            Some(DeviceState {
                device: parts.next()?,
                kind: parts.next()?,
                state: parts.next()?,
            })
        })
        .collect()
}

/// Names of saved Wi-Fi connections, excluding the hotspot's own connection.
fn parse_wifi_connections(output: &str, hotspot_connection: &str) -> Vec<String> {
    output
        .lines()
        .filter_map(|line| {
            let parts = split_terse(line);
            match parts.as_slice() {
                [name, kind, ..] if kind == WIFI_CONNECTION_TYPE && name != hotspot_connection => {
                    Some(name.clone())
                }
                _ => None,
            }
        })
        .collect()
}

/// Parses `nmcli -t -f SSID,SIGNAL,SECURITY device wifi list`. SIGNAL is already 0-100.
fn parse_nmcli_list(output: &str) -> Vec<Network> {
    let networks = output
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            let parts = split_terse(line);
            let ssid = parts.first().cloned().unwrap_or_default();
            let signal = parts
                .get(1)
                .and_then(|s| s.parse::<u16>().ok())
                .unwrap_or(0)
                .min(100) as u8;
            let security = security_label(parts.get(2).map(String::as_str).unwrap_or(""));
            Network {
                ssid,
                signal,
                security,
            }
        })
        .collect();
    strongest_per_ssid(networks)
}

/// NetworkManager keyfile for a client connection. Line breaks are stripped
/// from user input so it cannot inject keys.
fn render_keyfile(ssid: &str, password: &str) -> String {
    let clean = |s: &str| s.replace(['\n', '\r'], "");
    let ssid = clean(ssid);
    let mut keyfile = format!(
        "[connection]\nid={ssid}\ntype=wifi\nautoconnect=true\n\n[wifi]\nmode=infrastructure\nssid={ssid}\n\n"
    );
    if !password.is_empty() {
        keyfile.push_str(&format!(
            "[wifi-security]\nkey-mgmt=wpa-psk\npsk={}\n\n",
            clean(password)
        ));
    }
    keyfile.push_str("[ipv4]\nmethod=auto\n\n[ipv6]\nmethod=auto\n");
    keyfile
}

#[async_trait]
impl NetworkProbe for NmcliBackend {
    async fn is_link_up(&self, class: AdapterClass) -> Result<bool> {
        Ok(self
            .devices()
            .await?
            .iter()
            .any(|d| d.is_class(class) && d.is_connected()))
    }

    async fn is_internet_reachable(&self, attempts: u32) -> bool {
        self.reachability.check(attempts).await
    }
}

#[async_trait]
impl AdapterInventory for NmcliBackend {
    async fn hardware_address(&self, class: AdapterClass) -> Result<Option<MacAddress>> {
        for device in self.devices().await?.iter().filter(|d| d.is_class(class)) {
            let output = self
                .nmcli(
                    &["-g", "GENERAL.HWADDR", "device", "show", &device.device],
                    "nmcli device show",
                )
                .await?;
            match output.trim().parse::<MacAddress>() {
                Ok(mac) if !mac.is_unspecified() => return Ok(Some(mac)),
                Ok(_) => {}
                Err(e) => tracing::debug!(device = %device.device, "Skipping adapter: {}", e),
            }
        }
        Ok(None)
    }
}

#[async_trait]
impl HostedNetwork for NmcliBackend {
    /// 使用 `connection add` 创建热点连接，以便指定 IP
    async fn configure(&self, identity: &HotspotIdentity) -> Result<()> {
        let name = self.config.hotspot_connection.as_str();
        // 同名连接可能是上一次初始化留下的，先删掉
        let _ = self
            .runner
            .run("nmcli", &["connection", "delete", "id", name])
            .await;

        self.nmcli(
            &[
                "connection",
                "add",
                "type",
                "wifi",
                "ifname",
                &self.config.wifi_iface,
                "con-name",
                name,
                "autoconnect",
                "no",
                "ssid",
                &identity.ssid,
                "802-11-wireless.mode",
                "ap",
                "ipv4.method",
                "shared",
                "ipv4.addresses",
                &self.config.hotspot_gateway_cidr,
                "wifi-sec.key-mgmt",
                "wpa-psk",
                "wifi-sec.psk",
                &identity.password,
            ],
            "Failed to add hotspot connection",
        )
        .await?;
        Ok(())
    }

    async fn unconfigure(&self) -> Result<()> {
        self.nmcli(
            &["connection", "delete", "id", &self.config.hotspot_connection],
            "Failed to delete hotspot connection",
        )
        .await?;
        Ok(())
    }

    async fn start(&self) -> Result<()> {
        self.nmcli(
            &["connection", "up", "id", &self.config.hotspot_connection],
            "Failed to bring up hotspot connection",
        )
        .await?;
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.nmcli(
            &["connection", "down", "id", &self.config.hotspot_connection],
            "Failed to bring down hotspot connection",
        )
        .await?;
        Ok(())
    }
}

#[async_trait]
impl ProfileRegistry for NmcliBackend {
    async fn known_profiles(&self) -> Result<Vec<String>> {
        let output = self
            .nmcli(&["-t", "-f", "NAME,TYPE", "connection", "show"], "nmcli connection list")
            .await?;
        Ok(parse_wifi_connections(&output, &self.config.hotspot_connection))
    }

    /// 文件名由 SSID 的十六进制构成，不同 SSID 不会落到同一个 keyfile 上
    fn profile_file_name(&self, ssid: &str) -> String {
        format!("netprov-{}.nmconnection", hex::encode(ssid.as_bytes()))
    }

    fn render_profile(&self, ssid: &str, password: &str) -> String {
        render_keyfile(ssid, password)
    }

    /// NetworkManager 只加载自己 keyfile 目录里的文件，先复制过去（权限 0600）
    async fn add(&self, path: &Path) -> Result<()> {
        let file_name = path
            .file_name()
            .ok_or_else(|| Error::Registration(format!("not a file: {}", path.display())))?;
        let dest = self.config.keyfile_dir.join(file_name);
        tokio::fs::copy(path, &dest).await?;

        // 加载失败时不能把明文凭据留在 NetworkManager 的目录里
        if let Err(e) = self.load_keyfile(&dest).await {
            if let Err(cleanup) = tokio::fs::remove_file(&dest).await {
                tracing::warn!(path = %dest.display(), "Failed to remove rejected keyfile: {}", cleanup);
            }
            return Err(e);
        }
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<()> {
        self.nmcli(&["connection", "delete", "id", name], "Failed to delete profile")
            .await?;
        Ok(())
    }

    /// `--wait 0`: only issue the activation, confirmation is polled separately.
    async fn connect(&self, name: &str) -> Result<()> {
        self.nmcli(
            &["--wait", "0", "connection", "up", "id", name],
            "Failed to activate profile",
        )
        .await?;
        Ok(())
    }
}

#[async_trait]
impl WifiScanner for NmcliBackend {
    async fn scan(&self) -> Result<Vec<Network>> {
        let _ = self
            .runner
            .run("nmcli", &["device", "wifi", "rescan"])
            .await;
        let output = self
            .nmcli(
                &["-t", "-f", "SSID,SIGNAL,SECURITY", "device", "wifi", "list"],
                "nmcli scan failed",
            )
            .await?;
        Ok(parse_nmcli_list(&output))
    }
}
