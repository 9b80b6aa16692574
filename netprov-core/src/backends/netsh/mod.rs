// 后端：Windows 的 netsh / ipconfig。
// 热点使用承载网络（hostednetwork），用户的 Wi-Fi 凭据以 WLAN profile XML 的形式注册。

pub mod parsing;

use self::parsing::{parse_ipconfig, parse_networks, parse_profiles};
use crate::identity::{HotspotIdentity, MacAddress};
use crate::probe::Reachability;
use crate::profile_store::file_stem_for;
use crate::traits::{
    AdapterClass, AdapterInventory, CommandRunner, HostedNetwork, Network, NetworkProbe,
    ProfileRegistry, WifiScanner,
};
use crate::Result;
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

const PROFILE_NAMESPACE: &str = "http://www.microsoft.com/networking/WLAN/profile/v1";
const MAC_RANDOMIZATION_NAMESPACE: &str = "http://www.microsoft.com/networking/WLAN/profile/v3";
const RANDOMIZATION_SEED: u32 = 2699710311;

pub struct NetshBackend {
    runner: Arc<dyn CommandRunner>,
    reachability: Reachability,
}

impl NetshBackend {
    pub fn new(runner: Arc<dyn CommandRunner>, reachability: Reachability) -> Self {
        Self {
            runner,
            reachability,
        }
    }

    async fn netsh(&self, args: &[&str], what: &str) -> Result<String> {
        self.runner.run("netsh", args).await?.checked(what)
    }

    async fn ipconfig(&self) -> Result<Vec<parsing::AdapterSection>> {
        let output = self
            .runner
            .run("ipconfig", &["/all"])
            .await?
            .checked("ipconfig failed")?;
        Ok(parse_ipconfig(&output))
    }
}

fn escape_xml(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// WLAN profile XML accepted by `netsh wlan add profile`. An empty password
/// yields an open-network profile without a shared key.
fn render_profile_xml(ssid: &str, password: &str) -> String {
    let name = escape_xml(ssid);
    let hex_ssid = hex::encode_upper(ssid.as_bytes());
    let security = if password.is_empty() {
        "        <security>
            <authEncryption>
                <authentication>open</authentication>
                <encryption>none</encryption>
                <useOneX>false</useOneX>
            </authEncryption>
        </security>"
            .to_string()
    } else {
        format!(
            "        <security>
            <authEncryption>
                <authentication>WPA2PSK</authentication>
                <encryption>AES</encryption>
                <useOneX>false</useOneX>
            </authEncryption>
            <sharedKey>
                <keyType>passPhrase</keyType>
                <protected>false</protected>
                <keyMaterial>{}</keyMaterial>
            </sharedKey>
        </security>",
            escape_xml(password)
        )
    };

    format!(
        r#"<?xml version="1.0"?>
<WLANProfile xmlns="{PROFILE_NAMESPACE}">
    <name>{name}</name>
    <SSIDConfig>
        <SSID>
            <hex>{hex_ssid}</hex>
            <name>{name}</name>
        </SSID>
    </SSIDConfig>
    <connectionType>ESS</connectionType>
    <connectionMode>auto</connectionMode>
    <MSM>
{security}
    </MSM>
    <MacRandomization xmlns="{MAC_RANDOMIZATION_NAMESPACE}">
        <enableRandomization>false</enableRandomization>
        <randomizationSeed>{RANDOMIZATION_SEED}</randomizationSeed>
    </MacRandomization>
</WLANProfile>
"#
    )
}

#[async_trait]
impl NetworkProbe for NetshBackend {
    /// 有线网卡没有"媒体已断开连接"即视为链路已建立
    async fn is_link_up(&self, class: AdapterClass) -> Result<bool> {
        Ok(self
            .ipconfig()
            .await?
            .iter()
            .any(|s| s.class == class && !s.is_virtual() && !s.media_disconnected))
    }

    async fn is_internet_reachable(&self, attempts: u32) -> bool {
        self.reachability.check(attempts).await
    }
}

#[async_trait]
impl AdapterInventory for NetshBackend {
    async fn hardware_address(&self, class: AdapterClass) -> Result<Option<MacAddress>> {
        Ok(self
            .ipconfig()
            .await?
            .into_iter()
            .filter(|s| s.class == class && !s.is_virtual())
            .filter_map(|s| s.mac)
            .find(|mac| !mac.is_unspecified()))
    }
}

#[async_trait]
impl HostedNetwork for NetshBackend {
    async fn configure(&self, identity: &HotspotIdentity) -> Result<()> {
        let ssid = format!("ssid={}", identity.ssid);
        let key = format!("key={}", identity.password);
        self.netsh(
            &["wlan", "set", "hostednetwork", "mode=allow", &ssid, &key],
            "创建承载网络时出错",
        )
        .await?;
        Ok(())
    }

    async fn unconfigure(&self) -> Result<()> {
        self.netsh(
            &["wlan", "set", "hostednetwork", "mode=disallow"],
            "禁用承载网络时出错",
        )
        .await?;
        Ok(())
    }

    async fn start(&self) -> Result<()> {
        self.netsh(&["wlan", "start", "hostednetwork"], "开启承载网络时出错")
            .await?;
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.netsh(&["wlan", "stop", "hostednetwork"], "关闭承载网络时出错")
            .await?;
        Ok(())
    }
}

#[async_trait]
impl ProfileRegistry for NetshBackend {
    async fn known_profiles(&self) -> Result<Vec<String>> {
        let output = self
            .netsh(&["wlan", "show", "profiles"], "查询配置文件时出错")
            .await?;
        Ok(parse_profiles(&output))
    }

    fn profile_file_name(&self, ssid: &str) -> String {
        format!("{}Profile.xml", file_stem_for(ssid))
    }

    fn render_profile(&self, ssid: &str, password: &str) -> String {
        render_profile_xml(ssid, password)
    }

    async fn add(&self, path: &Path) -> Result<()> {
        let filename = format!("filename={}", path.display());
        self.netsh(&["wlan", "add", "profile", &filename], "添加配置文件失败")
            .await?;
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<()> {
        let name = format!("name={}", name);
        self.netsh(&["wlan", "delete", "profile", &name], "删除配置文件失败")
            .await?;
        Ok(())
    }

    async fn connect(&self, name: &str) -> Result<()> {
        let name = format!("name={}", name);
        self.netsh(&["wlan", "connect", &name], "连接失败").await?;
        Ok(())
    }
}

#[async_trait]
impl WifiScanner for NetshBackend {
    async fn scan(&self) -> Result<Vec<Network>> {
        let output = self
            .netsh(&["wlan", "show", "networks", "mode=bssid"], "扫描网络失败")
            .await?;
        Ok(parse_networks(&output))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ScriptedRunner;
    use crate::Error;
    use std::time::Duration;

    fn backend(runner: &Arc<ScriptedRunner>) -> NetshBackend {
        NetshBackend::new(
            runner.clone(),
            Reachability::new("127.0.0.1:9", Duration::from_millis(10)),
        )
    }

    const IPCONFIG: &str = "\
Ethernet adapter Ethernet:

   Media State . . . . . . . . . . . : Media disconnected
   Physical Address. . . . . . . . . : 00-00-00-00-00-00

Ethernet adapter Ethernet 2:

   Physical Address. . . . . . . . . : AA-BB-CC-DD-EE-FF
";

    #[test]
    fn profile_xml_escapes_and_hex_encodes() {
        let xml = render_profile_xml("R&D <5G>", "pa\"ss<word>");

        assert!(xml.contains("<name>R&amp;D &lt;5G&gt;</name>"));
        assert!(xml.contains("<hex>522644203C35473E</hex>"));
        assert!(xml.contains("<keyMaterial>pa&quot;ss&lt;word&gt;</keyMaterial>"));
        assert!(xml.contains("<randomizationSeed>2699710311</randomizationSeed>"));
    }

    #[test]
    fn open_profile_has_no_shared_key() {
        let xml = render_profile_xml("Cafe", "");
        assert!(xml.contains("<authentication>open</authentication>"));
        assert!(!xml.contains("sharedKey"));
    }

    #[tokio::test]
    async fn configure_sets_hostednetwork() {
        let runner = Arc::new(ScriptedRunner::new());
        let backend = backend(&runner);
        let identity = HotspotIdentity {
            ssid: "PRINTER_AABBCCD".into(),
            password: "wenyinyi:AABBC".into(),
        };

        backend.configure(&identity).await.unwrap();
        backend.start().await.unwrap();

        assert_eq!(
            runner.calls(),
            vec![
                "netsh wlan set hostednetwork mode=allow ssid=PRINTER_AABBCCD key=wenyinyi:AABBC",
                "netsh wlan start hostednetwork",
            ]
        );
    }

    #[tokio::test]
    async fn wired_state_and_address_from_ipconfig() {
        let runner = Arc::new(ScriptedRunner::new());
        runner.reply("ipconfig /all", IPCONFIG);
        let backend = backend(&runner);

        // "Ethernet 2" 没有媒体状态行，视为已连接
        assert!(backend.is_link_up(AdapterClass::Wired).await.unwrap());
        let mac = backend.hardware_address(AdapterClass::Wired).await.unwrap();
        assert_eq!(mac.unwrap().hex_digits(), "AABBCCDDEEFF");
        assert_eq!(backend.hardware_address(AdapterClass::Wireless).await.unwrap(), None);
    }

    #[tokio::test]
    async fn failed_add_carries_netsh_output() {
        let runner = Arc::new(ScriptedRunner::new());
        runner.fail(
            "netsh wlan add profile filename=C:\\data\\HomeNetProfile.xml",
            "The profile is corrupted.",
        );
        let backend = backend(&runner);

        let err = backend
            .add(Path::new("C:\\data\\HomeNetProfile.xml"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::CommandFailed(msg) if msg.contains("corrupted")));
    }
}
