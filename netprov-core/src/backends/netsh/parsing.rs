// ipconfig / netsh 输出解析。系统语言可能是中文也可能是英文，两套标签都要认。

use crate::backends::utils::{security_label, strongest_per_ssid};
use crate::identity::MacAddress;
use crate::traits::{AdapterClass, Network};

const WIRED_HEADERS: [&str; 2] = ["以太网适配器", "Ethernet adapter"];
const WIRELESS_HEADERS: [&str; 2] = ["无线局域网适配器", "Wireless LAN adapter"];
const PHYSICAL_ADDRESS: [&str; 2] = ["物理地址", "Physical Address"];
const MEDIA_STATE: [&str; 2] = ["媒体状态", "Media State"];
const MEDIA_DISCONNECTED: [&str; 2] = ["已断开连接", "disconnected"];
const PROFILE_LABELS: [&str; 2] = ["所有用户配置文件", "All User Profile"];

/// One adapter block of `ipconfig /all`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterSection {
    pub name: String,
    pub class: AdapterClass,
    pub mac: Option<MacAddress>,
    pub media_disconnected: bool,
}

impl AdapterSection {
    /// Virtual adapters ("Local Area Connection* 2") share hardware with a real one.
    pub fn is_virtual(&self) -> bool {
        self.name.contains('*')
    }
}

fn starts_with_any(line: &str, labels: &[&str]) -> bool {
    labels.iter().any(|label| line.starts_with(label))
}

/// `标签 . . . . . : 值` -> `值`
fn value_of(line: &str) -> Option<&str> {
    line.split_once(':').map(|(_, value)| value.trim())
}

fn section_header(line: &str) -> Option<(AdapterClass, String)> {
    let class = if starts_with_any(line, &WIRED_HEADERS) {
        AdapterClass::Wired
    } else if starts_with_any(line, &WIRELESS_HEADERS) {
        AdapterClass::Wireless
    } else {
        return None;
    };
    let name = line.trim_end_matches(':').trim().to_string();
    Some((class, name))
}

/// Splits `ipconfig /all` output into wired and wireless adapter sections.
/// Other adapter kinds (tunnels, Bluetooth) end the current section.
pub fn parse_ipconfig(output: &str) -> Vec<AdapterSection> {
    let mut sections = Vec::new();
    let mut current: Option<AdapterSection> = None;

    for raw in output.lines() {
        let is_header = !raw.starts_with(char::is_whitespace) && !raw.trim().is_empty();
        let line = raw.trim();

        if is_header {
            sections.extend(current.take());
            if let Some((class, name)) = section_header(line) {
                current = Some(AdapterSection {
                    name,
                    class,
                    mac: None,
                    media_disconnected: false,
                });
            }
            continue;
        }

        let Some(section) = current.as_mut() else {
            continue;
        };
        if starts_with_any(line, &PHYSICAL_ADDRESS) {
            section.mac = value_of(line).and_then(|v| v.parse().ok());
        } else if starts_with_any(line, &MEDIA_STATE) {
            section.media_disconnected = value_of(line)
                .is_some_and(|v| MEDIA_DISCONNECTED.iter().any(|d| v.contains(d)));
        }
    }
    sections.extend(current);
    sections
}

/// Names from `netsh wlan show profiles`, in host order.
pub fn parse_profiles(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| starts_with_any(line, &PROFILE_LABELS))
        .filter_map(|line| value_of(line).map(str::to_string))
        .filter(|name| !name.is_empty())
        .collect()
}

/// Parses `netsh wlan show networks mode=bssid`. A network may list several
/// BSSIDs; the strongest signal wins.
pub fn parse_networks(output: &str) -> Vec<Network> {
    let mut networks: Vec<Network> = Vec::new();

    for line in output.lines().map(str::trim) {
        // "SSID 1 : name"，注意不要匹配 "BSSID 1 : ..."
        if line.starts_with("SSID") {
            let ssid = value_of(line).unwrap_or_default().to_string();
            networks.push(Network {
                ssid,
                signal: 0,
                security: "Open".to_string(),
            });
            continue;
        }
        let Some(network) = networks.last_mut() else {
            continue;
        };
        if line.starts_with("Authentication") || line.starts_with("身份验证") {
            network.security = security_label(value_of(line).unwrap_or_default());
        } else if line.starts_with("Signal") || line.starts_with("信号") {
            let signal = value_of(line)
                .map(|v| v.trim_end_matches('%').trim())
                .and_then(|v| v.parse::<u8>().ok())
                .unwrap_or(0)
                .min(100);
            network.signal = network.signal.max(signal);
        }
    }

    strongest_per_ssid(networks)
}

#[cfg(test)]
mod tests {
    use super::*;

    const IPCONFIG_EN: &str = "\
Windows IP Configuration

   Host Name . . . . . . . . . . . . : PRINTER-01

Ethernet adapter Ethernet:

   Media State . . . . . . . . . . . : Media disconnected
   Description . . . . . . . . . . . : Realtek PCIe GbE Family Controller
   Physical Address. . . . . . . . . : 00-1A-2B-3C-4D-5E

Wireless LAN adapter Local Area Connection* 2:

   Media State . . . . . . . . . . . : Media disconnected
   Physical Address. . . . . . . . . : 02-1A-2B-3C-4D-5F

Wireless LAN adapter Wi-Fi:

   Physical Address. . . . . . . . . : 10-20-30-40-50-60
   IPv4 Address. . . . . . . . . . . : 192.168.4.1(Preferred)
";

    const IPCONFIG_ZH: &str = "\
Windows IP 配置

以太网适配器 以太网:

   描述. . . . . . . . . . . . . . . : Intel(R) Ethernet Connection
   物理地址. . . . . . . . . . . . . : AA-BB-CC-DD-EE-FF
   IPv4 地址 . . . . . . . . . . . . : 10.0.0.23(首选)

隧道适配器 Teredo:

   媒体状态  . . . . . . . . . . . . : 媒体已断开连接
   物理地址. . . . . . . . . . . . . : 00-00-00-00-00-00-00-E0
";

    #[test]
    fn english_ipconfig_sections() {
        let sections = parse_ipconfig(IPCONFIG_EN);

        assert_eq!(sections.len(), 3);
        assert_eq!(sections[0].class, AdapterClass::Wired);
        assert!(sections[0].media_disconnected);
        assert_eq!(sections[0].mac.unwrap().hex_digits(), "001A2B3C4D5E");
        assert!(sections[1].is_virtual());
        assert_eq!(sections[2].name, "Wireless LAN adapter Wi-Fi");
        assert!(!sections[2].media_disconnected);
    }

    #[test]
    fn chinese_ipconfig_sections() {
        let sections = parse_ipconfig(IPCONFIG_ZH);

        // 隧道适配器不属于有线/无线，不会产生条目
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].class, AdapterClass::Wired);
        assert!(!sections[0].media_disconnected);
        assert_eq!(sections[0].mac.unwrap().hex_digits(), "AABBCCDDEEFF");
    }

    #[test]
    fn profile_names_in_both_languages() {
        let output = "\
Profiles on interface Wi-Fi:

Group policy profiles (read only)
---------------------------------
    <None>

User profiles
-------------
    All User Profile     : HomeNet
    All User Profile     : Cafe Guest
    所有用户配置文件 : 办公室
";
        assert_eq!(parse_profiles(output), vec!["HomeNet", "Cafe Guest", "办公室"]);
        assert!(parse_profiles("There is no wireless interface on the system.").is_empty());
    }

    #[test]
    fn networks_take_strongest_bssid() {
        let output = "\
Interface name : Wi-Fi
There are 2 networks currently visible.

SSID 1 : HomeNet
    Network type            : Infrastructure
    Authentication          : WPA2-Personal
    Encryption              : CCMP
    BSSID 1                 : 10:20:30:40:50:60
         Signal             : 45%
    BSSID 2                 : 10:20:30:40:50:61
         Signal             : 88%

SSID 2 : Cafe
    Network type            : Infrastructure
    Authentication          : Open
    Encryption              : None
    BSSID 1                 : 20:30:40:50:60:70
         Signal             : 60%
";
        let networks = parse_networks(output);

        assert_eq!(networks.len(), 2);
        assert_eq!(networks[0].ssid, "HomeNet");
        assert_eq!(networks[0].signal, 88);
        assert_eq!(networks[0].security, "WPA2");
        assert_eq!(networks[1].security, "Open");
    }
}
