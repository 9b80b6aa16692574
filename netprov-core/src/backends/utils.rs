use crate::traits::Network;

/// Normalizes a backend's security description to "WPA3", "WPA2", "WPA", "WEP" or "Open".
pub fn security_label(flags: &str) -> String {
    let upper = flags.to_uppercase();
    let label = if upper.contains("WPA3") || upper.contains("SAE") {
        "WPA3"
    } else if upper.contains("WPA2") {
        "WPA2"
    } else if upper.contains("WPA") {
        "WPA"
    } else if upper.contains("WEP") {
        "WEP"
    } else {
        "Open"
    };
    label.to_string()
}

/// Keeps the strongest entry per SSID, strongest first. Hidden (empty) SSIDs are dropped.
pub fn strongest_per_ssid(networks: Vec<Network>) -> Vec<Network> {
    let mut best: Vec<Network> = Vec::new();
    for network in networks {
        if network.ssid.is_empty() || network.ssid == "\\x00" {
            continue;
        }
        match best.iter_mut().find(|n| n.ssid == network.ssid) {
            Some(existing) if existing.signal < network.signal => *existing = network,
            Some(_) => {}
            None => best.push(network),
        }
    }
    best.sort_by(|a, b| b.signal.cmp(&a.signal));
    best
}
