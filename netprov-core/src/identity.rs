//! 热点身份：由网卡硬件地址确定性生成，首次运行时加密保存。

use crate::{Error, Result};
use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Nonce};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// 加密后的热点信息文件名
pub const HOTSPOT_FILE: &str = "hotspot.json";

const NONCE_LEN: usize = 12;

/// A 48-bit adapter hardware address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MacAddress([u8; 6]);

impl MacAddress {
    pub fn new(octets: [u8; 6]) -> Self {
        Self(octets)
    }

    /// All-zero addresses are what virtual/loopback adapters report.
    pub fn is_unspecified(&self) -> bool {
        self.0 == [0; 6]
    }

    /// Uppercase hex digits without separators, e.g. `AABBCCDDEEFF`.
    pub fn hex_digits(&self) -> String {
        hex::encode_upper(self.0)
    }
}

impl FromStr for MacAddress {
    type Err = Error;

    /// Accepts `AA:BB:..`, `aa-bb-..`, bare hex, and nmcli's escaped `AA\:BB`.
    fn from_str(s: &str) -> Result<Self> {
        let digits: String = s
            .trim()
            .chars()
            .filter(|c| !matches!(c, ':' | '-' | '.' | '\\'))
            .collect();
        if digits.len() != 12 {
            return Err(Error::InvalidAddress(s.trim().to_string()));
        }
        let mut octets = [0u8; 6];
        hex::decode_to_slice(&digits, &mut octets)
            .map_err(|_| Error::InvalidAddress(s.trim().to_string()))?;
        Ok(Self(octets))
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let o = self.0;
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            o[0], o[1], o[2], o[3], o[4], o[5]
        )
    }
}

/// SSID and passphrase of the temporary access point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HotspotIdentity {
    pub ssid: String,
    pub password: String,
}

impl HotspotIdentity {
    /// SSID suffix is the first 7 hex digits of the address, passphrase
    /// suffix the first 5.
    pub fn derive(mac: &MacAddress, ssid_prefix: &str, password_prefix: &str) -> Self {
        let digits = mac.hex_digits();
        Self {
            ssid: format!("{}{}", ssid_prefix, &digits[..7]),
            password: format!("{}{}", password_prefix, &digits[..5]),
        }
    }
}

/// The on-disk form of a [`HotspotIdentity`]: AES-256-GCM with the key kept
/// beside the ciphertext, all hex encoded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SealedIdentity {
    pub nonce: String,
    pub ciphertext: String,
    pub key: String,
}

impl SealedIdentity {
    pub fn seal(identity: &HotspotIdentity) -> Result<Self> {
        let plaintext = serde_json::to_vec(identity)?;
        let key = Aes256Gcm::generate_key(OsRng);
        let cipher = Aes256Gcm::new(&key);
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = cipher
            .encrypt(&nonce, plaintext.as_ref())
            .map_err(|e| Error::Crypto(e.to_string()))?;

        Ok(Self {
            nonce: hex::encode(nonce),
            ciphertext: hex::encode(ciphertext),
            key: hex::encode(key),
        })
    }

    pub fn open(&self) -> Result<HotspotIdentity> {
        let decode = |field: &str, value: &str| {
            hex::decode(value).map_err(|e| Error::Crypto(format!("{}: {}", field, e)))
        };
        let key = decode("key", &self.key)?;
        let nonce = decode("nonce", &self.nonce)?;
        let ciphertext = decode("ciphertext", &self.ciphertext)?;

        if nonce.len() != NONCE_LEN {
            return Err(Error::Crypto(format!("nonce must be {} bytes", NONCE_LEN)));
        }
        let cipher =
            Aes256Gcm::new_from_slice(&key).map_err(|e| Error::Crypto(e.to_string()))?;
        let plaintext = cipher
            .decrypt(Nonce::from_slice(&nonce), ciphertext.as_ref())
            .map_err(|e| Error::Crypto(e.to_string()))?;
        Ok(serde_json::from_slice(&plaintext)?)
    }
}

/// Persisted identity file under the device data directory.
#[derive(Debug, Clone)]
pub struct IdentityStore {
    path: PathBuf,
}

impl IdentityStore {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join(HOTSPOT_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn exists(&self) -> bool {
        tokio::fs::try_exists(&self.path).await.unwrap_or(false)
    }

    /// Seals and writes `identity`, creating the data directory if needed.
    pub async fn save(&self, identity: &HotspotIdentity) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }
        let sealed = SealedIdentity::seal(identity)?;
        let body = serde_json::to_vec_pretty(&sealed)?;

        // 先写临时文件再重命名，避免留下半个文件导致下次启动不再初始化
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, body).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    pub async fn load(&self) -> Result<HotspotIdentity> {
        let body = tokio::fs::read(&self.path).await?;
        let sealed: SealedIdentity = serde_json::from_slice(&body)?;
        sealed.open()
    }
}
