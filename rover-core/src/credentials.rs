//! Persisted Wi-Fi credentials
//!
//! Provisioning happens outside the firmware; this module only decodes the
//! record it leaves in flash:
//!
//! | offset | size       | content         |
//! |--------|------------|-----------------|
//! | 0      | 4          | magic `WCRD`    |
//! | 4      | 1          | SSID length     |
//! | 5      | 1          | password length |
//! | 6      | ssid len   | SSID (UTF-8)    |
//! | ...    | pass len   | password        |

use heapless::String;

pub const MAGIC: [u8; 4] = *b"WCRD";
pub const SSID_MAX_LEN: usize = 32;
pub const PASSWORD_MAX_LEN: usize = 64;
const HEADER_LEN: usize = MAGIC.len() + 2;
/// Largest encoded record
pub const RECORD_MAX_LEN: usize = HEADER_LEN + SSID_MAX_LEN + PASSWORD_MAX_LEN;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CredentialError {
    /// The storage holding the record could not be read
    Unreadable,
    /// Erased flash or a foreign record
    NotProvisioned,
    /// Declared lengths exceed the limits or the record
    InvalidLength,
    Encoding,
    BufferTooSmall,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WifiCredentials {
    pub ssid: String<SSID_MAX_LEN>,
    /// Empty for an open network
    pub password: String<PASSWORD_MAX_LEN>,
}

impl WifiCredentials {
    pub fn new(ssid: &str, password: &str) -> Result<Self, CredentialError> {
        if ssid.is_empty() {
            return Err(CredentialError::InvalidLength);
        }
        Ok(Self {
            ssid: String::try_from(ssid).map_err(|_| CredentialError::InvalidLength)?,
            password: String::try_from(password).map_err(|_| CredentialError::InvalidLength)?,
        })
    }

    pub fn is_open(&self) -> bool {
        self.password.is_empty()
    }

    /// Fills a record buffer with `read` and decodes it
    pub fn load<E>(read: impl FnOnce(&mut [u8]) -> Result<(), E>) -> Result<Self, CredentialError> {
        let mut record = [0u8; RECORD_MAX_LEN];
        read(&mut record).map_err(|_| CredentialError::Unreadable)?;
        Self::decode(&record)
    }

    pub fn decode(record: &[u8]) -> Result<Self, CredentialError> {
        if record.len() < HEADER_LEN || record[..MAGIC.len()] != MAGIC {
            return Err(CredentialError::NotProvisioned);
        }

        let ssid_len = usize::from(record[4]);
        let pass_len = usize::from(record[5]);
        if ssid_len > SSID_MAX_LEN || pass_len > PASSWORD_MAX_LEN {
            return Err(CredentialError::InvalidLength);
        }

        let ssid_end = HEADER_LEN + ssid_len;
        let pass_end = ssid_end + pass_len;
        let (Some(ssid), Some(password)) = (
            record.get(HEADER_LEN..ssid_end),
            record.get(ssid_end..pass_end),
        ) else {
            return Err(CredentialError::InvalidLength);
        };

        let ssid = core::str::from_utf8(ssid).map_err(|_| CredentialError::Encoding)?;
        let password = core::str::from_utf8(password).map_err(|_| CredentialError::Encoding)?;
        Self::new(ssid, password)
    }

    /// Writes the record into `out`, returning the number of bytes used
    pub fn encode(&self, out: &mut [u8]) -> Result<usize, CredentialError> {
        let ssid = self.ssid.as_bytes();
        let password = self.password.as_bytes();
        let len = HEADER_LEN + ssid.len() + password.len();
        let out = out.get_mut(..len).ok_or(CredentialError::BufferTooSmall)?;

        out[..MAGIC.len()].copy_from_slice(&MAGIC);
        // lengths are bounded by the string capacities
        out[4] = ssid.len() as u8;
        out[5] = password.len() as u8;
        out[HEADER_LEN..HEADER_LEN + ssid.len()].copy_from_slice(ssid);
        out[HEADER_LEN + ssid.len()..].copy_from_slice(password);
        Ok(len)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for WifiCredentials {
    fn format(&self, f: defmt::Formatter) {
        // never log the password
        defmt::write!(f, "WifiCredentials {{ ssid: {} }}", self.ssid.as_str())
    }
}
