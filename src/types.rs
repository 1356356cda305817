use uuid::Uuid;

/// Normalized identifier of a remote peer.
///
/// The native layer may report the same peer with differently cased or padded
/// identifier strings; `DeviceId` trims and lowercases them so that registry
/// lookups agree with the keys written by the connect callback.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DeviceId(String);

impl DeviceId {
    /// Normalizes `raw` into a `DeviceId`.
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(raw.as_ref().trim().to_ascii_lowercase())
    }

    /// Returns the normalized string form.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DeviceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<Uuid> for DeviceId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid.hyphenated().to_string())
    }
}

impl From<&str> for DeviceId {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

/// Service UUID together with the data advertised for it.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ServiceData {
    pub uuid: Uuid,
    pub data: Vec<u8>,
}

/// Decoded advertisement fields as handed over by the native discovery callback.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AdvertisementData {
    pub local_name: Option<String>,
    pub manufacturer_data: Option<Vec<u8>>,
    pub is_connectable: Option<bool>,
    pub tx_power_level: Option<i16>,
    /// Advertised service UUIDs, in the order the native layer reported them.
    pub services: Vec<Uuid>,
    /// Service data pairs, in the order the native layer reported them.
    pub service_data: Vec<ServiceData>,
}

/// A discovered advertisement, delivered to the active scan sink.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Advertisement {
    pub id: DeviceId,
    pub adv_data: AdvertisementData,
    /// Received signal strength in dBm.
    pub rssi: i16,
}

/// State of the local central manager, as reported by the native framework.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ManagerState {
    #[default]
    Unknown,
    Resetting,
    Unsupported,
    Unauthorized,
    PoweredOff,
    PoweredOn,
}
