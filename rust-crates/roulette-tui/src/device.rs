use chrono::{
    DateTime,
    Utc,
};
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use rand::RngCore;
use serde::{
    Deserialize,
    Serialize,
};
use std::{
    fs,
    path::{
        Path,
        PathBuf,
    },
};

pub const DATA_ROOT: &str = ".country-roulette";
const DEVICE_FILE: &str = "device.json";
const DEVICE_ID_BYTES: usize = 16;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeviceRecord {
    pub device_id: String,
    pub created_at: DateTime<Utc>,
}

impl DeviceRecord {
    pub fn generate() -> Self {
        let mut bytes = [0u8; DEVICE_ID_BYTES];
        rand::rng().fill_bytes(&mut bytes);
        Self {
            device_id: hex::encode(bytes),
            created_at: Utc::now(),
        }
    }
}

/// The per-installation identity file, `<root>/.country-roulette/device.json`.
#[derive(Debug)]
pub struct DeviceStore {
    path: PathBuf,
}

impl DeviceStore {
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let dir = data_dir(root);
        fs::create_dir_all(&dir)
            .wrap_err_with(|| format!("Failed to create {}", dir.display()))?;
        Ok(Self {
            path: dir.join(DEVICE_FILE),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Option<DeviceRecord>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let data = fs::read(&self.path).wrap_err("Failed to read device record")?;
        if data.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }
        let record: DeviceRecord = serde_json::from_slice(&data)
            .wrap_err("Failed to parse device record JSON")?;
        if record.device_id.is_empty() {
            return Err(eyre!("Device record at {} has an empty id", self.path.display()));
        }
        Ok(Some(record))
    }

    pub fn save(&self, record: &DeviceRecord) -> Result<()> {
        let json = serde_json::to_vec_pretty(record)
            .wrap_err("Failed to serialize device record")?;
        fs::write(&self.path, json).wrap_err("Failed to write device record")?;
        Ok(())
    }

    /// Returns the stored identity, creating and persisting one on first use.
    pub fn load_or_create(&self) -> Result<DeviceRecord> {
        if let Some(record) = self.load()? {
            return Ok(record);
        }
        let record = DeviceRecord::generate();
        self.save(&record)?;
        tracing::info!(
            device_id = %record.device_id,
            path = %self.path.display(),
            "created device identity"
        );
        Ok(record)
    }
}

pub fn data_dir(root: impl AsRef<Path>) -> PathBuf {
    root.as_ref().join(DATA_ROOT)
}
