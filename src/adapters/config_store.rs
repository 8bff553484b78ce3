//! Persisted scanner configuration.
//!
//! The sanitized [`BluetoothConfig`] is kept as a postcard blob in the
//! `blescanner` NVS namespace so it survives reboots.
//!
//! - **`target_os = "espidf"`**: ESP-IDF NVS flash.
//! - **all other targets**: an in-memory blob for host tests.

use log::{info, warn};

use crate::config::BluetoothConfig;
use crate::error::Error;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

#[cfg(target_os = "espidf")]
const NAMESPACE: &core::ffi::CStr = c"blescanner";
#[cfg(target_os = "espidf")]
const KEY: &core::ffi::CStr = c"btcfg";

/// A stored blob larger than this is treated as corrupt.
const MAX_BLOB_SIZE: usize = 256;

pub struct ConfigStore {
    #[cfg(not(target_os = "espidf"))]
    blob: Option<Vec<u8>>,
}

impl ConfigStore {
    /// Bring up NVS flash, erasing the partition when its layout is stale.
    #[cfg(target_os = "espidf")]
    pub fn new() -> Result<Self, Error> {
        // SAFETY: called once from the main task before any other NVS use.
        let ret = unsafe { nvs_flash_init() };
        if ret == ESP_ERR_NVS_NO_FREE_PAGES as i32 || ret == ESP_ERR_NVS_NEW_VERSION_FOUND as i32 {
            warn!("NVS: erasing and re-initialising flash partition");
            if unsafe { nvs_flash_erase() } != ESP_OK as i32
                || unsafe { nvs_flash_init() } != ESP_OK as i32
            {
                return Err(Error::Config("nvs init failed"));
            }
        } else if ret != ESP_OK as i32 {
            return Err(Error::Config("nvs init failed"));
        }
        info!("NVS: config store ready");
        Ok(Self {})
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn new() -> Result<Self, Error> {
        info!("NVS(sim): in-memory config store");
        Ok(Self { blob: None })
    }

    /// Stored configuration, or `None` on first boot.
    pub fn load(&self) -> Result<Option<BluetoothConfig>, Error> {
        let Some(bytes) = self.read_blob()? else {
            info!("NVS: no stored config");
            return Ok(None);
        };
        if bytes.len() > MAX_BLOB_SIZE {
            return Err(Error::Config("stored blob too large"));
        }
        let config = BluetoothConfig::from_postcard(&bytes)?;
        info!("NVS: loaded config ({} bytes)", bytes.len());
        Ok(Some(config))
    }

    /// Persist `config` after clamping it.
    pub fn save(&mut self, config: &BluetoothConfig) -> Result<(), Error> {
        let bytes = config.sanitize().to_postcard()?;
        self.write_blob(&bytes)?;
        info!("NVS: config saved ({} bytes)", bytes.len());
        Ok(())
    }

    // ── Platform-specific ─────────────────────────────────────

    #[cfg(target_os = "espidf")]
    fn with_handle<T>(
        mode: nvs_open_mode_t,
        f: impl FnOnce(nvs_handle_t) -> Result<T, i32>,
    ) -> Result<T, i32> {
        let mut handle: nvs_handle_t = 0;
        let ret = unsafe { nvs_open(NAMESPACE.as_ptr(), mode, &mut handle) };
        if ret != ESP_OK as i32 {
            return Err(ret);
        }
        let result = f(handle);
        unsafe { nvs_close(handle) };
        result
    }

    #[cfg(target_os = "espidf")]
    fn read_blob(&self) -> Result<Option<Vec<u8>>, Error> {
        let result = Self::with_handle(nvs_open_mode_t_NVS_READONLY, |handle| {
            let mut size: usize = 0;
            let ret =
                unsafe { nvs_get_blob(handle, KEY.as_ptr(), core::ptr::null_mut(), &mut size) };
            if ret != ESP_OK as i32 {
                return Err(ret);
            }
            if size > MAX_BLOB_SIZE {
                return Err(ESP_ERR_NVS_INVALID_LENGTH as i32);
            }
            let mut buf = vec![0u8; size];
            let ret =
                unsafe { nvs_get_blob(handle, KEY.as_ptr(), buf.as_mut_ptr().cast(), &mut size) };
            if ret != ESP_OK as i32 {
                return Err(ret);
            }
            buf.truncate(size);
            Ok(buf)
        });
        match result {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e == ESP_ERR_NVS_NOT_FOUND as i32 => Ok(None),
            Err(e) => {
                warn!("NVS: read error {}", e);
                Err(Error::Config("nvs read failed"))
            }
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn read_blob(&self) -> Result<Option<Vec<u8>>, Error> {
        Ok(self.blob.clone())
    }

    #[cfg(target_os = "espidf")]
    fn write_blob(&mut self, bytes: &[u8]) -> Result<(), Error> {
        Self::with_handle(nvs_open_mode_t_NVS_READWRITE, |handle| {
            let ret =
                unsafe { nvs_set_blob(handle, KEY.as_ptr(), bytes.as_ptr().cast(), bytes.len()) };
            if ret != ESP_OK as i32 {
                return Err(ret);
            }
            let ret = unsafe { nvs_commit(handle) };
            if ret != ESP_OK as i32 {
                return Err(ret);
            }
            Ok(())
        })
        .map_err(|e| {
            warn!("NVS: write error {}", e);
            Error::Config("nvs write failed")
        })
    }

    #[cfg(not(target_os = "espidf"))]
    fn write_blob(&mut self, bytes: &[u8]) -> Result<(), Error> {
        self.blob = Some(bytes.to_vec());
        Ok(())
    }
}

/// Choose the configuration for this boot and persist it.
///
/// A document baked in at build time wins and replaces what is stored.
/// Otherwise the stored config is used; a corrupt or missing one falls
/// back to defaults.  The result is always sanitized.
pub fn resolve(store: &mut ConfigStore, baked_json: Option<&str>) -> BluetoothConfig {
    let baked = baked_json.and_then(|text| match BluetoothConfig::from_json(text) {
        Ok(c) => Some(c),
        Err(e) => {
            warn!("Config: baked-in document ignored: {}", e);
            None
        }
    });

    let (config, persist) = match baked {
        Some(c) => (c.sanitize(), true),
        None => match store.load() {
            Ok(Some(c)) => (c.sanitize(), false),
            Ok(None) => (BluetoothConfig::default(), true),
            Err(e) => {
                warn!("Config: stored config unusable ({}), using defaults", e);
                (BluetoothConfig::default(), true)
            }
        },
    };

    if persist {
        if let Err(e) = store.save(&config) {
            warn!("Config: not persisted: {}", e);
        }
    }
    config
}
