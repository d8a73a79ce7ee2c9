//! Public operations of the firmware metadata client.
//!
//! [`Api`] only knows the service base address. Every call takes the
//! caller's [`Transport`], builds one URL, fetches it, resolves the selector
//! against the decoded list and builds the entity.

use log::{debug, info};
use serde::de::DeserializeOwned;

use crate::config::{ClientConfig, BASE_API};
use crate::endpoint::Endpoint;
use crate::error::{FwError, Result};
use crate::model::{Device, DeviceRecord, Firmware, FirmwareRecord, SignedRecord};
use crate::resolve::{self, FirmwareSelector};
use crate::transport::Transport;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Api {
    base_url: String,
}

impl Default for Api {
    fn default() -> Self {
        Self::new(BASE_API)
    }
}

impl Api {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { base_url: base_url.into().trim_end_matches('/').to_string() }
    }

    pub fn from_config(cfg: &ClientConfig) -> Self {
        Self::new(cfg.base_url.as_str())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url(&self, endpoint: Endpoint<'_>) -> Result<String> {
        endpoint.url(&self.base_url)
    }

    fn fetch<T: DeserializeOwned>(&self, t: &dyn Transport, endpoint: Endpoint<'_>) -> Result<T> {
        let url = self.url(endpoint)?;
        let body = t.fetch_json(&url)?;
        Ok(serde_json::from_value(body)?)
    }

    // ── Devices ───────────────────────────────────────────────────────────────

    /// Every device known to the service.
    pub fn devices(&self, t: &dyn Transport) -> Result<Vec<DeviceRecord>> {
        self.fetch(t, Endpoint::ListDevices)
    }

    /// Resolve a device by identifier (case-insensitive, exact) and load its
    /// board variants.
    pub fn device(&self, t: &dyn Transport, identifier: &str) -> Result<Device> {
        if identifier.is_empty() {
            return Err(FwError::Usage("a device identifier must be provided".into()));
        }
        let devices = self.devices(t)?;
        let hit = resolve::device_by_identifier(&devices, identifier)
            .into_result("device", format!("identifier {identifier}"))?;
        self.device_info(t, &hit.identifier)
    }

    /// Resolve a device by (partial, case-insensitive) name.
    pub fn search_device(&self, t: &dyn Transport, name: &str) -> Result<Device> {
        if name.is_empty() {
            return Err(FwError::Usage("a device name must be provided".into()));
        }
        let devices = self.devices(t)?;
        let hit = resolve::device_by_name(&devices, name)
            .into_result("device", format!("name {name}"))?;
        info!("device name {name:?} resolved to {} ({})", hit.name, hit.identifier);
        self.device_info(t, &hit.identifier)
    }

    fn device_info(&self, t: &dyn Transport, identifier: &str) -> Result<Device> {
        let rec: DeviceRecord = self.fetch(t, Endpoint::DeviceInfo { identifier })?;
        debug!("device {identifier}: {} board variant(s)", rec.boards.len());
        Ok(Device::from_record(rec))
    }

    /// Device behind a hardware model number (e.g. `A2882`).
    pub fn model_device(&self, t: &dyn Transport, model: &str) -> Result<Device> {
        if model.is_empty() {
            return Err(FwError::Usage("a model must be provided".into()));
        }
        let rec: DeviceRecord = self.fetch(t, Endpoint::ModelLookup { model })?;
        Ok(Device::from_record(rec))
    }

    // ── Firmwares ─────────────────────────────────────────────────────────────

    /// Raw firmware records listed for one device.
    pub fn device_firmwares(&self, t: &dyn Transport, device: &Device) -> Result<Vec<FirmwareRecord>> {
        let rec: DeviceRecord = self.fetch(t, Endpoint::DeviceIpsws { identifier: device.identifier() })?;
        Ok(rec.firmwares)
    }

    /// Resolve one firmware of `device`. The build id wins over the version
    /// when both are given; giving neither fails before any request.
    pub fn firmware(
        &self,
        t:        &dyn Transport,
        device:   &Device,
        selector: &FirmwareSelector,
    ) -> Result<Firmware> {
        let query = selector.query()?;
        let firmwares = self.device_firmwares(t, device)?;
        let hit = query
            .resolve(&firmwares)
            .into_result("firmware", query.describe())?;
        info!("{} {} resolved to build {}", device.identifier(), query.describe(), hit.buildid);
        Firmware::from_record(hit.clone(), device.identifier())
    }

    /// Every firmware carrying `version`, across all devices.
    pub fn version_firmwares(&self, t: &dyn Transport, version: &str) -> Result<Vec<Firmware>> {
        if version.is_empty() {
            return Err(FwError::Usage("a firmware version must be provided".into()));
        }
        let recs: Vec<FirmwareRecord> = self.fetch(t, Endpoint::VersionIpsws { version })?;
        recs.into_iter()
            .map(|rec| {
                let owner = rec.identifier.clone().ok_or_else(|| {
                    FwError::Decode(format!("firmware {} has no device identifier", rec.buildid))
                })?;
                Firmware::from_record(rec, &owner)
            })
            .collect()
    }

    /// Current signing status. Always asks the service.
    pub fn firmware_signed(&self, t: &dyn Transport, firmware: &Firmware) -> Result<bool> {
        let rec: SignedRecord = self.fetch(
            t,
            Endpoint::IpswInfo { identifier: firmware.device(), buildid: firmware.buildid() },
        )?;
        Ok(rec.signed)
    }

    /// Service redirect URL that serves the firmware archive.
    pub fn download_url(&self, firmware: &Firmware) -> Result<String> {
        self.url(Endpoint::IpswDownload { identifier: firmware.device(), buildid: firmware.buildid() })
    }
}
