//! Endpoint catalog and URL builder.
//!
//! Every logical operation of the service maps to one [`EndpointTemplate`]:
//! a path pattern with `{name}` placeholders plus the exact list of argument
//! names it needs. [`build`] turns a template and an argument map into a
//! request URL. Each [`Endpoint`] variant carries exactly its template's
//! arguments.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{FwError, Result};

/// Argument name → stringified value.
pub type Args<'a> = BTreeMap<&'a str, String>;

/// Parameterised path pattern plus the argument names it requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndpointTemplate {
    pub name:          &'static str,
    pub path_pattern:  &'static str,
    pub required_args: &'static [&'static str],
}

// ── Catalog ───────────────────────────────────────────────────────────────────

const LIST_DEVICES: EndpointTemplate = EndpointTemplate {
    name:          "devices",
    path_pattern:  "/devices",
    required_args: &[],
};
const DEVICE_INFO: EndpointTemplate = EndpointTemplate {
    name:          "device-info",
    path_pattern:  "/device/{identifier}",
    required_args: &["identifier"],
};
const DEVICE_IPSWS: EndpointTemplate = EndpointTemplate {
    name:          "device-ipsws",
    path_pattern:  "/device/{identifier}?type=ipsw",
    required_args: &["identifier"],
};
const IPSW_INFO: EndpointTemplate = EndpointTemplate {
    name:          "ipsw-info",
    path_pattern:  "/ipsw/{identifier}/{buildid}",
    required_args: &["identifier", "buildid"],
};
const IPSW_DOWNLOAD: EndpointTemplate = EndpointTemplate {
    name:          "ipsw-download",
    path_pattern:  "/ipsw/download/{identifier}/{buildid}",
    required_args: &["identifier", "buildid"],
};
const VERSION_IPSWS: EndpointTemplate = EndpointTemplate {
    name:          "version-ipsws",
    path_pattern:  "/ipsw/{version}",
    required_args: &["version"],
};
const MODEL_LOOKUP: EndpointTemplate = EndpointTemplate {
    name:          "model",
    path_pattern:  "/model/{model}",
    required_args: &["model"],
};
const VERSION_OTAS: EndpointTemplate = EndpointTemplate {
    name:          "version-otas",
    path_pattern:  "/ota/{version}",
    required_args: &["version"],
};
const OTA_DOCS: EndpointTemplate = EndpointTemplate {
    name:          "ota-docs",
    path_pattern:  "/ota/documentation/{device}/{version}",
    required_args: &["device", "version"],
};
const OTA_INFO: EndpointTemplate = EndpointTemplate {
    name:          "ota-info",
    path_pattern:  "/ota/{identifier}/{buildid}",
    required_args: &["identifier", "buildid"],
};
const OTA_DOWNLOAD: EndpointTemplate = EndpointTemplate {
    name:          "ota-download",
    path_pattern:  "/ota/download/{identifier}/{buildid}",
    required_args: &["identifier", "buildid"],
};

/// Logical operations offered by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    ListDevices,
    DeviceInfo,
    DeviceIpsws,
    IpswInfo,
    IpswDownload,
    VersionIpsws,
    ModelLookup,
    VersionOtas,
    OtaDocs,
    OtaInfo,
    OtaDownload,
}

impl Operation {
    pub const ALL: [Operation; 11] = [
        Operation::ListDevices,
        Operation::DeviceInfo,
        Operation::DeviceIpsws,
        Operation::IpswInfo,
        Operation::IpswDownload,
        Operation::VersionIpsws,
        Operation::ModelLookup,
        Operation::VersionOtas,
        Operation::OtaDocs,
        Operation::OtaInfo,
        Operation::OtaDownload,
    ];

    pub fn template(self) -> &'static EndpointTemplate {
        match self {
            Operation::ListDevices  => &LIST_DEVICES,
            Operation::DeviceInfo   => &DEVICE_INFO,
            Operation::DeviceIpsws  => &DEVICE_IPSWS,
            Operation::IpswInfo     => &IPSW_INFO,
            Operation::IpswDownload => &IPSW_DOWNLOAD,
            Operation::VersionIpsws => &VERSION_IPSWS,
            Operation::ModelLookup  => &MODEL_LOOKUP,
            Operation::VersionOtas  => &VERSION_OTAS,
            Operation::OtaDocs      => &OTA_DOCS,
            Operation::OtaInfo      => &OTA_INFO,
            Operation::OtaDownload  => &OTA_DOWNLOAD,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.template().name)
    }
}

impl FromStr for Operation {
    type Err = FwError;

    fn from_str(s: &str) -> Result<Self> {
        Operation::ALL
            .into_iter()
            .find(|op| op.template().name.eq_ignore_ascii_case(s))
            .ok_or_else(|| FwError::Usage(format!("unknown endpoint: {s}")))
    }
}

// ── URL builder ───────────────────────────────────────────────────────────────

/// Substitute every placeholder of `template` from `args` and prefix `base`.
///
/// Extra entries in `args` are ignored. A missing required argument fails
/// with [`FwError::InvalidArguments`] naming the template.
pub fn build(base: &str, template: &EndpointTemplate, args: &Args<'_>) -> Result<String> {
    let missing = |name: &'static str| FwError::InvalidArguments {
        endpoint: template.name,
        missing:  name,
    };
    if let Some(&name) = template.required_args.iter().find(|&&n| !args.contains_key(n)) {
        return Err(missing(name));
    }

    // Single left-to-right pass: substituted values are never rescanned.
    let mut url = String::from(base);
    let mut rest: &'static str = template.path_pattern;
    while let Some(open) = rest.find('{') {
        url.push_str(&rest[..open]);
        let Some(len) = rest[open + 1..].find('}') else {
            url.push_str(&rest[open..]);
            rest = "";
            break;
        };
        let name = &rest[open + 1..open + 1 + len];
        url.push_str(args.get(name).ok_or_else(|| missing(name))?);
        rest = &rest[open + len + 2..];
    }
    url.push_str(rest);
    Ok(url)
}

// ── Typed requests ────────────────────────────────────────────────────────────

/// One request to the service with its arguments bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint<'a> {
    ListDevices,
    DeviceInfo   { identifier: &'a str },
    DeviceIpsws  { identifier: &'a str },
    IpswInfo     { identifier: &'a str, buildid: &'a str },
    IpswDownload { identifier: &'a str, buildid: &'a str },
    VersionIpsws { version: &'a str },
    ModelLookup  { model: &'a str },
    VersionOtas  { version: &'a str },
    OtaDocs      { device: &'a str, version: &'a str },
    OtaInfo      { identifier: &'a str, buildid: &'a str },
    OtaDownload  { identifier: &'a str, buildid: &'a str },
}

impl<'a> Endpoint<'a> {
    pub fn operation(&self) -> Operation {
        match self {
            Endpoint::ListDevices         => Operation::ListDevices,
            Endpoint::DeviceInfo { .. }   => Operation::DeviceInfo,
            Endpoint::DeviceIpsws { .. }  => Operation::DeviceIpsws,
            Endpoint::IpswInfo { .. }     => Operation::IpswInfo,
            Endpoint::IpswDownload { .. } => Operation::IpswDownload,
            Endpoint::VersionIpsws { .. } => Operation::VersionIpsws,
            Endpoint::ModelLookup { .. }  => Operation::ModelLookup,
            Endpoint::VersionOtas { .. }  => Operation::VersionOtas,
            Endpoint::OtaDocs { .. }      => Operation::OtaDocs,
            Endpoint::OtaInfo { .. }      => Operation::OtaInfo,
            Endpoint::OtaDownload { .. }  => Operation::OtaDownload,
        }
    }

    pub fn args(&self) -> Args<'static> {
        let pairs: Vec<(&'static str, &str)> = match *self {
            Endpoint::ListDevices => vec![],
            Endpoint::DeviceInfo { identifier } | Endpoint::DeviceIpsws { identifier } => {
                vec![("identifier", identifier)]
            }
            Endpoint::IpswInfo { identifier, buildid }
            | Endpoint::IpswDownload { identifier, buildid }
            | Endpoint::OtaInfo { identifier, buildid }
            | Endpoint::OtaDownload { identifier, buildid } => {
                vec![("identifier", identifier), ("buildid", buildid)]
            }
            Endpoint::VersionIpsws { version } | Endpoint::VersionOtas { version } => {
                vec![("version", version)]
            }
            Endpoint::ModelLookup { model } => vec![("model", model)],
            Endpoint::OtaDocs { device, version } => vec![("device", device), ("version", version)],
        };
        pairs.into_iter().map(|(k, v)| (k, v.to_string())).collect()
    }

    pub fn url(&self, base: &str) -> Result<String> {
        build(base, self.operation().template(), &self.args())
    }
}
