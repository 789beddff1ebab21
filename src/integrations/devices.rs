//! Block device discovery via `lsblk`

use anyhow::{Context, Result};
use serde_json::Value;
use tokio::process::Command;

use crate::error::{FragError, UnsupportedReason};

const LSBLK_COLUMNS: &str = "NAME,PATH,TYPE,SIZE,FSTYPE,MOUNTPOINT,ROTA";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Hdd,
    Ssd,
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Hdd => write!(f, "HDD"),
            Self::Ssd => write!(f, "SSD"),
        }
    }
}

/// One disk or partition as reported by lsblk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockDevice {
    pub name: String,
    pub path: String,
    pub device_type: String,
    pub size: u64,
    pub fs_type: Option<String>,
    pub mountpoint: Option<String>,
    /// `None` when lsblk did not report the flag
    pub rotational: Option<bool>,
}

impl BlockDevice {
    /// Absent rotational flag counts as spinning media
    pub fn media(&self) -> MediaKind {
        match self.rotational {
            Some(false) => MediaKind::Ssd,
            _ => MediaKind::Hdd,
        }
    }

    pub fn is_ext4(&self) -> bool {
        self.fs_type
            .as_deref()
            .map(|fs| fs.eq_ignore_ascii_case("ext4"))
            .unwrap_or(false)
    }

    /// Reject devices before any external command is launched
    pub fn check_eligible(&self) -> Result<(), FragError> {
        if self.media() == MediaKind::Ssd {
            return Err(FragError::UnsupportedDevice(UnsupportedReason::IsSsd));
        }
        if !self.is_ext4() {
            return Err(FragError::UnsupportedDevice(UnsupportedReason::NotExt4));
        }
        Ok(())
    }

    pub fn matches(&self, query: &str) -> bool {
        self.path == query || self.name == query || self.path.trim_start_matches("/dev/") == query
    }
}

/// Run lsblk and return every device, partitions flattened after their parent
pub async fn list_devices(lister: &str) -> Result<Vec<BlockDevice>> {
    let output = Command::new(lister)
        .args(["--json", "--bytes", "-o", LSBLK_COLUMNS])
        .output()
        .await
        .with_context(|| format!("{} not found", lister))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        anyhow::bail!("{} failed: {}", lister, stderr.trim());
    }

    let devices = parse_lsblk(&String::from_utf8_lossy(&output.stdout))?;
    tracing::debug!(count = devices.len(), "enumerated block devices");
    Ok(devices)
}

/// Find a device by path or kernel name
pub fn find_device(devices: Vec<BlockDevice>, query: &str) -> Result<BlockDevice> {
    devices
        .into_iter()
        .find(|d| d.matches(query))
        .with_context(|| format!("no block device matches `{}`", query))
}

/// Print the device table for the `devices` subcommand
pub async fn print_devices(lister: &str) -> Result<()> {
    let devices = list_devices(lister).await?;

    println!(
        "{:<14} {:<18} {:<6} {:<5} {:>10}  {:<16} STATUS",
        "NAME", "PATH", "FS", "MEDIA", "SIZE", "MOUNT"
    );
    println!("{}", "-".repeat(90));

    for device in &devices {
        let status = match device.check_eligible() {
            Ok(()) => "eligible".to_string(),
            Err(FragError::UnsupportedDevice(UnsupportedReason::IsSsd)) => "ssd, skipped".to_string(),
            Err(_) => "unsupported".to_string(),
        };
        println!(
            "{:<14} {:<18} {:<6} {:<5} {:>10}  {:<16} {}",
            device.name,
            device.path,
            device.fs_type.as_deref().unwrap_or("-"),
            device.media(),
            humansize::format_size(device.size, humansize::BINARY),
            device.mountpoint.as_deref().unwrap_or("-"),
            status
        );
    }

    Ok(())
}

pub fn parse_lsblk(json: &str) -> Result<Vec<BlockDevice>> {
    let v: Value = serde_json::from_str(json).context("lsblk produced invalid JSON")?;
    let mut devices = Vec::new();
    if let Some(roots) = v["blockdevices"].as_array() {
        for dev in roots {
            collect(dev, &mut devices);
        }
    }
    Ok(devices)
}

fn collect(dev: &Value, out: &mut Vec<BlockDevice>) {
    let Some(name) = str_opt(&dev["name"]) else {
        return;
    };
    let path = str_opt(&dev["path"]).unwrap_or_else(|| format!("/dev/{}", name));

    out.push(BlockDevice {
        name,
        path,
        device_type: str_opt(&dev["type"]).unwrap_or_default(),
        size: u64_lenient(&dev["size"]).unwrap_or(0),
        fs_type: str_opt(&dev["fstype"]),
        mountpoint: str_opt(&dev["mountpoint"]),
        rotational: bool_lenient(&dev["rota"]),
    });

    if let Some(children) = dev["children"].as_array() {
        for child in children {
            collect(child, out);
        }
    }
}

fn str_opt(v: &Value) -> Option<String> {
    v.as_str()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

// Older lsblk releases print numbers and flags as strings.
fn u64_lenient(v: &Value) -> Option<u64> {
    v.as_u64().or_else(|| v.as_str()?.trim().parse().ok())
}

fn bool_lenient(v: &Value) -> Option<bool> {
    match v {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_u64().map(|n| n != 0),
        Value::String(s) => match s.trim() {
            "1" | "true" => Some(true),
            "0" | "false" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const LSBLK_JSON: &str = r#"{
       "blockdevices": [
          {"name":"sda", "path":"/dev/sda", "type":"disk", "size":1000204886016, "fstype":null, "mountpoint":null, "rota":true,
             "children": [
                {"name":"sda1", "path":"/dev/sda1", "type":"part", "size":536870912, "fstype":"vfat", "mountpoint":"/boot/efi", "rota":true},
                {"name":"sda2", "path":"/dev/sda2", "type":"part", "size":999666221056, "fstype":"ext4", "mountpoint":"/data", "rota":true}
             ]
          },
          {"name":"nvme0n1", "path":"/dev/nvme0n1", "type":"disk", "size":512110190592, "fstype":null, "mountpoint":null, "rota":false,
             "children": [
                {"name":"nvme0n1p1", "path":"/dev/nvme0n1p1", "type":"part", "size":512110190592, "fstype":"ext4", "mountpoint":"/", "rota":false}
             ]
          }
       ]
    }"#;

    fn device(fs: Option<&str>, rotational: Option<bool>) -> BlockDevice {
        BlockDevice {
            name: "sdb1".into(),
            path: "/dev/sdb1".into(),
            device_type: "part".into(),
            size: 0,
            fs_type: fs.map(String::from),
            mountpoint: None,
            rotational,
        }
    }

    #[test]
    fn finds_devices_by_path_or_name() {
        let devices = parse_lsblk(LSBLK_JSON).expect("parse");
        let by_name = find_device(devices.clone(), "sda2").expect("by name");
        let by_path = find_device(devices.clone(), "/dev/sda2").expect("by path");
        assert_eq!(by_name, by_path);
        assert!(find_device(devices, "sdz9").is_err());
    }

    #[test]
    fn flattens_partitions_in_order() {
        let devices = parse_lsblk(LSBLK_JSON).expect("parse");
        let names: Vec<&str> = devices.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["sda", "sda1", "sda2", "nvme0n1", "nvme0n1p1"]);

        let data = &devices[2];
        assert_eq!(data.path, "/dev/sda2");
        assert_eq!(data.fs_type.as_deref(), Some("ext4"));
        assert_eq!(data.mountpoint.as_deref(), Some("/data"));
        assert_eq!(data.media(), MediaKind::Hdd);
        assert!(data.check_eligible().is_ok());

        assert_eq!(devices[4].media(), MediaKind::Ssd);
    }

    #[test]
    fn accepts_legacy_string_fields() {
        let json = r#"{"blockdevices":[{"name":"sdc","type":"disk","size":"4096","fstype":"ext4","rota":"0"}]}"#;
        let devices = parse_lsblk(json).expect("parse");
        assert_eq!(devices[0].path, "/dev/sdc");
        assert_eq!(devices[0].size, 4096);
        assert_eq!(devices[0].rotational, Some(false));
    }

    #[test]
    fn missing_rotational_flag_is_hdd() {
        assert_eq!(device(Some("ext4"), None).media(), MediaKind::Hdd);
        assert!(device(Some("ext4"), None).check_eligible().is_ok());
    }

    #[test]
    fn rejects_ssd_before_filesystem() {
        assert_eq!(
            device(Some("xfs"), Some(false)).check_eligible(),
            Err(FragError::UnsupportedDevice(UnsupportedReason::IsSsd))
        );
        assert_eq!(
            device(Some("xfs"), Some(true)).check_eligible(),
            Err(FragError::UnsupportedDevice(UnsupportedReason::NotExt4))
        );
        assert_eq!(
            device(None, Some(true)).check_eligible(),
            Err(FragError::UnsupportedDevice(UnsupportedReason::NotExt4))
        );
        assert!(device(Some("EXT4"), Some(true)).check_eligible().is_ok());
    }

    #[test]
    fn matches_path_or_name() {
        let dev = device(Some("ext4"), Some(true));
        assert!(dev.matches("/dev/sdb1"));
        assert!(dev.matches("sdb1"));
        assert!(!dev.matches("sdb"));
    }

    #[test]
    fn invalid_json_is_an_error() {
        assert!(parse_lsblk("not json").is_err());
    }
}
