//! Windows adapter management through PowerShell's NetAdapter cmdlets

use std::process::Command;

use serde::Deserialize;

use super::{AdapterPlatform, NetworkAdapter, NetworkError};

const LIST_SCRIPT: &str = concat!(
    "Get-NetAdapter",
    " | Select-Object InterfaceGuid, Name, Status, PhysicalMediaType",
    " | ConvertTo-Json -Compress"
);

/// One row of `Get-NetAdapter` output
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct NetAdapterRow {
    interface_guid: String,
    name: String,
    status: Option<String>,
    physical_media_type: Option<String>,
}

impl From<NetAdapterRow> for NetworkAdapter {
    fn from(row: NetAdapterRow) -> Self {
        Self {
            enabled: !row
                .status
                .as_deref()
                .is_some_and(|s| s.eq_ignore_ascii_case("Disabled")),
            id: row.interface_guid,
            name: row.name,
            kind: row.physical_media_type.filter(|t| !t.is_empty()),
        }
    }
}

/// `ConvertTo-Json` emits a bare object for a single adapter
#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(NetAdapterRow),
    Many(Vec<NetAdapterRow>),
}

/// Parse `Get-NetAdapter | ConvertTo-Json` output
pub fn parse_adapter_json(json: &str) -> Result<Vec<NetworkAdapter>, NetworkError> {
    let json = json.trim();
    if json.is_empty() {
        return Ok(Vec::new());
    }

    let rows = match serde_json::from_str::<OneOrMany>(json)? {
        OneOrMany::One(row) => vec![row],
        OneOrMany::Many(rows) => rows,
    };
    Ok(rows.into_iter().map(NetworkAdapter::from).collect())
}

/// Adapter platform backed by `powershell.exe`
///
/// Toggling requires an elevated process.
#[derive(Debug, Clone)]
pub struct PowerShellPlatform {
    executable: String,
}

impl Default for PowerShellPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl PowerShellPlatform {
    pub fn new() -> Self {
        Self {
            executable: "powershell".to_string(),
        }
    }

    /// Use another shell binary, e.g. `pwsh`
    pub fn with_executable(executable: impl Into<String>) -> Self {
        Self {
            executable: executable.into(),
        }
    }

    fn run(&self, script: &str) -> Result<std::process::Output, NetworkError> {
        Command::new(&self.executable)
            .args(["-NoProfile", "-NonInteractive", "-Command", script])
            .output()
            .map_err(|source| NetworkError::Command {
                command: self.executable.clone(),
                source,
            })
    }
}

impl AdapterPlatform for PowerShellPlatform {
    fn list(&self) -> Result<Vec<NetworkAdapter>, NetworkError> {
        let output = self.run(LIST_SCRIPT)?;
        if !output.status.success() {
            return Err(NetworkError::Platform(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }

        parse_adapter_json(&String::from_utf8_lossy(&output.stdout))
    }

    fn set_enabled(&self, id: &str, enabled: bool) -> Result<bool, NetworkError> {
        if !is_guid(id) {
            return Ok(false);
        }

        let cmdlet = if enabled {
            "Enable-NetAdapter"
        } else {
            "Disable-NetAdapter"
        };
        let script = format!(
            "$ErrorActionPreference = 'Stop'; \
             Get-NetAdapter | Where-Object InterfaceGuid -eq '{}' | {} -Confirm:$false",
            id, cmdlet
        );

        let output = self.run(&script)?;
        if !output.status.success() {
            log::error!(
                "{} failed for {}: {}",
                cmdlet,
                id,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(output.status.success())
    }
}

/// Ids are interpolated into a script, so only GUID characters are accepted
fn is_guid(id: &str) -> bool {
    let guid_char = |c: char| c.is_ascii_hexdigit() || matches!(c, '{' | '}' | '-');
    !id.is_empty() && id.chars().all(guid_char)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_adapter_list() {
        let json = r#"[
            {
                "InterfaceGuid": "{1111-AAAA}",
                "Name": "Wi-Fi",
                "Status": "Up",
                "PhysicalMediaType": "Native 802.11"
            },
            {
                "InterfaceGuid": "{2222-BBBB}",
                "Name": "Ethernet",
                "Status": "Disabled",
                "PhysicalMediaType": "802.3"
            }
        ]"#;

        let adapters = parse_adapter_json(json).unwrap();
        assert_eq!(adapters.len(), 2);
        assert_eq!(adapters[0].id, "{1111-AAAA}");
        assert!(adapters[0].enabled);
        assert_eq!(adapters[0].kind.as_deref(), Some("Native 802.11"));
        assert_eq!(adapters[1].name, "Ethernet");
        assert!(!adapters[1].enabled);
    }

    #[test]
    fn test_parse_single_adapter_object() {
        let json = r#"{
            "InterfaceGuid": "{3333}",
            "Name": "Ethernet 2",
            "Status": "Disconnected",
            "PhysicalMediaType": ""
        }"#;

        let adapters = parse_adapter_json(json).unwrap();
        assert_eq!(adapters.len(), 1);
        assert!(adapters[0].enabled);
        assert_eq!(adapters[0].kind, None);
    }

    #[test]
    fn test_parse_empty_output() {
        assert!(parse_adapter_json("  \r\n").unwrap().is_empty());
        assert!(parse_adapter_json("not json").is_err());
    }

    #[test]
    fn test_guid_check_blocks_script_injection() {
        assert!(is_guid("{4D36E972-E325-11CE-BFC1-08002BE10318}"));
        assert!(!is_guid("x'; Remove-Item C:\\ -Recurse; '"));
        assert!(!is_guid(""));
    }

    #[test]
    fn test_non_guid_toggle_is_refused_without_spawning() {
        let platform = PowerShellPlatform::with_executable("definitely-not-a-shell");
        assert!(!platform.set_enabled("Wi-Fi", false).unwrap());
    }
}
