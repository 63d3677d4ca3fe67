//! 장비 인벤토리 — 폴링 대상 장비 목록 파일
//!
//! JSON 배열이거나 `{"devices": [...]}` 객체입니다. 각 항목은
//! [`Device`] 형식이며 `id`와 `hostname`만 필수입니다.

use std::collections::BTreeSet;
use std::path::Path;

use serde::Deserialize;
use tracing::{info, warn};

use topowatch_core::types::Device;
use topowatch_topology::TopologyStore;

use crate::error::DiscoveryError;

#[derive(Deserialize)]
#[serde(untagged)]
enum InventoryDocument {
    List(Vec<Device>),
    Wrapped { devices: Vec<Device> },
}

/// 인벤토리 JSON 문자열을 파싱합니다.
///
/// 같은 장비 ID가 두 번 나오면 거부합니다.
pub fn parse_inventory(content: &str) -> Result<Vec<Device>, String> {
    let doc: InventoryDocument = serde_json::from_str(content).map_err(|e| e.to_string())?;
    let devices = match doc {
        InventoryDocument::List(devices) | InventoryDocument::Wrapped { devices } => devices,
    };
    let mut seen = BTreeSet::new();
    for device in &devices {
        if device.id.as_str().is_empty() {
            return Err("device with empty id".to_owned());
        }
        if !seen.insert(device.id.clone()) {
            return Err(format!("duplicate device id '{}'", device.id));
        }
    }
    Ok(devices)
}

/// 인벤토리 파일을 읽습니다.
pub async fn load_inventory(path: impl AsRef<Path>) -> Result<Vec<Device>, DiscoveryError> {
    let path = path.as_ref();
    let records_err = |reason: String| DiscoveryError::Records {
        path: path.display().to_string(),
        reason,
    };
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| records_err(e.to_string()))?;
    parse_inventory(&content).map_err(records_err)
}

/// 장비들을 저장소에 등록합니다. 새 버전을 만든 장비 수를 반환합니다.
///
/// 저장소가 쓰기 중단 상태면 첫 실패에서 멈춥니다.
pub fn register_inventory(
    store: &TopologyStore,
    devices: Vec<Device>,
) -> Result<usize, DiscoveryError> {
    let total = devices.len();
    let mut changed = 0;
    for device in devices {
        let device_id = device.id.clone();
        match store.register_device(device) {
            Ok(outcome) if outcome.changed => changed += 1,
            Ok(_) => {}
            Err(e) if e.is_halt() => return Err(e.into()),
            Err(e) => warn!(device_id = %device_id, error = %e, "device registration rejected"),
        }
    }
    info!(total, changed, "inventory registered");
    Ok(changed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_list() {
        let devices = parse_inventory(
            r#"[{"id": "sw1", "hostname": "sw1.lab"}, {"id": "sw2", "hostname": "sw2.lab"}]"#,
        )
        .unwrap();
        assert_eq!(devices.len(), 2);
        assert_eq!(devices[1].hostname, "sw2.lab");
    }

    #[test]
    fn parses_wrapped_document() {
        let devices =
            parse_inventory(r#"{"devices": [{"id": "r1", "hostname": "r1"}]}"#).unwrap();
        assert_eq!(devices[0].id.as_str(), "r1");
    }

    #[test]
    fn rejects_duplicate_ids() {
        let err = parse_inventory(
            r#"[{"id": "sw1", "hostname": "a"}, {"id": "sw1", "hostname": "b"}]"#,
        )
        .unwrap_err();
        assert!(err.contains("duplicate"));
    }

    #[tokio::test]
    async fn missing_file_is_records_error() {
        let err = load_inventory("/nonexistent/topowatch/inventory.json")
            .await
            .unwrap_err();
        assert!(matches!(err, DiscoveryError::Records { .. }));
    }

    #[test]
    fn registration_is_idempotent() {
        use std::sync::Arc;
        use topowatch_core::event::{EventSink, MemoryEventSink};
        use topowatch_topology::TopologyConfig;

        let sink: Arc<dyn EventSink> = Arc::new(MemoryEventSink::new());
        let store = TopologyStore::new(TopologyConfig::default(), sink);
        let devices = parse_inventory(r#"[{"id": "sw1", "hostname": "sw1"}]"#).unwrap();
        assert_eq!(register_inventory(&store, devices.clone()).unwrap(), 1);
        assert_eq!(register_inventory(&store, devices).unwrap(), 0);
        assert_eq!(store.snapshot().device_count(), 1);
    }
}
