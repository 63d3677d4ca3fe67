//! 수집기 어댑터 — 장비별 이웃 레코드 공급자
//!
//! 실제 LLDP/CDP/SNMP 프로토콜 처리는 어댑터 바깥의 몫이며, 엔진은
//! 디코딩된 [`NeighborRecord`]만 받습니다. 에러는 시간 초과/사용 불가/거부로
//! 분류되어 돌아와야 합니다.
//!
//! - [`StaticAdapter`]: 메모리에 올려 둔 레코드 (CLI 오프라인 수집, 테스트)
//! - [`FileAdapter`]: `<records_dir>/<device_id>.json` 파일을 매 호출마다 다시 읽음

use std::collections::BTreeMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use tracing::debug;

use topowatch_core::types::{Device, DeviceId, Interface, NeighborRecord};

use crate::error::DiscoveryError;

/// 수집기 어댑터 trait
///
/// 한 번의 호출은 유한한 레코드 목록을 돌려주며, 같은 장비에 대해
/// 언제든 다시 호출할 수 있어야 합니다.
pub trait CollectorAdapter: Send + Sync + 'static {
    /// 어댑터 이름 (로그용)
    fn name(&self) -> &str;

    /// 장비의 이웃 레코드를 수집합니다.
    fn collect(
        &self,
        device: &Device,
    ) -> impl Future<Output = Result<Vec<NeighborRecord>, DiscoveryError>> + Send;

    /// 장비의 인터페이스 상태(운용 상태, 속도)를 조회합니다.
    ///
    /// 기본 구현은 아무것도 보고하지 않습니다.
    fn poll_interfaces(
        &self,
        _device: &Device,
    ) -> impl Future<Output = Result<Vec<Interface>, DiscoveryError>> + Send {
        std::future::ready(Ok(Vec::new()))
    }
}

// ─── 레코드 문서 ─────────────────────────────────────────────────────

/// 장비 하나의 수집 결과 묶음
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceRecords {
    /// 폴링된 인터페이스 상태
    #[serde(default)]
    pub interfaces: Vec<Interface>,
    /// 이웃 레코드
    #[serde(default)]
    pub records: Vec<NeighborRecord>,
}

/// 레코드 파일 형식
///
/// 이웃 레코드 배열만 있어도 되고, 인터페이스를 함께 담은 객체여도 됩니다.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum RecordsDocument {
    Records(Vec<NeighborRecord>),
    Full(DeviceRecords),
}

impl From<RecordsDocument> for DeviceRecords {
    fn from(doc: RecordsDocument) -> Self {
        match doc {
            RecordsDocument::Records(records) => Self {
                interfaces: Vec::new(),
                records,
            },
            RecordsDocument::Full(full) => full,
        }
    }
}

/// 여러 장비의 레코드를 담은 픽스처 파일 형식
///
/// 장비 ID를 키로 하는 객체이거나, `local_device_id`로 묶을 평면 배열입니다.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum FixtureDocument {
    Flat(Vec<NeighborRecord>),
    ByDevice(BTreeMap<String, RecordsDocument>),
}

// ─── StaticAdapter ───────────────────────────────────────────────────

/// 메모리 기반 어댑터
///
/// 등록되지 않은 장비는 [`DiscoveryError::AdapterUnavailable`]입니다.
#[derive(Default)]
pub struct StaticAdapter {
    devices: RwLock<BTreeMap<DeviceId, DeviceRecords>>,
}

impl StaticAdapter {
    /// 빈 어댑터를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 장비의 수집 결과를 지정합니다 (빌더 형태).
    pub fn with_device(self, device_id: impl Into<DeviceId>, records: DeviceRecords) -> Self {
        self.set_device(device_id, records);
        self
    }

    /// 장비의 수집 결과를 교체합니다.
    pub fn set_device(&self, device_id: impl Into<DeviceId>, records: DeviceRecords) {
        self.devices
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(device_id.into(), records);
    }

    /// 장비의 이웃 레코드만 교체합니다.
    pub fn set_records(&self, device_id: impl Into<DeviceId>, records: Vec<NeighborRecord>) {
        self.devices
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(device_id.into())
            .or_default()
            .records = records;
    }

    /// 장비를 제거합니다. 이후 수집은 사용 불가 에러가 됩니다.
    pub fn remove_device(&self, device_id: &DeviceId) {
        self.devices
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(device_id);
    }

    /// 레코드가 등록된 장비 목록
    pub fn device_ids(&self) -> Vec<DeviceId> {
        self.devices
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    /// 픽스처 파일에서 어댑터를 만듭니다.
    pub async fn from_fixture_file(path: impl AsRef<Path>) -> Result<Self, DiscoveryError> {
        let path = path.as_ref();
        let content =
            tokio::fs::read_to_string(path)
                .await
                .map_err(|e| DiscoveryError::Records {
                    path: path.display().to_string(),
                    reason: e.to_string(),
                })?;
        Self::from_fixture_str(&content).map_err(|reason| DiscoveryError::Records {
            path: path.display().to_string(),
            reason,
        })
    }

    /// 픽스처 JSON 문자열에서 어댑터를 만듭니다.
    pub fn from_fixture_str(content: &str) -> Result<Self, String> {
        let doc: FixtureDocument = serde_json::from_str(content).map_err(|e| e.to_string())?;
        let adapter = Self::new();
        match doc {
            FixtureDocument::Flat(records) => {
                let mut grouped: BTreeMap<DeviceId, Vec<NeighborRecord>> = BTreeMap::new();
                for record in records {
                    grouped
                        .entry(record.local_device_id.clone())
                        .or_default()
                        .push(record);
                }
                for (device_id, records) in grouped {
                    adapter.set_records(device_id, records);
                }
            }
            FixtureDocument::ByDevice(map) => {
                for (device_id, doc) in map {
                    adapter.set_device(device_id, doc.into());
                }
            }
        }
        Ok(adapter)
    }

    fn lookup(&self, device_id: &DeviceId) -> Result<DeviceRecords, DiscoveryError> {
        self.devices
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(device_id)
            .cloned()
            .ok_or_else(|| DiscoveryError::AdapterUnavailable {
                device_id: device_id.to_string(),
                reason: "no records loaded for device".to_owned(),
            })
    }
}

impl CollectorAdapter for StaticAdapter {
    fn name(&self) -> &str {
        "static"
    }

    async fn collect(&self, device: &Device) -> Result<Vec<NeighborRecord>, DiscoveryError> {
        Ok(self.lookup(&device.id)?.records)
    }

    async fn poll_interfaces(&self, device: &Device) -> Result<Vec<Interface>, DiscoveryError> {
        Ok(self.lookup(&device.id)?.interfaces)
    }
}

// ─── FileAdapter ─────────────────────────────────────────────────────

/// 디렉토리의 장비별 JSON 파일을 읽는 어댑터
///
/// 외부 수집기가 `<dir>/<device_id>.json`을 갱신해 두면 다음 사이클에 반영됩니다.
pub struct FileAdapter {
    dir: PathBuf,
}

impl FileAdapter {
    /// 레코드 디렉토리로 생성합니다.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// 레코드 디렉토리
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// 장비의 레코드 파일 경로
    pub fn path_for(&self, device_id: &DeviceId) -> Result<PathBuf, DiscoveryError> {
        let id = device_id.as_str();
        if id.is_empty() || id.contains(['/', '\\']) || id.starts_with('.') {
            return Err(DiscoveryError::AdapterRejected {
                device_id: id.to_owned(),
                reason: "device id is not usable as a file name".to_owned(),
            });
        }
        Ok(self.dir.join(format!("{id}.json")))
    }

    async fn read(&self, device_id: &DeviceId) -> Result<DeviceRecords, DiscoveryError> {
        let path = self.path_for(device_id)?;
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) => {
                return Err(DiscoveryError::AdapterUnavailable {
                    device_id: device_id.to_string(),
                    reason: format!("{}: {e}", path.display()),
                });
            }
        };
        let doc: RecordsDocument =
            serde_json::from_str(&content).map_err(|e| DiscoveryError::AdapterRejected {
                device_id: device_id.to_string(),
                reason: format!("{}: {e}", path.display()),
            })?;
        debug!(device_id = %device_id, path = %path.display(), "records file loaded");
        Ok(doc.into())
    }
}

impl CollectorAdapter for FileAdapter {
    fn name(&self) -> &str {
        "file"
    }

    async fn collect(&self, device: &Device) -> Result<Vec<NeighborRecord>, DiscoveryError> {
        Ok(self.read(&device.id).await?.records)
    }

    async fn poll_interfaces(&self, device: &Device) -> Result<Vec<Interface>, DiscoveryError> {
        Ok(self.read(&device.id).await?.interfaces)
    }
}
