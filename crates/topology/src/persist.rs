//! 영속화 — 최신 스냅샷 테이블과 추가 전용 수집 로그
//!
//! - `snapshot.json`: 링크 ID를 키로 하는 최신 그래프 테이블. 임시 파일에 쓴 뒤
//!   rename으로 교체하므로 중간 상태가 남지 않습니다.
//! - `ingestion.jsonl`: 장비 사이클마다 `{device_id, timestamp, records}` 한 줄.
//!   재시작 시 스냅샷 위에 순서대로 재적용합니다. 재적용은 멱등입니다.
//!
//! 보고 장비의 사이클은 자기 증거 전체를 교체하므로, 장비별 마지막 항목만으로도
//! 같은 그래프를 재구성할 수 있습니다. 플러시 후 로그는 그 형태로 압축됩니다.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use topowatch_core::types::{DeviceId, Interface, NeighborRecord, Timestamp};

use crate::error::TopologyError;
use crate::snapshot::SnapshotTable;
use crate::store::TopologyStore;

/// 스냅샷 테이블 파일명
pub const SNAPSHOT_FILE: &str = "snapshot.json";
/// 수집 로그 파일명
pub const INGESTION_LOG_FILE: &str = "ingestion.jsonl";

fn io_err(path: &Path, err: impl std::fmt::Display) -> TopologyError {
    TopologyError::Io {
        path: path.display().to_string(),
        reason: err.to_string(),
    }
}

/// 수집 로그 한 줄
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestionLogEntry {
    /// 보고 장비
    pub device_id: DeviceId,
    /// 사이클 시각
    pub timestamp: Timestamp,
    /// 수집된 원본 이웃 레코드
    pub records: Vec<NeighborRecord>,
    /// 같은 사이클에 폴링된 인터페이스 상태
    #[serde(default)]
    pub interfaces: Vec<Interface>,
}

// ─── IngestionLog ────────────────────────────────────────────────────

/// 추가 전용 수집 로그
///
/// 여러 워커가 동시에 추가할 수 있으며, 한 줄 단위로 직렬화됩니다.
pub struct IngestionLog {
    path: PathBuf,
    file: Mutex<Option<tokio::fs::File>>,
}

impl IngestionLog {
    /// 로그 파일 경로로 생성합니다. 파일은 첫 추가 시 열립니다.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file: Mutex::new(None),
        }
    }

    /// 로그 파일 경로
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 항목 하나를 추가합니다.
    pub async fn append(&self, entry: &IngestionLogEntry) -> Result<(), TopologyError> {
        let mut line =
            serde_json::to_vec(entry).map_err(|e| TopologyError::Serialization(e.to_string()))?;
        line.push(b'\n');

        let mut guard = self.file.lock().await;
        if guard.is_none() {
            if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| io_err(parent, e))?;
            }
            let file = tokio::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)
                .await
                .map_err(|e| io_err(&self.path, e))?;
            *guard = Some(file);
        }
        if let Some(file) = guard.as_mut() {
            file.write_all(&line)
                .await
                .map_err(|e| io_err(&self.path, e))?;
            file.flush().await.map_err(|e| io_err(&self.path, e))?;
        }
        Ok(())
    }

    /// 전체 항목을 기록 순서대로 읽습니다.
    ///
    /// 파일이 없으면 빈 목록입니다. 손상된 줄은 경고 후 건너뜁니다.
    pub async fn read_all(&self) -> Result<Vec<IngestionLogEntry>, TopologyError> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_err(&self.path, e)),
        };
        let mut entries = Vec::new();
        for (lineno, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<IngestionLogEntry>(line) {
                Ok(entry) => entries.push(entry),
                Err(e) => warn!(
                    path = %self.path.display(),
                    line = lineno + 1,
                    error = %e,
                    "skipping malformed ingestion log line"
                ),
            }
        }
        Ok(entries)
    }

    /// 장비별 마지막 항목만 남기도록 로그를 다시 씁니다.
    ///
    /// 남은 항목 수를 반환합니다.
    pub async fn compact(&self) -> Result<usize, TopologyError> {
        let mut guard = self.file.lock().await;
        let entries = self.read_all().await?;
        let mut latest: BTreeMap<DeviceId, IngestionLogEntry> = BTreeMap::new();
        for entry in entries {
            latest.insert(entry.device_id.clone(), entry);
        }
        let mut kept: Vec<IngestionLogEntry> = latest.into_values().collect();
        kept.sort_by(|a, b| {
            a.timestamp
                .cmp(&b.timestamp)
                .then_with(|| a.device_id.cmp(&b.device_id))
        });

        let mut buf = Vec::new();
        for entry in &kept {
            serde_json::to_writer(&mut buf, entry)
                .map_err(|e| TopologyError::Serialization(e.to_string()))?;
            buf.push(b'\n');
        }
        write_atomic(&self.path, &buf).await?;
        // 다음 추가는 새 파일을 엽니다.
        *guard = None;
        debug!(path = %self.path.display(), entries = kept.len(), "ingestion log compacted");
        Ok(kept.len())
    }
}

// ─── 스냅샷 테이블 ───────────────────────────────────────────────────

/// 임시 파일에 쓴 뒤 rename으로 교체합니다.
async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), TopologyError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| io_err(parent, e))?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    tokio::fs::write(&tmp, bytes)
        .await
        .map_err(|e| io_err(&tmp, e))?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| io_err(path, e))
}

/// 스냅샷 테이블을 파일에 씁니다.
pub async fn write_snapshot_table(
    path: &Path,
    table: &SnapshotTable,
) -> Result<(), TopologyError> {
    let bytes = serde_json::to_vec_pretty(table)
        .map_err(|e| TopologyError::Serialization(e.to_string()))?;
    write_atomic(path, &bytes).await
}

/// 스냅샷 테이블을 읽습니다. 파일이 없으면 `None`입니다.
pub async fn read_snapshot_table(path: &Path) -> Result<Option<SnapshotTable>, TopologyError> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(io_err(path, e)),
    };
    serde_json::from_str(&content)
        .map(Some)
        .map_err(|e| TopologyError::Serialization(format!("{}: {e}", path.display())))
}

// ─── Persistence ─────────────────────────────────────────────────────

/// 데이터 디렉토리 아래의 영속 파일 묶음
pub struct Persistence {
    snapshot_path: PathBuf,
    log: Option<Arc<IngestionLog>>,
}

impl Persistence {
    /// 데이터 디렉토리로 생성합니다.
    pub fn new(data_dir: impl AsRef<Path>, ingestion_log: bool) -> Self {
        let dir = data_dir.as_ref();
        Self {
            snapshot_path: dir.join(SNAPSHOT_FILE),
            log: ingestion_log.then(|| Arc::new(IngestionLog::new(dir.join(INGESTION_LOG_FILE)))),
        }
    }

    /// 스냅샷 테이블 경로
    pub fn snapshot_path(&self) -> &Path {
        &self.snapshot_path
    }

    /// 수집 로그 (비활성화 시 `None`)
    ///
    /// 수집 엔진과 공유할 수 있도록 `Arc`로 반환합니다.
    pub fn log(&self) -> Option<Arc<IngestionLog>> {
        self.log.clone()
    }

    /// 저장된 스냅샷 테이블을 읽습니다.
    pub async fn load_table(&self) -> Result<Option<SnapshotTable>, TopologyError> {
        read_snapshot_table(&self.snapshot_path).await
    }

    /// 현재 스냅샷을 저장하고 수집 로그를 압축합니다.
    ///
    /// 저장한 스냅샷 버전을 반환합니다.
    pub async fn flush(&self, store: &TopologyStore) -> Result<u64, TopologyError> {
        let snapshot = store.snapshot();
        write_snapshot_table(&self.snapshot_path, &snapshot.to_table()).await?;
        if let Some(log) = &self.log {
            log.compact().await?;
        }
        info!(
            version = snapshot.version(),
            path = %self.snapshot_path.display(),
            "topology snapshot flushed"
        );
        Ok(snapshot.version())
    }
}
