//! 도메인 타입 — 시스템 전역에서 사용되는 공통 타입
//!
//! 장비([`Device`]), 인터페이스([`Interface`]), 수집기가 전달하는
//! 이웃 관측([`NeighborRecord`])과 이를 둘러싼 열거형을 정의합니다.
//! 링크와 스냅샷은 `topowatch-topology` 크레이트가 소유합니다.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 시스템 전역 타임스탬프 타입
pub type Timestamp = DateTime<Utc>;

// ─── 식별자 ──────────────────────────────────────────────────────────

/// 장비 식별자
///
/// 레지스트리 안에서 유일합니다. 정렬 순서는 경로 순위 결정의
/// 마지막 기준(사전순 장비 ID 시퀀스)으로 사용됩니다.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    /// 새 장비 식별자를 생성합니다.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// 문자열 슬라이스로 반환합니다.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DeviceId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for DeviceId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// 인터페이스 식별자 (소유 장비 안에서만 유일)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InterfaceId(String);

impl InterfaceId {
    /// 새 인터페이스 식별자를 생성합니다.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// 문자열 슬라이스로 반환합니다.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InterfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for InterfaceId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for InterfaceId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

// ─── Severity ────────────────────────────────────────────────────────

/// 이벤트 심각도
///
/// `Ord` 구현으로 비교가 가능합니다 (`Info < Warning < Error < Critical`).
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// 정보성 이벤트
    #[default]
    Info,
    /// 운영자 확인 권장 (식별 실패, 수집기 장애)
    Warning,
    /// 운영자 조치 필요 (그래프 충돌)
    Error,
    /// 치명적, 저장소 쓰기 중단
    Critical,
}

impl Severity {
    /// 문자열에서 심각도를 파싱합니다.
    ///
    /// 대소문자를 구분하지 않습니다.
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "info" | "informational" => Some(Self::Info),
            "warning" | "warn" => Some(Self::Warning),
            "error" | "err" => Some(Self::Error),
            "critical" | "crit" => Some(Self::Critical),
            _ => None,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

// ─── Vendor ──────────────────────────────────────────────────────────

/// 장비 제조사
///
/// 표시 이름과 아이콘 키는 [`VENDOR_TABLE`] 조회 테이블에서 가져옵니다.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Vendor {
    Cisco,
    Juniper,
    Arista,
    Dell,
    Fortinet,
    Hpe,
    #[default]
    Other,
}

/// 제조사 조회 테이블 항목
#[derive(Debug, Clone, Copy)]
pub struct VendorInfo {
    /// 제조사
    pub vendor: Vendor,
    /// 표시 이름
    pub label: &'static str,
    /// 협업 UI가 사용하는 아이콘 키
    pub icon: &'static str,
    /// 느슨한 파싱에 쓰이는 별칭 (소문자)
    pub aliases: &'static [&'static str],
}

/// 제조사 조회 테이블
pub const VENDOR_TABLE: &[VendorInfo] = &[
    VendorInfo {
        vendor: Vendor::Cisco,
        label: "Cisco",
        icon: "vendor-cisco",
        aliases: &["cisco", "cisco systems", "ciscosystems"],
    },
    VendorInfo {
        vendor: Vendor::Juniper,
        label: "Juniper",
        icon: "vendor-juniper",
        aliases: &["juniper", "juniper networks", "junos"],
    },
    VendorInfo {
        vendor: Vendor::Arista,
        label: "Arista",
        icon: "vendor-arista",
        aliases: &["arista", "arista networks", "eos"],
    },
    VendorInfo {
        vendor: Vendor::Dell,
        label: "Dell",
        icon: "vendor-dell",
        aliases: &["dell", "dell emc", "force10"],
    },
    VendorInfo {
        vendor: Vendor::Fortinet,
        label: "Fortinet",
        icon: "vendor-fortinet",
        aliases: &["fortinet", "fortigate", "fortiswitch"],
    },
    VendorInfo {
        vendor: Vendor::Hpe,
        label: "HPE",
        icon: "vendor-hpe",
        aliases: &["hpe", "hp", "aruba", "hewlett packard enterprise"],
    },
    VendorInfo {
        vendor: Vendor::Other,
        label: "Other",
        icon: "vendor-generic",
        aliases: &[],
    },
];

impl Vendor {
    /// 조회 테이블 항목을 반환합니다.
    pub fn info(self) -> &'static VendorInfo {
        VENDOR_TABLE
            .iter()
            .find(|entry| entry.vendor == self)
            .unwrap_or(&VENDOR_TABLE[VENDOR_TABLE.len() - 1])
    }

    /// 표시 이름
    pub fn label(self) -> &'static str {
        self.info().label
    }

    /// 아이콘 키
    pub fn icon(self) -> &'static str {
        self.info().icon
    }

    /// 자유 형식 문자열(sysDescr, 인벤토리 값)에서 제조사를 추정합니다.
    ///
    /// 알 수 없는 값은 [`Vendor::Other`]가 됩니다.
    pub fn from_str_loose(s: &str) -> Self {
        let lower = s.trim().to_lowercase();
        VENDOR_TABLE
            .iter()
            .find(|entry| {
                entry
                    .aliases
                    .iter()
                    .any(|alias| lower == *alias || lower.starts_with(&format!("{alias} ")))
            })
            .map_or(Self::Other, |entry| entry.vendor)
    }
}

impl fmt::Display for Vendor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ─── 상태 열거형 ─────────────────────────────────────────────────────

/// 장비 상태
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceStatus {
    Up,
    Down,
    Warning,
    #[default]
    Unknown,
}

impl fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Up => write!(f, "up"),
            Self::Down => write!(f, "down"),
            Self::Warning => write!(f, "warning"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// 인터페이스 운용 상태 (ifOperStatus)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperStatus {
    Up,
    Down,
    Testing,
    #[default]
    Unknown,
}

impl fmt::Display for OperStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Up => write!(f, "up"),
            Self::Down => write!(f, "down"),
            Self::Testing => write!(f, "testing"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// 듀플렉스 모드
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Duplex {
    Full,
    Half,
    #[default]
    Unknown,
}

// ─── DiscoveryProtocol ───────────────────────────────────────────────

/// 링크 근거를 제공한 탐색 프로토콜
///
/// `Manual`은 운영자가 직접 등록한 링크이며, 수집기는 생성할 수 없습니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DiscoveryProtocol {
    #[serde(rename = "lldp")]
    Lldp,
    #[serde(rename = "cdp")]
    Cdp,
    #[serde(rename = "snmp-bridge")]
    SnmpBridge,
    #[serde(rename = "manual")]
    Manual,
}

impl DiscoveryProtocol {
    /// 수집기가 보고할 수 있는 프로토콜인지 여부
    pub fn is_collectable(self) -> bool {
        !matches!(self, Self::Manual)
    }

    /// 문자열에서 프로토콜을 파싱합니다.
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "lldp" => Some(Self::Lldp),
            "cdp" => Some(Self::Cdp),
            "snmp-bridge" | "snmp_bridge" | "snmp" | "bridge" => Some(Self::SnmpBridge),
            "manual" => Some(Self::Manual),
            _ => None,
        }
    }
}

impl fmt::Display for DiscoveryProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lldp => write!(f, "lldp"),
            Self::Cdp => write!(f, "cdp"),
            Self::SnmpBridge => write!(f, "snmp-bridge"),
            Self::Manual => write!(f, "manual"),
        }
    }
}

// ─── MacAddress ──────────────────────────────────────────────────────

/// 정규화된 48비트 MAC 주소
///
/// `aa:bb:cc:dd:ee:ff`, `aa-bb-cc-dd-ee-ff`, `aabb.ccdd.eeff`,
/// `aabbccddeeff` 형식을 모두 받아들이고 콜론 소문자 형식으로 출력합니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MacAddress([u8; 6]);

impl MacAddress {
    /// 옥텟 배열로 MAC 주소를 생성합니다.
    pub const fn new(octets: [u8; 6]) -> Self {
        Self(octets)
    }

    /// 옥텟 배열
    pub fn octets(&self) -> [u8; 6] {
        self.0
    }
}

impl FromStr for MacAddress {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex: String = s
            .trim()
            .chars()
            .filter(|c| !matches!(c, ':' | '-' | '.'))
            .collect();
        if hex.len() != 12 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(format!("invalid mac address: {s}"));
        }
        let mut octets = [0u8; 6];
        for (i, octet) in octets.iter_mut().enumerate() {
            *octet = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16)
                .map_err(|e| format!("invalid mac address: {s}: {e}"))?;
        }
        Ok(Self(octets))
    }
}

impl TryFrom<String> for MacAddress {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<MacAddress> for String {
    fn from(mac: MacAddress) -> Self {
        mac.to_string()
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

// ─── Interface / Device ──────────────────────────────────────────────

/// 장비 인터페이스
///
/// 정확히 하나의 [`Device`]가 소유합니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interface {
    /// 인터페이스 ID (장비 내 유일)
    pub id: InterfaceId,
    /// SNMP ifIndex
    pub if_index: u32,
    /// 인터페이스 이름 (예: `GigabitEthernet0/1`)
    pub name: String,
    /// 운용 상태
    #[serde(default)]
    pub oper_status: OperStatus,
    /// 속도 (bits/s)
    #[serde(default)]
    pub speed_bps: Option<u64>,
    /// 듀플렉스
    #[serde(default)]
    pub duplex: Duplex,
    /// MAC 주소
    #[serde(default)]
    pub mac: Option<MacAddress>,
}

impl Interface {
    /// 최소 정보로 인터페이스를 생성합니다 (상태 미상).
    pub fn new(id: impl Into<InterfaceId>, if_index: u32, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            if_index,
            name: name.into(),
            oper_status: OperStatus::Unknown,
            speed_bps: None,
            duplex: Duplex::Unknown,
            mac: None,
        }
    }

    /// 속도를 지정합니다.
    pub fn with_speed(mut self, speed_bps: u64) -> Self {
        self.speed_bps = Some(speed_bps);
        self
    }

    /// MAC 주소를 지정합니다.
    pub fn with_mac(mut self, mac: MacAddress) -> Self {
        self.mac = Some(mac);
        self
    }

    /// 운용 상태를 지정합니다.
    pub fn with_oper_status(mut self, status: OperStatus) -> Self {
        self.oper_status = status;
        self
    }

    /// 원격 포트 식별자가 이 인터페이스를 가리키는지 확인합니다.
    ///
    /// 인터페이스 ID, 이름(대소문자 무시), ifIndex, MAC 순으로 비교합니다.
    pub fn matches_port_id(&self, port_id: &str) -> bool {
        let port_id = port_id.trim();
        if self.id.as_str() == port_id || self.name.eq_ignore_ascii_case(port_id) {
            return true;
        }
        if port_id.parse::<u32>().is_ok_and(|idx| idx == self.if_index) {
            return true;
        }
        match (self.mac, port_id.parse::<MacAddress>()) {
            (Some(mine), Ok(theirs)) => mine == theirs,
            _ => false,
        }
    }
}

/// 네트워크 장비
///
/// 최초 탐색 또는 수동 등록 시 생성되며, 수집 사이클이 `status`와
/// `last_seen`을 갱신합니다. 암묵적으로 삭제되지 않습니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    /// 장비 ID
    pub id: DeviceId,
    /// 호스트명
    pub hostname: String,
    /// FQDN
    #[serde(default)]
    pub fqdn: Option<String>,
    /// 제조사
    #[serde(default)]
    pub vendor: Vendor,
    /// 모델명
    #[serde(default)]
    pub model: String,
    /// OS 버전 문자열
    #[serde(default)]
    pub os: String,
    /// LLDP/CDP로 광고되는 섀시 ID
    #[serde(default)]
    pub chassis_id: Option<String>,
    /// 관리 IP 주소 집합
    #[serde(default)]
    pub ip_addresses: BTreeSet<IpAddr>,
    /// 인터페이스 목록 (순서 유지)
    #[serde(default)]
    pub interfaces: Vec<Interface>,
    /// 장비 상태
    #[serde(default)]
    pub status: DeviceStatus,
    /// 마지막 관측 시각
    #[serde(default)]
    pub last_seen: Option<Timestamp>,
    /// 설치 위치
    #[serde(default)]
    pub location: Option<String>,
    /// 역할 참조 (엔진은 해석하지 않음)
    #[serde(default)]
    pub role_refs: Vec<String>,
    /// 자격 증명 참조 (엔진은 해석하지 않음)
    #[serde(default)]
    pub credential_refs: Vec<String>,
    /// 레이블
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    /// 태그
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Device {
    /// 최소 정보로 장비를 생성합니다.
    pub fn new(id: impl Into<DeviceId>, hostname: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            hostname: hostname.into(),
            fqdn: None,
            vendor: Vendor::Other,
            model: String::new(),
            os: String::new(),
            chassis_id: None,
            ip_addresses: BTreeSet::new(),
            interfaces: Vec::new(),
            status: DeviceStatus::Unknown,
            last_seen: None,
            location: None,
            role_refs: Vec::new(),
            credential_refs: Vec::new(),
            labels: BTreeMap::new(),
            tags: Vec::new(),
        }
    }

    /// 인터페이스를 추가합니다.
    pub fn with_interface(mut self, interface: Interface) -> Self {
        self.interfaces.push(interface);
        self
    }

    /// 섀시 ID를 지정합니다.
    pub fn with_chassis_id(mut self, chassis_id: impl Into<String>) -> Self {
        self.chassis_id = Some(chassis_id.into());
        self
    }

    /// 관리 IP를 추가합니다.
    pub fn with_ip(mut self, ip: IpAddr) -> Self {
        self.ip_addresses.insert(ip);
        self
    }

    /// 제조사를 지정합니다.
    pub fn with_vendor(mut self, vendor: Vendor) -> Self {
        self.vendor = vendor;
        self
    }

    /// 장비 상태를 지정합니다.
    pub fn with_status(mut self, status: DeviceStatus) -> Self {
        self.status = status;
        self
    }

    /// ID로 인터페이스를 조회합니다.
    pub fn interface(&self, id: &InterfaceId) -> Option<&Interface> {
        self.interfaces.iter().find(|iface| &iface.id == id)
    }

    /// ID로 인터페이스를 가변 조회합니다.
    pub fn interface_mut(&mut self, id: &InterfaceId) -> Option<&mut Interface> {
        self.interfaces.iter_mut().find(|iface| &iface.id == id)
    }

    /// 원격 포트 식별자로 인터페이스를 찾습니다.
    pub fn resolve_port(&self, port_id: &str) -> Option<&Interface> {
        self.interfaces
            .iter()
            .find(|iface| iface.matches_port_id(port_id))
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}) vendor={} status={} interfaces={}",
            self.hostname,
            self.id,
            self.vendor,
            self.status,
            self.interfaces.len(),
        )
    }
}

// ─── NeighborRecord ──────────────────────────────────────────────────

/// 수집기가 전달하는 디코딩된 이웃 관측 1건
///
/// 수집 파이프라인이 소비하며, 추가 전용 수집 로그 외에는
/// 그대로 저장되지 않습니다.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NeighborRecord {
    /// 보고 장비 ID
    pub local_device_id: DeviceId,
    /// 보고 장비의 로컬 인터페이스 ID
    pub local_interface_id: InterfaceId,
    /// 원격 섀시 ID
    pub remote_chassis_id: String,
    /// 원격 포트 ID
    pub remote_port_id: String,
    /// 원격 시스템 이름
    #[serde(default)]
    pub remote_system_name: Option<String>,
    /// 원격 관리 IP (LLDP management address TLV 등)
    #[serde(default)]
    pub remote_mgmt_ip: Option<IpAddr>,
    /// 프로토콜
    pub protocol: DiscoveryProtocol,
    /// 관측 시각
    pub observed_at: Timestamp,
}

impl fmt::Display for NeighborRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} -> chassis={} port={} via {}",
            self.local_device_id,
            self.local_interface_id,
            self.remote_chassis_id,
            self.remote_port_id,
            self.protocol,
        )
    }
}
