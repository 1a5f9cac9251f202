//! 에러 타입 -- 도메인별 에러 정의

/// imgwarden 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum WardenError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 외부 소스(인벤토리, 워크로드, 파인딩) 에러
    #[error("source error: {0}")]
    Source(#[from] SourceError),

    /// 스캔 주기 에러
    #[error("scan error: {0}")]
    Scan(#[from] ScanError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 외부 소스 에러
///
/// 주기 전체를 중단시키는 에러 범주입니다 (부분 스냅샷을 게시하지 않음).
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// 소스에 연결/인증할 수 없음
    #[error("{source_name} unavailable: {reason}")]
    Unavailable { source_name: String, reason: String },

    /// 호출 기한 초과
    #[error("{source_name} call timed out after {timeout_secs}s")]
    Timeout {
        source_name: String,
        timeout_secs: u64,
    },

    /// 페이지네이션 커서 실패
    #[error("pagination failed after {pages} page(s): {reason}")]
    Pagination { pages: usize, reason: String },
}

/// 스캔 주기 에러
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    /// 이전 주기가 아직 진행 중
    #[error("a scan cycle is already in progress")]
    AlreadyRunning,
}
