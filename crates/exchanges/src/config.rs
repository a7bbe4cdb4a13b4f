use std::env;
use std::fmt;
use std::sync::Once;
use std::time::Duration;

use thiserror::Error;
use tracing::info;

use crate::transport::DEFAULT_TIMEOUT;

static DOTENV: Once = Once::new();

/// `.env` 파일은 프로세스당 한 번만 읽는다.
fn load_dotenv() {
    DOTENV.call_once(|| {
        dotenv::dotenv().ok();
    });
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("{0} not found")]
    MissingVar(String),
}

/// 거래소 API 인증 정보
#[derive(Clone, Default)]
pub struct Credentials {
    pub api_key: String,
    pub secret: String,
    /// OKX 처럼 패스프레이즈를 요구하는 거래소용
    pub passphrase: Option<String>,
}

impl Credentials {
    pub fn new(api_key: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            secret: secret.into(),
            passphrase: None,
        }
    }

    pub fn with_passphrase(mut self, passphrase: impl Into<String>) -> Self {
        self.passphrase = Some(passphrase.into());
        self
    }

    /// 환경변수에서 읽는다: `{PREFIX}_API_KEY`, `{PREFIX}_API_SECRET`, `{PREFIX}_API_PASSPHRASE`(선택)
    pub fn from_env(prefix: &str) -> Result<Self, ConfigError> {
        load_dotenv();

        let key_var = format!("{}_API_KEY", prefix);
        let secret_var = format!("{}_API_SECRET", prefix);
        let api_key = env::var(&key_var).map_err(|_| ConfigError::MissingVar(key_var))?;
        let secret = env::var(&secret_var).map_err(|_| ConfigError::MissingVar(secret_var))?;
        let passphrase = env::var(format!("{}_API_PASSPHRASE", prefix)).ok();

        Ok(Self {
            api_key,
            secret,
            passphrase,
        })
    }

    /// 환경변수가 설정되어 있는지 확인
    pub fn present_in_env(prefix: &str) -> bool {
        load_dotenv();
        env::var(format!("{}_API_KEY", prefix)).is_ok()
            && env::var(format!("{}_API_SECRET", prefix)).is_ok()
    }

    pub fn is_complete(&self) -> bool {
        !self.api_key.is_empty() && !self.secret.is_empty()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &redact(&self.api_key))
            .field("secret", &"***")
            .field("passphrase", &self.passphrase.as_ref().map(|_| "***"))
            .finish()
    }
}

fn redact(value: &str) -> String {
    if value.is_empty() {
        return String::new();
    }
    let head: String = value.chars().take(4).collect();
    format!("{}***", head)
}

/// 커넥터 하나의 설정
#[derive(Debug, Clone)]
pub struct ConnectorConfig {
    pub credentials: Credentials,
    /// 기본 엔드포인트 대신 쓸 주소 (로컬 픽스처 서버 등)
    pub base_url: Option<String>,
    pub timeout: Duration,
}

impl ConnectorConfig {
    pub fn public() -> Self {
        Self::default()
    }

    pub fn with_credentials(credentials: Credentials) -> Self {
        Self {
            credentials,
            ..Self::default()
        }
    }

    /// 환경변수에 인증 정보가 있으면 사용하고, 없으면 공개 API 전용 설정
    pub fn from_env(prefix: &str) -> Self {
        match Credentials::from_env(prefix) {
            Ok(credentials) => Self::with_credentials(credentials),
            Err(e) => {
                info!("{}: {}, private calls disabled", prefix, e);
                Self::public()
            }
        }
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self {
            credentials: Credentials::default(),
            base_url: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}
