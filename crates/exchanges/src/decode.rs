use std::cmp::Ordering;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

use interface::MakerLevel;

/// 응답 해석 실패. 커넥터가 거래소/오퍼레이션 정보를 붙여 `ExchangeError` 로 바꾼다.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum WireError {
    /// 통신은 성공했지만 거래소가 요청을 거절함
    #[error("{0}")]
    Rejected(String),
    /// 응답 형식이 예상과 다름
    #[error("{0}")]
    Malformed(String),
}

impl WireError {
    pub fn malformed(message: impl Into<String>) -> Self {
        WireError::Malformed(message.into())
    }
}

pub fn parse_json<T: DeserializeOwned>(body: &str) -> Result<T, WireError> {
    serde_json::from_str(body).map_err(|e| WireError::Malformed(format!("Failed to parse response: {}", e)))
}

/// 목록 응답의 항목을 하나씩 해석한다. 형식이 맞지 않는 항목은 경고 후 건너뛴다.
pub fn parse_entries<T: DeserializeOwned>(entries: Vec<serde_json::Value>, kind: &str) -> Vec<T> {
    let mut out = Vec::with_capacity(entries.len());
    for entry in entries {
        match serde_json::from_value::<T>(entry) {
            Ok(value) => out.push(value),
            Err(e) => warn!(kind, error = %e, "skipping malformed entry"),
        }
    }
    out
}

/// 문자열 또는 숫자로 오는 수치 필드
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum NumericString {
    Number(f64),
    Text(String),
}

impl NumericString {
    /// 유한한 f64 로 변환. 빈 문자열이나 NaN 은 실패.
    pub fn parse(&self) -> Result<f64, WireError> {
        let value = match self {
            NumericString::Number(value) => *value,
            NumericString::Text(text) => text
                .trim()
                .parse::<f64>()
                .map_err(|e| WireError::Malformed(format!("invalid number {:?}: {}", text, e)))?,
        };
        if !value.is_finite() {
            return Err(WireError::Malformed(format!("non-finite number {}", value)));
        }
        Ok(value)
    }

    /// 선택 필드용: 비어 있거나 해석되지 않으면 0
    pub fn value_or_zero(&self) -> f64 {
        match self.parse() {
            Ok(value) => value,
            Err(e) => {
                if !matches!(self, NumericString::Text(text) if text.trim().is_empty()) {
                    warn!(value = ?self, error = %e, "numeric field unreadable, using 0");
                }
                0.0
            }
        }
    }

    /// 정수 코드/개수 필드. 소수부가 있거나 숫자가 아니면 None.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            NumericString::Number(value) => {
                if value.is_finite()
                    && value.fract() == 0.0
                    && *value >= i64::MIN as f64
                    && *value < i64::MAX as f64
                {
                    Some(*value as i64)
                } else {
                    None
                }
            }
            NumericString::Text(text) => text.trim().parse::<i64>().ok(),
        }
    }
}

impl Default for NumericString {
    fn default() -> Self {
        NumericString::Number(0.0)
    }
}

impl From<f64> for NumericString {
    fn from(value: f64) -> Self {
        NumericString::Number(value)
    }
}

impl From<&str> for NumericString {
    fn from(value: &str) -> Self {
        NumericString::Text(value.to_string())
    }
}

/// 호가 한 단계. `["price", "qty", ...]` 배열이거나 `{price, quantity}` 객체.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawLevel {
    List(Vec<NumericString>),
    Entry {
        #[serde(alias = "p", alias = "rate", alias = "px")]
        price: NumericString,
        #[serde(alias = "q", alias = "qty", alias = "amount", alias = "size")]
        quantity: NumericString,
    },
}

impl RawLevel {
    pub fn parse(&self) -> Result<MakerLevel, WireError> {
        let (rate, quantity) = match self {
            RawLevel::List(values) => match values.as_slice() {
                [price, quantity, ..] => (price.parse()?, quantity.parse()?),
                _ => {
                    return Err(WireError::malformed(format!(
                        "order book level has {} fields",
                        values.len()
                    )))
                }
            },
            RawLevel::Entry { price, quantity } => (price.parse()?, quantity.parse()?),
        };
        Ok(MakerLevel { rate, quantity })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawBook {
    pub bids: Vec<RawLevel>,
    pub asks: Vec<RawLevel>,
}

/// 원본 호가를 파싱하고 bids 는 높은 가격 순, asks 는 낮은 가격 순으로 정렬한다.
/// 한 단계라도 해석에 실패하면 전체가 실패한다.
pub fn normalize_book(book: &RawBook) -> Result<(Vec<MakerLevel>, Vec<MakerLevel>), WireError> {
    let mut bids = book
        .bids
        .iter()
        .map(RawLevel::parse)
        .collect::<Result<Vec<_>, _>>()?;
    let mut asks = book
        .asks
        .iter()
        .map(RawLevel::parse)
        .collect::<Result<Vec<_>, _>>()?;

    bids.sort_by(|a, b| b.rate.partial_cmp(&a.rate).unwrap_or(Ordering::Equal));
    asks.sort_by(|a, b| a.rate.partial_cmp(&b.rate).unwrap_or(Ordering::Equal));

    Ok((bids, asks))
}
