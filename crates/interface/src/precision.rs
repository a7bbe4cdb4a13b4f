//! 가격/수량 자리수 처리.
//!
//! 거래소가 주는 필터(lot size, tick size)로부터 소수점 자리수를 구하고,
//! 그 자리수까지 0 방향으로 잘라낸 고정 소수점 문자열을 만든다.

use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};
use thiserror::Error;

/// rust_decimal 이 표현할 수 있는 최대 scale
const MAX_DECIMALS: u32 = 28;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PrecisionError {
    #[error("value {0} is not a finite number")]
    NonFinite(f64),
    #[error("filter {0} must be a positive increment")]
    InvalidFilter(f64),
    #[error("value {0} is outside the decimal range")]
    OutOfRange(f64),
    #[error("value {value} rounds to zero at increment {filter}")]
    RoundsToZero { value: f64, filter: f64 },
    #[error("quantity {quantity} is below the minimum trade quantity {minimum}")]
    BelowMinimum { quantity: f64, minimum: f64 },
}

/// 필터에 해당하는 소수점 자리수: round(-log10(filter)), 음수면 0
/// 예: 0.0001 -> 4, 0.01 -> 2, 1 -> 0, 10 -> 0
pub fn decimals_for(filter: f64) -> Result<u32, PrecisionError> {
    if !filter.is_finite() || filter <= 0.0 {
        return Err(PrecisionError::InvalidFilter(filter));
    }

    let digits = (-filter.log10()).round();
    if digits <= 0.0 {
        return Ok(0);
    }
    if digits > MAX_DECIMALS as f64 {
        return Err(PrecisionError::InvalidFilter(filter));
    }
    Ok(digits as u32)
}

/// 자리수로 필터 값을 만든다. 4 -> 0.0001
pub fn filter_from_decimals(decimals: u32) -> f64 {
    1.0 / 10f64.powi(decimals.min(MAX_DECIMALS) as i32)
}

/// 필터 자리수까지 0 방향으로 잘라낸다 (반올림하지 않음).
pub fn round_to_filter(value: f64, filter: f64) -> Result<Decimal, PrecisionError> {
    if !value.is_finite() {
        return Err(PrecisionError::NonFinite(value));
    }
    let decimals = decimals_for(filter)?;

    // f64 의 Display 는 지수 표기 없이 최단 표현을 내므로 10진수 변환이 정확하다
    let exact = Decimal::from_str(&value.to_string()).map_err(|_| PrecisionError::OutOfRange(value))?;
    Ok(exact.round_dp_with_strategy(decimals, RoundingStrategy::ToZero))
}

/// 잘라낸 값을 고정 자리수 문자열로. 1.23456 @ 0.001 -> "1.234"
pub fn format_to_filter(value: f64, filter: f64) -> Result<String, PrecisionError> {
    let decimals = decimals_for(filter)?;
    let rounded = round_to_filter(value, filter)?;
    Ok(format!("{:.*}", decimals as usize, rounded))
}

/// 잘라낸 값을 f64 로 돌려준다.
pub fn truncate_to_filter(value: f64, filter: f64) -> Result<f64, PrecisionError> {
    // 10진 문자열을 거쳐야 "50000.56" 과 같은 리터럴과 정확히 같은 f64 가 나온다
    round_to_filter(value, filter)?
        .to_string()
        .parse::<f64>()
        .map_err(|_| PrecisionError::OutOfRange(value))
}

fn step_decimal(step: f64) -> Result<Decimal, PrecisionError> {
    if !step.is_finite() || step <= 0.0 {
        return Err(PrecisionError::InvalidFilter(step));
    }
    let step = Decimal::from_str(&step.to_string()).map_err(|_| PrecisionError::InvalidFilter(step))?;
    if step.is_zero() {
        return Err(PrecisionError::InvalidFilter(0.0));
    }
    Ok(step.normalize())
}

/// 호가 단위의 배수로 0 방향으로 잘라낸다. 5, 50 처럼 10 의 거듭제곱이 아닌 단위용.
pub fn round_to_step(value: f64, step: f64) -> Result<Decimal, PrecisionError> {
    if !value.is_finite() {
        return Err(PrecisionError::NonFinite(value));
    }
    let step_dec = step_decimal(step)?;
    let exact = Decimal::from_str(&value.to_string()).map_err(|_| PrecisionError::OutOfRange(value))?;

    let steps = exact
        .checked_div(step_dec)
        .ok_or(PrecisionError::OutOfRange(value))?
        .trunc();
    let rounded = steps
        .checked_mul(step_dec)
        .ok_or(PrecisionError::OutOfRange(value))?;
    Ok(rounded.round_dp_with_strategy(step_dec.scale(), RoundingStrategy::ToZero))
}

/// 7123 @ 5 -> "7120", 0.51239 @ 0.0001 -> "0.5123"
pub fn format_to_step(value: f64, step: f64) -> Result<String, PrecisionError> {
    let decimals = step_decimal(step)?.scale();
    let rounded = round_to_step(value, step)?;
    Ok(format!("{:.*}", decimals as usize, rounded))
}

pub fn truncate_to_step(value: f64, step: f64) -> Result<f64, PrecisionError> {
    round_to_step(value, step)?
        .to_string()
        .parse::<f64>()
        .map_err(|_| PrecisionError::OutOfRange(value))
}
