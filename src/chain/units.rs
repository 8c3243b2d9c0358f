//! 人类可读小数与链上整数单位之间的换算。

use std::str::FromStr;

use alloy_primitives::{I256, U256};
use rust_decimal::Decimal;

use crate::error::ClientError;

pub fn to_base_units(amount: Decimal, decimals: u8) -> Result<U256, ClientError> {
    let value = amount.normalize();
    if value.is_zero() {
        return Ok(U256::ZERO);
    }
    if value.is_sign_negative() {
        return Err(ClientError::InvalidAmount(format!("金额不能为负: {amount}")));
    }
    let scale = value.scale();
    if scale > u32::from(decimals) {
        return Err(ClientError::InvalidAmount(format!(
            "{amount} 的小数位超过代币精度 {decimals}"
        )));
    }
    let mantissa = u128::try_from(value.mantissa())
        .map_err(|_| ClientError::InvalidAmount(format!("金额无法表示: {amount}")))?;
    let factor = pow10(u32::from(decimals) - scale);
    U256::from(mantissa)
        .checked_mul(factor)
        .ok_or_else(|| ClientError::InvalidAmount(format!("金额溢出: {amount}")))
}

/// 格式化为十进制字符串，去掉小数部分末尾的 0。
pub fn format_base_units(value: U256, decimals: u8) -> String {
    if decimals == 0 {
        return value.to_string();
    }
    let factor = pow10(u32::from(decimals));
    let whole = value / factor;
    let fraction = value % factor;
    if fraction.is_zero() {
        return whole.to_string();
    }
    let padded = format!(
        "{:0>width$}",
        fraction.to_string(),
        width = decimals as usize
    );
    format!("{whole}.{}", padded.trim_end_matches('0'))
}

pub fn format_signed_units(value: I256, decimals: u8) -> String {
    let magnitude = format_base_units(value.unsigned_abs(), decimals);
    if value.is_negative() {
        format!("-{magnitude}")
    } else {
        magnitude
    }
}

pub fn from_base_units(value: U256, decimals: u8) -> Result<Decimal, ClientError> {
    let text = format_base_units(value, decimals);
    Decimal::from_str(&text)
        .map_err(|err| ClientError::InvalidAmount(format!("{text} 超出可显示范围: {err}")))
}

fn pow10(exp: u32) -> U256 {
    U256::from(10u64).pow(U256::from(exp))
}
