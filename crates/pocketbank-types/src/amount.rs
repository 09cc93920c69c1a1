use serde::{Deserialize, Serialize};
use std::fmt;
use crate::error::{LedgerError, Result};

/// Number of decimal places carried by every amount
pub const DECIMALS: u32 = 2;

const SCALE: i128 = 10_i128.pow(DECIMALS); // 100

/// Fixed-point money amount with 2 decimal places
/// Internally stored as i128 minor units (cents)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Amount(i128);

impl Amount {
    /// Zero amount
    pub const ZERO: Amount = Amount(0);

    /// Create from minor units (cents)
    pub const fn from_cents(cents: i128) -> Self {
        Amount(cents)
    }

    /// Get the raw minor-unit value
    pub const fn cents(&self) -> i128 {
        self.0
    }

    /// Create from whole currency units
    pub const fn from_units(units: i64) -> Self {
        Amount((units as i128) * SCALE)
    }

    /// Parse user input such as `"1,234.50"`.
    ///
    /// Grouping commas are stripped before parsing. At most two fractional
    /// digits are accepted; sub-cent input is rejected rather than rounded.
    pub fn parse_input(input: &str) -> Result<Self> {
        let cleaned: String = input.trim().chars().filter(|c| *c != ',').collect();
        let invalid = || LedgerError::InvalidAmount(format!("cannot parse: {:?}", input));

        let (negative, body) = match cleaned.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, cleaned.strip_prefix('+').unwrap_or(&cleaned)),
        };
        let (whole, frac) = body.split_once('.').unwrap_or((body, ""));

        if whole.is_empty() && frac.is_empty() {
            return Err(invalid());
        }
        if !whole.bytes().chain(frac.bytes()).all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        if frac.len() > DECIMALS as usize {
            return Err(LedgerError::InvalidAmount(format!(
                "more than {} decimal places: {:?}",
                DECIMALS, input
            )));
        }

        let overflow = || LedgerError::InvalidAmount(format!("overflow: {:?}", input));
        let mut cents: i128 = 0;
        for digit in whole.bytes().map(|b| i128::from(b - b'0')) {
            cents = cents
                .checked_mul(10)
                .and_then(|c| c.checked_add(digit))
                .ok_or_else(overflow)?;
        }
        let frac_digits = frac.as_bytes();
        let mut frac_cents: i128 = 0;
        for i in 0..DECIMALS as usize {
            let digit = frac_digits.get(i).map_or(0, |b| i128::from(b - b'0'));
            frac_cents = frac_cents * 10 + digit;
        }
        cents = cents
            .checked_mul(SCALE)
            .and_then(|c| c.checked_add(frac_cents))
            .ok_or_else(overflow)?;

        Ok(Amount(if negative { -cents } else { cents }))
    }

    /// Parse user input and require a strictly positive amount
    pub fn parse_positive(input: &str) -> Result<Self> {
        let amount = Self::parse_input(input)?;
        if !amount.is_positive() {
            return Err(LedgerError::InvalidAmount(format!(
                "amount must be greater than zero: {:?}",
                input
            )));
        }
        Ok(amount)
    }

    /// Check if amount is positive
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Check if amount is negative
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Check if amount is zero
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checked addition
    pub fn checked_add(&self, other: Self) -> Result<Self> {
        self.0
            .checked_add(other.0)
            .map(Amount)
            .ok_or_else(|| LedgerError::InvalidAmount("overflow in addition".to_string()))
    }

    /// Checked subtraction
    pub fn checked_sub(&self, other: Self) -> Result<Self> {
        self.0
            .checked_sub(other.0)
            .map(Amount)
            .ok_or_else(|| LedgerError::InvalidAmount("overflow in subtraction".to_string()))
    }

    /// Display form with thousands grouping, e.g. `1,234.50`
    pub fn to_grouped(&self) -> String {
        let (whole, cents) = self.split();
        let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
        for (i, ch) in whole.chars().enumerate() {
            if i > 0 && (whole.len() - i) % 3 == 0 {
                grouped.push(',');
            }
            grouped.push(ch);
        }
        format!(
            "{}{}.{:0width$}",
            self.sign(),
            grouped,
            cents,
            width = DECIMALS as usize
        )
    }

    fn split(&self) -> (String, u128) {
        let abs = self.0.unsigned_abs();
        let scale = SCALE as u128;
        ((abs / scale).to_string(), abs % scale)
    }

    fn sign(&self) -> &'static str {
        if self.is_negative() {
            "-"
        } else {
            ""
        }
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (whole, cents) = self.split();
        write!(
            f,
            "{}{}.{:0width$}",
            self.sign(),
            whole,
            cents,
            width = DECIMALS as usize
        )
    }
}
