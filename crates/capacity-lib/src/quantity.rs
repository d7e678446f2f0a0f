//! Exact resource quantities
//!
//! Kubernetes expresses CPU and memory as decimal strings carrying SI, binary
//! or exponent suffixes ("250m", "1.5Gi", "2e3"). Values are held as a signed
//! count of nano-units so that sums stay exact for anything the API can
//! express down to `1n`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign};
use thiserror::Error;

/// Nano-units in one whole unit (one core, one byte)
const NANOS_PER_UNIT: i128 = 1_000_000_000;

/// Nano-units in one milli-unit
const NANOS_PER_MILLI: i128 = 1_000_000;

const MEBIBYTE: i128 = 1024 * 1024;

/// The two resource types tracked by the capacity report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Cpu,
    Memory,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 2] = [ResourceKind::Cpu, ResourceKind::Memory];

    /// Key used for this resource in Kubernetes resource lists
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cpu => "cpu",
            Self::Memory => "memory",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors produced while parsing a quantity string
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum QuantityError {
    #[error("quantity is empty")]
    Empty,

    #[error("invalid number in quantity '{0}'")]
    InvalidNumber(String),

    #[error("unknown suffix '{suffix}' in quantity '{input}'")]
    UnknownSuffix { input: String, suffix: String },

    #[error("quantity '{0}' is out of range")]
    Overflow(String),
}

/// Multiplier encoded by a quantity suffix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scale {
    /// Power of ten
    Decimal(i32),
    /// Power of 1024
    Binary(u32),
}

impl Scale {
    fn from_suffix(suffix: &str) -> Option<Self> {
        let scale = match suffix {
            "n" => Self::Decimal(-9),
            "u" => Self::Decimal(-6),
            "m" => Self::Decimal(-3),
            "" => Self::Decimal(0),
            "k" => Self::Decimal(3),
            "M" => Self::Decimal(6),
            "G" => Self::Decimal(9),
            "T" => Self::Decimal(12),
            "P" => Self::Decimal(15),
            "E" => Self::Decimal(18),
            "Ki" => Self::Binary(1),
            "Mi" => Self::Binary(2),
            "Gi" => Self::Binary(3),
            "Ti" => Self::Binary(4),
            "Pi" => Self::Binary(5),
            "Ei" => Self::Binary(6),
            other => {
                // Decimal exponent form: "e3", "E-2"
                let exponent = other
                    .strip_prefix('e')
                    .or_else(|| other.strip_prefix('E'))?;
                return exponent.parse::<i32>().ok().map(Self::Decimal);
            }
        };
        Some(scale)
    }
}

/// An exact amount of a single resource type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Quantity {
    kind: ResourceKind,
    nanos: i128,
}

impl Quantity {
    /// The additive identity for `kind`
    pub const fn zero(kind: ResourceKind) -> Self {
        Self { kind, nanos: 0 }
    }

    pub const fn from_nanos(kind: ResourceKind, nanos: i128) -> Self {
        Self { kind, nanos }
    }

    pub fn cores(cores: i64) -> Self {
        Self::from_nanos(ResourceKind::Cpu, cores as i128 * NANOS_PER_UNIT)
    }

    pub fn millicores(millis: i64) -> Self {
        Self::from_nanos(ResourceKind::Cpu, millis as i128 * NANOS_PER_MILLI)
    }

    pub fn bytes(bytes: i64) -> Self {
        Self::from_nanos(ResourceKind::Memory, bytes as i128 * NANOS_PER_UNIT)
    }

    pub fn mebibytes(mebibytes: i64) -> Self {
        Self::from_nanos(ResourceKind::Memory, mebibytes as i128 * MEBIBYTE * NANOS_PER_UNIT)
    }

    /// Parse a Kubernetes quantity string as a `kind` quantity.
    ///
    /// Amounts finer than one nano-unit are rounded up in magnitude, matching
    /// how the API server canonicalises quantities.
    pub fn parse(kind: ResourceKind, input: &str) -> Result<Self, QuantityError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(QuantityError::Empty);
        }

        let (negative, body) = match trimmed.as_bytes()[0] {
            b'-' => (true, &trimmed[1..]),
            b'+' => (false, &trimmed[1..]),
            _ => (false, trimmed),
        };

        let split = body
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(body.len());
        let (number, suffix) = body.split_at(split);

        let scale = Scale::from_suffix(suffix).ok_or_else(|| QuantityError::UnknownSuffix {
            input: input.to_string(),
            suffix: suffix.to_string(),
        })?;

        let (whole, fraction) = number.split_once('.').unwrap_or((number, ""));
        if (whole.is_empty() && fraction.is_empty()) || fraction.contains('.') {
            return Err(QuantityError::InvalidNumber(input.to_string()));
        }

        let overflow = || QuantityError::Overflow(input.to_string());

        let digits = format!("{whole}{fraction}");
        let digits = digits.trim_start_matches('0');
        let mantissa: i128 = if digits.is_empty() {
            0
        } else {
            digits.parse().map_err(|_| overflow())?
        };

        let (exponent, binary_power) = match scale {
            Scale::Decimal(exp) => (exp, 0),
            Scale::Binary(power) => (0, power),
        };
        let numerator = 1024i128
            .checked_pow(binary_power)
            .and_then(|multiplier| mantissa.checked_mul(multiplier))
            .ok_or_else(overflow)?;

        // i64 so extreme exponents cannot wrap
        let shift = 9 + i64::from(exponent) - fraction.len() as i64;
        let magnitude = if numerator == 0 {
            0
        } else if shift >= 0 {
            u32::try_from(shift)
                .ok()
                .and_then(|shift| 10i128.checked_pow(shift))
                .and_then(|multiplier| numerator.checked_mul(multiplier))
                .ok_or_else(overflow)?
        } else {
            match u32::try_from(shift.unsigned_abs())
                .ok()
                .and_then(|shift| 10i128.checked_pow(shift))
            {
                Some(divisor) => ceil_div(numerator, divisor),
                // Smaller than any representable divisor: one nano-unit
                None => 1,
            }
        };

        let nanos = if negative { -magnitude } else { magnitude };
        Ok(Self { kind, nanos })
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn nanos(&self) -> i128 {
        self.nanos
    }

    pub fn is_zero(&self) -> bool {
        self.nanos == 0
    }

    /// Value in milli-units, rounded down
    pub fn millis(&self) -> i128 {
        self.nanos.div_euclid(NANOS_PER_MILLI)
    }

    /// Value in whole units (cores or bytes), rounded up
    pub fn value(&self) -> i128 {
        ceil_div(self.nanos, NANOS_PER_UNIT)
    }

    /// Value in whole units as a float, for ratios and sorting
    pub fn as_f64(&self) -> f64 {
        self.nanos as f64 / NANOS_PER_UNIT as f64
    }

    /// `self` as a percentage of `allocatable`, `0.0` when nothing is allocatable
    pub fn percent_of(&self, allocatable: &Quantity) -> f64 {
        ratio_percent(self, allocatable)
    }
}

/// `numerator / denominator * 100`, or `0.0` for a zero denominator
pub fn ratio_percent(numerator: &Quantity, denominator: &Quantity) -> f64 {
    debug_assert_eq!(numerator.kind, denominator.kind, "ratio of mixed resource kinds");
    if denominator.nanos == 0 {
        return 0.0;
    }
    numerator.nanos as f64 / denominator.nanos as f64 * 100.0
}

fn ceil_div(numerator: i128, divisor: i128) -> i128 {
    let quotient = numerator / divisor;
    if numerator % divisor > 0 {
        quotient + 1
    } else {
        quotient
    }
}

impl AddAssign for Quantity {
    fn add_assign(&mut self, rhs: Self) {
        debug_assert_eq!(self.kind, rhs.kind, "sum of mixed resource kinds");
        self.nanos = self.nanos.saturating_add(rhs.nanos);
    }
}

impl Add for Quantity {
    type Output = Quantity;

    fn add(mut self, rhs: Self) -> Self::Output {
        self += rhs;
        self
    }
}

/// Sum helper bound to a resource kind, so empty iterators still carry a unit
pub fn sum_of<I>(kind: ResourceKind, quantities: I) -> Quantity
where
    I: IntoIterator<Item = Quantity>,
{
    quantities
        .into_iter()
        .fold(Quantity::zero(kind), |total, q| total + q)
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ResourceKind::Cpu => write!(f, "{}m", self.millis()),
            ResourceKind::Memory => write!(f, "{}Mi", self.value().div_euclid(MEBIBYTE)),
        }
    }
}
