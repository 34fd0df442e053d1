//! Arbitrary-precision decimal arithmetic.
//!
//! All monetary amounts, prices and ratios in the ledger are [`Decimal`]s.
//! Addition, subtraction and multiplication are exact; division always takes an
//! explicit scale and [`RoundingMode`] so repeated pro-rata splits round the
//! same way on every run.

use std::cmp::Ordering;
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};
use std::str::FromStr;

use num_bigint::{BigInt, Sign};
use num_integer::Integer;
use num_traits::{One, Signed, Zero};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Error, Result};

// ═══════════════════════════════════════════════════════════════════════════════
// ROUNDING
// ═══════════════════════════════════════════════════════════════════════════════

/// How to resolve digits dropped by a division or a rescale
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RoundingMode {
    /// Round to nearest, ties to the even neighbour (banker's rounding)
    #[default]
    HalfEven,
    /// Round to nearest, ties away from zero
    HalfUp,
    /// Truncate towards zero
    Down,
}

fn ten_pow(exp: u32) -> BigInt {
    num_traits::pow(BigInt::from(10u8), exp as usize)
}

/// Integer division of `numerator / denominator` rounded with `mode`.
fn div_rounded(numerator: &BigInt, denominator: &BigInt, mode: RoundingMode) -> BigInt {
    let divisor = denominator.abs();
    let (quotient, remainder) = numerator.abs().div_rem(&divisor);

    let round_up = if remainder.is_zero() {
        false
    } else {
        let twice = &remainder + &remainder;
        match mode {
            RoundingMode::Down => false,
            RoundingMode::HalfUp => twice >= divisor,
            RoundingMode::HalfEven => match twice.cmp(&divisor) {
                Ordering::Greater => true,
                Ordering::Equal => quotient.is_odd(),
                Ordering::Less => false,
            },
        }
    };

    let magnitude = if round_up { quotient + BigInt::one() } else { quotient };
    let negative = (numerator.sign() == Sign::Minus) != (denominator.sign() == Sign::Minus);
    if negative {
        -magnitude
    } else {
        magnitude
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// DECIMAL
// ═══════════════════════════════════════════════════════════════════════════════

/// Signed decimal number `mantissa × 10^-scale` of unbounded precision
#[derive(Clone)]
pub struct Decimal {
    mantissa: BigInt,
    scale: u32,
}

impl Decimal {
    /// Create from a mantissa and a number of fractional digits
    /// (`Decimal::new(12, 1)` is `1.2`)
    pub fn new(mantissa: i64, scale: u32) -> Self {
        Self {
            mantissa: BigInt::from(mantissa),
            scale,
        }
    }

    /// Zero
    pub fn zero() -> Self {
        Self::new(0, 0)
    }

    /// One
    pub fn one() -> Self {
        Self::new(1, 0)
    }

    /// Number of fractional digits currently carried
    pub fn scale(&self) -> u32 {
        self.scale
    }

    /// Check if value is zero
    pub fn is_zero(&self) -> bool {
        self.mantissa.is_zero()
    }

    /// Check if value is strictly greater than zero
    pub fn is_positive(&self) -> bool {
        self.mantissa.is_positive()
    }

    /// Check if value is strictly less than zero
    pub fn is_negative(&self) -> bool {
        self.mantissa.is_negative()
    }

    /// Absolute value
    pub fn abs(&self) -> Self {
        Self {
            mantissa: self.mantissa.abs(),
            scale: self.scale,
        }
    }

    /// Divide, keeping `scale` fractional digits in the quotient
    pub fn div(&self, rhs: &Decimal, scale: u32, mode: RoundingMode) -> Result<Decimal> {
        if rhs.is_zero() {
            return Err(Error::DivisionByZero {
                operation: format!("{} / {}", self, rhs),
            });
        }

        // quotient mantissa = self.m * 10^(scale + rhs.scale - self.scale) / rhs.m
        let shift = i64::from(scale) + i64::from(rhs.scale) - i64::from(self.scale);
        let (numerator, denominator) = if shift >= 0 {
            (&self.mantissa * ten_pow(shift as u32), rhs.mantissa.clone())
        } else {
            (self.mantissa.clone(), &rhs.mantissa * ten_pow((-shift) as u32))
        };

        Ok(Decimal {
            mantissa: div_rounded(&numerator, &denominator, mode),
            scale,
        })
    }

    /// Rescale to exactly `scale` fractional digits
    pub fn round(&self, scale: u32, mode: RoundingMode) -> Decimal {
        match scale.cmp(&self.scale) {
            Ordering::Equal => self.clone(),
            Ordering::Greater => Decimal {
                mantissa: &self.mantissa * ten_pow(scale - self.scale),
                scale,
            },
            Ordering::Less => Decimal {
                mantissa: div_rounded(&self.mantissa, &ten_pow(self.scale - scale), mode),
                scale,
            },
        }
    }

    /// Same value with trailing fractional zeros removed
    pub fn normalized(&self) -> Decimal {
        let ten = BigInt::from(10u8);
        let mut mantissa = self.mantissa.clone();
        let mut scale = self.scale;
        while scale > 0 {
            let (quotient, remainder) = mantissa.div_rem(&ten);
            if !remainder.is_zero() {
                break;
            }
            mantissa = quotient;
            scale -= 1;
        }
        Decimal { mantissa, scale }
    }

    /// Both mantissas expressed at the larger of the two scales
    fn aligned(&self, other: &Decimal) -> (BigInt, BigInt, u32) {
        match self.scale.cmp(&other.scale) {
            Ordering::Equal => (self.mantissa.clone(), other.mantissa.clone(), self.scale),
            Ordering::Less => (
                &self.mantissa * ten_pow(other.scale - self.scale),
                other.mantissa.clone(),
                other.scale,
            ),
            Ordering::Greater => (
                self.mantissa.clone(),
                &other.mantissa * ten_pow(self.scale - other.scale),
                self.scale,
            ),
        }
    }
}

impl Default for Decimal {
    fn default() -> Self {
        Self::zero()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// COMPARISON
// ═══════════════════════════════════════════════════════════════════════════════

impl PartialEq for Decimal {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Decimal {}

impl PartialOrd for Decimal {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Decimal {
    fn cmp(&self, other: &Self) -> Ordering {
        if self.scale == other.scale {
            return self.mantissa.cmp(&other.mantissa);
        }
        let (a, b, _) = self.aligned(other);
        a.cmp(&b)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ARITHMETIC
// ═══════════════════════════════════════════════════════════════════════════════

impl<'a> Add<&'a Decimal> for &'a Decimal {
    type Output = Decimal;

    fn add(self, rhs: &'a Decimal) -> Decimal {
        let (a, b, scale) = self.aligned(rhs);
        Decimal { mantissa: a + b, scale }
    }
}

impl<'a> Sub<&'a Decimal> for &'a Decimal {
    type Output = Decimal;

    fn sub(self, rhs: &'a Decimal) -> Decimal {
        let (a, b, scale) = self.aligned(rhs);
        Decimal { mantissa: a - b, scale }
    }
}

impl<'a> Mul<&'a Decimal> for &'a Decimal {
    type Output = Decimal;

    fn mul(self, rhs: &'a Decimal) -> Decimal {
        Decimal {
            mantissa: &self.mantissa * &rhs.mantissa,
            scale: self.scale + rhs.scale,
        }
    }
}

macro_rules! forward_owned_binop {
    ($imp:ident, $method:ident) => {
        impl $imp<Decimal> for Decimal {
            type Output = Decimal;

            fn $method(self, rhs: Decimal) -> Decimal {
                (&self).$method(&rhs)
            }
        }

        impl<'a> $imp<&'a Decimal> for Decimal {
            type Output = Decimal;

            fn $method(self, rhs: &'a Decimal) -> Decimal {
                (&self).$method(rhs)
            }
        }

        impl<'a> $imp<Decimal> for &'a Decimal {
            type Output = Decimal;

            fn $method(self, rhs: Decimal) -> Decimal {
                self.$method(&rhs)
            }
        }
    };
}

forward_owned_binop!(Add, add);
forward_owned_binop!(Sub, sub);
forward_owned_binop!(Mul, mul);

impl AddAssign<&Decimal> for Decimal {
    fn add_assign(&mut self, rhs: &Decimal) {
        *self = &*self + rhs;
    }
}

impl AddAssign for Decimal {
    fn add_assign(&mut self, rhs: Decimal) {
        *self = &*self + &rhs;
    }
}

impl SubAssign<&Decimal> for Decimal {
    fn sub_assign(&mut self, rhs: &Decimal) {
        *self = &*self - rhs;
    }
}

impl SubAssign for Decimal {
    fn sub_assign(&mut self, rhs: Decimal) {
        *self = &*self - &rhs;
    }
}

impl Neg for Decimal {
    type Output = Decimal;

    fn neg(self) -> Decimal {
        Decimal {
            mantissa: -self.mantissa,
            scale: self.scale,
        }
    }
}

impl Sum for Decimal {
    fn sum<I: Iterator<Item = Decimal>>(iter: I) -> Decimal {
        iter.fold(Decimal::zero(), |acc, value| acc + value)
    }
}

impl<'a> Sum<&'a Decimal> for Decimal {
    fn sum<I: Iterator<Item = &'a Decimal>>(iter: I) -> Decimal {
        iter.fold(Decimal::zero(), |acc, value| acc + value)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// CONVERSIONS
// ═══════════════════════════════════════════════════════════════════════════════

macro_rules! from_integer {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Decimal {
                fn from(value: $t) -> Self {
                    Decimal { mantissa: BigInt::from(value), scale: 0 }
                }
            }
        )*
    };
}

from_integer!(i32, i64, u32, u64);

impl FromStr for Decimal {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::InvalidParameter {
            name: "decimal".into(),
            reason: format!("cannot parse '{}'", s),
        };

        let trimmed = s.trim();
        let (negative, unsigned) = match trimmed.as_bytes().first() {
            Some(b'-') => (true, &trimmed[1..]),
            Some(b'+') => (false, &trimmed[1..]),
            _ => (false, trimmed),
        };

        let (integer, fraction) = match unsigned.split_once('.') {
            Some((integer, fraction)) => (integer, fraction),
            None => (unsigned, ""),
        };

        if integer.is_empty() && fraction.is_empty() {
            return Err(invalid());
        }
        if !integer.bytes().chain(fraction.bytes()).all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }

        let digits = format!("{}{}", integer, fraction);
        let magnitude = BigInt::parse_bytes(digits.as_bytes(), 10).ok_or_else(invalid)?;
        let scale = u32::try_from(fraction.len()).map_err(|_| invalid())?;

        Ok(Decimal {
            mantissa: if negative { -magnitude } else { magnitude },
            scale,
        })
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let digits = self.mantissa.abs().to_string();
        let sign = if self.is_negative() { "-" } else { "" };
        let scale = self.scale as usize;

        if scale == 0 {
            return write!(f, "{}{}", sign, digits);
        }

        let padded = if digits.len() <= scale {
            format!("{}{}", "0".repeat(scale + 1 - digits.len()), digits)
        } else {
            digits
        };
        let (integer, fraction) = padded.split_at(padded.len() - scale);
        write!(f, "{}{}.{}", sign, integer, fraction)
    }
}

impl fmt::Debug for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Decimal({})", self)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SERDE
// ═══════════════════════════════════════════════════════════════════════════════

impl Serialize for Decimal {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

struct DecimalVisitor;

impl<'de> Visitor<'de> for DecimalVisitor {
    type Value = Decimal;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a decimal string or number")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<Decimal, E> {
        v.parse().map_err(E::custom)
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<Decimal, E> {
        Ok(Decimal::from(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<Decimal, E> {
        Ok(Decimal::from(v))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> std::result::Result<Decimal, E> {
        if !v.is_finite() {
            return Err(E::custom(format!("non-finite decimal {}", v)));
        }
        v.to_string().parse().map_err(E::custom)
    }
}

impl<'de> Deserialize<'de> for Decimal {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Decimal, D::Error> {
        deserializer.deserialize_any(DecimalVisitor)
    }
}
