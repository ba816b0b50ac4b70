use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, Mul, Neg, Sub};
use std::str::FromStr;

use bigdecimal::BigDecimal;
use num_bigint::{BigInt, Sign};
use num_traits::{ToPrimitive, Zero};

/// An arbitrary-precision numeric value. Integers and floats stay in their
/// own representation until an operation mixes them, at which point the
/// integer side is promoted.
#[derive(Clone, Debug)]
pub enum Number {
    Int(BigInt),
    Float(BigDecimal),
}

/// A numeric literal is a float exactly when it contains a decimal point.
pub fn is_float(literal: &str) -> bool {
    literal.contains('.')
}

impl Number {
    /// Parses a lexed numeric literal. The lexer guarantees the literal is
    /// one or more digits with at most one interior `.`.
    pub fn from_literal(literal: &str) -> Option<Number> {
        if is_float(literal) {
            BigDecimal::from_str(literal).ok().map(Number::Float)
        } else {
            BigInt::from_str(literal).ok().map(Number::Int)
        }
    }

    pub fn is_int(&self) -> bool {
        matches!(self, Number::Int(_))
    }

    fn promote(&self) -> BigDecimal {
        match self {
            Number::Int(i) => BigDecimal::from(i.clone()),
            Number::Float(f) => f.clone(),
        }
    }

    /// Division result keeps the integer kind only when both operands are
    /// integers, truncating toward zero. Returns `None` on a zero divisor.
    pub fn checked_div(&self, other: &Number) -> Option<Number> {
        match (self, other) {
            (Number::Int(l), Number::Int(r)) => {
                if r.is_zero() {
                    None
                } else {
                    Some(Number::Int(l / r))
                }
            }
            (l, r) => {
                let divisor = r.promote();
                if divisor.is_zero() {
                    None
                } else {
                    Some(Number::Float(l.promote() / divisor))
                }
            }
        }
    }

    /// Coerces to an in-range array index. Floats qualify only when they
    /// carry no fractional part.
    pub fn as_index(&self) -> Option<i64> {
        match self {
            Number::Int(i) => i.to_i64(),
            Number::Float(f) => {
                if f.is_integer() {
                    f.to_i64()
                } else {
                    None
                }
            }
        }
    }

    /// The 64-bit hash digest: integers contribute the low 64 bits of
    /// their two's-complement value, floats the bit pattern of their
    /// nearest IEEE-754 double.
    pub fn hash_digest(&self) -> u64 {
        match self {
            Number::Int(i) => {
                let (sign, digits) = i.to_u64_digits();
                let low = digits.first().copied().unwrap_or(0);
                match sign {
                    Sign::Minus => low.wrapping_neg(),
                    _ => low,
                }
            }
            Number::Float(f) => f.to_f64().unwrap_or(f64::NAN).to_bits(),
        }
    }
}

impl Add for &Number {
    type Output = Number;

    fn add(self, other: Self) -> Number {
        match (self, other) {
            (Number::Int(l), Number::Int(r)) => Number::Int(l + r),
            (l, r) => Number::Float(l.promote() + r.promote()),
        }
    }
}

impl Sub for &Number {
    type Output = Number;

    fn sub(self, other: Self) -> Number {
        match (self, other) {
            (Number::Int(l), Number::Int(r)) => Number::Int(l - r),
            (l, r) => Number::Float(l.promote() - r.promote()),
        }
    }
}

impl Mul for &Number {
    type Output = Number;

    fn mul(self, other: Self) -> Number {
        match (self, other) {
            (Number::Int(l), Number::Int(r)) => Number::Int(l * r),
            (l, r) => Number::Float(l.promote() * r.promote()),
        }
    }
}

impl Neg for &Number {
    type Output = Number;

    fn neg(self) -> Number {
        match self {
            Number::Int(i) => Number::Int(-i),
            Number::Float(f) => Number::Float(-f.clone()),
        }
    }
}

/// Mixed int/float pairs compare by numeric value after promotion.
impl PartialEq for Number {
    fn eq(&self, other: &Number) -> bool {
        match (self, other) {
            (Number::Int(l), Number::Int(r)) => l == r,
            (l, r) => l.promote() == r.promote(),
        }
    }
}

impl PartialOrd for Number {
    fn partial_cmp(&self, other: &Number) -> Option<Ordering> {
        match (self, other) {
            (Number::Int(l), Number::Int(r)) => l.partial_cmp(r),
            (l, r) => l.promote().partial_cmp(&r.promote()),
        }
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Number::Int(i) => write!(f, "{}", i),
            Number::Float(v) => write!(f, "{}", v),
        }
    }
}
