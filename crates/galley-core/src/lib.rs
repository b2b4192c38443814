//! Core numeric types used throughout the Galley project.
//!
//! The central type is [Scaled], the fixed-point number used for every
//! geometric quantity in the typesetting model.
//! The crate also defines the physical units a scaled number can be written
//! in ([ScaledUnit]) and the [Glue] type for stretchable spacing.

use std::fmt::Write;

/// Scaled numbers.
///
/// A fixed-width numeric type with 15 bits for the integer part, 16 bits for
/// the fractional part, and a sign bit.
/// The inner value is the represented number multiplied by 2^16.
///
/// All arithmetic that can leave the legal range reports overflow through
/// [OverflowError]; nothing wraps silently.
#[derive(Default, PartialEq, Eq, Debug, Copy, Clone, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Scaled(pub i32);

impl Scaled {
    /// Representation of the number 0.
    pub const ZERO: Scaled = Scaled(0);

    /// Representation of the number 1.
    pub const ONE: Scaled = Scaled(1 << 16);

    /// Representation of the number 2.
    pub const TWO: Scaled = Scaled(1 << 17);

    /// The largest legal dimension, (2^30-1)/2^16 points.
    ///
    /// This is smaller than the largest value the backing integer can hold;
    /// the slack is what makes the overflow checks in the arithmetic routines
    /// exact.
    pub const MAX_DIMEN: Scaled = Scaled((1 << 30) - 1);

    /// Create a scaled number from an integer.
    ///
    /// The integer must be in the range `(-2^14, 2^14)`; otherwise an
    /// overflow error is returned.
    pub fn from_integer(i: i32) -> Result<Scaled, OverflowError> {
        if i >= (1 << 14) || i <= -(1 << 14) {
            Err(OverflowError {})
        } else {
            Ok(Scaled(Scaled::ONE.0 * i))
        }
    }

    /// Create a scaled number from the digits of a decimal fraction.
    ///
    /// `digits` holds the digits after the decimal point, most significant
    /// first. The result is the closest scaled value to 0.digits, with ties
    /// rounded up.
    pub fn from_decimal_digits(digits: &[u8]) -> Scaled {
        let mut a = 0;
        for d in digits.iter().rev() {
            a = (a + (*d as i32) * Scaled::TWO.0) / 10;
        }
        Scaled((a + 1) / 2)
    }

    /// Create the scaled number `(i + f) u` where `i` is a non-negative
    /// integer, `f` a fraction in `[0, 1)` and `u` a unit.
    ///
    /// The arithmetic follows the legacy unit-application algorithm exactly,
    /// including its rounding: integer and fractional parts are converted
    /// separately and the remainder of the integer conversion is folded into
    /// the fraction. For scaled points the fractional part is dropped.
    pub fn new(
        integer_part: i32,
        fractional_part: Scaled,
        unit: ScaledUnit,
    ) -> Result<Scaled, OverflowError> {
        let (integer_part, fractional_part) = match unit {
            ScaledUnit::ScaledPoint => {
                let s = Scaled(integer_part);
                if s > Scaled::MAX_DIMEN {
                    return Err(OverflowError {});
                }
                return Ok(s);
            }
            ScaledUnit::Point => (integer_part, fractional_part),
            _ => {
                let (n, d) = unit.conversion_fraction();
                let (converted, remainder) = Scaled(integer_part).xn_over_d(n, d)?;
                let f = fractional_part
                    .nx_plus_y(n, Scaled::from_integer(remainder.0)?)?
                    / d;
                (converted.0 + f.integer_part(), f.fractional_part())
            }
        };
        Ok(Scaled::from_integer(integer_part)? + fractional_part)
    }

    /// Add another scaled number, wrapping on overflow of the backing integer.
    pub fn wrapping_add(self, rhs: Scaled) -> Scaled {
        Scaled(self.0.wrapping_add(rhs.0))
    }

    /// Multiply by an integer, wrapping on overflow of the backing integer.
    pub fn wrapping_mul(self, rhs: i32) -> Scaled {
        Scaled(self.0.wrapping_mul(rhs))
    }

    /// Calculate `xn/d` and the remainder, where `x` is this scaled number
    /// and `n` and `d` are integers in the range `[0, 2^16]`.
    ///
    /// The intermediate product can exceed 32 bits even when the final result
    /// is in range, so the computation is done in 64 bits.
    pub fn xn_over_d(self, n: i32, d: i32) -> Result<(Scaled, Scaled), OverflowError> {
        debug_assert!(n <= 0o200000);
        debug_assert!(d <= 0o200000);
        let mut product: i64 = self.0.into();
        product *= n as i64;
        let remainder: i32 = (product % (d as i64))
            .try_into()
            .expect("d <= 2^16 so the remainder fits in 32 bits");
        product /= d as i64;
        if product < -(Scaled::MAX_DIMEN.0 as i64) || product > Scaled::MAX_DIMEN.0 as i64 {
            return Err(OverflowError {});
        }
        let product: i32 = product.try_into().expect("checked against MAX_DIMEN above");
        Ok((Scaled(product), Scaled(remainder)))
    }

    /// Calculate `xn + y` where `x` is this scaled number.
    pub fn nx_plus_y(self, mut n: i32, y: Scaled) -> Result<Scaled, OverflowError> {
        let max_answer = Scaled::MAX_DIMEN;
        if n == 0 {
            return Ok(y);
        }
        let mut x = self;
        if n < 0 {
            n = -n;
            x = -x;
        }
        if x <= (max_answer - y) / n && -x <= (max_answer + y) / n {
            Ok(x * n + y)
        } else {
            Err(OverflowError {})
        }
    }

    /// Add another scaled number, reporting overflow of the legal range.
    pub fn checked_add(self, rhs: Scaled) -> Result<Scaled, OverflowError> {
        match self.0.checked_add(rhs.0) {
            Some(sum) if sum.unsigned_abs() <= Scaled::MAX_DIMEN.0 as u32 => Ok(Scaled(sum)),
            _ => Err(OverflowError {}),
        }
    }

    /// Multiply by an integer, reporting overflow of the legal range.
    pub fn checked_mul(self, rhs: i32) -> Result<Scaled, OverflowError> {
        match self.0.checked_mul(rhs) {
            Some(product) if product.unsigned_abs() <= Scaled::MAX_DIMEN.0 as u32 => {
                Ok(Scaled(product))
            }
            _ => Err(OverflowError {}),
        }
    }

    /// Divide by an integer. Division by zero is an overflow error.
    pub fn checked_div(self, rhs: i32) -> Result<Scaled, OverflowError> {
        match self.0.checked_div(rhs) {
            Some(quotient) => Ok(Scaled(quotient)),
            None => Err(OverflowError {}),
        }
    }

    pub fn integer_part(self) -> i32 {
        self.0 / Scaled::ONE.0
    }

    pub fn fractional_part(self) -> Scaled {
        self % Scaled::ONE.0
    }

    pub fn abs(self) -> Scaled {
        Scaled(self.0.abs())
    }
}

/// Error returned when a scaled arithmetic operation leaves the legal range,
/// including division by zero.
#[derive(Debug, PartialEq, Eq)]
pub struct OverflowError;

impl std::fmt::Display for Scaled {
    fn fmt(&self, fm: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = *self;
        if s < Scaled::ZERO {
            write!(fm, "-")?;
        }
        write!(fm, "{}.", s.abs().integer_part())?;
        // Print the shortest decimal fraction that rounds back to the value.
        let mut f = s.abs().fractional_part() * 10 + Scaled(5);
        let mut delta = Scaled(10);
        loop {
            if delta > Scaled::ONE {
                f = f + Scaled(0o100000 - 50000);
            }
            fm.write_char(char::from_digit(f.integer_part().try_into().unwrap(), 10).unwrap())?;
            f = f.fractional_part() * 10;
            delta = delta * 10;
            if f <= delta {
                break;
            }
        }
        Ok(())
    }
}

impl std::ops::Add<Scaled> for Scaled {
    type Output = Scaled;
    fn add(self, rhs: Scaled) -> Self::Output {
        Scaled(self.0 + rhs.0)
    }
}
impl std::ops::Sub<Scaled> for Scaled {
    type Output = Scaled;
    fn sub(self, rhs: Scaled) -> Self::Output {
        Scaled(self.0 - rhs.0)
    }
}
impl std::ops::Mul<i32> for Scaled {
    type Output = Scaled;
    fn mul(self, rhs: i32) -> Self::Output {
        Scaled(self.0 * rhs)
    }
}
impl std::ops::Div<i32> for Scaled {
    type Output = Scaled;
    fn div(self, rhs: i32) -> Self::Output {
        Scaled(self.0 / rhs)
    }
}
impl std::ops::Rem<i32> for Scaled {
    type Output = Scaled;
    fn rem(self, rhs: i32) -> Self::Output {
        Scaled(self.0 % rhs)
    }
}
impl std::ops::Neg for Scaled {
    type Output = Scaled;
    fn neg(self) -> Self::Output {
        Scaled(-self.0)
    }
}

/// Physical unit a scaled number can be written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaledUnit {
    Point,
    Pica,
    Inch,
    BigPoint,
    Centimeter,
    Millimeter,
    DidotPoint,
    Cicero,
    ScaledPoint,
}

impl ScaledUnit {
    /// Parse a unit from its two character abbreviation, e.g. `"pc"`.
    pub fn parse(s: &str) -> Option<Self> {
        use ScaledUnit::*;
        Some(match s {
            "pt" => Point,
            "pc" => Pica,
            "in" => Inch,
            "bp" => BigPoint,
            "cm" => Centimeter,
            "mm" => Millimeter,
            "dd" => DidotPoint,
            "cc" => Cicero,
            "sp" => ScaledPoint,
            _ => return None,
        })
    }

    /// The fraction `(n, d)` converting this unit to points: a length of `x`
    /// in this unit is `xn/d` points.
    ///
    /// These constants are the legacy conversion table and must not be
    /// re-derived; all implementations agree on them bit for bit.
    pub fn conversion_fraction(&self) -> (i32, i32) {
        use ScaledUnit::*;
        match self {
            Point => (1, 1),
            Pica => (12, 1),
            Inch => (7227, 100),
            BigPoint => (7227, 7200),
            Centimeter => (7227, 254),
            Millimeter => (7227, 2540),
            DidotPoint => (1238, 1157),
            Cicero => (14856, 1157),
            ScaledPoint => (1, 1 << 16),
        }
    }
}

/// Order of infinity of a glue stretch or shrink component.
///
/// When a list is stretched or shrunk, only the glue of the highest order
/// present participates; finite glue is left alone whenever any infinite
/// glue is available.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum GlueOrder {
    #[default]
    Normal,
    Fil,
    Fill,
    Filll,
}

impl GlueOrder {
    /// Parse an infinite glue order from its keyword.
    pub fn parse(s: &str) -> Option<Self> {
        use GlueOrder::*;
        Some(match s {
            "fil" => Fil,
            "fill" => Fill,
            "filll" => Filll,
            _ => return None,
        })
    }

    fn suffix(&self) -> &'static str {
        use GlueOrder::*;
        match self {
            Normal => "pt",
            Fil => "fil",
            Fill => "fill",
            Filll => "filll",
        }
    }
}

/// Glue: a width plus the ability to stretch and shrink.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Glue {
    pub width: Scaled,
    pub stretch: Scaled,
    pub stretch_order: GlueOrder,
    pub shrink: Scaled,
    pub shrink_order: GlueOrder,
}

impl Glue {
    /// Glue with the provided width and no stretch or shrink.
    pub fn from_width(width: Scaled) -> Glue {
        Glue {
            width,
            ..Default::default()
        }
    }

    // When two stretch (or shrink) components of different infinity orders
    // are added, only the higher-order component survives.
    fn add_components(
        (a, a_order): (Scaled, GlueOrder),
        (b, b_order): (Scaled, GlueOrder),
        add: impl Fn(Scaled, Scaled) -> Option<Scaled>,
    ) -> Option<(Scaled, GlueOrder)> {
        match a_order.cmp(&b_order) {
            std::cmp::Ordering::Less => Some((b, b_order)),
            std::cmp::Ordering::Greater => Some((a, a_order)),
            std::cmp::Ordering::Equal => Some((add(a, b)?, a_order)),
        }
    }

    fn add(self, rhs: Glue, add: impl Fn(Scaled, Scaled) -> Option<Scaled>) -> Option<Glue> {
        let width = add(self.width, rhs.width)?;
        let (stretch, stretch_order) = Glue::add_components(
            (self.stretch, self.stretch_order),
            (rhs.stretch, rhs.stretch_order),
            &add,
        )?;
        let (shrink, shrink_order) = Glue::add_components(
            (self.shrink, self.shrink_order),
            (rhs.shrink, rhs.shrink_order),
            &add,
        )?;
        Some(Glue {
            width,
            stretch,
            stretch_order,
            shrink,
            shrink_order,
        })
    }

    /// Add another glue, reporting overflow of the legal range.
    pub fn checked_add(self, rhs: Glue) -> Option<Glue> {
        self.add(rhs, |a, b| a.checked_add(b).ok())
    }

    /// Add another glue, wrapping on overflow.
    pub fn wrapping_add(self, rhs: Glue) -> Glue {
        self.add(rhs, |a, b| Some(a.wrapping_add(b)))
            .expect("wrapping addition cannot fail")
    }

    fn map(self, f: impl Fn(Scaled) -> Option<Scaled>) -> Option<Glue> {
        Some(Glue {
            width: f(self.width)?,
            stretch: f(self.stretch)?,
            stretch_order: self.stretch_order,
            shrink: f(self.shrink)?,
            shrink_order: self.shrink_order,
        })
    }

    /// Multiply every component by an integer, reporting overflow.
    pub fn checked_mul(self, rhs: i32) -> Option<Glue> {
        self.map(|s| s.checked_mul(rhs).ok())
    }

    /// Multiply every component by an integer, wrapping on overflow.
    pub fn wrapping_mul(self, rhs: i32) -> Glue {
        self.map(|s| Some(s.wrapping_mul(rhs)))
            .expect("wrapping multiplication cannot fail")
    }

    /// Divide every component by an integer. Division by zero returns [None].
    pub fn checked_div(self, rhs: i32) -> Option<Glue> {
        self.map(|s| s.checked_div(rhs).ok())
    }
}

impl std::fmt::Display for Glue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}pt", self.width)?;
        if self.stretch != Scaled::ZERO {
            write!(f, " plus {}{}", self.stretch, self.stretch_order.suffix())?;
        }
        if self.shrink != Scaled::ZERO {
            write!(f, " minus {}{}", self.shrink, self.shrink_order.suffix())?;
        }
        Ok(())
    }
}
