//! Dimension parsing.
//!
//! A dimension is a decimal constant (with an optional fraction) followed by
//! a unit, or an internal value read from a register.
//! The unit conversion constants and their rounding behavior are the legacy
//! ones, reproduced verbatim in [galley_core::ScaledUnit].

use galley_core::{GlueOrder, Scaled, ScaledUnit};

use super::keyword::parse_keyword;
use crate::error;
use crate::parse;
use crate::prelude as sl;
use crate::token::Value;
use crate::traits::*;
use crate::vm;

impl<S: SetlangState> Parsable<S> for Scaled {
    fn parse_impl(input: &mut vm::ExpansionInput<S>) -> sl::Result<Self> {
        scan_dimen(input, None)
    }
}

/// Scan a dimension, optionally accepting the infinite `fil` units.
///
/// If `glue_order` is provided, the `fil`, `fill` and `filll` units are
/// accepted and the matched order is written through the reference.
/// This is how the stretch and shrink components of glue are scanned.
pub(crate) fn scan_dimen<S: SetlangState>(
    input: &mut vm::ExpansionInput<S>,
    mut glue_order: Option<&mut GlueOrder>,
) -> sl::Result<Scaled> {
    let negative = super::number::parse_optional_signs(input)?.is_some();
    let first_token = input.next_or(DimenEndOfInputError {})?;
    let (integer_part, has_fractional_part) = match first_token.value() {
        Value::CommandRef(command_ref) => {
            use super::number::InternalNumber;
            match super::number::parse_internal_number(input, first_token, command_ref)? {
                InternalNumber::Integer(i) => (i, false),
                InternalNumber::Dimen(d) => {
                    return Ok(if negative { -d } else { d });
                }
                InternalNumber::Glue(g) => {
                    return Ok(if negative { -g.width } else { g.width });
                }
            }
        }
        Value::Other(',' | '.') => (0, true),
        _ => {
            input.back(first_token);
            let (_, i, radix) = super::number::parse_integer(input)?;
            // A fractional part is only scanned after a decimal constant.
            let has_fractional_part = match radix {
                Some(10) => match input.next()? {
                    Some(next) => match next.value() {
                        Value::Other(',' | '.') => true,
                        _ => {
                            input.back(next);
                            false
                        }
                    },
                    None => false,
                },
                _ => false,
            };
            (i, has_fractional_part)
        }
    };
    let fractional_part = if has_fractional_part {
        scan_decimal_fraction(input)?
    } else {
        Scaled::ZERO
    };

    let (negative, integer_part) = if integer_part < 0 {
        // Only possible when the integer came from an internal value, in
        // which case the fractional part is zero.
        (!negative, -integer_part)
    } else {
        (negative, integer_part)
    };
    if let Some(glue_order) = glue_order.as_deref_mut() {
        if let Some(order) = scan_fil_unit(input)? {
            *glue_order = order;
            let s = match Scaled::from_integer(integer_part) {
                Ok(i) => i + fractional_part,
                Err(_) => {
                    report_dimension_too_large(input, first_token)?;
                    Scaled::MAX_DIMEN
                }
            };
            return Ok(if negative { -s } else { s });
        }
    }
    let s = match scan_and_apply_units(input, integer_part, fractional_part)? {
        ScanAndApplyResult::Scaled(s) => s,
        ScanAndApplyResult::Overflow(negative_overflow) => {
            report_dimension_too_large(input, first_token)?;
            if negative_overflow {
                -Scaled::MAX_DIMEN
            } else {
                Scaled::MAX_DIMEN
            }
        }
    };
    Ok(if negative { -s } else { s })
}

fn report_dimension_too_large<S: SetlangState>(
    input: &mut vm::ExpansionInput<S>,
    first_token: crate::token::Token,
) -> sl::Result<()> {
    input.vm().error(
        parse::Error::new(
            "a dimension in the range (-2^14pt, 2^14pt)",
            Some(first_token),
            "",
        )
        .with_got_override("a dimension that's too large"),
    )
}

enum ScanAndApplyResult {
    Scaled(Scaled),
    // Overflow; true if the overflow was in the negative direction.
    Overflow(bool),
}

/// Scan the infinite fil/fill/filll units, if present.
fn scan_fil_unit<S: SetlangState>(
    input: &mut vm::ExpansionInput<S>,
) -> sl::Result<Option<GlueOrder>> {
    if !parse_keyword(input, "fil")? {
        return Ok(None);
    }
    let mut order = GlueOrder::Fil;
    while parse_keyword(input, "l")? {
        order = match order {
            GlueOrder::Fil => GlueOrder::Fill,
            GlueOrder::Fill => GlueOrder::Filll,
            _ => {
                let got = input.peek()?.copied();
                input.vm().error(parse::Error::new(
                    "a fil unit with at most three l's",
                    got,
                    "the infinite units are fil, fill and filll",
                ))?;
                GlueOrder::Filll
            }
        };
    }
    super::OptionalSpace::parse(input)?;
    Ok(Some(order))
}

/// Apply a unit to a scanned constant.
///
/// The unit is an internal value (coerce semantics: the constant multiplies
/// the value, and a bare integer counts as scaled points), the `em`/`ex`
/// units read from the current font, or one of the physical units.
fn scan_and_apply_units<S: SetlangState>(
    input: &mut vm::ExpansionInput<S>,
    integer_part: i32,
    fractional_part: Scaled,
) -> sl::Result<ScanAndApplyResult> {
    if let Some(next) = input.next()? {
        let v_or = match next.value() {
            Value::CommandRef(command_ref) => {
                use super::number::InternalNumber;
                Some(
                    match super::number::parse_internal_number(input, next, command_ref)? {
                        InternalNumber::Integer(i) => Scaled(i),
                        InternalNumber::Dimen(scaled) => scaled,
                        InternalNumber::Glue(g) => g.width,
                    },
                )
            }
            _ => {
                input.back(next);
                if parse_keyword(input, "em")? {
                    super::OptionalSpace::parse(input)?;
                    Some(input.state().em_width())
                } else if parse_keyword(input, "ex")? {
                    super::OptionalSpace::parse(input)?;
                    Some(input.state().ex_height())
                } else {
                    None
                }
            }
        };
        if let Some(v) = v_or {
            let Ok(adjusted_fractional_part) = v.xn_over_d(fractional_part.0, 0o200000) else {
                return Ok(ScanAndApplyResult::Overflow(v < Scaled::ZERO));
            };
            return Ok(
                match v.nx_plus_y(integer_part, adjusted_fractional_part.0) {
                    Ok(s) => ScanAndApplyResult::Scaled(s),
                    Err(_) => ScanAndApplyResult::Overflow(v < Scaled::ZERO),
                },
            );
        }
    }

    let scaled_unit = ScaledUnitKeyword::parse(input)?.0;
    super::OptionalSpace::parse(input)?;
    Ok(match Scaled::new(integer_part, fractional_part, scaled_unit) {
        Ok(s) => ScanAndApplyResult::Scaled(s),
        Err(_) => ScanAndApplyResult::Overflow(false),
    })
}

struct ScaledUnitKeyword(ScaledUnit);

impl<S: SetlangState> Parsable<S> for ScaledUnitKeyword {
    fn parse_impl(input: &mut vm::ExpansionInput<S>) -> sl::Result<Self> {
        for (keyword, unit) in [
            ("pt", ScaledUnit::Point),
            ("in", ScaledUnit::Inch),
            ("pc", ScaledUnit::Pica),
            ("cm", ScaledUnit::Centimeter),
            ("mm", ScaledUnit::Millimeter),
            ("bp", ScaledUnit::BigPoint),
            ("dd", ScaledUnit::DidotPoint),
            ("cc", ScaledUnit::Cicero),
            ("sp", ScaledUnit::ScaledPoint),
        ] {
            if parse_keyword(input, keyword)? {
                return Ok(ScaledUnitKeyword(unit));
            }
        }
        let got = input.peek()?.copied();
        input.vm().error(parse::Error::new(
            "a unit of measure",
            got,
            "the units of measure are pt, pc, in, bp, cm, mm, dd, cc and sp",
        ))?;
        Ok(ScaledUnitKeyword(ScaledUnit::Point))
    }
}

/// Scan the digits of a decimal fraction, after the decimal point.
fn scan_decimal_fraction<S: SetlangState>(
    input: &mut vm::ExpansionInput<S>,
) -> sl::Result<Scaled> {
    // 17 digits are enough: further digits cannot affect the result, because
    // the smallest scaled number is 2^-16.
    let mut digits = [0_u8; 17];
    let mut i = 0_usize;
    while let Some(token) = input.next()? {
        let d: u8 = match token.value() {
            Value::Other(c) if c.is_ascii_digit() => (c as u32 as u8) - b'0',
            Value::Space(_) => {
                break;
            }
            _ => {
                input.back(token);
                break;
            }
        };
        if let Some(digit) = digits.get_mut(i) {
            *digit = d;
            i += 1;
        }
    }
    Ok(Scaled::from_decimal_digits(&digits[0..i]))
}

#[derive(Debug)]
struct DimenEndOfInputError;

impl error::EndOfInputError for DimenEndOfInputError {
    fn doing(&self) -> String {
        "parsing a dimension".into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::testing::*;

    #[derive(Default)]
    struct State;

    impl SetlangState for State {}

    parse_success_tests![
        (zero_pt, "0pt", Scaled::ZERO),
        (one_pt, "1pt", Scaled::ONE),
        (one_pt_negative, "-1pt", -Scaled::ONE),
        (two_pt, "2pt", Scaled::TWO),
        (empty_point, ".pt", Scaled::ZERO),
        (fraction_1, "0.5pt", Scaled::from_decimal_digits(&[5])),
        (fraction_2, "-0.5pt", -Scaled::from_decimal_digits(&[5])),
        (
            fraction_3,
            "1.5pt",
            Scaled::ONE + Scaled::from_decimal_digits(&[5])
        ),
        (units_in_1, "1in", (Scaled::ONE * 7227) / 100),
        (units_in_2, "1 in", (Scaled::ONE * 7227) / 100),
        (units_pc, "1pc", Scaled::ONE * 12),
        (units_cm, "1cm", (Scaled::ONE * 7227) / 254),
        (units_mm, "1mm", (Scaled::ONE * 7227) / 2540),
        (units_bp, "1bp", (Scaled::ONE * 7227) / 7200),
        (units_dd, "1dd", (Scaled::ONE * 1238) / 1157),
        (units_cc, "1cc", (Scaled::ONE * 14856) / 1157),
        (units_sp_1, "1sp", Scaled(1)),
        (units_sp_2, "1.999999sp", Scaled(1)),
        (nearly_overflow_pt, "16383.99998pt", Scaled::MAX_DIMEN),
        (nearly_overflow_sp, "1073741823sp", Scaled::MAX_DIMEN),
    ];

    parse_failure_tests!(
        Scaled,
        State,
        (invalid_unit, "1xy"),
        (overflow_pt, "16384pt"),
        (overflow_pt_neg, "-16384pt"),
        (overflow_in_1, "300in"),
        (overflow_in_2, "300000000in"),
        (overflow_sp, "1073741824sp"),
    );
}
