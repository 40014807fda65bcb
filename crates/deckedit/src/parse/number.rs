//! nom parser combinators for the numeric fields embedded in cell, surface,
//! and transform cards.

use nom::bytes::complete::take_while1;
use nom::character::complete::{char, digit1, space0};
use nom::combinator::{all_consuming, map_res, opt, recognize};
use nom::multi::many1;
use nom::number::complete::double;
use nom::sequence::{preceded, terminated};
use nom::IResult;

/// Unsigned 32-bit integer, trimming leading whitespace.
pub(crate) fn uint32(i: &str) -> IResult<&str, u32> {
    map_res(digit1, str::parse)(i.trim_start())
}

/// Signed 64-bit integer, trimming leading whitespace.
pub(crate) fn int64(i: &str) -> IResult<&str, i64> {
    map_res(recognize(preceded(opt(char('-')), digit1)), str::parse)(i.trim_start())
}

/// Floating point field, trimming leading whitespace.
pub(crate) fn float64(i: &str) -> IResult<&str, f64> {
    double(i.trim_start())
}

/// A run of digits and/or `.` characters, with no leading-sign handling -
/// callers that care about a sign consume it themselves first (geometry
/// tokens keep the sign out of the renumbered magnitude).
pub(crate) fn digits_and_dots(i: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_ascii_digit() || c == '.')(i)
}

/// Parses `s` as a `u32` only if every character in `s` is a digit, with
/// nothing left over (used for the bare-digit suffix of header tokens like
/// `tr12`, `m5`, `mt3`).
pub(crate) fn full_uint32(s: &str) -> Option<u32> {
    all_consuming(map_res(digit1, str::parse::<u32>))(s).ok().map(|(_, v)| v)
}

/// A whitespace-separated run of floating point values, as used by
/// transform cards' 3/12/13-number bodies.
pub(crate) fn vector_of_f64(i: &str) -> IResult<&str, Vec<f64>> {
    many1(terminated(double, space0))(i.trim_start())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uint32_trims_and_stops_at_first_non_digit() {
        let (rest, v) = uint32("  42 abc").unwrap();
        assert_eq!(v, 42);
        assert_eq!(rest, " abc");
    }

    #[test]
    fn int64_parses_negative_values() {
        let (rest, v) = int64("-17rest").unwrap();
        assert_eq!(v, -17);
        assert_eq!(rest, "rest");
    }

    #[test]
    fn full_uint32_rejects_trailing_garbage() {
        assert_eq!(full_uint32("12"), Some(12));
        assert_eq!(full_uint32("12a"), None);
        assert_eq!(full_uint32(""), None);
    }

    #[test]
    fn vector_of_f64_reads_a_transform_body() {
        let (rest, values) = vector_of_f64(" 0 0 0 1 0 0 0 1 0 0 0 1 ").unwrap();
        assert_eq!(values.len(), 12);
        assert_eq!(rest, "");
    }
}
