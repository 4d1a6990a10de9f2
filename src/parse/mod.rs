//! nom grammars for the textual rule formats accepted on the command line.
//!
//! * All: `<isotope>:<symbol>` (`13:C`)
//! * Specific: `<isotope>:<symbol>:<position>` (`13:C:2`)
//! * Enumerate: `<isotope>:<symbol>:<min>:<max>`, `<isotope>:<symbol>:<max>` or
//!   `<isotope>:<symbol>`
//! * Charge: `<symbol>:<position>:<charge>` (`N:1:+1`)
//!
//! Anything else is a [`ValidationError::MalformedRuleString`]. Parsing checks
//! shape only; whether the symbol, isotope or position makes sense for a given
//! molecule is decided during validation.

use nom::{
    branch::alt,
    character::complete::{char, digit1, one_of, satisfy},
    combinator::{all_consuming, map, map_res, opt, recognize},
    sequence::{pair, preceded, tuple},
    IResult,
};

use crate::{ChargeState, IsotopeRule, Position, ValidationError};

type Res<'a, T> = IResult<&'a str, T>;

const ALL_FORMAT: &str = "\"isotope:element\"";
const SPECIFIC_FORMAT: &str = "\"isotope:element:position\"";
const ENUMERATE_FORMAT: &str =
    "\"isotope:element:min:max\", \"isotope:element:max\" or \"isotope:element\"";
const CHARGE_FORMAT: &str = "\"element:position:charge\"";

fn isotope(input: &str) -> Res<&str> {
    digit1(input)
}

/// One uppercase letter, optionally followed by one lowercase letter.
fn symbol(input: &str) -> Res<&str> {
    recognize(pair(
        satisfy(|c| c.is_ascii_uppercase()),
        opt(satisfy(|c| c.is_ascii_lowercase())),
    ))(input)
}

fn count(input: &str) -> Res<usize> {
    map_res(digit1, str::parse)(input)
}

fn position(input: &str) -> Res<Position> {
    map_res(digit1, str::parse)(input)
}

fn charge(input: &str) -> Res<i32> {
    map_res(recognize(pair(opt(one_of("+-")), digit1)), str::parse)(input)
}

fn field<'a, T>(parser: impl FnMut(&'a str) -> Res<'a, T>) -> impl FnMut(&'a str) -> Res<'a, T> {
    preceded(char(':'), parser)
}

fn malformed(kind: &'static str, rule: &str, expected: &'static str) -> ValidationError {
    ValidationError::MalformedRuleString {
        kind,
        rule: rule.to_string(),
        expected,
    }
}

pub fn parse_all_rule(rule: &str) -> Result<IsotopeRule, ValidationError> {
    let (_, (isotope, symbol)) = all_consuming(pair(isotope, field(symbol)))(rule.trim())
        .map_err(|_| malformed("all", rule, ALL_FORMAT))?;
    Ok(IsotopeRule::All {
        symbol: symbol.to_string(),
        isotope: isotope.to_string(),
    })
}

pub fn parse_specific_rule(rule: &str) -> Result<IsotopeRule, ValidationError> {
    let (_, (isotope, symbol, position)) =
        all_consuming(tuple((isotope, field(symbol), field(position))))(rule.trim())
            .map_err(|_| malformed("specific", rule, SPECIFIC_FORMAT))?;
    Ok(IsotopeRule::Specific {
        symbol: symbol.to_string(),
        isotope: isotope.to_string(),
        position,
    })
}

/// Parses an Enumerate rule. A missing `min` is 0; a missing `max` stays `None`
/// until validation resolves it to the number of atoms of that element.
pub fn parse_enumerate_rule(rule: &str) -> Result<IsotopeRule, ValidationError> {
    let (_, (isotope, symbol, min, max)) = all_consuming(alt((
        map(
            tuple((isotope, field(symbol), field(count), field(count))),
            |(isotope, symbol, min, max)| (isotope, symbol, min, Some(max)),
        ),
        map(
            tuple((isotope, field(symbol), field(count))),
            |(isotope, symbol, max)| (isotope, symbol, 0, Some(max)),
        ),
        map(pair(isotope, field(symbol)), |(isotope, symbol)| {
            (isotope, symbol, 0, None)
        }),
    )))(rule.trim())
    .map_err(|_| malformed("enumerate", rule, ENUMERATE_FORMAT))?;

    Ok(IsotopeRule::Enumerate {
        symbol: symbol.to_string(),
        isotope: isotope.to_string(),
        min,
        max,
    })
}

pub fn parse_charge_state(rule: &str) -> Result<ChargeState, ValidationError> {
    let (_, (symbol, position, charge)) =
        all_consuming(tuple((symbol, field(position), field(charge))))(rule.trim())
            .map_err(|_| malformed("charge", rule, CHARGE_FORMAT))?;
    Ok(ChargeState {
        symbol: symbol.to_string(),
        position,
        charge,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_all() {
        assert_eq!(
            parse_all_rule("13:C"),
            Ok(IsotopeRule::All {
                symbol: "C".to_string(),
                isotope: "13".to_string()
            })
        );
        assert_eq!(
            parse_all_rule(" 15:N ").unwrap().symbol(),
            "N"
        );
        assert!(parse_all_rule("13:C:2").is_err());
        assert!(parse_all_rule("C:13").is_err());
    }

    #[test]
    fn test_parse_specific() {
        assert_eq!(
            parse_specific_rule("2:H:12"),
            Ok(IsotopeRule::Specific {
                symbol: "H".to_string(),
                isotope: "2".to_string(),
                position: 12
            })
        );
        assert!(parse_specific_rule("13:C").is_err());
        assert!(parse_specific_rule("13:C:x").is_err());
    }

    #[test]
    fn test_parse_enumerate_arities() {
        let enumerate = |symbol: &str, isotope: &str, min, max| IsotopeRule::Enumerate {
            symbol: symbol.to_string(),
            isotope: isotope.to_string(),
            min,
            max,
        };
        assert_eq!(parse_enumerate_rule("13:C:1:2"), Ok(enumerate("C", "13", 1, Some(2))));
        assert_eq!(parse_enumerate_rule("13:C:2"), Ok(enumerate("C", "13", 0, Some(2))));
        assert_eq!(parse_enumerate_rule("13:Cl"), Ok(enumerate("Cl", "13", 0, None)));
    }

    #[test]
    fn test_parse_enumerate_rejects_garbage() {
        for rule in ["13:C:1:2:3", "13:C:", "13:C:a", ":C", "13", ""] {
            assert!(
                matches!(
                    parse_enumerate_rule(rule),
                    Err(ValidationError::MalformedRuleString { kind: "enumerate", .. })
                ),
                "{rule:?} should be malformed"
            );
        }
    }

    #[test]
    fn test_parse_charge() {
        let state = parse_charge_state("N:4:+1").unwrap();
        assert_eq!((state.symbol.as_str(), state.position, state.charge), ("N", 4, 1));
        assert_eq!(parse_charge_state("O:2:-1").unwrap().charge, -1);
        assert_eq!(parse_charge_state("O:2:0").unwrap().charge, 0);
        assert!(parse_charge_state("O:2").is_err());
    }
}
