use crate::parser::tab_parser::TabDuration;
use crate::transcriber::tuning::{Tuning, TuningRoot};
use encoding_rs::{Encoding, WINDOWS_1252};
use nom::branch::alt;
use nom::bytes::complete::tag;
use nom::character::complete::{char, digit1, one_of};
use nom::combinator::{all_consuming, map_opt, map_res, opt, value};
use nom::{IResult, Parser};

/// Parse unsigned decimal integer
pub fn parse_unsigned(i: &str) -> IResult<&str, u32> {
    map_res(digit1, |d: &str| d.parse::<u32>()).parse(i)
}

/// Parse a tablature duration token: a power-of-two denominator, `breve` or `long`.
pub fn parse_duration(i: &str) -> IResult<&str, TabDuration> {
    alt((
        value(TabDuration::Breve, tag("breve")),
        value(TabDuration::Long, tag("long")),
        map_opt(parse_unsigned, TabDuration::from_denominator),
    ))
    .parse(i)
}

/// Parse a tuning code such as `G` or `F-` (Abzug).
pub fn parse_tuning_code(i: &str) -> IResult<&str, Tuning> {
    map_opt((one_of("FGA"), opt(char('-'))), |(root, abzug)| {
        TuningRoot::from_letter(root).map(|root| Tuning::new(root, abzug.is_some()))
    })
    .parse(i)
}

/// Run `parser` over the whole (trimmed) attribute value.
pub fn parse_token<'a, O, P>(parser: P, input: &'a str) -> Option<O>
where
    P: Parser<&'a str, Output = O, Error = nom::error::Error<&'a str>>,
{
    all_consuming(parser)
        .parse(input.trim())
        .ok()
        .map(|(_, parsed)| parsed)
}

/// Materialize properly encoded text from raw file bytes
pub fn decode_text(i: &[u8]) -> String {
    if let Some((encoding, bom_len)) = Encoding::for_bom(i) {
        log::debug!("Decoding text with BOM for {}", encoding.name());
        let (cow, _had_errors) = encoding.decode_without_bom_handling(&i[bom_len..]);
        return cow.into_owned();
    }
    match std::str::from_utf8(i) {
        Ok(s) => s.to_string(),
        Err(e) => {
            log::debug!("Error UTF-8 text parsing:{e}, falling back to windows-1252");
            let (cow, _encoding_used, _had_errors) = WINDOWS_1252.decode(i);
            cow.into_owned()
        }
    }
}
