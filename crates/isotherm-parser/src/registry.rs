use tracing::debug;

use crate::compose::assemble;
use crate::errors::{ParserAttempt, ParserError};
use crate::formats::{BelCsvParser, BelDatParser, GenericCsvParser};
use crate::model::{IsothermRecord, RawIsotherm};
use crate::options::ParseOptions;

pub trait IsothermParser: Sync {
    fn name(&self) -> &'static str;
    fn parse(&self, content: &str, options: &ParseOptions) -> Result<RawIsotherm, ParserError>;
}

/// Every reader, in the order auto-detection tries them.
pub const PARSERS: &[&dyn IsothermParser] = &[&BelDatParser, &BelCsvParser, &GenericCsvParser];

pub fn parser_names() -> Vec<&'static str> {
    PARSERS.iter().map(|parser| parser.name()).collect()
}

pub fn parser_by_name(name: &str) -> Result<&'static dyn IsothermParser, ParserError> {
    PARSERS
        .iter()
        .copied()
        .find(|parser| parser.name().eq_ignore_ascii_case(name.trim()))
        .ok_or_else(|| ParserError::UnknownParser {
            name: name.to_string(),
        })
}

pub fn parse_isotherm_file(
    content: &str,
    options: &ParseOptions,
) -> Result<RawIsotherm, ParserError> {
    parse_with_parsers(content, options, PARSERS)
}

pub fn parse_with_parsers(
    content: &str,
    options: &ParseOptions,
    parsers: &[&dyn IsothermParser],
) -> Result<RawIsotherm, ParserError> {
    detect(content, options, parsers).map(|(_, raw)| raw)
}

fn detect<'p>(
    content: &str,
    options: &ParseOptions,
    parsers: &[&'p dyn IsothermParser],
) -> Result<(&'p dyn IsothermParser, RawIsotherm), ParserError> {
    let mut attempts = Vec::new();

    for parser in parsers {
        match parser.parse(content, options) {
            Ok(parsed) => return Ok((*parser, parsed)),
            Err(ParserError::FormatMismatch { reason, .. }) => {
                debug!(parser = parser.name(), %reason, "format mismatch");
                attempts.push(ParserAttempt::new(parser.name(), reason));
            }
            Err(err) => return Err(err),
        }
    }

    Err(ParserError::NoMatchingParser { attempts })
}

/// Read a file with the named reader, or by auto-detection, and assemble
/// the output record.
pub fn read_isotherm(
    content: &str,
    options: &ParseOptions,
    parser: Option<&str>,
) -> Result<IsothermRecord, ParserError> {
    let (parser, raw) = match parser {
        Some(name) => {
            let parser = parser_by_name(name)?;
            (parser, parser.parse(content, options)?)
        }
        None => detect(content, options, PARSERS)?,
    };
    assemble(raw).map_err(|source| ParserError::Schema {
        parser: parser.name(),
        source,
    })
}
