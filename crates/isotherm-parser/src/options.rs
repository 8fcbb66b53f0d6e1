use encoding_rs::{SHIFT_JIS, UTF_8, WINDOWS_1252};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Text encoding of an instrument export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    #[default]
    Utf8,
    /// Decoded as windows-1252, the WHATWG superset of ISO-8859-1.
    Latin1,
    /// Japanese-language BEL exports.
    #[serde(rename = "shift_jis", alias = "shiftjis", alias = "sjis")]
    ShiftJis,
}

impl Encoding {
    fn codec(self) -> &'static encoding_rs::Encoding {
        match self {
            Encoding::Utf8 => UTF_8,
            Encoding::Latin1 => WINDOWS_1252,
            Encoding::ShiftJis => SHIFT_JIS,
        }
    }
}

/// Reader settings that vary between instrument installations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ParseOptions {
    /// Field separator; each reader has its own default.
    pub separator: Option<char>,
    /// Read `,` as the decimal mark in numeric cells.
    pub decimal_comma: bool,
    pub encoding: Encoding,
}

impl ParseOptions {
    pub fn separator_or(&self, default: char) -> char {
        self.separator.unwrap_or(default)
    }

    /// Decode raw file bytes into text, dropping a leading byte order mark.
    ///
    /// UTF-8 input that turns out not to be valid UTF-8 is decoded as
    /// Latin-1, which accepts every byte sequence. Other encodings replace
    /// malformed sequences with U+FFFD.
    pub fn decode(&self, bytes: &[u8]) -> String {
        let (text, actual, had_errors) = self.encoding.codec().decode(bytes);
        if had_errors && actual == UTF_8 {
            debug!("input is not UTF-8, decoding as Latin-1");
            let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
            return WINDOWS_1252
                .decode_without_bom_handling(bytes)
                .0
                .into_owned();
        }
        if had_errors {
            debug!(encoding = actual.name(), "malformed input replaced while decoding");
        }
        text.into_owned()
    }
}
