pub mod aif;
pub mod branch;
pub mod compose;
pub mod definitions;
pub mod diagnostics;
pub mod errors;
pub mod formats;
pub mod model;
pub mod options;
mod registry;
pub mod units;
pub mod value;

pub use aif::write_aif;
pub use branch::{split, split_table};
pub use compose::{assemble, compose};
pub use definitions::{
    resolve, sanitize_key, DefinitionTable, FieldDefinition, MatchMode, ValueType,
};
pub use diagnostics::{Diagnostics, ParseWarning};
pub use errors::{
    CastError, KeyNotFound, ParserAttempt, ParserError, SchemaError, UnitError, UnitRole,
};
pub use model::{
    Branch, DataTable, ExportError, IsothermRecord, Metadata, OutputLayout, RawIsotherm,
};
pub use options::{Encoding, ParseOptions};
pub use registry::{
    parse_isotherm_file, parse_with_parsers, parser_by_name, parser_names, read_isotherm,
    IsothermParser, PARSERS,
};
pub use units::{
    parse_loading, parse_pressure, parse_temperature_unit, LoadingBasis, LoadingUnits,
    MaterialBasis, PressureMode, PressureUnit, PressureUnits,
};
pub use value::{cast, split_number_unit, Value};
