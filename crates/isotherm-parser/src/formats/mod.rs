mod bel_common;
mod bel_csv;
mod bel_dat;
mod common;
mod generic_csv;

pub use bel_csv::BelCsvParser;
pub use bel_dat::BelDatParser;
pub use generic_csv::{GenericCsvParser, GENERIC_CSV_VERSION};

pub(crate) use common::TableBuilder;
