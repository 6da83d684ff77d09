use crate::error::{CardError, Result};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;

#[derive(Debug, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum OpKind {
    Issue,
    Activate,
    Status,
    Credit,
    Debit,
    Preauth,
    Fee,
}

/// One operation row from a batch file. Columns are sparse: which ones are
/// required depends on the operation kind, checked at dispatch time.
#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct OperationRow {
    pub op: OpKind,
    pub program: Option<String>,
    pub card: Option<u64>,
    pub amount: Option<Decimal>,
    /// Target status for `status` rows.
    pub value: Option<String>,
    pub expiry: Option<NaiveDate>,
    pub cvv: Option<u16>,
    pub date_of_birth: Option<NaiveDate>,
}

/// Reads operations from a CSV source.
///
/// Wraps `csv::Reader` and provides an iterator over `Result<OperationRow>`,
/// with whitespace trimming and flexible record lengths.
pub struct OperationReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> OperationReader<R> {
    /// Creates a new `OperationReader` from any `Read` source (e.g. File, Stdin).
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Returns an iterator that lazily reads and deserializes operations, so
    /// large batch files stream without loading into memory.
    pub fn operations(self) -> impl Iterator<Item = Result<OperationRow>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(CardError::from))
    }
}
