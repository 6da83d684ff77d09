use crate::domain::card::CardRecord;
use crate::error::Result;
use rust_decimal::Decimal;
use serde::Serialize;
use std::io::Write;

/// Masks a PAN for external transmission: first six and last four digits
/// kept, the middle replaced. Masking is presentation policy; the core always
/// returns full values.
pub fn mask_pan(number: &str) -> String {
    if number.len() < 10 {
        return "*".repeat(number.len());
    }
    format!("{}******{}", &number[..6], &number[number.len() - 4..])
}

#[derive(Debug, Serialize)]
struct CardSummaryRow {
    card: u64,
    pan: String,
    status: String,
    balance: Decimal,
    ledger: Decimal,
}

/// Writes card summaries as CSV, one row per card, with the PAN masked.
pub struct CardWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> CardWriter<W> {
    pub fn new(target: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(target),
        }
    }

    pub fn write_cards(&mut self, records: Vec<CardRecord>) -> Result<()> {
        for record in records {
            self.writer.serialize(CardSummaryRow {
                card: record.card.serial,
                pan: mask_pan(&record.card.number),
                status: record.card.status.to_string(),
                balance: record.fund.balance.0,
                ledger: record.fund.ledger.0,
            })?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
