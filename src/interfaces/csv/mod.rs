pub mod card_writer;
pub mod operation_reader;
