use cardcore::application::activation::ActivationProofs;
use cardcore::application::engine::{CardEngine, IssueRequest};
use cardcore::domain::card::{Amount, CardStatus};
use cardcore::domain::program::CardProgram;
use cardcore::error::CardError;
use cardcore::infrastructure::in_memory::{
    InMemoryCardStore, InMemoryCustomerStore, InMemoryNumberRegistry, InMemoryProgramStore,
};
use cardcore::interfaces::csv::card_writer::CardWriter;
use cardcore::interfaces::csv::operation_reader::{OpKind, OperationReader, OperationRow};
use clap::Parser;
use miette::{IntoDiagnostic, Result};
use std::fs::File;
use std::io;
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Card program definitions (JSON array)
    #[arg(long)]
    programs: PathBuf,

    /// Input operations CSV file
    input: PathBuf,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[cfg(feature = "storage-rocksdb")]
    #[arg(long)]
    db_path: Option<PathBuf>,
}

fn build_engine(cli: &Cli) -> Result<CardEngine> {
    #[cfg(not(feature = "storage-rocksdb"))]
    let _ = cli;

    #[cfg(feature = "storage-rocksdb")]
    if let Some(db_path) = &cli.db_path {
        use cardcore::infrastructure::rocksdb::RocksDbStore;
        let store = RocksDbStore::open(db_path).into_diagnostic()?;
        return Ok(CardEngine::new(
            Box::new(store.clone()),
            Box::new(store.clone()),
            Box::new(store.clone()),
            Box::new(store),
        ));
    }

    Ok(CardEngine::new(
        Box::new(InMemoryProgramStore::new()),
        Box::new(InMemoryCustomerStore::new()),
        Box::new(InMemoryCardStore::new()),
        Box::new(InMemoryNumberRegistry::new()),
    ))
}

fn required_card(row: &OperationRow) -> cardcore::error::Result<u64> {
    row.card
        .ok_or_else(|| CardError::Validation("operation row missing card serial".to_string()))
}

async fn apply_operation(engine: &CardEngine, row: OperationRow) -> cardcore::error::Result<()> {
    match row.op {
        OpKind::Issue => {
            let program = row.program.clone().ok_or_else(|| {
                CardError::Validation("issue row missing program".to_string())
            })?;
            engine
                .issue_card(IssueRequest {
                    program,
                    funds: row.amount,
                    ..Default::default()
                })
                .await
                .map(drop)
        }
        OpKind::Activate => {
            let serial = required_card(&row)?;
            let proofs = ActivationProofs {
                expiry: row.expiry,
                cvv: row.cvv,
                date_of_birth: row.date_of_birth,
            };
            engine.activate_card(serial, proofs).await.map(drop)
        }
        OpKind::Status => {
            let serial = required_card(&row)?;
            let status: CardStatus = row
                .value
                .as_deref()
                .ok_or_else(|| {
                    CardError::Validation("status row missing target status".to_string())
                })?
                .parse()?;
            engine.set_status(serial, status).await.map(drop)
        }
        OpKind::Credit | OpKind::Debit | OpKind::Preauth | OpKind::Fee => {
            let serial = required_card(&row)?;
            let amount = Amount::new(row.amount.ok_or_else(|| {
                CardError::Validation("fund operation row missing amount".to_string())
            })?)?;
            match row.op {
                OpKind::Credit => engine.credit(serial, amount).await.map(drop),
                OpKind::Debit => engine.debit(serial, amount).await.map(drop),
                OpKind::Preauth => engine.pre_auth(serial, amount).await.map(drop),
                _ => engine.apply_fee(serial, amount).await.map(drop),
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let engine = build_engine(&cli)?;

    // Seed programs; already-known names are fine when reusing a database.
    let file = File::open(&cli.programs).into_diagnostic()?;
    let programs: Vec<CardProgram> = serde_json::from_reader(file).into_diagnostic()?;
    for program in programs {
        match engine.create_program(program).await {
            Ok(()) | Err(CardError::Conflict(_)) => {}
            Err(e) => return Err(e).into_diagnostic(),
        }
    }

    // Process operations, keeping going past per-row failures.
    let file = File::open(&cli.input).into_diagnostic()?;
    let reader = OperationReader::new(file);
    for row_result in reader.operations() {
        match row_result {
            Ok(row) => {
                if let Err(e) = apply_operation(&engine, row).await {
                    eprintln!("Error processing operation: {e}");
                }
            }
            Err(e) => {
                eprintln!("Error reading operation: {e}");
            }
        }
    }

    // Output final card state with PANs masked.
    let cards = engine.list_cards().await.into_diagnostic()?;
    let stdout = io::stdout();
    let mut writer = CardWriter::new(stdout.lock());
    writer.write_cards(cards).into_diagnostic()?;

    Ok(())
}
