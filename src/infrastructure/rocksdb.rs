use crate::domain::card::{CardRecord, FundAccount};
use crate::domain::customer::{Customer, CustomerProfile};
use crate::domain::ports::{CardStore, CustomerStore, NumberRegistry, ProgramStore};
use crate::domain::program::CardProgram;
use crate::error::{CardError, Result};
use async_trait::async_trait;
use rocksdb::{ColumnFamilyDescriptor, DB, Options};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Column family for card program definitions, keyed by name.
pub const CF_PROGRAMS: &str = "programs";
/// Column family for customers, keyed by id.
pub const CF_CUSTOMERS: &str = "customers";
/// Column family for card aggregates, keyed by serial.
pub const CF_CARDS: &str = "cards";
/// Column family backing the PAN registry and number index, keyed by PAN.
pub const CF_CARD_NUMBERS: &str = "card_numbers";

const KEY_NEXT_CARD_SERIAL: &[u8] = b"meta:next_card_serial";
const KEY_NEXT_CUSTOMER_ID: &[u8] = b"meta:next_customer_id";

fn internal<E: std::error::Error + Send + Sync + 'static>(e: E) -> CardError {
    CardError::Internal(Box::new(e))
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    serde_json::to_vec(value).map_err(internal)
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    serde_json::from_slice(bytes).map_err(internal)
}

/// A persistent store implementation using RocksDB.
///
/// Implements every storage port plus the number registry over one database,
/// so PAN uniqueness is a durable constraint that survives restarts. The
/// struct is thread-safe; `Clone` shares the underlying `Arc<DB>`. The
/// check-then-insert sections are serialized by an internal mutex, which is
/// sufficient for the single-process deployments this backend targets.
#[derive(Clone)]
pub struct RocksDbStore {
    db: Arc<DB>,
    next_card_serial: Arc<AtomicU64>,
    next_customer_id: Arc<AtomicU64>,
    write_lock: Arc<Mutex<()>>,
}

impl RocksDbStore {
    /// Opens or creates a RocksDB instance at the specified path, ensuring
    /// the required column families exist and reloading the id counters.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cfs = [CF_PROGRAMS, CF_CUSTOMERS, CF_CARDS, CF_CARD_NUMBERS]
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect::<Vec<_>>();

        let db = DB::open_cf_descriptors(&opts, path, cfs).map_err(internal)?;

        let load_counter = |key: &[u8]| -> Result<u64> {
            let stored = db.get(key).map_err(internal)?;
            Ok(match stored {
                Some(bytes) => {
                    let bytes: [u8; 8] = bytes
                        .as_slice()
                        .try_into()
                        .map_err(|_| CardError::Internal("corrupt id counter".into()))?;
                    u64::from_be_bytes(bytes)
                }
                None => 0,
            })
        };
        let next_card_serial = load_counter(KEY_NEXT_CARD_SERIAL)?;
        let next_customer_id = load_counter(KEY_NEXT_CUSTOMER_ID)?;

        Ok(Self {
            db: Arc::new(db),
            next_card_serial: Arc::new(AtomicU64::new(next_card_serial)),
            next_customer_id: Arc::new(AtomicU64::new(next_customer_id)),
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    fn cf(&self, name: &str) -> Result<&rocksdb::ColumnFamily> {
        self.db.cf_handle(name).ok_or_else(|| {
            CardError::Internal(format!("column family '{name}' not found").into())
        })
    }

    fn bump_counter(&self, counter: &AtomicU64, key: &[u8]) -> Result<u64> {
        let id = counter.fetch_add(1, Ordering::SeqCst) + 1;
        self.db.put(key, id.to_be_bytes()).map_err(internal)?;
        Ok(id)
    }
}

#[async_trait]
impl ProgramStore for RocksDbStore {
    async fn insert(&self, program: CardProgram) -> Result<()> {
        let _guard = self.write_lock.lock().expect("store lock poisoned");
        let cf = self.cf(CF_PROGRAMS)?;
        if self
            .db
            .get_pinned_cf(cf, program.name.as_bytes())
            .map_err(internal)?
            .is_some()
        {
            return Err(CardError::Conflict(format!(
                "card program '{}' already exists",
                program.name
            )));
        }
        self.db
            .put_cf(cf, program.name.as_bytes(), encode(&program)?)
            .map_err(internal)
    }

    async fn get(&self, name: &str) -> Result<Option<CardProgram>> {
        let cf = self.cf(CF_PROGRAMS)?;
        match self.db.get_cf(cf, name.as_bytes()).map_err(internal)? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn update(&self, program: CardProgram) -> Result<()> {
        let _guard = self.write_lock.lock().expect("store lock poisoned");
        let cf = self.cf(CF_PROGRAMS)?;
        if self
            .db
            .get_pinned_cf(cf, program.name.as_bytes())
            .map_err(internal)?
            .is_none()
        {
            return Err(CardError::NotFound(format!(
                "card program '{}' not found",
                program.name
            )));
        }
        self.db
            .put_cf(cf, program.name.as_bytes(), encode(&program)?)
            .map_err(internal)
    }

    async fn all(&self) -> Result<Vec<CardProgram>> {
        let cf = self.cf(CF_PROGRAMS)?;
        let mut programs = Vec::new();
        for item in self.db.iterator_cf(cf, rocksdb::IteratorMode::Start) {
            let (_key, value) = item.map_err(internal)?;
            programs.push(decode(&value)?);
        }
        Ok(programs)
    }
}

#[async_trait]
impl CustomerStore for RocksDbStore {
    async fn insert(&self, profile: CustomerProfile) -> Result<Customer> {
        let id = self.bump_counter(&self.next_customer_id, KEY_NEXT_CUSTOMER_ID)?;
        let customer = Customer { id, profile };
        let cf = self.cf(CF_CUSTOMERS)?;
        self.db
            .put_cf(cf, id.to_be_bytes(), encode(&customer)?)
            .map_err(internal)?;
        Ok(customer)
    }

    async fn get(&self, id: u64) -> Result<Option<Customer>> {
        let cf = self.cf(CF_CUSTOMERS)?;
        match self.db.get_cf(cf, id.to_be_bytes()).map_err(internal)? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl CardStore for RocksDbStore {
    async fn insert(&self, mut record: CardRecord) -> Result<CardRecord> {
        let _guard = self.write_lock.lock().expect("store lock poisoned");
        let numbers = self.cf(CF_CARD_NUMBERS)?;

        // A number key carrying a serial means a live card owns that PAN; an
        // empty value is only a generator reservation.
        let existing = self
            .db
            .get_cf(numbers, record.card.number.as_bytes())
            .map_err(internal)?;
        if existing.as_ref().is_some_and(|v| v.len() == 8) {
            return Err(CardError::Conflict(format!(
                "card number {} already issued",
                record.card.number
            )));
        }

        let serial = self.bump_counter(&self.next_card_serial, KEY_NEXT_CARD_SERIAL)?;
        record.card.serial = serial;
        self.db
            .put_cf(numbers, record.card.number.as_bytes(), serial.to_be_bytes())
            .map_err(internal)?;
        let cards = self.cf(CF_CARDS)?;
        self.db
            .put_cf(cards, serial.to_be_bytes(), encode(&record)?)
            .map_err(internal)?;
        Ok(record)
    }

    async fn get(&self, serial: u64) -> Result<Option<CardRecord>> {
        let cf = self.cf(CF_CARDS)?;
        match self.db.get_cf(cf, serial.to_be_bytes()).map_err(internal)? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn find_by_number(&self, number: &str) -> Result<Option<CardRecord>> {
        let numbers = self.cf(CF_CARD_NUMBERS)?;
        let serial = match self
            .db
            .get_cf(numbers, number.as_bytes())
            .map_err(internal)?
        {
            Some(bytes) if bytes.len() == 8 => {
                let bytes: [u8; 8] = bytes.as_slice().try_into().expect("length checked");
                u64::from_be_bytes(bytes)
            }
            _ => return Ok(None),
        };
        CardStore::get(self, serial).await
    }

    async fn update_card(&self, record: CardRecord) -> Result<()> {
        let _guard = self.write_lock.lock().expect("store lock poisoned");
        let cf = self.cf(CF_CARDS)?;
        let key = record.card.serial.to_be_bytes();
        if self.db.get_pinned_cf(cf, key).map_err(internal)?.is_none() {
            return Err(CardError::NotFound(format!(
                "card with serial {} not found",
                record.card.serial
            )));
        }
        self.db.put_cf(cf, key, encode(&record)?).map_err(internal)
    }

    async fn save_fund(&self, serial: u64, fund: FundAccount) -> Result<()> {
        let _guard = self.write_lock.lock().expect("store lock poisoned");
        let cf = self.cf(CF_CARDS)?;
        let key = serial.to_be_bytes();
        let mut record: CardRecord = match self.db.get_cf(cf, key).map_err(internal)? {
            Some(bytes) => decode(&bytes)?,
            None => {
                return Err(CardError::NotFound(format!(
                    "card with serial {serial} not found"
                )));
            }
        };
        record.fund = fund;
        self.db.put_cf(cf, key, encode(&record)?).map_err(internal)
    }

    async fn all(&self) -> Result<Vec<CardRecord>> {
        let cf = self.cf(CF_CARDS)?;
        let mut records: Vec<CardRecord> = Vec::new();
        for item in self.db.iterator_cf(cf, rocksdb::IteratorMode::Start) {
            let (_key, value) = item.map_err(internal)?;
            records.push(decode(&value)?);
        }
        records.sort_by_key(|r| r.card.serial);
        Ok(records)
    }
}

#[async_trait]
impl NumberRegistry for RocksDbStore {
    async fn reserve(&self, number: &str) -> Result<bool> {
        let _guard = self.write_lock.lock().expect("store lock poisoned");
        let cf = self.cf(CF_CARD_NUMBERS)?;
        if self
            .db
            .get_pinned_cf(cf, number.as_bytes())
            .map_err(internal)?
            .is_some()
        {
            return Ok(false);
        }
        self.db
            .put_cf(cf, number.as_bytes(), Vec::<u8>::new())
            .map_err(internal)?;
        Ok(true)
    }
}
