use crate::domain::card::{CardRecord, FundAccount};
use crate::domain::customer::{Customer, CustomerProfile};
use crate::domain::ports::{CardStore, CustomerStore, NumberRegistry, ProgramStore};
use crate::domain::program::CardProgram;
use crate::error::{CardError, Result};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

/// A thread-safe in-memory store for card programs.
///
/// Uses `Arc<RwLock<HashMap>>` to allow shared concurrent access. Ideal for
/// tests and single-process runs where persistence is not required.
#[derive(Default, Clone)]
pub struct InMemoryProgramStore {
    programs: Arc<RwLock<HashMap<String, CardProgram>>>,
}

impl InMemoryProgramStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProgramStore for InMemoryProgramStore {
    async fn insert(&self, program: CardProgram) -> Result<()> {
        let mut programs = self.programs.write().await;
        if programs.contains_key(&program.name) {
            return Err(CardError::Conflict(format!(
                "card program '{}' already exists",
                program.name
            )));
        }
        programs.insert(program.name.clone(), program);
        Ok(())
    }

    async fn get(&self, name: &str) -> Result<Option<CardProgram>> {
        let programs = self.programs.read().await;
        Ok(programs.get(name).cloned())
    }

    async fn update(&self, program: CardProgram) -> Result<()> {
        let mut programs = self.programs.write().await;
        if !programs.contains_key(&program.name) {
            return Err(CardError::NotFound(format!(
                "card program '{}' not found",
                program.name
            )));
        }
        programs.insert(program.name.clone(), program);
        Ok(())
    }

    async fn all(&self) -> Result<Vec<CardProgram>> {
        let programs = self.programs.read().await;
        let mut all: Vec<_> = programs.values().cloned().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(all)
    }
}

/// A thread-safe in-memory store for customers. Ids are assigned from an
/// atomic counter, mimicking a database sequence.
#[derive(Default, Clone)]
pub struct InMemoryCustomerStore {
    customers: Arc<RwLock<HashMap<u64, Customer>>>,
    next_id: Arc<AtomicU64>,
}

impl InMemoryCustomerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CustomerStore for InMemoryCustomerStore {
    async fn insert(&self, profile: CustomerProfile) -> Result<Customer> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let customer = Customer { id, profile };
        let mut customers = self.customers.write().await;
        customers.insert(id, customer.clone());
        Ok(customer)
    }

    async fn get(&self, id: u64) -> Result<Option<Customer>> {
        let customers = self.customers.read().await;
        Ok(customers.get(&id).cloned())
    }
}

#[derive(Default)]
struct CardTable {
    records: HashMap<u64, CardRecord>,
    by_number: HashMap<String, u64>,
}

/// A thread-safe in-memory store for the card aggregate.
///
/// Keeps a PAN index alongside the serial index so `insert` can enforce
/// number uniqueness the way a database unique constraint would.
#[derive(Default, Clone)]
pub struct InMemoryCardStore {
    table: Arc<RwLock<CardTable>>,
    next_serial: Arc<AtomicU64>,
}

impl InMemoryCardStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CardStore for InMemoryCardStore {
    async fn insert(&self, mut record: CardRecord) -> Result<CardRecord> {
        let mut table = self.table.write().await;
        if table.by_number.contains_key(&record.card.number) {
            return Err(CardError::Conflict(format!(
                "card number {} already issued",
                record.card.number
            )));
        }
        let serial = self.next_serial.fetch_add(1, Ordering::SeqCst) + 1;
        record.card.serial = serial;
        table.by_number.insert(record.card.number.clone(), serial);
        table.records.insert(serial, record.clone());
        Ok(record)
    }

    async fn get(&self, serial: u64) -> Result<Option<CardRecord>> {
        let table = self.table.read().await;
        Ok(table.records.get(&serial).cloned())
    }

    async fn find_by_number(&self, number: &str) -> Result<Option<CardRecord>> {
        let table = self.table.read().await;
        Ok(table
            .by_number
            .get(number)
            .and_then(|serial| table.records.get(serial))
            .cloned())
    }

    async fn update_card(&self, record: CardRecord) -> Result<()> {
        let mut table = self.table.write().await;
        let serial = record.card.serial;
        if !table.records.contains_key(&serial) {
            return Err(CardError::NotFound(format!(
                "card with serial {serial} not found"
            )));
        }
        table.records.insert(serial, record);
        Ok(())
    }

    async fn save_fund(&self, serial: u64, fund: FundAccount) -> Result<()> {
        let mut table = self.table.write().await;
        match table.records.get_mut(&serial) {
            Some(record) => {
                record.fund = fund;
                Ok(())
            }
            None => Err(CardError::NotFound(format!(
                "card with serial {serial} not found"
            ))),
        }
    }

    async fn all(&self) -> Result<Vec<CardRecord>> {
        let table = self.table.read().await;
        let mut all: Vec<_> = table.records.values().cloned().collect();
        all.sort_by_key(|r| r.card.serial);
        Ok(all)
    }
}

/// In-memory reserve-if-absent registry of issued PANs. The write lock makes
/// check-and-insert a single critical section.
#[derive(Default, Clone)]
pub struct InMemoryNumberRegistry {
    numbers: Arc<RwLock<HashSet<String>>>,
}

impl InMemoryNumberRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl NumberRegistry for InMemoryNumberRegistry {
    async fn reserve(&self, number: &str) -> Result<bool> {
        let mut numbers = self.numbers.write().await;
        Ok(numbers.insert(number.to_string()))
    }
}
