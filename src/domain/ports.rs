use super::card::{CardRecord, FundAccount};
use super::customer::{Customer, CustomerProfile};
use super::program::CardProgram;
use crate::error::Result;
use async_trait::async_trait;

/// Storage port for card programs. Program names are a unique key; inserting
/// a duplicate name fails with `CardError::Conflict`.
#[async_trait]
pub trait ProgramStore: Send + Sync {
    async fn insert(&self, program: CardProgram) -> Result<()>;
    async fn get(&self, name: &str) -> Result<Option<CardProgram>>;
    async fn update(&self, program: CardProgram) -> Result<()>;
    async fn all(&self) -> Result<Vec<CardProgram>>;
}

/// Storage port for customers. `insert` assigns and returns the customer id.
#[async_trait]
pub trait CustomerStore: Send + Sync {
    async fn insert(&self, profile: CustomerProfile) -> Result<Customer>;
    async fn get(&self, id: u64) -> Result<Option<Customer>>;
}

/// Storage port for the card aggregate.
///
/// `insert` persists card, security and fund as one atomic unit, assigns the
/// serial, and fails with `CardError::Conflict` on a duplicate PAN — the
/// durable uniqueness backstop behind the number registry. `save_fund`
/// persists only the fund record of an existing card.
#[async_trait]
pub trait CardStore: Send + Sync {
    async fn insert(&self, record: CardRecord) -> Result<CardRecord>;
    async fn get(&self, serial: u64) -> Result<Option<CardRecord>>;
    async fn find_by_number(&self, number: &str) -> Result<Option<CardRecord>>;
    async fn update_card(&self, record: CardRecord) -> Result<()>;
    async fn save_fund(&self, serial: u64, fund: FundAccount) -> Result<()>;
    async fn all(&self) -> Result<Vec<CardRecord>>;
}

/// Reserve-if-absent registry of issued card numbers.
///
/// `reserve` must be atomic with respect to concurrent issuance: it returns
/// `true` when the number was free and is now taken, `false` when it was
/// already reserved so the caller can retry with a new candidate.
#[async_trait]
pub trait NumberRegistry: Send + Sync {
    async fn reserve(&self, number: &str) -> Result<bool>;
}

pub type ProgramStoreBox = Box<dyn ProgramStore>;
pub type CustomerStoreBox = Box<dyn CustomerStore>;
pub type CardStoreBox = Box<dyn CardStore>;
pub type NumberRegistryBox = Box<dyn NumberRegistry>;
