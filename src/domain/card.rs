use crate::error::{CardError, Result};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Sub, SubAssign};
use std::str::FromStr;

/// Represents a monetary value held on a card.
///
/// This is a wrapper around `rust_decimal::Decimal` to enforce domain-specific
/// rules and provide type safety for financial calculations.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
pub struct Balance(pub Decimal);

/// Represents a positive monetary amount for fund operations.
///
/// Ensures that operation amounts are always positive; zero and negative
/// amounts are rejected at construction time.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Amount(Decimal);

impl Amount {
    pub fn new(value: Decimal) -> Result<Self> {
        if value > Decimal::ZERO {
            Ok(Self(value))
        } else {
            Err(CardError::Validation(format!(
                "amount must be positive, got {value}"
            )))
        }
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = CardError;

    fn try_from(value: Decimal) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Amount> for Balance {
    fn from(amount: Amount) -> Self {
        Self(amount.0)
    }
}

impl Balance {
    pub const ZERO: Self = Self(Decimal::ZERO);

    pub fn new(amount: Decimal) -> Self {
        Self(amount)
    }
}

impl Add for Balance {
    type Output = Self;
    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Sub for Balance {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

impl AddAssign for Balance {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl SubAssign for Balance {
    fn sub_assign(&mut self, rhs: Self) {
        self.0 -= rhs.0;
    }
}

impl fmt::Display for Balance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Card lifecycle status. Serialized as the single-letter codes used on the
/// wire and in storage.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
pub enum CardStatus {
    #[serde(rename = "P")]
    Preactive,
    #[serde(rename = "A")]
    Active,
    #[serde(rename = "B")]
    Blocked,
    #[serde(rename = "C")]
    Closed,
    #[serde(rename = "E")]
    Expired,
    #[serde(rename = "I")]
    Inactive,
    #[serde(rename = "F")]
    FraudBlocked,
    #[serde(rename = "R")]
    Reissued,
}

impl fmt::Display for CardStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CardStatus::Preactive => "PREACTIVE",
            CardStatus::Active => "ACTIVE",
            CardStatus::Blocked => "BLOCKED",
            CardStatus::Closed => "CLOSED",
            CardStatus::Expired => "EXPIRED",
            CardStatus::Inactive => "INACTIVE",
            CardStatus::FraudBlocked => "FRAUDBLOCKED",
            CardStatus::Reissued => "REISSUED",
        };
        f.write_str(name)
    }
}

impl FromStr for CardStatus {
    type Err = CardError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "PREACTIVE" => Ok(CardStatus::Preactive),
            "ACTIVE" => Ok(CardStatus::Active),
            "BLOCKED" => Ok(CardStatus::Blocked),
            "CLOSED" => Ok(CardStatus::Closed),
            "EXPIRED" => Ok(CardStatus::Expired),
            "INACTIVE" => Ok(CardStatus::Inactive),
            "FRAUDBLOCKED" => Ok(CardStatus::FraudBlocked),
            "REISSUED" => Ok(CardStatus::Reissued),
            other => Err(CardError::Validation(format!(
                "unknown card status '{other}'"
            ))),
        }
    }
}

/// The card entity. Channel flags are a snapshot of the program at issuance
/// time, not a live reference.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Card {
    pub serial: u64,
    pub number: String,
    pub expiry: NaiveDate,
    pub status: CardStatus,
    pub atm_allowed: bool,
    pub pos_allowed: bool,
    pub embossing: Option<String>,
    pub created_at: DateTime<Utc>,
    pub first_activated_at: Option<DateTime<Utc>>,
    pub last_activated_at: Option<DateTime<Utc>>,
    pub program: String,
    pub customer_id: u64,
}

impl Card {
    /// Gate shared by all fund operations: only ACTIVE and PREACTIVE cards
    /// transact, and only before their expiry date.
    pub fn eligible_for_transaction(&self, today: NaiveDate) -> Result<()> {
        if !matches!(self.status, CardStatus::Active | CardStatus::Preactive) {
            return Err(CardError::State(format!(
                "card {} status is not ACTIVE or PREACTIVE (currently {})",
                self.serial, self.status
            )));
        }
        if self.expiry < today {
            return Err(CardError::State(format!(
                "card {} is expired (expiry {})",
                self.serial, self.expiry
            )));
        }
        Ok(())
    }
}

/// Security material paired one-to-one with a card.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct CardSecurity {
    pub cvv: u16,
    pub pin: String,
}

/// The fund record paired one-to-one with a card.
///
/// `balance` is the spendable amount and is reduced by holds; `ledger` is the
/// settled accounting total and is reduced only by settled debits and fees.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct FundAccount {
    pub balance: Balance,
    pub ledger: Balance,
    pub last_transaction_at: DateTime<Utc>,
}

impl FundAccount {
    pub fn new(initial: Balance) -> Self {
        Self {
            balance: initial,
            ledger: initial,
            last_transaction_at: Utc::now(),
        }
    }

    /// Adds funds to both balance and ledger. No upper bound is enforced.
    pub fn credit(&mut self, amount: Amount) {
        self.balance += amount.into();
        self.ledger += amount.into();
        self.last_transaction_at = Utc::now();
    }

    /// Settled debit: reduces balance and ledger if the balance covers it.
    pub fn debit(&mut self, amount: Amount) -> Result<()> {
        if self.balance < amount.into() {
            return Err(CardError::InsufficientFunds(format!(
                "balance {} is less than debit amount {}",
                self.balance,
                amount.value()
            )));
        }
        self.balance -= amount.into();
        self.ledger -= amount.into();
        self.last_transaction_at = Utc::now();
        Ok(())
    }

    /// Pre-authorization hold: reduces balance only. The ledger is untouched
    /// until the hold settles, which is outside this engine.
    pub fn hold(&mut self, amount: Amount) -> Result<()> {
        if self.balance < amount.into() {
            return Err(CardError::InsufficientFunds(format!(
                "balance {} is less than hold amount {}",
                self.balance,
                amount.value()
            )));
        }
        self.balance -= amount.into();
        self.last_transaction_at = Utc::now();
        Ok(())
    }

    /// Fee: reduces balance and ledger, and requires both to cover the
    /// amount so the ledger never goes negative.
    pub fn apply_fee(&mut self, amount: Amount) -> Result<()> {
        if self.balance < amount.into() || self.ledger < amount.into() {
            return Err(CardError::InsufficientFunds(format!(
                "balance {} or ledger {} is less than fee amount {}",
                self.balance,
                self.ledger,
                amount.value()
            )));
        }
        self.balance -= amount.into();
        self.ledger -= amount.into();
        self.last_transaction_at = Utc::now();
        Ok(())
    }
}

/// The card aggregate: the card root plus its security and fund records.
/// These are created and first persisted as a single unit; no component may
/// construct or persist the sub-records independently.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct CardRecord {
    pub card: Card,
    pub security: CardSecurity,
    pub fund: FundAccount,
}
