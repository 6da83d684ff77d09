use crate::application::activation::{self, ActivationProofs, StoredProofs};
use crate::application::generator;
use crate::domain::card::{
    Amount, Balance, Card, CardRecord, CardSecurity, CardStatus, FundAccount,
};
use crate::domain::customer::CustomerProfile;
use crate::domain::ports::{CardStoreBox, CustomerStoreBox, NumberRegistryBox, ProgramStoreBox};
use crate::domain::program::CardProgram;
use crate::error::{CardError, Result};
use chrono::{DateTime, NaiveDate, Utc};
use log::{debug, info, warn};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Card issuance request, arriving pre-validated from the outer layer.
#[derive(Debug, Clone, Default)]
pub struct IssueRequest {
    pub program: String,
    pub customer_id: Option<u64>,
    pub profile: Option<CustomerProfile>,
    pub funds: Option<Decimal>,
    pub embossing: Option<String>,
}

/// Result of a successful issuance. Values are returned in full; masking for
/// external transmission is the presentation layer's responsibility.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IssuedCard {
    pub serial: u64,
    pub number: String,
    pub expiry: NaiveDate,
    pub cvv: u16,
    pub pin: String,
    pub balance: Balance,
    pub program: String,
    pub customer_id: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivationReceipt {
    pub serial: u64,
    pub status: CardStatus,
    pub activated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusChange {
    pub serial: u64,
    pub previous_status: CardStatus,
    pub status: CardStatus,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FundReceipt {
    pub serial: u64,
    pub amount: Decimal,
    pub balance: Balance,
    pub ledger: Balance,
    pub transaction_at: DateTime<Utc>,
}

/// Per-card async locks. Operations on the same serial are mutually
/// exclusive; operations on different cards never contend.
#[derive(Default)]
struct CardLocks {
    locks: Mutex<HashMap<u64, Arc<tokio::sync::Mutex<()>>>>,
}

impl CardLocks {
    fn for_serial(&self, serial: u64) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().expect("card lock table poisoned");
        locks.entry(serial).or_default().clone()
    }
}

fn masked(number: &str) -> String {
    if number.len() < 10 {
        return "*".repeat(number.len());
    }
    format!("{}******{}", &number[..6], &number[number.len() - 4..])
}

/// The card issuance and ledger engine.
///
/// Owns the storage ports and composes the number generator, activation
/// validator, lifecycle state machine and fund operations. Every read-check-
/// write sequence on a card happens under that card's lock.
pub struct CardEngine {
    programs: ProgramStoreBox,
    customers: CustomerStoreBox,
    cards: CardStoreBox,
    registry: NumberRegistryBox,
    locks: CardLocks,
}

impl CardEngine {
    pub fn new(
        programs: ProgramStoreBox,
        customers: CustomerStoreBox,
        cards: CardStoreBox,
        registry: NumberRegistryBox,
    ) -> Self {
        Self {
            programs,
            customers,
            cards,
            registry,
            locks: CardLocks::default(),
        }
    }

    // MARK: programs

    /// Registers a new card program after checking its cross-field rules.
    pub async fn create_program(&self, program: CardProgram) -> Result<()> {
        program.validate()?;
        self.programs.insert(program.clone()).await?;
        info!("card program '{}' created", program.name);
        Ok(())
    }

    /// Replaces an existing program definition. Missing programs are an
    /// error; the prefix invariant is re-checked on every update.
    pub async fn update_program(&self, program: CardProgram) -> Result<()> {
        program.validate()?;
        if self.programs.get(&program.name).await?.is_none() {
            warn!("update for unknown card program '{}'", program.name);
            return Err(CardError::NotFound(format!(
                "card program '{}' not found",
                program.name
            )));
        }
        self.programs.update(program.clone()).await?;
        info!("card program '{}' updated", program.name);
        Ok(())
    }

    // MARK: lifecycle

    /// Issues a new card under a program: resolves or creates the customer,
    /// generates PAN/expiry/CVV/PIN, and persists the card aggregate
    /// (card + security + fund) as one unit.
    pub async fn issue_card(&self, request: IssueRequest) -> Result<IssuedCard> {
        info!("card issuance initiated for program '{}'", request.program);

        let program = self.programs.get(&request.program).await?.ok_or_else(|| {
            CardError::NotFound(format!("card program '{}' not found", request.program))
        })?;

        let customer = match request.customer_id {
            Some(id) => self
                .customers
                .get(id)
                .await?
                .ok_or_else(|| CardError::NotFound(format!("customer with id {id} not found")))?,
            None => {
                let profile = request
                    .profile
                    .unwrap_or_default()
                    .with_defaults(program.country.as_deref());
                let customer = self.customers.insert(profile).await?;
                info!("new customer created with id {}", customer.id);
                customer
            }
        };

        let initial = request.funds.unwrap_or(Decimal::ZERO);
        if initial < Decimal::ZERO {
            return Err(CardError::Validation(format!(
                "initial funds must not be negative, got {initial}"
            )));
        }

        let number =
            generator::generate_card_number(&program.starting_number, self.registry.as_ref())
                .await?;
        let expiry = generator::generate_expiry(program.expiry_months)?;
        let cvv = generator::generate_cvv();
        let pin = generator::generate_pin(program.pin_policy, &number);
        debug!("generated PAN {} with expiry {expiry}", masked(&number));

        let record = CardRecord {
            card: Card {
                serial: 0,
                number,
                expiry,
                status: CardStatus::Preactive,
                atm_allowed: program.atm_allowed,
                pos_allowed: program.pos_allowed,
                embossing: request.embossing,
                created_at: Utc::now(),
                first_activated_at: None,
                last_activated_at: None,
                program: program.name.clone(),
                customer_id: customer.id,
            },
            security: CardSecurity { cvv, pin },
            fund: FundAccount::new(Balance::new(initial)),
        };

        let record = self.cards.insert(record).await?;
        info!(
            "card {} issued: PAN {}, program '{}', customer {}",
            record.card.serial,
            masked(&record.card.number),
            record.card.program,
            record.card.customer_id
        );

        Ok(IssuedCard {
            serial: record.card.serial,
            number: record.card.number,
            expiry: record.card.expiry,
            cvv: record.security.cvv,
            pin: record.security.pin,
            balance: record.fund.balance,
            program: record.card.program,
            customer_id: record.card.customer_id,
        })
    }

    /// Activates a PREACTIVE card once the supplied proofs pass the
    /// program's activation policy.
    pub async fn activate_card(
        &self,
        serial: u64,
        proofs: ActivationProofs,
    ) -> Result<ActivationReceipt> {
        info!("activation initiated for card {serial}");
        let lock = self.locks.for_serial(serial);
        let _guard = lock.lock().await;

        let mut record = self.cards.get(serial).await?.ok_or_else(|| {
            CardError::NotFound(format!("card with serial {serial} not found"))
        })?;

        match record.card.status {
            CardStatus::Preactive => {}
            CardStatus::Active => {
                warn!("card {serial} already activated");
                return Err(CardError::State("card already activated".to_string()));
            }
            CardStatus::Closed => {
                warn!("activation attempted on closed card {serial}");
                return Err(CardError::State("closed card".to_string()));
            }
            CardStatus::Blocked => {
                warn!("activation attempted on blocked card {serial}");
                return Err(CardError::State("blocked card".to_string()));
            }
            other => {
                warn!("activation attempted on card {serial} in status {other}");
                return Err(CardError::State(
                    "card activation from current status is not allowed".to_string(),
                ));
            }
        }

        let program = self.programs.get(&record.card.program).await?.ok_or_else(|| {
            CardError::NotFound(format!(
                "card program '{}' not found",
                record.card.program
            ))
        })?;
        let customer = self
            .customers
            .get(record.card.customer_id)
            .await?
            .ok_or_else(|| {
                CardError::NotFound(format!(
                    "customer with id {} not found",
                    record.card.customer_id
                ))
            })?;

        let stored = StoredProofs {
            expiry: record.card.expiry,
            cvv: record.security.cvv,
            date_of_birth: customer.profile.date_of_birth,
        };
        debug!(
            "validating card {serial} against policy '{}'",
            program.activation_policy
        );
        activation::validate(program.activation_policy, &stored, &proofs).inspect_err(|e| {
            warn!("activation of card {serial} rejected: {e}");
        })?;

        let now = Utc::now();
        record.card.status = CardStatus::Active;
        record.card.first_activated_at = Some(now);
        record.card.last_activated_at = Some(now);
        self.cards.update_card(record).await?;

        info!("card {serial} activated");
        Ok(ActivationReceipt {
            serial,
            status: CardStatus::Active,
            activated_at: now,
        })
    }

    /// Administrative status override. Any transition is permitted except out
    /// of CLOSED, which is terminal (re-closing included).
    pub async fn set_status(&self, serial: u64, status: CardStatus) -> Result<StatusChange> {
        info!("status change requested for card {serial} to {status}");
        let lock = self.locks.for_serial(serial);
        let _guard = lock.lock().await;

        let mut record = self.cards.get(serial).await?.ok_or_else(|| {
            CardError::NotFound(format!("card with serial {serial} not found"))
        })?;

        let previous = record.card.status;
        if previous == CardStatus::Closed {
            warn!("rejected status change of closed card {serial} to {status}");
            return Err(CardError::State(
                "cannot change status from CLOSED".to_string(),
            ));
        }

        record.card.status = status;
        self.cards.update_card(record).await?;

        info!("card {serial} status changed {previous} -> {status}");
        Ok(StatusChange {
            serial,
            previous_status: previous,
            status,
            updated_at: Utc::now(),
        })
    }

    // MARK: fund operations

    async fn fund_op<F>(&self, serial: u64, label: &str, amount: Amount, op: F) -> Result<FundReceipt>
    where
        F: FnOnce(&mut FundAccount, Amount) -> Result<()>,
    {
        info!("{label} initiated for card {serial}, amount {}", amount.value());
        let lock = self.locks.for_serial(serial);
        let _guard = lock.lock().await;

        let mut record = self.cards.get(serial).await?.ok_or_else(|| {
            CardError::NotFound(format!("card with serial {serial} not found"))
        })?;
        record
            .card
            .eligible_for_transaction(Utc::now().date_naive())
            .inspect_err(|e| warn!("{label} rejected for card {serial}: {e}"))?;

        op(&mut record.fund, amount).inspect_err(|e| {
            warn!("{label} rejected for card {serial}: {e}");
        })?;
        // Only the fund record is persisted; the card row is untouched.
        self.cards.save_fund(serial, record.fund.clone()).await?;

        info!(
            "{label} applied to card {serial}: balance {}, ledger {}",
            record.fund.balance, record.fund.ledger
        );
        Ok(FundReceipt {
            serial,
            amount: amount.value(),
            balance: record.fund.balance,
            ledger: record.fund.ledger,
            transaction_at: record.fund.last_transaction_at,
        })
    }

    /// Adds funds: balance and ledger both increase.
    pub async fn credit(&self, serial: u64, amount: Amount) -> Result<FundReceipt> {
        self.fund_op(serial, "credit", amount, |fund, amount| {
            fund.credit(amount);
            Ok(())
        })
        .await
    }

    /// Settled debit: balance and ledger both decrease.
    pub async fn debit(&self, serial: u64, amount: Amount) -> Result<FundReceipt> {
        self.fund_op(serial, "debit", amount, FundAccount::debit).await
    }

    /// Pre-authorization hold: balance decreases, ledger is untouched.
    pub async fn pre_auth(&self, serial: u64, amount: Amount) -> Result<FundReceipt> {
        self.fund_op(serial, "pre-auth", amount, FundAccount::hold).await
    }

    /// Fee: balance and ledger both decrease, and both must cover the amount.
    pub async fn apply_fee(&self, serial: u64, amount: Amount) -> Result<FundReceipt> {
        self.fund_op(serial, "fee", amount, FundAccount::apply_fee)
            .await
    }

    // MARK: lookups

    pub async fn find_card(&self, serial: u64) -> Result<CardRecord> {
        self.cards
            .get(serial)
            .await?
            .ok_or_else(|| CardError::NotFound(format!("card with serial {serial} not found")))
    }

    pub async fn find_card_by_number(&self, number: &str) -> Result<CardRecord> {
        self.cards.find_by_number(number).await?.ok_or_else(|| {
            CardError::NotFound(format!("card with number {} not found", masked(number)))
        })
    }

    pub async fn list_cards(&self) -> Result<Vec<CardRecord>> {
        self.cards.all().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::generator::is_luhn_valid;
    use crate::domain::ports::{CardStore, CustomerStore};
    use crate::domain::program::{ActivationPolicy, Network, PinPolicy, ProgramType};
    use crate::infrastructure::in_memory::{
        InMemoryCardStore, InMemoryCustomerStore, InMemoryNumberRegistry, InMemoryProgramStore,
    };
    use rust_decimal_macros::dec;

    fn sample_program() -> CardProgram {
        CardProgram {
            name: "STD_PREPAID".to_string(),
            description: "Standard prepaid".to_string(),
            program_type: ProgramType::Prepaid,
            network: Network::Visa,
            bin: "411111".to_string(),
            starting_number: "4111110000".to_string(),
            pin_policy: PinPolicy::Last4OfPan,
            activation_policy: ActivationPolicy::ExpiryCvv,
            atm_allowed: true,
            pos_allowed: false,
            currency_code: "USD".to_string(),
            country: Some("US".to_string()),
            expiry_months: 24,
            email: "ops@example.com".to_string(),
        }
    }

    struct Harness {
        engine: CardEngine,
        cards: InMemoryCardStore,
        customers: InMemoryCustomerStore,
    }

    async fn harness() -> Harness {
        let cards = InMemoryCardStore::new();
        let customers = InMemoryCustomerStore::new();
        let engine = CardEngine::new(
            Box::new(InMemoryProgramStore::new()),
            Box::new(customers.clone()),
            Box::new(cards.clone()),
            Box::new(InMemoryNumberRegistry::new()),
        );
        engine.create_program(sample_program()).await.unwrap();
        Harness {
            engine,
            cards,
            customers,
        }
    }

    fn issue_request(funds: Decimal) -> IssueRequest {
        IssueRequest {
            program: "STD_PREPAID".to_string(),
            customer_id: None,
            profile: Some(CustomerProfile {
                first_name: Some("Ada".to_string()),
                date_of_birth: NaiveDate::from_ymd_opt(1990, 1, 15),
                ..Default::default()
            }),
            funds: Some(funds),
            embossing: Some("ADA LOVELACE".to_string()),
        }
    }

    async fn activation_proofs(h: &Harness, serial: u64) -> ActivationProofs {
        let record = h.cards.get(serial).await.unwrap().unwrap();
        ActivationProofs {
            expiry: Some(record.card.expiry),
            cvv: Some(record.security.cvv),
            date_of_birth: NaiveDate::from_ymd_opt(1990, 1, 15),
        }
    }

    #[tokio::test]
    async fn test_issue_creates_preactive_aggregate() {
        let h = harness().await;
        let issued = h.engine.issue_card(issue_request(dec!(100))).await.unwrap();

        assert!(issued.number.starts_with("411111"));
        assert_eq!(issued.number.len(), 16);
        assert!(is_luhn_valid(&issued.number));
        assert_eq!(issued.pin, issued.number[12..]);
        assert_eq!(issued.balance, Balance::new(dec!(100)));

        let record = h.cards.get(issued.serial).await.unwrap().unwrap();
        assert_eq!(record.card.status, CardStatus::Preactive);
        assert!(record.card.atm_allowed);
        assert!(!record.card.pos_allowed);
        assert_eq!(record.fund.ledger, Balance::new(dec!(100)));
        assert_eq!(record.card.embossing.as_deref(), Some("ADA LOVELACE"));

        let customer = h.customers.get(issued.customer_id).await.unwrap().unwrap();
        assert_eq!(customer.profile.country.as_deref(), Some("US"));
        assert_eq!(customer.profile.language.as_deref(), Some("en"));
    }

    #[tokio::test]
    async fn test_issue_unknown_program() {
        let h = harness().await;
        let result = h
            .engine
            .issue_card(IssueRequest {
                program: "NO_SUCH".to_string(),
                ..Default::default()
            })
            .await;
        assert!(matches!(result, Err(CardError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_issue_with_existing_customer() {
        let h = harness().await;
        let first = h.engine.issue_card(issue_request(dec!(0))).await.unwrap();

        let second = h
            .engine
            .issue_card(IssueRequest {
                program: "STD_PREPAID".to_string(),
                customer_id: Some(first.customer_id),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(second.customer_id, first.customer_id);
        assert_ne!(second.number, first.number);

        let missing = h
            .engine
            .issue_card(IssueRequest {
                program: "STD_PREPAID".to_string(),
                customer_id: Some(9999),
                ..Default::default()
            })
            .await;
        assert!(matches!(missing, Err(CardError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_issue_negative_funds_rejected() {
        let h = harness().await;
        let result = h.engine.issue_card(issue_request(dec!(-5))).await;
        assert!(matches!(result, Err(CardError::Validation(_))));
    }

    #[tokio::test]
    async fn test_activation_happy_path() {
        let h = harness().await;
        let issued = h.engine.issue_card(issue_request(dec!(0))).await.unwrap();

        let proofs = activation_proofs(&h, issued.serial).await;
        let receipt = h.engine.activate_card(issued.serial, proofs).await.unwrap();
        assert_eq!(receipt.status, CardStatus::Active);

        let record = h.cards.get(issued.serial).await.unwrap().unwrap();
        assert_eq!(record.card.status, CardStatus::Active);
        assert!(record.card.first_activated_at.is_some());
        assert_eq!(
            record.card.first_activated_at,
            record.card.last_activated_at
        );
    }

    #[tokio::test]
    async fn test_activation_proof_errors_propagate() {
        let h = harness().await;
        let issued = h.engine.issue_card(issue_request(dec!(0))).await.unwrap();

        let mut wrong_cvv = activation_proofs(&h, issued.serial).await;
        wrong_cvv.cvv = Some(if issued.cvv == 999 { 100 } else { issued.cvv + 1 });
        let result = h.engine.activate_card(issued.serial, wrong_cvv).await;
        match result {
            Err(CardError::Validation(msg)) => assert_eq!(msg, "incorrect cvv provided"),
            other => panic!("expected validation error, got {other:?}"),
        }

        let mut missing_expiry = activation_proofs(&h, issued.serial).await;
        missing_expiry.expiry = None;
        let result = h.engine.activate_card(issued.serial, missing_expiry).await;
        match result {
            Err(CardError::Validation(msg)) => assert_eq!(msg, "expiry not provided"),
            other => panic!("expected validation error, got {other:?}"),
        }

        // Failed attempts leave the card preactive.
        let record = h.cards.get(issued.serial).await.unwrap().unwrap();
        assert_eq!(record.card.status, CardStatus::Preactive);
    }

    #[tokio::test]
    async fn test_activation_status_gate_messages() {
        let h = harness().await;

        let state_message = |result: Result<ActivationReceipt>| match result {
            Err(CardError::State(msg)) => msg,
            other => panic!("expected state error, got {other:?}"),
        };

        let issued = h.engine.issue_card(issue_request(dec!(0))).await.unwrap();
        let proofs = activation_proofs(&h, issued.serial).await;
        h.engine
            .activate_card(issued.serial, proofs)
            .await
            .unwrap();
        assert_eq!(
            state_message(h.engine.activate_card(issued.serial, proofs).await),
            "card already activated"
        );

        let blocked = h.engine.issue_card(issue_request(dec!(0))).await.unwrap();
        h.engine
            .set_status(blocked.serial, CardStatus::Blocked)
            .await
            .unwrap();
        assert_eq!(
            state_message(h.engine.activate_card(blocked.serial, proofs).await),
            "blocked card"
        );

        let closed = h.engine.issue_card(issue_request(dec!(0))).await.unwrap();
        h.engine
            .set_status(closed.serial, CardStatus::Closed)
            .await
            .unwrap();
        assert_eq!(
            state_message(h.engine.activate_card(closed.serial, proofs).await),
            "closed card"
        );

        let reissued = h.engine.issue_card(issue_request(dec!(0))).await.unwrap();
        h.engine
            .set_status(reissued.serial, CardStatus::Reissued)
            .await
            .unwrap();
        assert_eq!(
            state_message(h.engine.activate_card(reissued.serial, proofs).await),
            "card activation from current status is not allowed"
        );
    }

    #[tokio::test]
    async fn test_activation_of_missing_card() {
        let h = harness().await;
        let result = h
            .engine
            .activate_card(42, ActivationProofs::default())
            .await;
        assert!(matches!(result, Err(CardError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_closed_is_terminal() {
        let h = harness().await;
        let issued = h.engine.issue_card(issue_request(dec!(0))).await.unwrap();
        h.engine
            .set_status(issued.serial, CardStatus::Closed)
            .await
            .unwrap();

        for target in [
            CardStatus::Active,
            CardStatus::Blocked,
            CardStatus::Closed, // re-closing is disallowed too
        ] {
            let result = h.engine.set_status(issued.serial, target).await;
            match result {
                Err(CardError::State(msg)) => {
                    assert_eq!(msg, "cannot change status from CLOSED")
                }
                other => panic!("expected state error, got {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn test_set_status_is_otherwise_permissive() {
        // Any non-CLOSED status may move to any other, including
        // EXPIRED -> ACTIVE. This is an administrative override by design.
        let h = harness().await;
        let issued = h.engine.issue_card(issue_request(dec!(0))).await.unwrap();

        h.engine
            .set_status(issued.serial, CardStatus::Expired)
            .await
            .unwrap();
        let change = h
            .engine
            .set_status(issued.serial, CardStatus::Active)
            .await
            .unwrap();
        assert_eq!(change.previous_status, CardStatus::Expired);
        assert_eq!(change.status, CardStatus::Active);
    }

    #[tokio::test]
    async fn test_debit_and_preauth_scenarios() {
        let h = harness().await;
        let issued = h.engine.issue_card(issue_request(dec!(100))).await.unwrap();
        let serial = issued.serial;

        let receipt = h
            .engine
            .debit(serial, Amount::new(dec!(60)).unwrap())
            .await
            .unwrap();
        assert_eq!(receipt.balance, Balance::new(dec!(40)));
        assert_eq!(receipt.ledger, Balance::new(dec!(40)));

        let result = h.engine.debit(serial, Amount::new(dec!(50)).unwrap()).await;
        assert!(matches!(result, Err(CardError::InsufficientFunds(_))));
        let record = h.cards.get(serial).await.unwrap().unwrap();
        assert_eq!(record.fund.balance, Balance::new(dec!(40)));
        assert_eq!(record.fund.ledger, Balance::new(dec!(40)));

        let receipt = h
            .engine
            .pre_auth(serial, Amount::new(dec!(30)).unwrap())
            .await
            .unwrap();
        assert_eq!(receipt.balance, Balance::new(dec!(10)));
        assert_eq!(receipt.ledger, Balance::new(dec!(40)));
    }

    #[tokio::test]
    async fn test_fee_scenarios() {
        let h = harness().await;
        let issued = h.engine.issue_card(issue_request(dec!(0))).await.unwrap();
        let serial = issued.serial;

        h.engine
            .credit(serial, Amount::new(dec!(100)).unwrap())
            .await
            .unwrap();
        let receipt = h
            .engine
            .apply_fee(serial, Amount::new(dec!(30)).unwrap())
            .await
            .unwrap();
        assert_eq!(receipt.balance, Balance::new(dec!(70)));
        assert_eq!(receipt.ledger, Balance::new(dec!(70)));

        // A hold shrinks the balance below the fee while the ledger covers it.
        h.engine
            .pre_auth(serial, Amount::new(dec!(60)).unwrap())
            .await
            .unwrap();
        let result = h
            .engine
            .apply_fee(serial, Amount::new(dec!(20)).unwrap())
            .await;
        assert!(matches!(result, Err(CardError::InsufficientFunds(_))));
    }

    #[tokio::test]
    async fn test_fund_ops_require_eligible_status() {
        let h = harness().await;
        let issued = h.engine.issue_card(issue_request(dec!(100))).await.unwrap();

        // Preactive cards transact.
        h.engine
            .credit(issued.serial, Amount::new(dec!(1)).unwrap())
            .await
            .unwrap();

        h.engine
            .set_status(issued.serial, CardStatus::Blocked)
            .await
            .unwrap();
        let result = h
            .engine
            .credit(issued.serial, Amount::new(dec!(1)).unwrap())
            .await;
        assert!(matches!(result, Err(CardError::State(_))));
    }

    #[tokio::test]
    async fn test_expired_card_rejects_fund_ops() {
        let h = harness().await;
        let issued = h.engine.issue_card(issue_request(dec!(100))).await.unwrap();

        let mut record = h.cards.get(issued.serial).await.unwrap().unwrap();
        record.card.expiry = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        h.cards.update_card(record).await.unwrap();

        let result = h
            .engine
            .debit(issued.serial, Amount::new(dec!(10)).unwrap())
            .await;
        match result {
            Err(CardError::State(msg)) => assert!(msg.contains("expired")),
            other => panic!("expected state error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_fund_op_on_missing_card() {
        let h = harness().await;
        let result = h.engine.credit(42, Amount::new(dec!(1)).unwrap()).await;
        assert!(matches!(result, Err(CardError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_update_program_missing() {
        let h = harness().await;
        let mut program = sample_program();
        program.name = "NO_SUCH".to_string();
        let result = h.engine.update_program(program).await;
        assert!(matches!(result, Err(CardError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_duplicate_program_conflicts() {
        let h = harness().await;
        let result = h.engine.create_program(sample_program()).await;
        assert!(matches!(result, Err(CardError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_find_by_number() {
        let h = harness().await;
        let issued = h.engine.issue_card(issue_request(dec!(0))).await.unwrap();
        let record = h.engine.find_card_by_number(&issued.number).await.unwrap();
        assert_eq!(record.card.serial, issued.serial);

        let missing = h.engine.find_card_by_number("4111119999999999").await;
        assert!(matches!(missing, Err(CardError::NotFound(_))));
    }
}
