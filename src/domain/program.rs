use crate::error::{CardError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Funding model of a program.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
pub enum ProgramType {
    #[serde(rename = "P")]
    Prepaid,
    #[serde(rename = "D")]
    Debit,
    #[serde(rename = "C")]
    Credit,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "UPPERCASE")]
pub enum Network {
    Visa,
    Mastercard,
    UnionPay,
    Discover,
}

/// How the PIN for a newly issued card is derived.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
pub enum PinPolicy {
    /// The last four digits of the PAN.
    #[serde(rename = "last-4-of-pan")]
    Last4OfPan,
    /// A uniformly random four-digit PIN.
    #[serde(rename = "random-4-digit")]
    Random4Digit,
}

impl FromStr for PinPolicy {
    type Err = CardError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "last-4-of-pan" => Ok(PinPolicy::Last4OfPan),
            "random-4-digit" => Ok(PinPolicy::Random4Digit),
            _ => Err(CardError::NotFound(format!(
                "pin option '{s}' not found for program"
            ))),
        }
    }
}

/// Which proofs a cardholder must supply to activate a card of this program.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "kebab-case")]
pub enum ActivationPolicy {
    Expiry,
    Cvv,
    Dob,
    ExpiryCvv,
    DobCvv,
    /// Expiry, date of birth and CVV all required.
    All,
}

impl FromStr for ActivationPolicy {
    type Err = CardError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "expiry" => Ok(ActivationPolicy::Expiry),
            "cvv" => Ok(ActivationPolicy::Cvv),
            "dob" => Ok(ActivationPolicy::Dob),
            "expiry-cvv" => Ok(ActivationPolicy::ExpiryCvv),
            "dob-cvv" => Ok(ActivationPolicy::DobCvv),
            "all" => Ok(ActivationPolicy::All),
            _ => Err(CardError::Configuration(format!(
                "unsupported activation option '{s}'"
            ))),
        }
    }
}

impl fmt::Display for ActivationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ActivationPolicy::Expiry => "expiry",
            ActivationPolicy::Cvv => "cvv",
            ActivationPolicy::Dob => "dob",
            ActivationPolicy::ExpiryCvv => "expiry-cvv",
            ActivationPolicy::DobCvv => "dob-cvv",
            ActivationPolicy::All => "all",
        };
        f.write_str(name)
    }
}

/// Issuance policy for a family of cards: PAN prefix, PIN and activation
/// policies, channel flags and expiry horizon.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct CardProgram {
    pub name: String,
    pub description: String,
    pub program_type: ProgramType,
    pub network: Network,
    pub bin: String,
    pub starting_number: String,
    pub pin_policy: PinPolicy,
    pub activation_policy: ActivationPolicy,
    pub atm_allowed: bool,
    pub pos_allowed: bool,
    pub currency_code: String,
    pub country: Option<String>,
    pub expiry_months: u32,
    pub email: String,
}

impl CardProgram {
    /// Checks the cross-field business rules that must hold before a program
    /// is created or updated. Field formats are the caller's concern; the
    /// bin/starting-number relationship is a business rule and is checked
    /// here.
    pub fn validate(&self) -> Result<()> {
        if self.bin.is_empty() || !self.bin.bytes().all(|b| b.is_ascii_digit()) {
            return Err(CardError::Validation(format!(
                "program '{}': bin '{}' must be numeric",
                self.name, self.bin
            )));
        }
        if self.starting_number.is_empty()
            || !self.starting_number.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(CardError::Validation(format!(
                "program '{}': starting number '{}' must be numeric",
                self.name, self.starting_number
            )));
        }
        if !self.starting_number.starts_with(&self.bin) {
            return Err(CardError::Validation(format!(
                "program '{}': BIN {} and starting number {} do not match",
                self.name, self.bin, self.starting_number
            )));
        }
        if self.starting_number.len() > 15 {
            return Err(CardError::Configuration(format!(
                "program '{}': starting number {} is longer than 15 digits",
                self.name, self.starting_number
            )));
        }
        if self.expiry_months == 0 {
            return Err(CardError::Validation(format!(
                "program '{}': expiry_months must be positive",
                self.name
            )));
        }
        Ok(())
    }
}
