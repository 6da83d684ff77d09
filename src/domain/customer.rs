use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Cardholder profile as supplied at issuance time. All fields are optional;
/// the interface layer has already checked formats by the time this arrives.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone, Default)]
pub struct CustomerProfile {
    pub first_name: Option<String>,
    pub middle_name: Option<String>,
    pub last_name: Option<String>,
    pub address1: Option<String>,
    pub address2: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<String>,
    pub language: Option<String>,
    pub ssn: Option<String>,
    pub mobile: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub mother_maiden_name: Option<String>,
}

impl CustomerProfile {
    /// Defaults country from the issuing program and language to English
    /// when the profile leaves them blank.
    pub fn with_defaults(mut self, program_country: Option<&str>) -> Self {
        if self.country.is_none() {
            self.country = program_country.map(str::to_string);
        }
        if self.language.is_none() {
            self.language = Some("en".to_string());
        }
        self
    }
}

/// A stored customer. One customer may own many cards.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Customer {
    pub id: u64,
    pub profile: CustomerProfile,
}
