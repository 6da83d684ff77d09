use crate::domain::program::ActivationPolicy;
use crate::error::{CardError, Result};
use chrono::NaiveDate;

/// The true values held on file, against which supplied proofs are checked.
#[derive(Debug, Clone, Copy)]
pub struct StoredProofs {
    pub expiry: NaiveDate,
    pub cvv: u16,
    pub date_of_birth: Option<NaiveDate>,
}

/// Proof values supplied by the caller attempting activation. Each is
/// optional; which ones are required depends on the program's policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct ActivationProofs {
    pub expiry: Option<NaiveDate>,
    pub cvv: Option<u16>,
    pub date_of_birth: Option<NaiveDate>,
}

/// Evaluates the program's activation policy against the supplied proofs.
///
/// Every required proof that is missing fails before any comparison runs;
/// comparisons are exact (date-only for expiry and date of birth, numeric
/// for CVV) with no fuzzy matching.
pub fn validate(
    policy: ActivationPolicy,
    stored: &StoredProofs,
    proofs: &ActivationProofs,
) -> Result<()> {
    let needs_expiry = matches!(
        policy,
        ActivationPolicy::Expiry | ActivationPolicy::ExpiryCvv | ActivationPolicy::All
    );
    let needs_cvv = matches!(
        policy,
        ActivationPolicy::Cvv
            | ActivationPolicy::ExpiryCvv
            | ActivationPolicy::DobCvv
            | ActivationPolicy::All
    );
    let needs_dob = matches!(
        policy,
        ActivationPolicy::Dob | ActivationPolicy::DobCvv | ActivationPolicy::All
    );

    if needs_expiry && proofs.expiry.is_none() {
        return Err(CardError::Validation("expiry not provided".to_string()));
    }
    if needs_dob && proofs.date_of_birth.is_none() {
        return Err(CardError::Validation(
            "date of birth not provided".to_string(),
        ));
    }
    if needs_cvv && proofs.cvv.is_none() {
        return Err(CardError::Validation("cvv not provided".to_string()));
    }

    if needs_expiry && proofs.expiry != Some(stored.expiry) {
        return Err(CardError::Validation(
            "incorrect expiry provided".to_string(),
        ));
    }
    if needs_dob && proofs.date_of_birth != stored.date_of_birth {
        // A customer with no date of birth on file can never match.
        return Err(CardError::Validation(
            "incorrect date of birth provided".to_string(),
        ));
    }
    if needs_cvv && proofs.cvv != Some(stored.cvv) {
        return Err(CardError::Validation("incorrect cvv provided".to_string()));
    }

    Ok(())
}
