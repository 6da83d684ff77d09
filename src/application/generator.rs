use crate::domain::ports::NumberRegistry;
use crate::domain::program::PinPolicy;
use crate::error::{CardError, Result};
use chrono::{Months, NaiveDate, Utc};
use rand::Rng;

/// Total length of a generated PAN, including the Luhn check digit.
pub const PAN_LENGTH: usize = 16;

/// Bound on the regenerate-on-collision loop. A saturated prefix surfaces as
/// a configuration error instead of spinning forever.
const MAX_GENERATION_ATTEMPTS: u32 = 10_000;

/// Computes the Luhn check digit for a digit string, doubling every second
/// digit from the right of the body.
pub fn luhn_check_digit(body: &str) -> u8 {
    let sum: u32 = body
        .bytes()
        .rev()
        .enumerate()
        .map(|(i, b)| {
            let mut digit = u32::from(b - b'0');
            if i % 2 == 0 {
                digit *= 2;
                if digit > 9 {
                    digit -= 9;
                }
            }
            digit
        })
        .sum();
    ((10 - (sum % 10)) % 10) as u8
}

/// Validates a complete PAN: all digits, with a checksum of zero over the
/// full number.
pub fn is_luhn_valid(number: &str) -> bool {
    if number.is_empty() || !number.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    let sum: u32 = number
        .bytes()
        .rev()
        .enumerate()
        .map(|(i, b)| {
            let mut digit = u32::from(b - b'0');
            if i % 2 == 1 {
                digit *= 2;
                if digit > 9 {
                    digit -= 9;
                }
            }
            digit
        })
        .sum();
    sum % 10 == 0
}

fn random_digits(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| char::from(b'0' + rng.gen_range(0..10)))
        .collect()
}

/// Generates a unique, Luhn-valid PAN from the program's starting number.
///
/// The candidate is the starting number padded with random digits to 15
/// digits plus the check digit. Uniqueness is delegated to the registry's
/// atomic reserve; a taken candidate is simply regenerated.
pub async fn generate_card_number(
    starting_number: &str,
    registry: &dyn NumberRegistry,
) -> Result<String> {
    if !starting_number.bytes().all(|b| b.is_ascii_digit()) {
        return Err(CardError::Configuration(format!(
            "starting number '{starting_number}' must be numeric"
        )));
    }
    let payload_len = (PAN_LENGTH - 1)
        .checked_sub(starting_number.len())
        .ok_or_else(|| {
            CardError::Configuration(format!(
                "starting number {starting_number} is longer than {} digits",
                PAN_LENGTH - 1
            ))
        })?;

    for _ in 0..MAX_GENERATION_ATTEMPTS {
        let candidate = {
            let mut body = String::with_capacity(PAN_LENGTH);
            body.push_str(starting_number);
            body.push_str(&random_digits(payload_len));
            let check = luhn_check_digit(&body);
            body.push(char::from(b'0' + check));
            body
        };
        if registry.reserve(&candidate).await? {
            return Ok(candidate);
        }
    }
    Err(CardError::Configuration(format!(
        "card number space exhausted for starting number {starting_number}"
    )))
}

/// Expiry date: today plus the program's horizon in calendar months.
pub fn generate_expiry(months: u32) -> Result<NaiveDate> {
    Utc::now()
        .date_naive()
        .checked_add_months(Months::new(months))
        .ok_or_else(|| CardError::Configuration(format!("expiry horizon of {months} months overflows")))
}

/// Uniformly random three-digit CVV.
pub fn generate_cvv() -> u16 {
    rand::thread_rng().gen_range(100..=999)
}

/// Derives the PIN for a freshly generated PAN per the program's policy.
pub fn generate_pin(policy: PinPolicy, card_number: &str) -> String {
    match policy {
        PinPolicy::Last4OfPan => card_number[card_number.len() - 4..].to_string(),
        PinPolicy::Random4Digit => rand::thread_rng().gen_range(1000..=9999).to_string(),
    }
}
