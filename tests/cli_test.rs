use assert_cmd::Command;
use assert_cmd::cargo_bin;
use predicates::prelude::*;
use std::io::Write;

const PROGRAMS_JSON: &str = r#"[
  {
    "name": "STD_PREPAID",
    "description": "Standard prepaid",
    "program_type": "P",
    "network": "VISA",
    "bin": "411111",
    "starting_number": "4111110000",
    "pin_policy": "last-4-of-pan",
    "activation_policy": "cvv",
    "atm_allowed": true,
    "pos_allowed": true,
    "currency_code": "USD",
    "country": "US",
    "expiry_months": 24,
    "email": "ops@example.com"
  }
]"#;

fn write_temp(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn test_cli_issue_and_fund_flow() {
    let programs = write_temp(PROGRAMS_JSON);
    let ops = write_temp(
        "op, program, card, amount, value, expiry, cvv, date_of_birth\n\
         issue, STD_PREPAID, , 100, , , ,\n\
         credit, , 1, 25, , , ,\n\
         debit, , 1, 5, , , ,\n",
    );

    Command::new(cargo_bin!("cardcore"))
        .arg("--programs")
        .arg(programs.path())
        .arg(ops.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("card,pan,status,balance,ledger"))
        .stdout(predicate::str::contains("1,411111******"))
        .stdout(predicate::str::contains("PREACTIVE,120,120"));
}

#[test]
fn test_cli_keeps_going_past_bad_rows() {
    let programs = write_temp(PROGRAMS_JSON);
    let ops = write_temp(
        "op, program, card, amount, value, expiry, cvv, date_of_birth\n\
         issue, STD_PREPAID, , 10, , , ,\n\
         debit, , 1, 500, , , ,\n\
         status, , 1, , BLOCKED, , ,\n",
    );

    Command::new(cargo_bin!("cardcore"))
        .arg("--programs")
        .arg(programs.path())
        .arg(ops.path())
        .assert()
        .success()
        .stderr(predicate::str::contains("insufficient funds"))
        .stdout(predicate::str::contains("BLOCKED,10,10"));
}

#[test]
fn test_cli_rejects_bad_program_file() {
    let programs = write_temp("{ not json");
    let ops = write_temp("op, program, card, amount, value, expiry, cvv, date_of_birth\n");

    Command::new(cargo_bin!("cardcore"))
        .arg("--programs")
        .arg(programs.path())
        .arg(ops.path())
        .assert()
        .failure();
}
