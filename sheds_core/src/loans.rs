//! Equipment loan ledger (`loans.csv`).
//!
//! New loans are validated field by field before they are accepted; all
//! failures are collected so every bad field can be reported at once.
//! A loan is active until someone records its return.

use crate::entries::Entries;
use crate::roles::RoleLookup;
use crate::store::RecordStore;
use crate::{Error, LoanRecord, Result};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const LOANS_FILE: &str = "loans.csv";

/// Item value shown before anything has been picked
pub const ITEM_PLACEHOLDER: &str = "select";

/// Role whose members may borrow
pub const MEMBER_ROLE: &str = "member";

/// Role whose members may lend and receive returns
pub const OPERATOR_ROLE: &str = "operator";

/// A loan field that can fail validation
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoanField {
    Date,
    Item,
    Count,
    Borrower,
    Lender,
    Donation,
    Returned,
}

impl LoanField {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoanField::Date => "date",
            LoanField::Item => "item",
            LoanField::Count => "count",
            LoanField::Borrower => "borrower",
            LoanField::Lender => "lender",
            LoanField::Donation => "donation",
            LoanField::Returned => "returned",
        }
    }
}

impl fmt::Display for LoanField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A loan as entered, before any field has been parsed
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LoanCandidate {
    /// `YYYY-MM-DD` or RFC 3339
    pub date: String,
    pub item: String,
    pub count: String,
    pub borrower: String,
    pub lender: String,
    /// Blank means no donation
    pub donation: String,
}

/// Outcome of validating a candidate
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LoanValidation {
    pub invalid_fields: Vec<LoanField>,
}

impl LoanValidation {
    pub fn ok(&self) -> bool {
        self.invalid_fields.is_empty()
    }

    fn reject(&mut self, field: LoanField) {
        if !self.invalid_fields.contains(&field) {
            self.invalid_fields.push(field);
        }
    }

    /// `Ok(())` when valid, otherwise `Error::Validation` naming the fields
    pub fn into_result(self) -> Result<()> {
        if self.ok() {
            Ok(())
        } else {
            Err(Error::Validation(
                self.invalid_fields
                    .iter()
                    .map(|f| f.as_str().to_string())
                    .collect(),
            ))
        }
    }
}

fn parse_date(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(date) = DateTime::parse_from_rfc3339(text) {
        return Some(date.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

fn parse_count(text: &str) -> Option<u32> {
    text.trim().parse().ok()
}

fn parse_donation(text: &str) -> Option<f64> {
    let text = text.trim();
    if text.is_empty() {
        return Some(0.0);
    }
    text.parse::<f64>()
        .ok()
        .filter(|d| d.is_finite() && *d >= 0.0)
}

fn is_placeholder(item: &str) -> bool {
    let item = item.trim();
    item.is_empty() || item.eq_ignore_ascii_case(ITEM_PLACEHOLDER)
}

fn check_role(
    roles: &dyn RoleLookup,
    role: &str,
    name: &str,
    field: LoanField,
    result: &mut LoanValidation,
) {
    match roles.has_member(role, name.trim()) {
        Ok(true) => {}
        Ok(false) => result.reject(field),
        Err(e) => {
            tracing::warn!("Could not look up '{}' role: {}", role, e);
            result.reject(field);
        }
    }
}

/// Check every field of a prospective loan
pub fn validate_loan(
    candidate: &LoanCandidate,
    roles: &dyn RoleLookup,
    now: DateTime<Utc>,
) -> LoanValidation {
    let mut result = LoanValidation::default();

    match parse_date(&candidate.date) {
        Some(date) if date <= now => {}
        _ => result.reject(LoanField::Date),
    }
    if is_placeholder(&candidate.item) {
        result.reject(LoanField::Item);
    }
    if parse_count(&candidate.count).is_none() {
        result.reject(LoanField::Count);
    }
    if parse_donation(&candidate.donation).is_none() {
        result.reject(LoanField::Donation);
    }
    check_role(roles, MEMBER_ROLE, &candidate.borrower, LoanField::Borrower, &mut result);
    check_role(roles, OPERATOR_ROLE, &candidate.lender, LoanField::Lender, &mut result);

    if !result.ok() {
        tracing::debug!("Loan rejected, invalid fields: {:?}", result.invalid_fields);
    }
    result
}

impl LoanCandidate {
    /// Parse into a record; `None` unless the candidate validates
    fn to_record(&self) -> Option<LoanRecord> {
        Some(LoanRecord {
            date: parse_date(&self.date)?,
            item: self.item.trim().to_string(),
            count: parse_count(&self.count)?,
            borrower: self.borrower.trim().to_string(),
            lender: self.lender.trim().to_string(),
            donation: parse_donation(&self.donation)?,
            returned: None,
        })
    }
}

/// All loans, active and returned
#[derive(Clone, Debug)]
pub struct LoanLedger {
    entries: Entries<LoanRecord>,
}

impl LoanLedger {
    pub fn load(store: &dyn RecordStore) -> Result<Self> {
        let entries = Entries::load(store, LOANS_FILE)?;
        tracing::debug!("Loaded {} loan records", entries.len());
        Ok(Self { entries })
    }

    pub fn records(&self) -> &[LoanRecord] {
        self.entries.as_slice()
    }

    /// Active loans with their ledger index
    pub fn active(&self) -> impl Iterator<Item = (usize, &LoanRecord)> {
        self.entries.iter().enumerate().filter(|(_, r)| r.is_active())
    }

    /// Number of `item` currently out on active loans
    pub fn number_on_loan(&self, item: &str) -> u64 {
        self.active()
            .filter(|(_, r)| r.item == item)
            .map(|(_, r)| u64::from(r.count))
            .sum()
    }

    /// Active loans older than `loan_return_days`
    pub fn overdue(
        &self,
        now: DateTime<Utc>,
        loan_return_days: i64,
    ) -> impl Iterator<Item = (usize, &LoanRecord)> {
        // A period too long to represent is never over
        let due_after = Duration::try_days(loan_return_days);
        self.active().filter(move |(_, r)| {
            due_after
                .and_then(|d| r.date.checked_add_signed(d))
                .is_some_and(|due| due < now)
        })
    }

    /// Validate and, if every field passes, append and persist the loan.
    ///
    /// The ledger is reloaded from the store afterwards so it reflects
    /// what was saved.
    pub fn add_loan(
        &mut self,
        store: &dyn RecordStore,
        candidate: &LoanCandidate,
        roles: &dyn RoleLookup,
        now: DateTime<Utc>,
    ) -> Result<LoanValidation> {
        let validation = validate_loan(candidate, roles, now);
        if !validation.ok() {
            return Ok(validation);
        }
        let record = candidate
            .to_record()
            .ok_or_else(|| Error::Other("Validated loan failed to parse".into()))?;

        self.entries.reload(store)?;
        tracing::info!(
            "Loaning {} x {} to {} (lender {})",
            record.count,
            record.item,
            record.borrower,
            record.lender
        );
        self.entries.push(record);
        self.entries.save(store)?;
        self.entries.reload(store)?;
        Ok(validation)
    }

    /// Record the return of the loan at `index`, received by `operator`
    pub fn mark_returned(
        &mut self,
        store: &dyn RecordStore,
        index: usize,
        operator: &str,
        roles: &dyn RoleLookup,
    ) -> Result<()> {
        let mut validation = LoanValidation::default();
        check_role(roles, OPERATOR_ROLE, operator, LoanField::Returned, &mut validation);
        validation.into_result()?;

        self.entries.reload(store)?;
        let record = self
            .entries
            .get_mut(index)
            .ok_or_else(|| Error::Other(format!("No loan number {}", index)))?;
        if !record.is_active() {
            return Err(Error::Other(format!("Loan {} is already returned", index)));
        }
        record.returned = Some(operator.trim().to_string());
        tracing::info!("Loan {} ({}) returned to {}", index, record.item, operator);
        self.entries.save(store)
    }
}
