//! Age attestation applied when preferences are saved.
//!
//! The page-view gate trusts whatever the preference store hands it; this is the guard
//! that keeps the unblur opt-in from being stored for users who are not of age.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use tracing::debug;
use veil_core_types::PreferenceState;

use crate::errors::{EngineError, EngineResult};

pub const MIN_AGE_YEARS: i64 = 18;

/// Julian year, 365.25 days.
const SECONDS_PER_YEAR: i64 = 31_557_600;

/// Accepts `YYYY-MM-DD` or a bare `YYYY`, which is read as January 1st.
pub fn parse_birth_date(raw: &str) -> EngineResult<NaiveDate> {
    let trimmed = raw.trim();
    let invalid = || EngineError::BirthDate(raw.to_string());
    let bytes = trimmed.as_bytes();
    match bytes.len() {
        4 if bytes.iter().all(u8::is_ascii_digit) => {
            let year = trimmed.parse::<i32>().map_err(|_| invalid())?;
            NaiveDate::from_ymd_opt(year, 1, 1).ok_or_else(invalid)
        }
        10 if bytes[4] == b'-'
            && bytes[7] == b'-'
            && bytes
                .iter()
                .enumerate()
                .all(|(idx, b)| idx == 4 || idx == 7 || b.is_ascii_digit()) =>
        {
            NaiveDate::parse_from_str(trimmed, "%Y-%m-%d").map_err(|_| invalid())
        }
        _ => Err(invalid()),
    }
}

pub fn is_of_age(birth_date: NaiveDate, now: DateTime<Utc>) -> bool {
    let born = birth_date.and_time(NaiveTime::MIN).and_utc();
    (now - born).num_seconds() >= MIN_AGE_YEARS * SECONDS_PER_YEAR
}

/// Derives the attested flag from the birth date and withdraws the unblur opt-in for
/// anyone not attested. A missing or unreadable birth date never attests.
pub fn sanitize_preferences(
    preference: PreferenceState,
    birth_date: Option<&str>,
    now: DateTime<Utc>,
) -> PreferenceState {
    let attested = match birth_date.map(parse_birth_date) {
        Some(Ok(date)) => is_of_age(date, now),
        Some(Err(err)) => {
            debug!(target: "veil.session", error = %err, "attestation.birth_date.rejected");
            false
        }
        None => false,
    };
    if preference.unblur_opt_in && !attested {
        debug!(target: "veil.session", "attestation.opt_in.withdrawn");
    }
    PreferenceState {
        is_age_attested: attested,
        unblur_opt_in: preference.unblur_opt_in && attested,
        ..preference
    }
}
