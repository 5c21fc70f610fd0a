//! License content: the signed payload.

use std::fmt;

use chrono::{DateTime, Utc};

use crate::identity::DistinguishedName;

/// The structured payload carried inside a license blob.
///
/// Instances come only from [`LicenseContentBuilder`](crate::LicenseContentBuilder)
/// or from decoding a blob, so `not_after > issued_at` always holds and
/// both timestamps have millisecond precision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LicenseContent {
    pub(crate) subject: String,
    pub(crate) holder: DistinguishedName,
    pub(crate) issuer: DistinguishedName,
    pub(crate) consumer_type: String,
    pub(crate) consumer_amount: u32,
    pub(crate) info: String,
    pub(crate) issued_at: DateTime<Utc>,
    pub(crate) not_after: DateTime<Utc>,
}

impl LicenseContent {
    /// Identifier of the application this license is bound to.
    #[must_use]
    pub fn subject(&self) -> &str {
        &self.subject
    }

    #[must_use]
    pub fn holder(&self) -> &DistinguishedName {
        &self.holder
    }

    #[must_use]
    pub fn issuer(&self) -> &DistinguishedName {
        &self.issuer
    }

    /// Kind of consumer counted by [`consumer_amount`](Self::consumer_amount), e.g. `User`.
    #[must_use]
    pub fn consumer_type(&self) -> &str {
        &self.consumer_type
    }

    /// Seat count (always positive).
    #[must_use]
    pub fn consumer_amount(&self) -> u32 {
        self.consumer_amount
    }

    #[must_use]
    pub fn info(&self) -> &str {
        &self.info
    }

    #[must_use]
    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    #[must_use]
    pub fn not_after(&self) -> DateTime<Utc> {
        self.not_after
    }

    /// Returns true if `now` is at or before `not_after`.
    ///
    /// Only the upper bound is enforced; a license is accepted before its
    /// issue time to tolerate clock skew between issuer and holder.
    #[must_use]
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now <= self.not_after
    }
}

impl fmt::Display for LicenseContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Subject   : {}", self.subject)?;
        writeln!(f, "Info      : {}", self.info)?;
        writeln!(f, "Holder    : {}", self.holder)?;
        writeln!(f, "Issuer    : {}", self.issuer)?;
        writeln!(f, "Consumers : {} x {}", self.consumer_amount, self.consumer_type)?;
        writeln!(f, "Issued    : {}", self.issued_at.to_rfc3339())?;
        write!(f, "Expires   : {}", self.not_after.to_rfc3339())
    }
}
