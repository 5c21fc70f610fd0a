//! Construction of validated license content.

use chrono::TimeDelta;

use crate::clock::{truncate_to_millis, Clock, SystemClock};
use crate::content::LicenseContent;
use crate::error::{LicenseError, LicenseResult};
use crate::identity::DistinguishedName;

/// Default consumer type when none is given.
pub const DEFAULT_CONSUMER_TYPE: &str = "User";

/// Builder for [`LicenseContent`].
///
/// ```
/// use chrono::TimeDelta;
/// use licensegen_license::{DistinguishedName, LicenseContentBuilder};
///
/// let content = LicenseContentBuilder::new("MyApp")
///     .holder(DistinguishedName::person("John", "Doe", "Paris", "IDF", "FR"))
///     .issuer(DistinguishedName::new("ACME Licensing"))
///     .validity(TimeDelta::days(30))
///     .build()
///     .unwrap();
/// assert_eq!(content.subject(), "MyApp");
/// ```
#[derive(Debug, Clone)]
pub struct LicenseContentBuilder {
    subject: String,
    holder: Option<DistinguishedName>,
    issuer: Option<DistinguishedName>,
    consumer_type: String,
    consumer_amount: u32,
    info: Option<String>,
    validity: Option<TimeDelta>,
}

impl LicenseContentBuilder {
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            holder: None,
            issuer: None,
            consumer_type: DEFAULT_CONSUMER_TYPE.to_string(),
            consumer_amount: 1,
            info: None,
            validity: None,
        }
    }

    #[must_use]
    pub fn holder(mut self, holder: DistinguishedName) -> Self {
        self.holder = Some(holder);
        self
    }

    #[must_use]
    pub fn issuer(mut self, issuer: DistinguishedName) -> Self {
        self.issuer = Some(issuer);
        self
    }

    /// Sets consumer type and seat count.
    #[must_use]
    pub fn consumer(mut self, consumer_type: impl Into<String>, amount: u32) -> Self {
        self.consumer_type = consumer_type.into();
        self.consumer_amount = amount;
        self
    }

    #[must_use]
    pub fn info(mut self, info: impl Into<String>) -> Self {
        self.info = Some(info.into());
        self
    }

    /// Length of the validity window, counted from the issue time.
    #[must_use]
    pub fn validity(mut self, validity: TimeDelta) -> Self {
        self.validity = Some(validity);
        self
    }

    /// Builds the content, issued now by the system clock.
    pub fn build(self) -> LicenseResult<LicenseContent> {
        self.build_with_clock(&SystemClock)
    }

    /// Builds the content with `issued_at = clock.now()`.
    pub fn build_with_clock(self, clock: &dyn Clock) -> LicenseResult<LicenseContent> {
        if self.subject.trim().is_empty() {
            return Err(LicenseError::Validation("subject must not be empty".into()));
        }
        if self.consumer_amount == 0 {
            return Err(LicenseError::Validation(
                "consumer amount must be positive".into(),
            ));
        }
        if self.consumer_type.trim().is_empty() {
            return Err(LicenseError::Validation("consumer type must not be empty".into()));
        }
        let validity = self
            .validity
            .ok_or_else(|| LicenseError::Validation("validity duration is required".into()))?;
        if validity <= TimeDelta::zero() {
            return Err(LicenseError::Validation(format!(
                "validity duration must be positive, got {validity}"
            )));
        }
        let holder = self
            .holder
            .ok_or_else(|| LicenseError::Validation("holder is required".into()))?;
        if holder.common_name().trim().is_empty() {
            return Err(LicenseError::Validation("holder common name must not be empty".into()));
        }
        let issuer = self
            .issuer
            .ok_or_else(|| LicenseError::Validation("issuer is required".into()))?;

        let issued_at = truncate_to_millis(clock.now());
        let not_after = issued_at
            .checked_add_signed(validity)
            .map(truncate_to_millis)
            .ok_or_else(|| LicenseError::Validation("validity duration overflows".into()))?;
        if not_after <= issued_at {
            return Err(LicenseError::Validation(
                "validity duration is shorter than a millisecond".into(),
            ));
        }

        let info = self.info.unwrap_or_else(|| {
            format!("License key for the {} application for trial version.", self.subject)
        });

        Ok(LicenseContent {
            subject: self.subject,
            holder,
            issuer,
            consumer_type: self.consumer_type,
            consumer_amount: self.consumer_amount,
            info,
            issued_at,
            not_after,
        })
    }
}
