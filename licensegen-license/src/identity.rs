//! Holder and issuer identities as distinguished names.
//!
//! Rendered form: `CN=John Doe,L=Paris,ST=IDF,C=FR`. Attributes always
//! render in the order `CN, L, ST, OU, O, C, DC`; absent ones are omitted.
//! `\`, `,`, `=` and `+` inside values are backslash-escaped.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::LicenseError;

/// An X.500-style identity record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DistinguishedName {
    common_name: String,
    locality: Option<String>,
    state: Option<String>,
    organizational_unit: Option<String>,
    organization: Option<String>,
    country: Option<String>,
    domain_component: Option<String>,
}

impl DistinguishedName {
    /// Creates an identity with only a common name.
    pub fn new(common_name: impl Into<String>) -> Self {
        Self {
            common_name: common_name.into(),
            locality: None,
            state: None,
            organizational_unit: None,
            organization: None,
            country: None,
            domain_component: None,
        }
    }

    /// Holder identity assembled from person/location fields.
    pub fn person(
        first_name: &str,
        last_name: &str,
        city: &str,
        state: &str,
        country: &str,
    ) -> Self {
        Self::new(format!("{first_name} {last_name}"))
            .with_locality(city)
            .with_state(state)
            .with_country(country)
    }

    #[must_use]
    pub fn with_locality(mut self, value: impl Into<String>) -> Self {
        self.locality = Some(value.into());
        self
    }

    #[must_use]
    pub fn with_state(mut self, value: impl Into<String>) -> Self {
        self.state = Some(value.into());
        self
    }

    #[must_use]
    pub fn with_organizational_unit(mut self, value: impl Into<String>) -> Self {
        self.organizational_unit = Some(value.into());
        self
    }

    #[must_use]
    pub fn with_organization(mut self, value: impl Into<String>) -> Self {
        self.organization = Some(value.into());
        self
    }

    #[must_use]
    pub fn with_country(mut self, value: impl Into<String>) -> Self {
        self.country = Some(value.into());
        self
    }

    #[must_use]
    pub fn with_domain_component(mut self, value: impl Into<String>) -> Self {
        self.domain_component = Some(value.into());
        self
    }

    pub fn common_name(&self) -> &str {
        &self.common_name
    }

    pub fn locality(&self) -> Option<&str> {
        self.locality.as_deref()
    }

    pub fn state(&self) -> Option<&str> {
        self.state.as_deref()
    }

    pub fn organizational_unit(&self) -> Option<&str> {
        self.organizational_unit.as_deref()
    }

    pub fn organization(&self) -> Option<&str> {
        self.organization.as_deref()
    }

    pub fn country(&self) -> Option<&str> {
        self.country.as_deref()
    }

    pub fn domain_component(&self) -> Option<&str> {
        self.domain_component.as_deref()
    }

    fn attributes(&self) -> [(&'static str, Option<&str>); 7] {
        [
            ("CN", Some(self.common_name.as_str())),
            ("L", self.locality()),
            ("ST", self.state()),
            ("OU", self.organizational_unit()),
            ("O", self.organization()),
            ("C", self.country()),
            ("DC", self.domain_component()),
        ]
    }

    fn slot(&mut self, attribute: &str) -> Option<&mut Option<String>> {
        match attribute {
            "L" => Some(&mut self.locality),
            "ST" => Some(&mut self.state),
            "OU" => Some(&mut self.organizational_unit),
            "O" => Some(&mut self.organization),
            "C" => Some(&mut self.country),
            "DC" => Some(&mut self.domain_component),
            _ => None,
        }
    }
}

fn escape_into(out: &mut String, value: &str) {
    for c in value.chars() {
        if matches!(c, '\\' | ',' | '=' | '+') {
            out.push('\\');
        }
        out.push(c);
    }
}

impl fmt::Display for DistinguishedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        for (name, value) in self.attributes() {
            let Some(value) = value else { continue };
            if !out.is_empty() {
                out.push(',');
            }
            out.push_str(name);
            out.push('=');
            escape_into(&mut out, value);
        }
        f.write_str(&out)
    }
}

/// Splits `input` into `(attribute, value)` pairs, honoring escapes.
fn split_components(input: &str) -> Result<Vec<(String, String)>, LicenseError> {
    let mut pairs = Vec::new();
    let mut key = String::new();
    let mut value = String::new();
    let mut in_value = false;
    let mut chars = input.chars();

    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                let escaped = chars.next().ok_or_else(|| {
                    LicenseError::Validation(format!("dangling escape in {input:?}"))
                })?;
                if in_value { value.push(escaped) } else { key.push(escaped) }
            }
            '=' if !in_value => in_value = true,
            ',' => {
                if !in_value {
                    return Err(LicenseError::Validation(format!(
                        "component {key:?} has no value in {input:?}"
                    )));
                }
                pairs.push((key.trim().to_ascii_uppercase(), std::mem::take(&mut value)));
                key.clear();
                in_value = false;
            }
            _ if in_value => value.push(c),
            _ => key.push(c),
        }
    }

    if !in_value {
        return Err(LicenseError::Validation(format!(
            "component {key:?} has no value in {input:?}"
        )));
    }
    pairs.push((key.trim().to_ascii_uppercase(), value));
    Ok(pairs)
}

impl FromStr for DistinguishedName {
    type Err = LicenseError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let mut common_name = None;
        let mut dn = Self::new(String::new());

        for (attribute, value) in split_components(input)? {
            if attribute == "CN" {
                if common_name.replace(value).is_some() {
                    return Err(LicenseError::Validation(format!("duplicate CN in {input:?}")));
                }
                continue;
            }
            let slot = dn.slot(&attribute).ok_or_else(|| {
                LicenseError::Validation(format!("unknown attribute {attribute:?} in {input:?}"))
            })?;
            if slot.replace(value).is_some() {
                return Err(LicenseError::Validation(format!(
                    "duplicate {attribute} in {input:?}"
                )));
            }
        }

        dn.common_name = common_name
            .ok_or_else(|| LicenseError::Validation(format!("missing CN in {input:?}")))?;
        Ok(dn)
    }
}

impl TryFrom<String> for DistinguishedName {
    type Error = LicenseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DistinguishedName> for String {
    fn from(dn: DistinguishedName) -> Self {
        dn.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_in_fixed_order() {
        let dn = DistinguishedName::new("John Doe")
            .with_country("FR")
            .with_state("IDF")
            .with_locality("Paris");
        assert_eq!(dn.to_string(), "CN=John Doe,L=Paris,ST=IDF,C=FR");
    }

    #[test]
    fn parses_with_spaces_and_any_order() {
        let dn: DistinguishedName = "C=FR, L=Paris, CN=John Doe, ST=IDF".parse().unwrap();
        assert_eq!(dn, DistinguishedName::person("John", "Doe", "Paris", "IDF", "FR"));
    }

    #[test]
    fn escapes_roundtrip() {
        let dn = DistinguishedName::new("Doe, John = a+b \\ c").with_organization("ACME, Inc.");
        let rendered = dn.to_string();
        assert_eq!(rendered, r"CN=Doe\, John \= a\+b \\ c,O=ACME\, Inc.");
        assert_eq!(rendered.parse::<DistinguishedName>().unwrap(), dn);
    }

    #[test]
    fn issuer_with_all_attributes() {
        let dn: DistinguishedName =
            "CN=Issuer,L=Baba Hassen,ST=Alger,OU=FreeLance,O=TBO,C=Algérie,DC=DZ"
                .parse()
                .unwrap();
        assert_eq!(dn.organizational_unit(), Some("FreeLance"));
        assert_eq!(dn.organization(), Some("TBO"));
        assert_eq!(dn.country(), Some("Algérie"));
        assert_eq!(dn.domain_component(), Some("DZ"));
    }

    #[test]
    fn rejects_unknown_missing_and_duplicate() {
        assert!("CN=a,X=b".parse::<DistinguishedName>().is_err());
        assert!("L=Paris".parse::<DistinguishedName>().is_err());
        assert!("CN=a,CN=b".parse::<DistinguishedName>().is_err());
        assert!("CN=a,L=x,L=y".parse::<DistinguishedName>().is_err());
        assert!("CN=a,garbage".parse::<DistinguishedName>().is_err());
        assert!(r"CN=a\".parse::<DistinguishedName>().is_err());
    }

    #[test]
    fn serde_uses_rendered_string() {
        let dn = DistinguishedName::new("A").with_country("FR");
        let json = serde_json::to_string(&dn).unwrap();
        assert_eq!(json, r#""CN=A,C=FR""#);
        let back: DistinguishedName = serde_json::from_str(&json).unwrap();
        assert_eq!(back, dn);
    }
}
