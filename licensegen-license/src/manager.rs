//! License lifecycle: generate, install, verify, uninstall.

use std::sync::{Mutex, PoisonError};

use licensegen_crypto::{SigningKey, VerifyingKey};
use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::codec::{self, Blob, CipherParams};
use crate::content::LicenseContent;
use crate::error::{LicenseError, LicenseResult};
use crate::store::LicenseStore;

/// Persisted state of one subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LicenseState {
    Uninstalled,
    Installed,
}

/// Drives the license lifecycle against a [`LicenseStore`].
///
/// Each subject holds at most one installed blob. Installing always clears
/// the previous entry first, so a failed install leaves the subject
/// uninstalled rather than keeping a stale license around.
pub struct LicenseManager<S, C = SystemClock> {
    store: S,
    clock: C,
    install_guard: Mutex<()>,
}

impl<S: LicenseStore> LicenseManager<S> {
    pub fn new(store: S) -> Self {
        Self::with_clock(store, SystemClock)
    }
}

impl<S: LicenseStore, C: Clock> LicenseManager<S, C> {
    pub fn with_clock(store: S, clock: C) -> Self {
        Self {
            store,
            clock,
            install_guard: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Encodes `content` into a distributable blob. Touches no state.
    pub fn generate(
        &self,
        content: &LicenseContent,
        signing_key: &SigningKey,
        cipher: &CipherParams,
    ) -> LicenseResult<Blob> {
        let blob = codec::encode(content, signing_key, cipher)?;
        info!(
            subject = %content.subject(),
            not_after = %content.not_after(),
            "License generated"
        );
        Ok(blob)
    }

    /// Installs `blob` for `expected_subject`, replacing any prior license.
    ///
    /// The blob is only persisted if it decodes, names `expected_subject`
    /// and has not expired.
    pub fn install(
        &self,
        blob: &Blob,
        verifying_key: &VerifyingKey,
        cipher_secret: &str,
        expected_subject: &str,
    ) -> LicenseResult<LicenseContent> {
        let _in_process = self
            .install_guard
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        self.store.locked(expected_subject, || {
            self.store.delete(expected_subject)?;
            debug!(subject = %expected_subject, "Cleared previous license entry");

            let content = codec::decode(blob, verifying_key, cipher_secret)?;
            if let Err(e) = self.check(&content, expected_subject) {
                warn!(subject = %expected_subject, error = %e, "License rejected");
                return Err(e);
            }

            self.store.put(expected_subject, blob.as_bytes())?;
            info!(
                subject = %expected_subject,
                holder = %content.holder(),
                not_after = %content.not_after(),
                "License installed"
            );
            Ok(content)
        })
    }

    /// Re-verifies the installed license. Leaves the store untouched.
    pub fn verify(
        &self,
        verifying_key: &VerifyingKey,
        cipher_secret: &str,
        expected_subject: &str,
    ) -> LicenseResult<LicenseContent> {
        let bytes = self
            .store
            .get(expected_subject)?
            .ok_or_else(|| LicenseError::NotInstalled(expected_subject.to_string()))?;
        let content = codec::decode(&Blob::from_bytes(bytes), verifying_key, cipher_secret)?;
        self.check(&content, expected_subject)?;
        debug!(subject = %expected_subject, "License verified");
        Ok(content)
    }

    /// Removes the installed license. A no-op when nothing is installed.
    pub fn uninstall(&self, expected_subject: &str) -> LicenseResult<()> {
        let _in_process = self
            .install_guard
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        self.store
            .locked(expected_subject, || self.store.delete(expected_subject))?;
        info!(subject = %expected_subject, "License uninstalled");
        Ok(())
    }

    /// Reports whether an entry exists, without decoding it.
    pub fn state(&self, expected_subject: &str) -> LicenseResult<LicenseState> {
        Ok(match self.store.get(expected_subject)? {
            Some(_) => LicenseState::Installed,
            None => LicenseState::Uninstalled,
        })
    }

    fn check(&self, content: &LicenseContent, expected_subject: &str) -> LicenseResult<()> {
        if content.subject() != expected_subject {
            return Err(LicenseError::SubjectMismatch {
                expected: expected_subject.to_string(),
                actual: content.subject().to_string(),
            });
        }
        if !content.is_valid_at(self.clock.now()) {
            return Err(LicenseError::Expired {
                not_after: content.not_after(),
            });
        }
        Ok(())
    }
}
