//! Registry validator: compare deployed registries against the local database.
//!
//! Validation never fails. Drift is reported as a `ValidationOutcome`, and a
//! failed read becomes `ValidationOutcome::FetchError` after transient
//! failures have been retried. Pushing writes only entries that are missing,
//! one at a time, and confirms each by validating again.

use crate::actions::ActionHash;
use crate::errors::RegistryError;
use crate::operations::OperationDefinition;
use crate::registry::backend::{DeployedOperation, RegistryBackend};
use crate::registry::cache::{RegistrySnapshotCache, SnapshotKey};
use crate::registry::retry::RetryPolicy;
use crate::registry::OperationsDatabase;
use alloy::primitives::{Address, B256};
use futures::future::join_all;
use itertools::{EitherOrBoth, Itertools};
use std::fmt;
use std::sync::Arc;

/// First difference between the local definition and the deployed entry.
///
/// `None` fields lie past the end of the shorter list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MismatchDetail {
    pub index: usize,
    pub expected_hash: Option<ActionHash>,
    pub observed_hash: Option<ActionHash>,
    pub expected_optional: Option<bool>,
    pub observed_optional: Option<bool>,
    pub expected_name: Option<String>,
    pub observed_name: Option<String>,
}

impl fmt::Display for MismatchDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let side = |name: &Option<String>, hash: &Option<ActionHash>, optional: &Option<bool>| {
            match (hash, optional) {
                (None, None) => "<none>".to_string(),
                _ => format!(
                    "{}{}",
                    name.clone()
                        .or_else(|| hash.map(|hash| hash.to_string()))
                        .unwrap_or_else(|| "<none>".to_string()),
                    if optional.unwrap_or(false) { " (optional)" } else { "" }
                ),
            }
        };
        write!(
            f,
            "index {}: expected {}, observed {}",
            self.index,
            side(&self.expected_name, &self.expected_hash, &self.expected_optional),
            side(&self.observed_name, &self.observed_hash, &self.observed_optional),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    /// Deployed entry matches the local definition element for element.
    Configured,
    /// The registry has no entry under this name.
    NotConfigured,
    /// Registered on chain, but unknown to the local database.
    OpUnknown,
    ActionMismatch(MismatchDetail),
    FetchError(RegistryError),
}

impl ValidationOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            ValidationOutcome::Configured => "CONFIGURED",
            ValidationOutcome::NotConfigured => "NOT_CONFIGURED",
            ValidationOutcome::OpUnknown => "OP_UNKNOWN",
            ValidationOutcome::ActionMismatch(_) => "ACTION_MISMATCH",
            ValidationOutcome::FetchError(_) => "FETCH_ERROR",
        }
    }

    pub fn is_configured(&self) -> bool {
        matches!(self, ValidationOutcome::Configured)
    }
}

impl fmt::Display for ValidationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationOutcome::ActionMismatch(detail) => write!(f, "{} ({})", self.label(), detail),
            ValidationOutcome::FetchError(error) => write!(f, "{} ({})", self.label(), error),
            _ => f.write_str(self.label()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    pub operation: String,
    pub outcome: ValidationOutcome,
    /// Local fingerprint, when the operation is defined locally.
    pub fingerprint: Option<B256>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceOutcome {
    Registered,
    NotRegistered,
    AddressMismatch { observed: Address },
    FetchError(RegistryError),
}

impl ServiceOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            ServiceOutcome::Registered => "REGISTERED",
            ServiceOutcome::NotRegistered => "NOT_REGISTERED",
            ServiceOutcome::AddressMismatch { .. } => "ADDRESS_MISMATCH",
            ServiceOutcome::FetchError(_) => "FETCH_ERROR",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceReport {
    pub service: String,
    pub expected: Address,
    pub outcome: ServiceOutcome,
}

/// Validates and pushes one network's deployed registries.
pub struct RegistryValidator {
    database: Arc<OperationsDatabase>,
    backend: Arc<dyn RegistryBackend>,
    cache: Arc<RegistrySnapshotCache>,
    retry: RetryPolicy,
    registry_id: String,
}

impl RegistryValidator {
    pub fn new(
        database: Arc<OperationsDatabase>,
        backend: Arc<dyn RegistryBackend>,
        cache: Arc<RegistrySnapshotCache>,
        retry: RetryPolicy,
    ) -> Self {
        let registry_id = backend.registry_id();
        Self {
            database,
            backend,
            cache,
            retry,
            registry_id,
        }
    }

    pub fn database(&self) -> &OperationsDatabase {
        &self.database
    }

    pub fn cache(&self) -> &RegistrySnapshotCache {
        &self.cache
    }

    fn snapshot_key(&self, name: &str) -> SnapshotKey {
        SnapshotKey::new(self.database.network(), &self.registry_id, name)
    }

    async fn fetch_operation(&self, name: &str) -> Result<Option<DeployedOperation>, RegistryError> {
        let key = self.snapshot_key(name);
        if let Some(snapshot) = self.cache.get(&key).await {
            return Ok(snapshot);
        }

        let backend = &self.backend;
        let snapshot = self
            .retry
            .run("getOperation", || backend.get_operation(name))
            .await?;
        self.cache.insert(key, snapshot.clone()).await;
        Ok(snapshot)
    }

    /// Validate one operation against the deployed registry.
    pub async fn validate_operation(&self, name: &str) -> ValidationReport {
        let fingerprint = self.database.operation_fingerprint(name);

        let outcome = match self.fetch_operation(name).await {
            Err(error) => ValidationOutcome::FetchError(error),
            Ok(None) => ValidationOutcome::NotConfigured,
            Ok(Some(deployed)) => match self.database.operation_definition(name) {
                None => ValidationOutcome::OpUnknown,
                Some(definition) => match self.compare(definition, &deployed) {
                    Some(detail) => ValidationOutcome::ActionMismatch(detail),
                    None => ValidationOutcome::Configured,
                },
            },
        };

        match &outcome {
            ValidationOutcome::Configured => {
                tracing::debug!(operation = name, "Operation configured")
            }
            ValidationOutcome::FetchError(error) => {
                tracing::error!(operation = name, error = %error, "Failed to fetch operation")
            }
            other => tracing::warn!(operation = name, outcome = %other, "Operation not configured as expected"),
        }

        ValidationReport {
            operation: name.to_string(),
            outcome,
            fingerprint,
        }
    }

    /// Validate every locally defined operation concurrently.
    pub async fn validate_all(&self) -> Vec<ValidationReport> {
        let futures = self
            .database
            .operation_names()
            .map(|name| self.validate_operation(name));
        let reports = join_all(futures).await;

        let configured = reports.iter().filter(|report| report.outcome.is_configured()).count();
        tracing::info!(
            network = %self.database.network(),
            operations = reports.len(),
            configured = configured,
            "Validated operations registry"
        );
        reports
    }

    fn compare(
        &self,
        definition: &OperationDefinition,
        deployed: &DeployedOperation,
    ) -> Option<MismatchDetail> {
        let observed = deployed
            .actions
            .iter()
            .zip_longest(deployed.optional.iter())
            .map(|pair| match pair {
                EitherOrBoth::Both(hash, optional) => (Some(*hash), Some(*optional)),
                EitherOrBoth::Left(hash) => (Some(*hash), None),
                EitherOrBoth::Right(optional) => (None, Some(*optional)),
            });

        for (index, pair) in definition.actions.iter().zip_longest(observed).enumerate() {
            let (expected, (observed_hash, observed_optional)) = match pair {
                EitherOrBoth::Both(entry, observed) => (Some(entry), observed),
                EitherOrBoth::Left(entry) => (Some(entry), (None, None)),
                EitherOrBoth::Right(observed) => (None, observed),
            };

            let expected_hash = expected.map(|entry| entry.hash);
            let expected_optional = expected.map(|entry| entry.optional);
            if expected_hash == observed_hash && expected_optional == observed_optional {
                continue;
            }

            return Some(MismatchDetail {
                index,
                expected_hash,
                observed_hash,
                expected_optional,
                observed_optional,
                expected_name: expected.map(|entry| entry.name.clone()),
                observed_name: observed_hash
                    .and_then(|hash| self.database.action_name(&hash))
                    .map(str::to_string),
            });
        }
        None
    }

    /// Register a locally defined operation that the registry lacks.
    ///
    /// Already configured operations are left alone. A mismatched entry is
    /// never overwritten.
    ///
    /// # Errors
    ///
    /// - `RegistryError::UnknownOperation` when the name is not defined locally
    /// - `RegistryError::RefusedOverwrite` when the deployed entry differs
    /// - the fetch error when the current state cannot be read
    /// - the write error when the transaction fails or is not confirmed
    /// - `RegistryError::PushNotConfirmed` when the entry still does not
    ///   validate after the write
    pub async fn push_operation(&self, name: &str) -> Result<ValidationReport, RegistryError> {
        let definition = self
            .database
            .operation_definition(name)
            .ok_or_else(|| RegistryError::UnknownOperation {
                name: name.to_string(),
            })?;

        let _guard = self.backend.write_lock().lock().await;
        let key = self.snapshot_key(name);
        self.cache.invalidate(&key).await;

        let current = self.validate_operation(name).await;
        match &current.outcome {
            ValidationOutcome::Configured => return Ok(current),
            ValidationOutcome::NotConfigured => {}
            ValidationOutcome::ActionMismatch(detail) => {
                return Err(RegistryError::RefusedOverwrite {
                    name: name.to_string(),
                    index: detail.index,
                })
            }
            ValidationOutcome::OpUnknown => {
                return Err(RegistryError::UnknownOperation {
                    name: name.to_string(),
                })
            }
            ValidationOutcome::FetchError(error) => return Err(error.clone()),
        }

        tracing::info!(
            operation = name,
            actions = definition.actions.len(),
            fingerprint = %definition.fingerprint(),
            "Pushing operation"
        );
        let written = self.backend.add_operation(definition).await;
        self.cache.invalidate(&key).await;
        written?;

        let confirmed = self.validate_operation(name).await;
        if !confirmed.outcome.is_configured() {
            return Err(RegistryError::PushNotConfirmed {
                name: name.to_string(),
                outcome: confirmed.outcome.to_string(),
            });
        }

        tracing::info!(operation = name, "Operation pushed and confirmed");
        Ok(confirmed)
    }

    /// Push every operation the registry lacks, one after another.
    ///
    /// Stops at the first failure; operations pushed before it stay pushed.
    pub async fn push_missing(&self) -> Result<Vec<ValidationReport>, RegistryError> {
        let mut pushed = Vec::new();
        for report in self.validate_all().await {
            if report.outcome == ValidationOutcome::NotConfigured {
                pushed.push(self.push_operation(&report.operation).await?);
            }
        }
        Ok(pushed)
    }

    /// Compare a service registry entry with the expected address.
    pub async fn validate_service(&self, name: &str, expected: Address) -> ServiceReport {
        let backend = &self.backend;
        let outcome = match self
            .retry
            .run("getRegisteredService", || backend.get_service(name))
            .await
        {
            Err(error) => ServiceOutcome::FetchError(error),
            Ok(None) => ServiceOutcome::NotRegistered,
            Ok(Some(observed)) if observed == expected => ServiceOutcome::Registered,
            Ok(Some(observed)) => ServiceOutcome::AddressMismatch { observed },
        };

        tracing::debug!(service = name, expected = %expected, outcome = outcome.label(), "Validated service");

        ServiceReport {
            service: name.to_string(),
            expected,
            outcome,
        }
    }

    /// Register a service that is missing from the registry.
    ///
    /// # Errors
    ///
    /// - `RegistryError::RefusedServiceOverwrite` when another address is
    ///   registered
    /// - the fetch or write error
    /// - `RegistryError::PushNotConfirmed` when the entry does not read back
    pub async fn push_service(&self, name: &str, address: Address) -> Result<ServiceReport, RegistryError> {
        let _guard = self.backend.write_lock().lock().await;

        let current = self.validate_service(name, address).await;
        match &current.outcome {
            ServiceOutcome::Registered => return Ok(current),
            ServiceOutcome::NotRegistered => {}
            ServiceOutcome::AddressMismatch { observed } => {
                return Err(RegistryError::RefusedServiceOverwrite {
                    name: name.to_string(),
                    registered: observed.to_string(),
                })
            }
            ServiceOutcome::FetchError(error) => return Err(error.clone()),
        }

        tracing::info!(service = name, address = %address, "Pushing service");
        self.backend.add_service(name, address).await?;

        let confirmed = self.validate_service(name, address).await;
        if confirmed.outcome != ServiceOutcome::Registered {
            return Err(RegistryError::PushNotConfirmed {
                name: name.to_string(),
                outcome: confirmed.outcome.label().to_string(),
            });
        }
        Ok(confirmed)
    }
}
