// crates/socratic-bench-providers/src/registry.rs
// ============================================================================
// Module: Invoker Registry
// Description: Registry routing invocations by model identifier.
// Purpose: Compose invokers behind one ModelInvoker with policy checks.
// Dependencies: socratic-bench-core
// ============================================================================

//! ## Overview
//! The registry resolves invocations by model identifier and enforces
//! allowlist and denylist policies before delegating. It implements the core
//! [`ModelInvoker`] interface so the runner and judge stay backend-agnostic.
//! Resolution fails closed: a model without a registered invoker (and no
//! default) is refused rather than guessed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::Arc;

use socratic_bench_core::InvocationRequest;
use socratic_bench_core::InvocationResponse;
use socratic_bench_core::InvokerError;
use socratic_bench_core::ModelInvoker;

// ============================================================================
// SECTION: Access Policy
// ============================================================================

/// Access policy controlling which models may be invoked.
///
/// # Invariants
/// - `denylist` overrides `allowlist` when both are present.
/// - If `allowlist` is `None`, all models are allowed unless denied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvokerAccessPolicy {
    /// Optional allowlist of model identifiers.
    pub allowlist: Option<BTreeSet<String>>,
    /// Explicit denylist of model identifiers.
    pub denylist: BTreeSet<String>,
}

impl InvokerAccessPolicy {
    /// Returns a policy that permits all models.
    #[must_use]
    pub const fn allow_all() -> Self {
        Self {
            allowlist: None,
            denylist: BTreeSet::new(),
        }
    }

    /// Returns true when the model is allowed by policy.
    #[must_use]
    pub fn is_allowed(&self, model_id: &str) -> bool {
        if self.denylist.contains(model_id) {
            return false;
        }
        if let Some(allowlist) = &self.allowlist {
            return allowlist.contains(model_id);
        }
        true
    }
}

impl Default for InvokerAccessPolicy {
    fn default() -> Self {
        Self::allow_all()
    }
}

// ============================================================================
// SECTION: Registry Builder
// ============================================================================

/// Builder for an invoker registry.
///
/// # Invariants
/// - Later registrations for the same model overwrite earlier ones.
#[derive(Default)]
pub struct InvokerRegistryBuilder {
    /// Invokers keyed by model identifier.
    invokers: BTreeMap<String, Arc<dyn ModelInvoker>>,
    /// Fallback invoker for unregistered models.
    default: Option<Arc<dyn ModelInvoker>>,
    /// Access policy.
    policy: InvokerAccessPolicy,
}

impl InvokerRegistryBuilder {
    /// Registers an invoker for one model identifier.
    #[must_use]
    pub fn invoker(mut self, model_id: impl Into<String>, invoker: Arc<dyn ModelInvoker>) -> Self {
        self.invokers.insert(model_id.into(), invoker);
        self
    }

    /// Registers the fallback invoker for unregistered models.
    #[must_use]
    pub fn default_invoker(mut self, invoker: Arc<dyn ModelInvoker>) -> Self {
        self.default = Some(invoker);
        self
    }

    /// Sets the access policy.
    #[must_use]
    pub fn policy(mut self, policy: InvokerAccessPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Builds the registry.
    #[must_use]
    pub fn build(self) -> InvokerRegistry {
        InvokerRegistry {
            invokers: self.invokers,
            default: self.default,
            policy: self.policy,
        }
    }
}

// ============================================================================
// SECTION: Registry
// ============================================================================

/// Registry routing invocations by model identifier.
///
/// # Invariants
/// - Policy checks precede resolution; denied models never reach an invoker.
pub struct InvokerRegistry {
    /// Invokers keyed by model identifier.
    invokers: BTreeMap<String, Arc<dyn ModelInvoker>>,
    /// Fallback invoker for unregistered models.
    default: Option<Arc<dyn ModelInvoker>>,
    /// Access policy.
    policy: InvokerAccessPolicy,
}

impl InvokerRegistry {
    /// Returns a builder.
    #[must_use]
    pub fn builder() -> InvokerRegistryBuilder {
        InvokerRegistryBuilder::default()
    }
}

impl ModelInvoker for InvokerRegistry {
    fn invoke(&self, request: &InvocationRequest) -> Result<InvocationResponse, InvokerError> {
        let model_id = request.model_id.as_str();
        if !self.policy.is_allowed(model_id) {
            return Err(InvokerError::Refused(format!("model {model_id} blocked by policy")));
        }
        let invoker = self
            .invokers
            .get(model_id)
            .or(self.default.as_ref())
            .ok_or_else(|| InvokerError::MissingModel(model_id.to_string()))?;
        invoker.invoke(request)
    }
}
