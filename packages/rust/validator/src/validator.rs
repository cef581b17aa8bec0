//! Per-field validation with local failure recovery.

use std::time::Duration;

use tracing::{instrument, warn};

use prospectclean_shared::{FieldVerdict, ProspectCleanError, VerdictSource};

use crate::company;
use crate::service::{FieldKind, ReasoningService, ServiceRequest, ServiceVerdict, ValidationContext};

/// Validates one field at a time against the reasoning service.
///
/// Stateless with respect to rows and batches; concurrency and rate are
/// governed by the caller. Every service failure, timeout, or decode error
/// is absorbed here into an unresolved verdict so a single bad field never
/// aborts its row.
pub struct FieldValidator<S> {
    service: S,
    call_timeout: Duration,
}

impl<S: ReasoningService> FieldValidator<S> {
    /// Create a validator with a per-call deadline.
    pub fn new(service: S, call_timeout: Duration) -> Self {
        Self {
            service,
            call_timeout,
        }
    }

    /// Validate one field value, returning a verdict in every case.
    #[instrument(skip_all, fields(field = field.as_str()))]
    pub async fn validate(
        &self,
        field: FieldKind,
        value: &str,
        ctx: &ValidationContext,
    ) -> FieldVerdict {
        let value = value.trim();
        if value.is_empty() {
            return FieldVerdict::skipped(value);
        }

        let request = ServiceRequest {
            field,
            value: value.to_string(),
            context: ctx.clone(),
        };

        let outcome = match tokio::time::timeout(self.call_timeout, self.service.assess(&request))
            .await
        {
            Ok(result) => result,
            Err(_) => Err(ProspectCleanError::Validation(format!(
                "no verdict within {}s",
                self.call_timeout.as_secs()
            ))),
        };

        match outcome {
            Ok(verdict) => finish(field, value, ctx, verdict),
            Err(e) => {
                warn!(value, error = %e, "field validation degraded");
                FieldVerdict::unresolved(value, e.to_string())
            }
        }
    }
}

/// Map a decoded service verdict onto the field's output verdict.
fn finish(
    field: FieldKind,
    original: &str,
    ctx: &ValidationContext,
    verdict: ServiceVerdict,
) -> FieldVerdict {
    match field {
        FieldKind::Company => company::finalize(original, ctx, verdict),
        FieldKind::LastName | FieldKind::FirstName => {
            let trimmed = verdict.corrected_value.trim();
            let corrected = if trimmed.is_empty() { original } else { trimmed };
            let source_label = if corrected == original {
                VerdictSource::Accepted
            } else {
                VerdictSource::Corrected
            };
            FieldVerdict {
                corrected_value: corrected.to_string(),
                confidence: verdict.confidence,
                explanation: verdict.explanation,
                source_label,
                citations: Vec::new(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prospectclean_shared::Result;

    struct FixedService(ServiceVerdict);

    impl ReasoningService for FixedService {
        fn assess(
            &self,
            _request: &ServiceRequest,
        ) -> impl std::future::Future<Output = Result<ServiceVerdict>> + Send {
            let verdict = self.0.clone();
            async move { Ok(verdict) }
        }
    }

    struct FailingService;

    impl ReasoningService for FailingService {
        fn assess(
            &self,
            _request: &ServiceRequest,
        ) -> impl std::future::Future<Output = Result<ServiceVerdict>> + Send {
            async move {
                Err(ProspectCleanError::Validation(
                    "service unreachable".into(),
                ))
            }
        }
    }

    struct StalledService;

    impl ReasoningService for StalledService {
        fn assess(
            &self,
            _request: &ServiceRequest,
        ) -> impl std::future::Future<Output = Result<ServiceVerdict>> + Send {
            std::future::pending()
        }
    }

    fn verdict(corrected: &str, confidence: f64) -> ServiceVerdict {
        ServiceVerdict {
            corrected_value: corrected.into(),
            confidence,
            explanation: "ras".into(),
            known_entity: true,
            citations: vec![],
        }
    }

    fn ctx() -> ValidationContext {
        ValidationContext {
            email_domain: "acme.fr".into(),
            companion_name: None,
        }
    }

    #[tokio::test]
    async fn unchanged_value_is_accepted() {
        let validator = FieldValidator::new(
            FixedService(verdict("Dupont", 0.92)),
            Duration::from_secs(5),
        );
        let out = validator
            .validate(FieldKind::LastName, "Dupont", &ctx())
            .await;
        assert_eq!(out.source_label, VerdictSource::Accepted);
        assert_eq!(out.confidence, 0.92);
    }

    #[tokio::test]
    async fn changed_value_is_corrected() {
        let validator = FieldValidator::new(
            FixedService(verdict("Dupont", 0.85)),
            Duration::from_secs(5),
        );
        let out = validator
            .validate(FieldKind::LastName, "DUPONT j.", &ctx())
            .await;
        assert_eq!(out.source_label, VerdictSource::Corrected);
        assert_eq!(out.corrected_value, "Dupont");
    }

    #[tokio::test]
    async fn empty_input_is_skipped_without_a_call() {
        let validator = FieldValidator::new(FailingService, Duration::from_secs(5));
        let out = validator.validate(FieldKind::FirstName, "   ", &ctx()).await;
        assert_eq!(out.source_label, VerdictSource::Skipped);
        assert_eq!(out.confidence, 0.0);
    }

    #[tokio::test]
    async fn service_failure_degrades_to_unresolved() {
        let validator = FieldValidator::new(FailingService, Duration::from_secs(5));
        let out = validator.validate(FieldKind::Company, "Acme", &ctx()).await;
        assert_eq!(out.source_label, VerdictSource::Unresolved);
        assert_eq!(out.confidence, 0.0);
        assert_eq!(out.corrected_value, "Acme");
        assert!(out.explanation.contains("unreachable"));
    }

    #[tokio::test]
    async fn stalled_service_times_out_to_unresolved() {
        let validator = FieldValidator::new(StalledService, Duration::from_millis(50));
        let out = validator
            .validate(FieldKind::LastName, "Dupont", &ctx())
            .await;
        assert_eq!(out.source_label, VerdictSource::Unresolved);
        assert!(out.explanation.contains("no verdict within"));
    }

    #[tokio::test]
    async fn company_path_applies_calibration() {
        let service = FixedService(ServiceVerdict {
            corrected_value: "Acme".into(),
            confidence: 0.8,
            explanation: "connue".into(),
            known_entity: true,
            citations: vec!["https://acme.fr".into()],
        });
        let validator = FieldValidator::new(service, Duration::from_secs(5));
        let out = validator
            .validate(FieldKind::Company, "Acme SARL", &ctx())
            .await;
        assert_eq!(out.source_label, VerdictSource::Corrected);
        // 0.8 + 1 citation (0.025) + domain match (0.1) = 0.925 -> 0.93
        assert_eq!(out.confidence, 0.93);
        assert_eq!(out.citations.len(), 1);
    }
}
