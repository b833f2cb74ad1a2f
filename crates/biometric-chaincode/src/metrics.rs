use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};

/// Function labels accepted as-is; anything else is counted as `unknown`.
const KNOWN_FUNCTIONS: &[&str] = &[
    "init",
    "search",
    "insertBiometricRecord",
    "deleteBiometricRecord",
    "queryAll",
];

/// Invocation counters kept per chaincode instance.
pub struct ChaincodeMetrics {
    registry: Registry,
    invocations: IntCounterVec,
    records_written: IntCounterVec,
}

impl ChaincodeMetrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();
        let invocations = IntCounterVec::new(
            Opts::new(
                "biometric_chaincode_invocations_total",
                "Chaincode invocations by function and outcome",
            ),
            &["function", "status"],
        )?;
        let records_written = IntCounterVec::new(
            Opts::new(
                "biometric_chaincode_records_written_total",
                "World-state mutations issued by the chaincode",
            ),
            &["operation"],
        )?;
        registry.register(Box::new(invocations.clone()))?;
        registry.register(Box::new(records_written.clone()))?;
        Ok(Self {
            registry,
            invocations,
            records_written,
        })
    }

    pub fn observe_invocation(&self, function: &str, ok: bool) {
        let function = if KNOWN_FUNCTIONS.contains(&function) {
            function
        } else {
            "unknown"
        };
        let status = if ok { "ok" } else { "error" };
        self.invocations
            .with_label_values(&[function, status])
            .inc();
    }

    pub fn observe_write(&self, operation: &str) {
        self.records_written.with_label_values(&[operation]).inc();
    }

    pub fn invocation_count(&self, function: &str, status: &str) -> u64 {
        self.invocations
            .with_label_values(&[function, status])
            .get()
    }

    /// Text exposition of every registered metric.
    pub fn gather_text(&self) -> String {
        let mut buf = Vec::new();
        let encoder = TextEncoder::new();
        if encoder.encode(&self.registry.gather(), &mut buf).is_err() {
            return String::new();
        }
        String::from_utf8(buf).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_functions_share_one_label() {
        let m = ChaincodeMetrics::new().unwrap();
        m.observe_invocation("dropTable", false);
        m.observe_invocation("rm -rf", false);
        m.observe_invocation("queryAll", true);
        assert_eq!(m.invocation_count("unknown", "error"), 2);
        assert_eq!(m.invocation_count("queryAll", "ok"), 1);
        assert!(!m.gather_text().contains("dropTable"));
    }

    #[test]
    fn test_gather_text_lists_counters() {
        let m = ChaincodeMetrics::new().unwrap();
        m.observe_write("put");
        let text = m.gather_text();
        assert!(text.contains("biometric_chaincode_records_written_total"));
        assert!(text.contains("operation=\"put\""));
    }
}
