use prometheus::{histogram_opts, opts, HistogramVec, IntCounterVec, Registry};
use tokio::time::Instant;

#[derive(Clone)]
pub struct Metrics {
    pub requests: IntCounterVec,
    pub duration: HistogramVec,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let duration = HistogramVec::new(
            histogram_opts!(
                "admission_duration_seconds",
                "The duration of an admission review in seconds",
            )
            .buckets(vec![0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1., 5., 10.]),
            &["operation"],
        )?;
        let requests = IntCounterVec::new(
            opts!("admission_requests_total", "admission reviews by outcome"),
            &["operation", "kind", "result"],
        )?;
        Ok(Metrics { requests, duration })
    }

    /// Register admission metrics to start tracking them.
    pub fn register(self, registry: &Registry) -> Result<Self, prometheus::Error> {
        registry.register(Box::new(self.duration.clone()))?;
        registry.register(Box::new(self.requests.clone()))?;
        Ok(self)
    }

    pub fn count(&self, operation: &str, kind: &str, result: &str) {
        self.requests.with_label_values(&[operation, kind, result]).inc();
    }

    pub fn measure(&self, operation: &str) -> AdmissionMeasurer {
        AdmissionMeasurer {
            start: Instant::now(),
            metric: self.duration.clone(),
            operation: operation.to_string(),
        }
    }
}

/// Records the review duration when dropped.
pub struct AdmissionMeasurer {
    start: Instant,
    metric: HistogramVec,
    operation: String,
}

impl Drop for AdmissionMeasurer {
    fn drop(&mut self) {
        self.metric
            .with_label_values(&[self.operation.as_str()])
            .observe(self.start.elapsed().as_secs_f64());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_and_measures() {
        let registry = Registry::new();
        let metrics = Metrics::new().unwrap().register(&registry).unwrap();
        metrics.count("create", "RedisOpsRequest", "allowed");
        metrics.count("create", "RedisOpsRequest", "invalid");
        drop(metrics.measure("create"));

        assert_eq!(
            metrics
                .requests
                .with_label_values(&["create", "RedisOpsRequest", "allowed"])
                .get(),
            1
        );
        assert_eq!(metrics.duration.with_label_values(&["create"]).get_sample_count(), 1);
        assert_eq!(registry.gather().len(), 2);
    }
}
