use prometheus::{Encoder, Histogram, IntCounter, IntCounterVec, IntGauge, Registry, TextEncoder};

#[derive(Clone)]
pub struct BackofficeMetrics {
    pub registry: Registry,
    pub jobs_submitted_total: IntCounterVec,
    pub jobs_failed_total: IntCounterVec,
    pub jobs_in_flight: IntGauge,
    pub jobs_evicted_total: IntCounter,
    pub job_duration_seconds: Histogram,
    pub items_priced_total: IntCounter,
    pub invalid_group_total: IntCounter,
    pub http_errors_total: IntCounterVec,
}

impl BackofficeMetrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();
        let jobs_submitted_total = IntCounterVec::new(
            prometheus::Opts::new("backoffice_jobs_submitted_total", "Jobs handed to the dispatcher"),
            &["job"],
        )?;
        let jobs_failed_total = IntCounterVec::new(
            prometheus::Opts::new("backoffice_jobs_failed_total", "Jobs that finished with an error"),
            &["job"],
        )?;
        let jobs_in_flight = IntGauge::new("backoffice_jobs_in_flight", "Jobs currently running")?;
        let jobs_evicted_total = IntCounter::new(
            "backoffice_jobs_evicted_total",
            "Finished job results dropped by the retention sweeper",
        )?;
        let job_duration_seconds = Histogram::with_opts(
            prometheus::HistogramOpts::new(
                "backoffice_job_duration_seconds",
                "Wall time from job start to completion"
            ).buckets(vec![0.001,0.005,0.01,0.05,0.1,0.25,0.5,1.0,2.0,5.0])
        )?;
        let items_priced_total = IntCounter::new(
            "pricing_items_priced_total",
            "Items run through the landed-cost engine",
        )?;
        let invalid_group_total = IntCounter::new(
            "pricing_invalid_group_total",
            "Pricing requests refused because of an invalid shipping group",
        )?;
        let http_errors_total = IntCounterVec::new(
            prometheus::Opts::new(
                "http_errors_total",
                "Count of HTTP error responses emitted (status >= 400)"
            ),
            &["service", "code", "status"]
        )?;
        registry.register(Box::new(jobs_submitted_total.clone()))?;
        registry.register(Box::new(jobs_failed_total.clone()))?;
        registry.register(Box::new(jobs_in_flight.clone()))?;
        registry.register(Box::new(jobs_evicted_total.clone()))?;
        registry.register(Box::new(job_duration_seconds.clone()))?;
        registry.register(Box::new(items_priced_total.clone()))?;
        registry.register(Box::new(invalid_group_total.clone()))?;
        registry.register(Box::new(http_errors_total.clone()))?;
        Ok(BackofficeMetrics {
            registry,
            jobs_submitted_total,
            jobs_failed_total,
            jobs_in_flight,
            jobs_evicted_total,
            job_duration_seconds,
            items_priced_total,
            invalid_group_total,
            http_errors_total,
        })
    }

    /// Prometheus text exposition of everything in [`Self::registry`].
    pub fn render(&self) -> prometheus::Result<String> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buf)?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_lists_registered_families() {
        let metrics = BackofficeMetrics::new().unwrap();
        metrics.jobs_submitted_total.with_label_values(&["list_sellers"]).inc();
        metrics.items_priced_total.inc_by(3);
        let text = metrics.render().unwrap();
        assert!(text.contains("backoffice_jobs_submitted_total{job=\"list_sellers\"} 1"));
        assert!(text.contains("pricing_items_priced_total 3"));
    }

    #[test]
    fn instances_do_not_share_registries() {
        let a = BackofficeMetrics::new().unwrap();
        let b = BackofficeMetrics::new().unwrap();
        a.invalid_group_total.inc();
        assert_eq!(a.invalid_group_total.get(), 1);
        assert_eq!(b.invalid_group_total.get(), 0);
    }
}
