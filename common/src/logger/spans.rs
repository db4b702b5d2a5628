use std::time::{Duration, Instant};

use tracing::{Span, field};

use super::TraceId;

/// Root span for one observation. `source` and `sample_id` are recorded
/// later through [`annotate_span`].
pub fn root_span(name: &'static str, trace_id: &TraceId) -> Span {
    tracing::info_span!(
        "root",
        name = %name,
        trace_id = %trace_id.as_str(),
        source = field::Empty,
        sample_id = field::Empty
    )
}

pub fn annotate_span(source: &str, sample_id: Option<u64>) {
    let span = Span::current();
    span.record("source", field::display(source));
    if let Some(id) = sample_id {
        span.record("sample_id", id);
    }
}

pub async fn warn_if_slow<F, T>(label: &'static str, max: Duration, fut: F) -> T
where
    F: std::future::Future<Output = T>,
{
    let start = Instant::now();
    let out = fut.await;
    let elapsed = start.elapsed();
    if elapsed > max {
        tracing::warn!(
            target: "performance",
            label = label,
            elapsed_ms = elapsed.as_millis() as u64,
            "slow operation detected"
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    #[tokio::test]
    #[traced_test]
    async fn warn_if_slow_reports_slow_futures() {
        let out = warn_if_slow("sleepy", Duration::from_millis(1), async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            7
        })
        .await;

        assert_eq!(out, 7);
        assert!(logs_contain("slow operation detected"));
    }

    #[tokio::test]
    #[traced_test]
    async fn warn_if_slow_is_quiet_for_fast_futures() {
        let out = warn_if_slow("quick", Duration::from_secs(5), async { 1 }).await;

        assert_eq!(out, 1);
        assert!(!logs_contain("slow operation detected"));
    }

    #[test]
    fn trace_ids_are_unique() {
        let a = TraceId::default();
        let b = TraceId::default();
        assert_ne!(a, b);
        assert_eq!(TraceId::new("abc").as_str(), "abc");
    }
}
