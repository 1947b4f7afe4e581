use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, SystemTime};
use tokio::sync::RwLock;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiMetrics {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub rate_limited_requests: u64,
    pub average_response_time: Duration,
    pub last_request_time: Option<SystemTime>,
    pub requests_by_endpoint: HashMap<String, EndpointMetrics>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EndpointMetrics {
    pub request_count: u64,
    pub success_count: u64,
    pub error_count: u64,
    pub total_response_time: Duration,
}

impl EndpointMetrics {
    pub fn success_rate(&self) -> f64 {
        if self.request_count == 0 {
            return 0.0;
        }
        self.success_count as f64 / self.request_count as f64
    }

    pub fn average_response_time(&self) -> Duration {
        if self.request_count == 0 {
            return Duration::ZERO;
        }
        self.total_response_time / self.request_count as u32
    }
}

#[derive(Debug, Clone)]
pub struct RequestMetrics {
    pub endpoint: String,
    pub status_code: Option<u16>,
    pub response_time: Duration,
    pub success: bool,
    pub rate_limited: bool,
}

#[derive(Debug, Default)]
pub struct MetricsCollector {
    metrics: RwLock<ApiMetrics>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn record_request(&self, request: RequestMetrics) {
        let mut metrics = self.metrics.write().await;

        // Running average over all requests seen so far.
        let total_time = metrics.average_response_time * metrics.total_requests as u32
            + request.response_time;
        metrics.total_requests += 1;
        metrics.average_response_time = total_time / metrics.total_requests as u32;
        metrics.last_request_time = Some(SystemTime::now());

        if request.success {
            metrics.successful_requests += 1;
        } else {
            metrics.failed_requests += 1;
        }
        if request.rate_limited {
            metrics.rate_limited_requests += 1;
        }

        let endpoint = metrics
            .requests_by_endpoint
            .entry(request.endpoint.clone())
            .or_default();
        endpoint.request_count += 1;
        endpoint.total_response_time += request.response_time;
        if request.success {
            endpoint.success_count += 1;
        } else {
            endpoint.error_count += 1;
        }
    }

    pub async fn get_metrics(&self) -> ApiMetrics {
        self.metrics.read().await.clone()
    }

    pub async fn get_endpoint_metrics(&self, endpoint: &str) -> Option<EndpointMetrics> {
        self.metrics
            .read()
            .await
            .requests_by_endpoint
            .get(endpoint)
            .cloned()
    }

    pub async fn reset_metrics(&self) {
        *self.metrics.write().await = ApiMetrics::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_record_and_read_back() {
        let collector = MetricsCollector::new();
        collector
            .record_request(RequestMetrics {
                endpoint: "/2/users/me".to_string(),
                status_code: Some(200),
                response_time: Duration::from_millis(150),
                success: true,
                rate_limited: false,
            })
            .await;

        let metrics = collector.get_metrics().await;
        assert_eq!(metrics.total_requests, 1);
        assert_eq!(metrics.successful_requests, 1);
        assert_eq!(metrics.failed_requests, 0);
        assert_eq!(metrics.average_response_time, Duration::from_millis(150));
        assert!(metrics.last_request_time.is_some());
    }

    #[tokio::test]
    async fn test_endpoint_breakdown() {
        let collector = MetricsCollector::new();
        for success in [true, true, false] {
            collector
                .record_request(RequestMetrics {
                    endpoint: "/2/users/by/username".to_string(),
                    status_code: Some(if success { 200 } else { 500 }),
                    response_time: Duration::from_millis(100),
                    success,
                    rate_limited: false,
                })
                .await;
        }

        let endpoint = collector
            .get_endpoint_metrics("/2/users/by/username")
            .await
            .unwrap();
        assert_eq!(endpoint.request_count, 3);
        assert_eq!(endpoint.success_count, 2);
        assert_eq!(endpoint.error_count, 1);
        assert!((endpoint.success_rate() - 2.0 / 3.0).abs() < f64::EPSILON);
        assert_eq!(endpoint.average_response_time(), Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_reset() {
        let collector = MetricsCollector::new();
        collector
            .record_request(RequestMetrics {
                endpoint: "/2/tweets".to_string(),
                status_code: Some(429),
                response_time: Duration::from_millis(10),
                success: false,
                rate_limited: true,
            })
            .await;
        assert_eq!(collector.get_metrics().await.rate_limited_requests, 1);

        collector.reset_metrics().await;
        let metrics = collector.get_metrics().await;
        assert_eq!(metrics.total_requests, 0);
        assert!(metrics.requests_by_endpoint.is_empty());
    }
}
