use prometheus::{Encoder, TextEncoder, IntCounterVec, IntGaugeVec, Opts, Registry};
use warp::Filter;
use std::net::SocketAddr;
use once_cell::sync::Lazy;

use crate::prober::ProbeResult;

static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

static STATUS_GAUGE: Lazy<IntGaugeVec> = Lazy::new(|| {
    let opts = Opts::new("probe_http_status_code", "Status code of the last reply");
    let gauge = IntGaugeVec::new(opts, &["target", "client"]).unwrap();
    REGISTRY.register(Box::new(gauge.clone())).unwrap();
    gauge
});

static BYTES_GAUGE: Lazy<IntGaugeVec> = Lazy::new(|| {
    let opts = Opts::new("probe_reply_bytes", "Length of the last reply, header included");
    let gauge = IntGaugeVec::new(opts, &["target", "client"]).unwrap();
    REGISTRY.register(Box::new(gauge.clone())).unwrap();
    gauge
});

static LATENCY_GAUGE: Lazy<IntGaugeVec> = Lazy::new(|| {
    let opts = Opts::new("probe_cycle_milliseconds", "Duration of the last request cycle in milliseconds");
    let gauge = IntGaugeVec::new(opts, &["target", "client"]).unwrap();
    REGISTRY.register(Box::new(gauge.clone())).unwrap();
    gauge
});

static FAILURE_COUNTER: Lazy<IntCounterVec> = Lazy::new(|| {
    let opts = Opts::new("probe_failures_total", "Total number of failed request cycles");
    let ctr = IntCounterVec::new(opts, &["target", "client"]).unwrap();
    REGISTRY.register(Box::new(ctr.clone())).unwrap();
    ctr
});

pub fn render() -> Vec<u8> {
    let encoder = TextEncoder::new();
    let mf = REGISTRY.gather();
    let mut buf = Vec::new();
    if let Err(e) = encoder.encode(&mf, &mut buf) {
        tracing::error!("encoding metrics: {:?}", e);
    }
    buf
}

pub async fn serve_metrics(addr: SocketAddr) {
    let metrics_route = warp::path!("metrics").map(move || {
        let encoder = TextEncoder::new();
        warp::http::Response::builder()
            .header("Content-Type", encoder.format_type())
            .body(render())
            .unwrap_or_default()
    });

    warp::serve(metrics_route).run(addr).await;
}

pub fn observe_cycle(target: &str, client: usize, result: &ProbeResult) {
    let client = client.to_string();
    let labels = [target, client.as_str()];
    STATUS_GAUGE
        .with_label_values(&labels)
        .set(i64::from(result.status_code));
    BYTES_GAUGE
        .with_label_values(&labels)
        .set(i64::try_from(result.total_bytes).unwrap_or(i64::MAX));
    LATENCY_GAUGE
        .with_label_values(&labels)
        .set(i64::try_from(result.elapsed_ms).unwrap_or(i64::MAX));
}

pub fn inc_failure(target: &str, client: usize) {
    FAILURE_COUNTER
        .with_label_values(&[target, client.to_string().as_str()])
        .inc();
}
