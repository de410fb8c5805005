use std::net::{IpAddr, SocketAddr};

use tracing::{debug, trace};

use super::request::build_request;
use super::response::ingest;
use super::transport::{Connector, TcpConnector, Transport};
use super::{ProbeObserver, ProbeOptions, ProbeResult, Target};
use crate::error::ProbeError;
use crate::timestamp::{Clock, MonotonicClock};

/// One full request/response cycle against `ip`, over plain TCP.
pub fn run_probe_cycle(
    target: &Target,
    ip: IpAddr,
    options: &ProbeOptions,
    observer: &mut dyn ProbeObserver,
) -> Result<ProbeResult, ProbeError> {
    run_probe_cycle_with(&TcpConnector, &MonotonicClock, target, ip, options, observer)
}

pub fn run_probe_cycle_with<N, C>(
    connector: &N,
    clock: &C,
    target: &Target,
    ip: IpAddr,
    options: &ProbeOptions,
    observer: &mut dyn ProbeObserver,
) -> Result<ProbeResult, ProbeError>
where
    N: Connector,
    C: Clock,
{
    let mut result = ProbeResult::default();
    let start = clock.now_ms();

    let addr = SocketAddr::new(ip, target.port);
    let mut transport = connector
        .connect(addr)
        .map_err(|source| ProbeError::Connect { addr, source })?;
    debug!("connected to {}", addr);

    let request = build_request(target, options.flags);
    transport.write_all(&request).map_err(ProbeError::Write)?;
    trace!("sent {} request bytes", request.len());

    // sample slots are timed from the start of the cycle, connect included
    ingest(&mut transport, clock, start, options.timesplit, &mut result, observer)?;
    drop(transport);

    result.elapsed_ms = clock.now_ms().saturating_sub(start);
    debug!(
        "{} {} bytes in {} ms",
        result.status_code, result.total_bytes, result.elapsed_ms
    );
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prober::response::tests::{ScriptedTransport, StepClock};
    use crate::prober::{NoopObserver, RequestFlags, TimeSample};
    use std::cell::{Cell, RefCell};
    use std::io::{self, Read, Write};
    use std::net::{Ipv4Addr, TcpListener};
    use std::rc::Rc;
    use std::thread;

    /// Hands out scripted transports and keeps what was written to them.
    struct ScriptedConnector {
        replies: RefCell<Vec<Vec<Vec<u8>>>>,
        written: Rc<RefCell<Vec<Vec<u8>>>>,
        reads: Rc<Cell<usize>>,
        refuse: bool,
        fail_write: bool,
    }

    struct Recording {
        inner: ScriptedTransport,
        sink: Rc<RefCell<Vec<Vec<u8>>>>,
        reads: Rc<Cell<usize>>,
    }

    impl Transport for Recording {
        fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
            self.sink.borrow_mut().push(bytes.to_vec());
            self.inner.write_all(bytes)
        }

        fn read_chunk(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.reads.set(self.reads.get() + 1);
            self.inner.read_chunk(buf)
        }
    }

    impl ScriptedConnector {
        fn new(replies: Vec<Vec<Vec<u8>>>) -> Self {
            Self {
                replies: RefCell::new(replies),
                written: Rc::new(RefCell::new(Vec::new())),
                reads: Rc::new(Cell::new(0)),
                refuse: false,
                fail_write: false,
            }
        }
    }

    impl Connector for ScriptedConnector {
        type Conn = Recording;

        fn connect(&self, _addr: SocketAddr) -> io::Result<Recording> {
            if self.refuse {
                return Err(io::ErrorKind::ConnectionRefused.into());
            }
            let chunks = self.replies.borrow_mut().remove(0);
            let mut inner = ScriptedTransport::new(chunks);
            inner.fail_write = self.fail_write;
            Ok(Recording {
                inner,
                sink: self.written.clone(),
                reads: self.reads.clone(),
            })
        }
    }

    #[derive(Default)]
    struct Collecting {
        headers: Vec<String>,
        chunks: Vec<(usize, Option<TimeSample>)>,
        progress: Vec<u64>,
    }

    impl ProbeObserver for Collecting {
        fn on_header_text(&mut self, header: &str) {
            self.headers.push(header.to_string());
        }

        fn on_raw_chunk(&mut self, chunk: &[u8], opened: Option<&TimeSample>) {
            self.chunks.push((chunk.len(), opened.copied()));
        }

        fn on_progress(&mut self, total_bytes: u64) {
            self.progress.push(total_bytes);
        }
    }

    fn target() -> Target {
        Target {
            scheme: "http".into(),
            host: "example.com".into(),
            port: 8080,
            path: "/status".into(),
        }
    }

    const LOCALHOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);
    const REPLY: &[u8] = b"HTTP/1.1 200 OK\r\nContent-Encoding: gzip\r\n\r\nhello";

    #[test]
    fn cycle_sends_request_and_collects_reply() {
        let connector = ScriptedConnector::new(vec![vec![REPLY.to_vec()]]);
        let options = ProbeOptions {
            flags: RequestFlags { accept_compression: true, ..Default::default() },
            timesplit: true,
        };
        let clock = StepClock::new(3);
        let result = run_probe_cycle_with(&connector, &clock, &target(), LOCALHOST, &options, &mut NoopObserver).unwrap();

        assert_eq!(result.status_code, 200);
        assert_eq!(result.reason_phrase.as_deref(), Some("OK"));
        assert!(result.compressed);
        assert_eq!(result.total_bytes, REPLY.len() as u64);
        assert_eq!(result.samples.len(), 1);
        // start, one chunk, end
        assert_eq!(result.elapsed_ms, 6);

        let written = connector.written.borrow();
        assert_eq!(written.len(), 1);
        let request = String::from_utf8(written[0].clone()).unwrap();
        assert!(request.starts_with("GET /status HTTP/1.1\r\nHost: example.com:8080\r\n"));
        assert!(request.contains("Accept-Encoding: gzip,deflate"));
    }

    #[test]
    fn repeated_cycles_do_not_share_state() {
        let reply = REPLY.to_vec();
        let chunks = vec![reply[..20].to_vec(), reply[20..].to_vec()];
        let connector = ScriptedConnector::new(vec![chunks.clone(), chunks]);
        let options = ProbeOptions::default();
        let clock = StepClock::new(1);
        let first = run_probe_cycle_with(&connector, &clock, &target(), LOCALHOST, &options, &mut NoopObserver).unwrap();
        let second = run_probe_cycle_with(&connector, &clock, &target(), LOCALHOST, &options, &mut NoopObserver).unwrap();
        assert_eq!(first.total_bytes, second.total_bytes);
        assert_eq!(first.status_code, second.status_code);
        assert_eq!(first.reason_phrase, second.reason_phrase);
        assert_eq!(first.compressed, second.compressed);
    }

    #[test]
    fn observer_sees_header_chunks_and_progress() {
        let chunks = vec![REPLY[..30].to_vec(), REPLY[30..].to_vec()];
        let connector = ScriptedConnector::new(vec![chunks]);
        let options = ProbeOptions { timesplit: true, ..Default::default() };
        let mut observer = Collecting::default();
        run_probe_cycle_with(&connector, &StepClock::new(1), &target(), LOCALHOST, &options, &mut observer).unwrap();

        assert_eq!(observer.headers.len(), 1);
        assert!(observer.headers[0].starts_with("HTTP/1.1 200 OK"));
        assert_eq!(observer.chunks.len(), 2);
        assert_eq!(observer.chunks[1].1.map(|s| s.first_byte), Some(30));
        assert_eq!(observer.progress, vec![30, REPLY.len() as u64]);
    }

    #[test]
    fn refused_connection_is_a_connect_error() {
        let mut connector = ScriptedConnector::new(Vec::new());
        connector.refuse = true;
        let err = run_probe_cycle_with(&connector, &StepClock::new(1), &target(), LOCALHOST, &ProbeOptions::default(), &mut NoopObserver)
            .unwrap_err();
        assert!(matches!(err, ProbeError::Connect { .. }));
        assert_eq!(err.exit_code(), crate::error::EXIT_CONN);
    }

    #[test]
    fn failed_write_ends_cycle_before_reading() {
        let mut connector = ScriptedConnector::new(vec![vec![REPLY.to_vec()]]);
        connector.fail_write = true;
        let mut observer = Collecting::default();
        let err = run_probe_cycle_with(&connector, &StepClock::new(1), &target(), LOCALHOST, &ProbeOptions::default(), &mut observer)
            .unwrap_err();
        assert!(matches!(err, ProbeError::Write(_)));
        assert_eq!(err.exit_code(), crate::error::EXIT_WRITE);
        assert_eq!(connector.reads.get(), 0);
        assert!(observer.headers.is_empty());
        assert!(observer.progress.is_empty());
    }

    #[test]
    fn empty_reply_is_not_an_error() {
        let connector = ScriptedConnector::new(vec![Vec::new()]);
        let options = ProbeOptions { timesplit: true, ..Default::default() };
        let result = run_probe_cycle_with(&connector, &StepClock::new(1), &target(), LOCALHOST, &options, &mut NoopObserver).unwrap();
        assert_eq!(result.total_bytes, 0);
        assert_eq!(result.status_code, 0);
        assert!(result.samples.is_empty());
    }

    #[test]
    fn cycle_over_loopback_tcp() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = thread::spawn(move || {
            let (mut conn, _) = listener.accept().unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.ends_with(b"\r\n\r\n") {
                let n = conn.read(&mut buf).unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            conn.write_all(b"HTTP/1.0 503 Service Unavailable\r\nContent-Length: 4\r\n\r\nbusy").unwrap();
            String::from_utf8(request).unwrap()
        });

        let target = Target {
            scheme: "http".into(),
            host: "vhost.test".into(),
            port,
            path: "/".into(),
        };
        let options = ProbeOptions {
            flags: RequestFlags { use_head_method: true, use_http10: true, ..Default::default() },
            timesplit: false,
        };
        let result = run_probe_cycle(&target, LOCALHOST, &options, &mut NoopObserver).unwrap();
        let request = server.join().unwrap();

        assert!(request.starts_with("HEAD / HTTP/1.0\r\n"));
        assert!(request.contains(&format!("Host: vhost.test:{port}\r\n")));
        assert_eq!(result.status_code, 503);
        assert_eq!(result.reason_phrase.as_deref(), Some("Service Unavailable"));
        assert_eq!(result.total_bytes, 59);
    }
}
