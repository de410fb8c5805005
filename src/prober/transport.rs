use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpStream};

use socket2::{Domain, Protocol, SockAddr, Socket, Type};

/// Blocking byte stream a probe cycle talks over. Dropping it closes it.
pub trait Transport {
    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()>;

    /// Block until `buf` is full or the peer closed the stream.
    /// `Ok(0)` means EOF.
    fn read_chunk(&mut self, buf: &mut [u8]) -> io::Result<usize>;
}

pub trait Connector {
    type Conn: Transport;

    fn connect(&self, addr: SocketAddr) -> io::Result<Self::Conn>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnector;

impl Connector for TcpConnector {
    type Conn = TcpTransport;

    fn connect(&self, addr: SocketAddr) -> io::Result<TcpTransport> {
        TcpTransport::connect(addr)
    }
}

/// Plain TCP, no timeouts: a peer that never answers blocks the cycle.
#[derive(Debug)]
pub struct TcpTransport {
    stream: TcpStream,
}

impl TcpTransport {
    pub fn connect(addr: SocketAddr) -> io::Result<Self> {
        let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
        socket.connect(&SockAddr::from(addr))?;
        let stream: TcpStream = socket.into();
        stream.set_nodelay(true)?;
        Ok(Self { stream })
    }
}

impl Transport for TcpTransport {
    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.stream.write_all(bytes)?;
        self.stream.flush()
    }

    fn read_chunk(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        fill(&mut self.stream, buf)
    }
}

fn fill<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::thread;

    /// Hands out at most `step` bytes per read, like a slow socket.
    struct Trickle<'a> {
        data: &'a [u8],
        step: usize,
    }

    impl Read for Trickle<'_> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let n = self.step.min(buf.len()).min(self.data.len());
            buf[..n].copy_from_slice(&self.data[..n]);
            self.data = &self.data[n..];
            Ok(n)
        }
    }

    #[test]
    fn fill_waits_for_a_full_buffer_then_reports_eof() {
        let mut reader = Trickle { data: b"0123456789", step: 3 };
        let mut buf = [0u8; 8];
        assert_eq!(fill(&mut reader, &mut buf).unwrap(), 8);
        assert_eq!(&buf, b"01234567");
        assert_eq!(fill(&mut reader, &mut buf).unwrap(), 2);
        assert_eq!(fill(&mut reader, &mut buf).unwrap(), 0);
    }

    #[test]
    fn tcp_transport_round_trip() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let server = thread::spawn(move || {
            let (mut conn, _) = listener.accept().unwrap();
            let mut req = [0u8; 4];
            conn.read_exact(&mut req).unwrap();
            conn.write_all(b"pong!").unwrap();
            req
        });

        let mut transport = TcpConnector.connect(addr).unwrap();
        transport.write_all(b"ping").unwrap();
        let mut buf = [0u8; 64];
        let n = transport.read_chunk(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"pong!");
        assert_eq!(&server.join().unwrap(), b"ping");
    }
}
