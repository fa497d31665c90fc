//! Serial byte link.
//!
//! One byte per message, no length prefix, checksum or escape. Reads block
//! without timeout; a byte that arrives while a node is busy with its timer or
//! sensor stays buffered until the node next reads.

use std::io;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Point-to-point serial byte link.
#[async_trait]
pub trait SerialLink: Send {
    /// Send one byte.
    async fn send_byte(&mut self, byte: u8) -> io::Result<()>;

    /// Receive one byte, waiting as long as it takes.
    async fn recv_byte(&mut self) -> io::Result<u8>;
}

#[async_trait]
impl<L: SerialLink + ?Sized> SerialLink for Box<L> {
    async fn send_byte(&mut self, byte: u8) -> io::Result<()> {
        (**self).send_byte(byte).await
    }

    async fn recv_byte(&mut self) -> io::Result<u8> {
        (**self).recv_byte().await
    }
}

/// Link over any async byte stream: a TCP socket in simulation, a duplex pipe
/// in tests, a pty on a host.
#[derive(Debug)]
pub struct StreamLink<T> {
    stream: T,
}

impl<T> StreamLink<T> {
    /// Wrap a byte stream.
    pub fn new(stream: T) -> Self {
        Self { stream }
    }

    /// Unwrap the stream.
    pub fn into_inner(self) -> T {
        self.stream
    }
}

#[async_trait]
impl<T> SerialLink for StreamLink<T>
where
    T: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn send_byte(&mut self, byte: u8) -> io::Result<()> {
        self.stream.write_all(&[byte]).await?;
        self.stream.flush().await
    }

    async fn recv_byte(&mut self) -> io::Result<u8> {
        self.stream.read_u8().await
    }
}

#[cfg(feature = "serial")]
pub use serial::SerialPortLink;

#[cfg(feature = "serial")]
mod serial {
    use std::{
        io::{self, Read, Write},
        time::Duration,
    };

    use async_trait::async_trait;
    use tokio::sync::mpsc;

    use super::SerialLink;

    /// Link over a real serial port, 8N1 at the given baud rate.
    ///
    /// A reader thread blocks on the port and forwards bytes to the async side;
    /// writes go straight to a cloned handle.
    pub struct SerialPortLink {
        writer: Box<dyn serialport::SerialPort>,
        incoming: mpsc::Receiver<io::Result<u8>>,
    }

    impl SerialPortLink {
        /// Open `path` at `baud`.
        pub fn open(path: &str, baud: u32) -> io::Result<Self> {
            let port = serialport::new(path, baud)
                .data_bits(serialport::DataBits::Eight)
                .parity(serialport::Parity::None)
                .stop_bits(serialport::StopBits::One)
                .timeout(Duration::from_millis(100))
                .open()
                .map_err(io::Error::from)?;
            let mut reader = port.try_clone().map_err(io::Error::from)?;

            let (tx, incoming) = mpsc::channel(64);
            std::thread::spawn(move || {
                let mut byte = [0u8; 1];
                loop {
                    let item = match reader.read(&mut byte) {
                        Ok(0) => continue,
                        Ok(_) => Ok(byte[0]),
                        Err(err) if err.kind() == io::ErrorKind::TimedOut => continue,
                        Err(err) => Err(err),
                    };
                    let failed = item.is_err();
                    if tx.blocking_send(item).is_err() || failed {
                        break;
                    }
                }
            });

            tracing::info!(path, baud, "serial port open");
            Ok(Self { writer: port, incoming })
        }
    }

    #[async_trait]
    impl SerialLink for SerialPortLink {
        async fn send_byte(&mut self, byte: u8) -> io::Result<()> {
            self.writer.write_all(&[byte])?;
            self.writer.flush()
        }

        async fn recv_byte(&mut self) -> io::Result<u8> {
            self.incoming
                .recv()
                .await
                .unwrap_or_else(|| Err(io::Error::new(io::ErrorKind::BrokenPipe, "serial reader stopped")))
        }
    }
}
