//! A TCP client socket as an `embedded-io-async` stream.

use embassy_futures::yield_now;
use embassy_time::{Duration, Instant};
use embedded_io_async::{ErrorType, Read, ReadReady, Write};

use crate::modem::Modem;
use crate::pump::IoPump;
use crate::slot::SocketId;
use crate::{log, Error};

/// Drives one client socket of a [Modem] through an [IoPump].
///
/// Writes open a write session on the modem on demand. Reading, checking [ClientService::available]
/// and flushing end the session, which is when the modem actually sends the data.
pub struct ClientService<'a, IO> {
    modem: &'a mut Modem,
    pump: &'a mut IoPump<IO>,
    socket: Option<SocketId>,
    writing: bool,

    /// Timeout of read and write operations
    timeout: Duration,
}

impl<'a, IO: Read + Write + ReadReady> ClientService<'a, IO> {
    pub fn new(modem: &'a mut Modem, pump: &'a mut IoPump<IO>) -> Self {
        let timeout = modem.config().connect_timeout;
        ClientService {
            modem,
            pump,
            socket: None,
            writing: false,
            timeout,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Connect to `host`, closing the current connection first.
    ///
    /// Gives up after [crate::ModemConfig::connect_timeout]. The modem is not told, but the
    /// socket is released and the next command starts from a clean buffer.
    pub async fn connect(&mut self, host: &str, port: u16) -> Result<(), Error> {
        if self.socket.is_some() {
            self.stop().await?;
        }

        let id = self.modem.client().connect(host, port)?;
        let timeout = self.modem.config().connect_timeout;
        match self.pump.wait_ready(self.modem, timeout).await {
            Ok(_) => {
                log::info!("connected to {}:{}", host, port);
                self.socket = Some(id);
                Ok(())
            }
            Err(Error::Timeout) => {
                self.modem.abandon_command();
                Err(Error::Timeout)
            }
            Err(e) => Err(e),
        }
    }

    pub fn connected(&mut self) -> bool {
        match self.socket {
            Some(id) => self.modem.client().status(id),
            None => false,
        }
    }

    pub fn socket(&self) -> Option<SocketId> {
        self.socket
    }

    /// Bytes that can be read without waiting.
    pub async fn available(&mut self) -> Result<usize, Error> {
        let id = self.socket.ok_or(Error::NotConnected)?;
        self.end_write().await?;
        self.pump.pump(self.modem).await?;
        Ok(self.modem.client().available(id))
    }

    /// Close the connection, if there is one.
    pub async fn stop(&mut self) -> Result<(), Error> {
        if let Err(e) = self.end_write().await {
            log::warn!("failed to send the last write: {:?}", e);
        }
        let Some(id) = self.socket.take() else {
            return Ok(());
        };

        self.modem.client().stop(id)?;
        self.pump.wait_ready(self.modem, self.timeout).await?;
        Ok(())
    }

    async fn begin_write(&mut self, id: SocketId) -> Result<(), Error> {
        if self.writing {
            return Ok(());
        }

        self.modem.client().begin_write(id)?;
        self.pump.wait_ready(self.modem, self.timeout).await?;
        self.writing = true;
        Ok(())
    }

    async fn end_write(&mut self) -> Result<(), Error> {
        let Some(id) = self.socket.filter(|_| self.writing) else {
            return Ok(());
        };
        self.writing = false;

        self.modem.client().end_write(id)?;
        self.pump.wait_ready(self.modem, self.timeout).await?;
        Ok(())
    }
}

impl<IO> ErrorType for ClientService<'_, IO> {
    type Error = Error;
}

impl<IO: Read + Write + ReadReady> Read for ClientService<'_, IO> {
    /// Returns `Ok(0)` once the remote end has closed the connection and everything it sent has
    /// been read.
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        let id = self.socket.ok_or(Error::NotConnected)?;
        self.end_write().await?;

        let deadline = Instant::now() + self.timeout;
        loop {
            self.pump.pump(self.modem).await?;

            let n = self.modem.client().read(id, buf);
            if n > 0 || buf.is_empty() {
                return Ok(n);
            }
            if !self.modem.client().status(id) {
                log::debug!("socket {} closed", id.ordinal());
                return Ok(0);
            }
            if Instant::now() >= deadline {
                return Err(Error::Timeout);
            }

            yield_now().await;
        }
    }
}

impl<IO: Read + Write + ReadReady> Write for ClientService<'_, IO> {
    async fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        let id = self.socket.ok_or(Error::NotConnected)?;
        if buf.is_empty() {
            return Ok(0);
        }
        self.begin_write(id).await?;

        loop {
            let n = self.modem.client().write(buf);
            if n > 0 {
                return Ok(n);
            }

            // the transmit queue is full
            self.pump.flush(self.modem).await?;
        }
    }

    async fn flush(&mut self) -> Result<(), Self::Error> {
        self.end_write().await?;
        self.pump.flush(self.modem).await
    }
}
