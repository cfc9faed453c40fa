//! Moves bytes between a [Modem] and its serial port.

use core::{cmp::min, str::from_utf8, task::Poll};
use embassy_futures::yield_now;
use embassy_time::{Duration, Instant};
use embedded_io_async::{Read, ReadReady, Write};

use crate::buffer::RX_BUFFER_LEN;
use crate::modem::{Modem, Response};
use crate::{log, Error};

pub struct IoPump<IO> {
    io: IO,
}

impl<IO: Read + Write + ReadReady> IoPump<IO> {
    pub fn new(io: IO) -> Self {
        IoPump { io }
    }

    pub fn into_inner(self) -> IO {
        self.io
    }

    /// Write out what the modem queued, read what the serial port has, and poll the modem once.
    ///
    /// Never waits for the serial port to produce data. At most as many bytes are read as the
    /// receive buffer has room for.
    pub async fn pump(&mut self, modem: &mut Modem) -> Result<(), Error> {
        self.flush(modem).await?;

        let space = min(modem.rx_space(), RX_BUFFER_LEN);
        if space > 0 && self.io.read_ready().map_err(|_| Error::Serial)? {
            let mut buf = [0u8; RX_BUFFER_LEN];
            let n = self
                .io
                .read(&mut buf[..space])
                .await
                .map_err(|_| Error::Serial)?;

            match from_utf8(&buf[..n]) {
                Ok(text) => log::trace!("BYTES READ {:?}", text),
                Err(_) => log::trace!("READ INVALID {:?}", &buf[..n]),
            }
            if modem.receive(&buf[..n]) < n {
                log::error!("receive buffer overflow, {} bytes read", n);
                return Err(Error::BufferOverflow);
            }
        }

        modem.poll();
        self.flush(modem).await
    }

    /// Write everything the modem has queued.
    pub async fn flush(&mut self, modem: &mut Modem) -> Result<(), Error> {
        let pending = modem.pending_tx();
        if pending.is_empty() {
            return Ok(());
        }

        self.io
            .write_all(pending)
            .await
            .map_err(|_| Error::Serial)?;
        self.io.flush().await.map_err(|_| Error::Serial)?;

        let n = pending.len();
        modem.consume_tx(n);
        Ok(())
    }

    /// Pump until the ongoing command is done, or until `timeout` has passed.
    ///
    /// The command keeps running after a timeout. Use [Modem::abandon_command] to give up on it.
    pub async fn wait_ready(
        &mut self,
        modem: &mut Modem,
        timeout: Duration,
    ) -> Result<Response, Error> {
        let deadline = Instant::now() + timeout;
        loop {
            self.pump(modem).await?;

            if let Poll::Ready(result) = modem.ready() {
                return result.map_err(Error::from);
            }
            if Instant::now() >= deadline {
                log::warn!("timed out waiting for {:?}", modem.ongoing_command());
                return Err(Error::Timeout);
            }

            yield_now().await;
        }
    }
}
