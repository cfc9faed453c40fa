use core::convert::Infallible;
use std::collections::VecDeque;

use embedded_io_async::{ErrorType, Read, ReadReady, Write};

/// A serial port that plays back a script of reads and checks every write against it.
pub struct MockSerial {
    operations: VecDeque<SerialOperation>,
}

enum SerialOperation {
    Read(Vec<u8>),
    Write(Vec<u8>),
}

pub struct MockSerialBuilder {
    mock: MockSerial,
}

impl MockSerialBuilder {
    pub fn expect_read(mut self, bytes: &[u8]) -> MockSerialBuilder {
        self.mock
            .operations
            .push_back(SerialOperation::Read(Vec::from(bytes)));
        self
    }

    pub fn expect_write(mut self, bytes: &[u8]) -> MockSerialBuilder {
        self.mock
            .operations
            .push_back(SerialOperation::Write(Vec::from(bytes)));
        self
    }

    pub fn finalize(self) -> MockSerial {
        self.mock
    }
}

impl MockSerial {
    pub fn build() -> MockSerialBuilder {
        MockSerialBuilder {
            mock: MockSerial {
                operations: VecDeque::new(),
            },
        }
    }

    pub fn assert_done(&self) {
        assert!(
            self.operations.is_empty(),
            "{} operations left",
            self.operations.len()
        );
    }
}

impl ErrorType for MockSerial {
    type Error = Infallible;
}

impl ReadReady for MockSerial {
    fn read_ready(&mut self) -> Result<bool, Self::Error> {
        Ok(matches!(
            self.operations.front(),
            Some(SerialOperation::Read(_))
        ))
    }
}

impl Read for MockSerial {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        match self.operations.front_mut() {
            Some(SerialOperation::Read(bytes)) => {
                let n = buf.len().min(bytes.len());
                buf[..n].copy_from_slice(&bytes[..n]);
                bytes.drain(..n);

                if bytes.is_empty() {
                    self.operations.pop_front();
                }

                Ok(n)
            }
            Some(SerialOperation::Write(bytes)) => panic!(
                "Expected Write of {:?}, read called instead",
                String::from_utf8_lossy(bytes)
            ),
            None => panic!("Expected no more operations, read called instead"),
        }
    }
}

impl Write for MockSerial {
    async fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        let mut rest = buf;
        while !rest.is_empty() {
            match self.operations.front_mut() {
                Some(SerialOperation::Read(bytes)) => panic!(
                    "Expected Read of {:?}, write called instead with {:?}",
                    String::from_utf8_lossy(bytes),
                    String::from_utf8_lossy(rest)
                ),
                Some(SerialOperation::Write(bytes)) => {
                    let n = bytes.len().min(rest.len());
                    assert_eq!(
                        String::from_utf8_lossy(&rest[..n]),
                        String::from_utf8_lossy(&bytes[..n])
                    );
                    bytes.drain(..n);
                    rest = &rest[n..];

                    if bytes.is_empty() {
                        self.operations.pop_front();
                    }
                }
                None => panic!(
                    "Expected no more operations, write called instead with {:?}",
                    String::from_utf8_lossy(rest)
                ),
            }
        }

        Ok(buf.len())
    }

    async fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}
