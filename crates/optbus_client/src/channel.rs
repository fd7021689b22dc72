//! A blocking socket speaking NUL-terminated frames.

use crate::error::{ClientError, ClientResult};
use optbus_protocol::{encode_frame, FrameDecoder};
use std::io::{ErrorKind, Read, Write};
use std::net::{Shutdown, TcpStream};

pub(crate) struct FramedStream {
    stream: TcpStream,
    decoder: FrameDecoder,
}

pub(crate) enum Received {
    Frame(String),
    TimedOut,
    Closed,
}

impl FramedStream {
    pub(crate) fn new(stream: TcpStream) -> Self {
        Self {
            stream,
            decoder: FrameDecoder::new(),
        }
    }

    pub(crate) fn send(&mut self, text: &str) -> ClientResult<()> {
        self.stream.write_all(&encode_frame(text))?;
        Ok(())
    }

    /// Reads until a whole frame arrived, the read timeout fired or the
    /// peer closed.
    pub(crate) fn recv(&mut self) -> ClientResult<Received> {
        let mut buf = [0u8; 4096];
        loop {
            if let Some(frame) = self.decoder.next_frame()? {
                return Ok(Received::Frame(frame));
            }
            match self.stream.read(&mut buf) {
                Ok(0) => return Ok(Received::Closed),
                Ok(n) => self.decoder.extend(&buf[..n]),
                Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                    return Ok(Received::TimedOut)
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Like [`recv`](Self::recv) but treats a timeout or close as an error.
    pub(crate) fn expect_frame(&mut self) -> ClientResult<String> {
        match self.recv()? {
            Received::Frame(frame) => Ok(frame),
            Received::TimedOut => Err(ClientError::Io(ErrorKind::TimedOut.into())),
            Received::Closed => Err(ClientError::Closed),
        }
    }

    pub(crate) fn try_clone_stream(&self) -> ClientResult<TcpStream> {
        Ok(self.stream.try_clone()?)
    }

    pub(crate) fn shutdown(&self) {
        let _ = self.stream.shutdown(Shutdown::Both);
    }
}
