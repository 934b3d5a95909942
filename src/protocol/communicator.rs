//! Message framing over an async byte stream.
//!
//! Every message in either direction is one frame:
//!
//! ```text
//! <varint payload length><UTF-8 payload><'\n'>
//! ```
//!
//! The length counts payload bytes only. The terminator must sit exactly
//! where the length says the payload ends, otherwise the frame is rejected.

use bytes::{BufMut, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::varint::{read_varint, varint_size, write_varint};
use super::MAX_MESSAGE_LEN;
use crate::error::CommunicatorError;

const TERMINATOR: u8 = b'\n';

/// Reads and writes discrete multistream messages on a duplex stream.
///
/// Holds no buffered data between calls: after any read or write the
/// stream is positioned on a frame boundary, so it can be handed to the
/// negotiated protocol with [`Communicator::into_inner`].
#[derive(Debug)]
pub struct Communicator<S> {
    stream: S,
    max_message_len: usize,
}

impl<S> Communicator<S> {
    /// Wrap a stream with the default message size limit.
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            max_message_len: MAX_MESSAGE_LEN,
        }
    }

    /// Set the largest payload accepted or sent, in bytes.
    pub fn with_max_message_len(mut self, max_message_len: usize) -> Self {
        self.max_message_len = max_message_len;
        self
    }

    /// Largest payload accepted or sent, in bytes.
    pub fn max_message_len(&self) -> usize {
        self.max_message_len
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &S {
        &self.stream
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut S {
        &mut self.stream
    }

    /// Give the stream back, e.g. to the selected protocol's handler.
    pub fn into_inner(self) -> S {
        self.stream
    }
}

impl<S> Communicator<S>
where
    S: AsyncWrite + Unpin,
{
    /// Frame `text`, write it in full and flush.
    ///
    /// Returns the number of bytes written, prefix and terminator included.
    pub async fn write_message(&mut self, text: &str) -> Result<usize, CommunicatorError> {
        let payload = text.as_bytes();
        if payload.len() > self.max_message_len {
            return Err(CommunicatorError::MessageTooLarge {
                len: payload.len() as u64,
                max: self.max_message_len,
            });
        }

        let len = payload.len() as u64;
        let mut frame = BytesMut::with_capacity(varint_size(len) + payload.len() + 1);
        write_varint(&mut frame, len);
        frame.put_slice(payload);
        frame.put_u8(TERMINATOR);

        self.stream.write_all(&frame).await?;
        self.stream.flush().await?;

        tracing::trace!(payload = text, bytes = frame.len(), "sent multistream message");
        Ok(frame.len())
    }
}

impl<S> Communicator<S>
where
    S: AsyncRead + Unpin,
{
    /// Read exactly one frame and return its payload without the terminator.
    pub async fn read_message(&mut self) -> Result<String, CommunicatorError> {
        let declared = read_varint(&mut self.stream).await?;
        if declared > self.max_message_len as u64 {
            return Err(CommunicatorError::MessageTooLarge {
                len: declared,
                max: self.max_message_len,
            });
        }

        let len = declared as usize;
        let mut buf = vec![0u8; len + 1];
        self.stream.read_exact(&mut buf).await?;

        if buf[len] != TERMINATOR {
            return Err(CommunicatorError::Framing(format!(
                "frame of declared length {len} is not newline-terminated"
            )));
        }
        buf.truncate(len);

        let text = String::from_utf8(buf)
            .map_err(|e| CommunicatorError::Framing(format!("payload is not UTF-8: {e}")))?;

        tracing::trace!(payload = %text, "received multistream message");
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tokio::io::duplex;

    #[tokio::test]
    async fn test_write_message_frame_layout() {
        let mut comm = Communicator::new(Vec::new());

        let written = comm.write_message("/echo/1.0.0").await.unwrap();

        let bytes = comm.into_inner();
        assert_eq!(written, bytes.len());
        assert_eq!(bytes[0], 11);
        assert_eq!(&bytes[1..12], b"/echo/1.0.0");
        assert_eq!(bytes[12], b'\n');
    }

    #[tokio::test]
    async fn test_messages_stay_in_order() {
        let (a, b) = duplex(1024);
        let mut writer = Communicator::new(a);
        let mut reader = Communicator::new(b);

        writer.write_message("/multistream/1.0.0").await.unwrap();
        writer.write_message("ls").await.unwrap();
        writer.write_message("").await.unwrap();

        assert_eq!(reader.read_message().await.unwrap(), "/multistream/1.0.0");
        assert_eq!(reader.read_message().await.unwrap(), "ls");
        assert_eq!(reader.read_message().await.unwrap(), "");
    }

    #[tokio::test]
    async fn test_multi_byte_length_prefix() {
        let (a, b) = duplex(4096);
        let mut writer = Communicator::new(a);
        let mut reader = Communicator::new(b);

        let long = "/".repeat(300);
        let written = writer.write_message(&long).await.unwrap();
        assert_eq!(written, 2 + 300 + 1);
        assert_eq!(reader.read_message().await.unwrap(), long);
    }

    #[tokio::test]
    async fn test_missing_terminator_rejected() {
        let data: &[u8] = b"\x02nax";
        let mut comm = Communicator::new(data);

        let err = comm.read_message().await.unwrap_err();
        assert!(matches!(err, CommunicatorError::Framing(_)));
    }

    #[tokio::test]
    async fn test_length_mismatch_rejected() {
        // Declares 3 bytes but the terminator follows after 2
        let data: &[u8] = b"\x03na\nx";
        let mut comm = Communicator::new(data);

        let err = comm.read_message().await.unwrap_err();
        assert!(matches!(err, CommunicatorError::Framing(_)));
    }

    #[tokio::test]
    async fn test_invalid_utf8_rejected() {
        let data: &[u8] = b"\x02\xff\xfe\n";
        let mut comm = Communicator::new(data);

        let err = comm.read_message().await.unwrap_err();
        assert!(matches!(err, CommunicatorError::Framing(_)));
    }

    #[tokio::test]
    async fn test_short_read_is_io_error() {
        let data: &[u8] = b"\x0b/echo";
        let mut comm = Communicator::new(data);

        let err = comm.read_message().await.unwrap_err();
        assert!(err.is_disconnect());
    }

    #[tokio::test]
    async fn test_oversized_frame_rejected_before_payload() {
        let data: &[u8] = b"\x80\x02";
        let mut comm = Communicator::new(data).with_max_message_len(64);

        let err = comm.read_message().await.unwrap_err();
        assert!(matches!(
            err,
            CommunicatorError::MessageTooLarge { len: 256, max: 64 }
        ));
    }

    #[tokio::test]
    async fn test_oversized_write_writes_nothing() {
        let mut comm = Communicator::new(Vec::new()).with_max_message_len(4);

        let err = comm.write_message("/too/long").await.unwrap_err();
        assert!(matches!(err, CommunicatorError::MessageTooLarge { .. }));
        assert!(comm.into_inner().is_empty());
    }

    #[derive(Clone, Default)]
    struct CapturedLogs(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for CapturedLogs {
        type Writer = CapturedLogs;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    #[tokio::test]
    async fn test_trace_keeps_event_message() {
        let logs = CapturedLogs::default();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::TRACE)
            .with_ansi(false)
            .with_writer(logs.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let (a, b) = duplex(64);
        let mut writer = Communicator::new(a);
        let mut reader = Communicator::new(b);
        writer.write_message("/echo/1.0.0").await.unwrap();
        reader.read_message().await.unwrap();

        let output = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("sent multistream message"));
        assert!(output.contains("received multistream message"));
        assert!(output.contains("payload="));
    }

    #[tokio::test]
    async fn test_write_to_closed_peer_fails() {
        let (a, b) = duplex(64);
        drop(b);
        let mut comm = Communicator::new(a);

        let err = comm.write_message("/echo/1.0.0").await.unwrap_err();
        assert!(matches!(err, CommunicatorError::Io(_)));
    }

    proptest! {
        #[test]
        fn prop_garbage_never_panics(data in proptest::collection::vec(any::<u8>(), 0..64)) {
            let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
            let mut comm = Communicator::new(&data[..]);
            let result = rt.block_on(comm.read_message());

            if let Ok(text) = result {
                // Anything accepted must have been a well-formed frame
                prop_assert!(data.len() > text.len());
                prop_assert_eq!(data[text.len() + 1..].first(), Some(&b'\n'));
            }
        }
    }
}
