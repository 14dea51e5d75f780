use common::constants::LENGTH_FIELD_WIDTH;
use std::io::{self, ErrorKind, Read};

#[derive(Debug, thiserror::Error)]
pub enum FramingError {
    #[error("connection closed")]
    ConnectionClosed,
    #[error("declared frame length {0} exceeds the limit of {1} bytes")]
    TooLarge(usize, usize),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

#[inline]
pub fn parse_length_field(buffer: &[u8]) -> usize {
    let mut field = [0u8; LENGTH_FIELD_WIDTH];
    field.copy_from_slice(&buffer[.. LENGTH_FIELD_WIDTH]);
    u32::from_be_bytes(field) as usize
}

/// Reads one length-prefixed frame and returns its body without the length field.
///
/// Short reads are retried until the declared length has arrived. A stream which ends before
/// that, including before or in the middle of the length field, yields
/// [`FramingError::ConnectionClosed`].
pub fn read_framed<R: Read>(reader: &mut R, max_len: usize) -> Result<Vec<u8>, FramingError> {
    let mut length_field = [0u8; LENGTH_FIELD_WIDTH];
    read_exact_or_closed(reader, &mut length_field)?;

    let length = parse_length_field(&length_field);
    if length > max_len {
        return Err(FramingError::TooLarge(length, max_len));
    }

    let mut body = vec![0u8; length];
    read_exact_or_closed(reader, &mut body)?;
    Ok(body)
}

#[inline]
fn read_exact_or_closed<R: Read>(reader: &mut R, buffer: &mut [u8]) -> Result<(), FramingError> {
    match reader.read_exact(buffer) {
        Ok(()) => Ok(()),
        Err(error) if error.kind() == ErrorKind::UnexpectedEof => Err(FramingError::ConnectionClosed),
        Err(error) => Err(error.into()),
    }
}
