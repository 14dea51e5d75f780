use crate::constants::LENGTH_FIELD_WIDTH;
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::{
    convert::Infallible,
    io::{self, Cursor, Read, Write},
    num::TryFromIntError,
};

pub trait MessageComponent: Sized {
    fn read(cursor: &mut Cursor<&[u8]>) -> Result<Self, Error>;

    fn write(&self, cursor: &mut Cursor<Vec<u8>>) -> Result<(), Error>;

    /// Serializes this component. When `length_prefixed` is set, the output starts with a
    /// big-endian `u32` holding the length of everything after it.
    fn to_bytes(&self, length_prefixed: bool) -> Result<Vec<u8>, Error> {
        let mut cursor = Cursor::new(Vec::new());
        if length_prefixed {
            cursor.write_u32::<BigEndian>(0)?;
        }

        self.write(&mut cursor)?;
        let mut data = cursor.into_inner();

        if length_prefixed {
            let length = u32::try_from(data.len() - LENGTH_FIELD_WIDTH)?;
            data[.. LENGTH_FIELD_WIDTH].copy_from_slice(&length.to_be_bytes());
        }

        Ok(data)
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        Self::read(&mut Cursor::new(bytes))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("io error: {0}")]
    StdIo(#[from] io::Error),
    #[error("malformed message: got {len} bytes, need at least 3")]
    MalformedMessage { len: usize },
    #[error("message too long for the length field")]
    LengthTooLong(#[from] TryFromIntError),
}

impl From<Infallible> for Error {
    fn from(_: Infallible) -> Self {
        unreachable!()
    }
}

impl MessageComponent for u8 {
    fn read(cursor: &mut Cursor<&[u8]>) -> Result<Self, Error> {
        cursor.read_u8().map_err(Into::into)
    }

    fn write(&self, cursor: &mut Cursor<Vec<u8>>) -> Result<(), Error> {
        cursor.write_u8(*self).map_err(Into::into)
    }
}

/// Consumes everything left in the cursor.
impl MessageComponent for Vec<u8> {
    fn read(cursor: &mut Cursor<&[u8]>) -> Result<Self, Error> {
        let mut rest = Vec::new();
        cursor.read_to_end(&mut rest)?;
        Ok(rest)
    }

    fn write(&self, cursor: &mut Cursor<Vec<u8>>) -> Result<(), Error> {
        cursor.write_all(self).map_err(Into::into)
    }
}
