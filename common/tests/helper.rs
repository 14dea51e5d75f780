use common::messages::MessageComponent;
use std::io::Cursor;

pub fn test_write<T: MessageComponent>(message: &T, bytes: &[u8]) {
    let mut cursor = Cursor::new(Vec::<u8>::new());
    message.write(&mut cursor).unwrap();
    let inner = cursor.into_inner();
    assert_eq!(inner, bytes, "write failed");

    let data = message.to_bytes(false).unwrap();
    assert_eq!(data, bytes, "to_bytes failed");

    let data = message.to_bytes(true).unwrap();
    let length = u32::from_be_bytes(data[0 .. 4].try_into().unwrap());
    assert_eq!(bytes.len(), length as usize, "to_bytes length failed");
    assert_eq!(&data[4 ..], bytes, "to_bytes failed");
}
