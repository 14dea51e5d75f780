use super::{Error, MessageComponent};
use byteorder::{ReadBytesExt, WriteBytesExt};
use std::{
    fmt::{self, Display, Formatter},
    io::Cursor,
};

/// Defines a closed one-byte vocabulary. Bytes outside of it decode to `Unknown` so that a newer
/// peer can't take the session down by sending a code we don't know about yet.
macro_rules! byte_vocabulary {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $($variant:ident = $value:literal,)*
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
        pub enum $name {
            $($variant,)*
            Unknown(u8),
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$(Self::$variant,)*];

            pub const fn from_byte(byte: u8) -> Self {
                match byte {
                    $($value => Self::$variant,)*
                    other => Self::Unknown(other),
                }
            }

            pub const fn to_byte(self) -> u8 {
                match self {
                    $(Self::$variant => $value,)*
                    Self::Unknown(other) => other,
                }
            }

            pub const fn is_known(self) -> bool {
                !matches!(self, Self::Unknown(_))
            }
        }

        impl From<u8> for $name {
            fn from(byte: u8) -> Self {
                Self::from_byte(byte)
            }
        }

        impl From<$name> for u8 {
            fn from(code: $name) -> Self {
                code.to_byte()
            }
        }

        impl MessageComponent for $name {
            fn read(cursor: &mut Cursor<&[u8]>) -> Result<Self, Error> {
                Ok(Self::from_byte(cursor.read_u8()?))
            }

            fn write(&self, cursor: &mut Cursor<Vec<u8>>) -> Result<(), Error> {
                cursor.write_u8(self.to_byte()).map_err(Into::into)
            }
        }
    };
}

const TARGET_MASK: u8 = 0x0f;
const ACTION_MASK: u8 = 0xf0;

const CAMERA_TAG: u8 = 0x01;
const DISPLAY_TAG: u8 = 0x02;

const ACTION_PRIMARY: u8 = 0x10;
const ACTION_SECONDARY: u8 = 0x20;

byte_vocabulary! {
    /// What a message asks for. The low nibble of an action code names the role it targets, the
    /// high nibble names the action.
    pub enum RequestCode {
        None = 0x00,
        Camera = 0x01,
        Display = 0x02,
        CameraTakePicture = 0x11,
        CameraToggleTorch = 0x21,
        DisplayTakePicture = 0x12,
        DisplayShowPicture = 0x22,
        Quit = 0xf0,
    }
}

byte_vocabulary! {
    pub enum ResponseCode {
        None = 0,
        Ok = 1,
        Error = 2,
        Ack = 3,
        Reject = 4,
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Role {
    Camera,
    Display,
}

impl Role {
    pub const ALL: [Role; 2] = [Role::Camera, Role::Display];

    /// The code a peer sends to claim this role.
    pub const fn claim_code(self) -> RequestCode {
        match self {
            Self::Camera => RequestCode::Camera,
            Self::Display => RequestCode::Display,
        }
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Camera => f.write_str("camera"),
            Self::Display => f.write_str("display"),
        }
    }
}

impl RequestCode {
    fn is_action(self) -> bool {
        self.is_known() && matches!(self.to_byte() & ACTION_MASK, ACTION_PRIMARY | ACTION_SECONDARY)
    }

    pub fn is_for_camera(self) -> bool {
        self.is_action() && self.to_byte() & TARGET_MASK == CAMERA_TAG
    }

    pub fn is_for_display(self) -> bool {
        self.is_action() && self.to_byte() & TARGET_MASK == DISPLAY_TAG
    }

    /// The role an action code must be sent to. Role claims, `Quit`, `None` and unknown codes
    /// target no particular role.
    pub fn target(self) -> Option<Role> {
        if self.is_for_camera() {
            Some(Role::Camera)
        } else if self.is_for_display() {
            Some(Role::Display)
        } else {
            None
        }
    }

    /// The role this code claims when it is the first message on a new connection.
    pub fn claimed_role(self) -> Option<Role> {
        match self {
            Self::Camera => Some(Role::Camera),
            Self::Display => Some(Role::Display),
            _ => None,
        }
    }
}
