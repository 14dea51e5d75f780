use controller::{RequestCode, Role};
use crossbeam_channel::{unbounded, Receiver};
use log::{debug, warn};
use std::{
    io::{stdin, BufRead},
    path::PathBuf,
    str::FromStr,
    thread,
};

/// One line typed by the operator.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Command {
    Capture(Role),
    ToggleTorch,
    Show(PathBuf),
    Quit,
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("empty command")]
    Empty,
    #[error("unknown command {0:?}, expected capture, torch, show or quit")]
    Unknown(String),
    #[error("usage: capture <camera|display>")]
    CaptureUsage,
    #[error("usage: show <path>")]
    ShowUsage,
}

impl FromStr for Command {
    type Err = ParseError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };

        match word {
            "" => Err(ParseError::Empty),
            "capture" => match rest {
                "camera" => Ok(Self::Capture(Role::Camera)),
                "display" => Ok(Self::Capture(Role::Display)),
                _ => Err(ParseError::CaptureUsage),
            },
            "torch" => Ok(Self::ToggleTorch),
            // Paths may contain spaces
            "show" if !rest.is_empty() => Ok(Self::Show(PathBuf::from(rest))),
            "show" => Err(ParseError::ShowUsage),
            "quit" => Ok(Self::Quit),
            other => Err(ParseError::Unknown(other.to_owned())),
        }
    }
}

impl Command {
    /// The request this command sends, `None` for commands handled locally.
    pub fn request(&self) -> Option<RequestCode> {
        match self {
            Self::Capture(Role::Camera) => Some(RequestCode::CameraTakePicture),
            Self::Capture(Role::Display) => Some(RequestCode::DisplayTakePicture),
            Self::ToggleTorch => Some(RequestCode::CameraToggleTorch),
            Self::Show(_) => Some(RequestCode::DisplayShowPicture),
            Self::Quit => None,
        }
    }
}

/// Reads commands from stdin on a background thread. The receiver disconnects when stdin closes.
pub fn spawn_reader() -> Receiver<Command> {
    let (tx, rx) = unbounded();

    thread::spawn(move || {
        for line in stdin().lock().lines() {
            let line = match line {
                Ok(line) => line,
                Err(error) => {
                    warn!("Failed to read from stdin: {}", error);
                    break;
                }
            };

            match line.parse::<Command>() {
                Ok(command) =>
                    if tx.send(command).is_err() {
                        break;
                    },
                Err(ParseError::Empty) => {}
                Err(error) => warn!("{}", error),
            }
        }

        debug!("Console reader finished");
    });

    rx
}
