//! Typed command requests
//!
//! Payload layouts:
//!
//! | command | payload |
//! |---|---|
//! | hello, status, stop | empty |
//! | list groups | optional `u16be max_count`, optional nt `filter` |
//! | list songs | `u16be max_count`, nt `group` |
//! | start song | nt `song_dir`, nt `difficulty` |
//! | pause/resume | optional `u8` (nonzero pauses) |
//!
//! Bytes past the last field are ignored.

use bytes::Bytes;

use crate::commands::Command;
use crate::error::{FrameError, PayloadError};
use crate::packet::Packet;
use crate::payload::{PayloadReader, PayloadWriter};

/// Upper bound applied to list requests
pub const MAX_LIST_COUNT: u16 = 500;

/// Paging and filtering for the list commands
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    /// Requested cap as sent; see [`ListQuery::limit`]
    pub max_count: u16,

    /// Empty means no filter
    pub filter: String,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            max_count: MAX_LIST_COUNT,
            filter: String::new(),
        }
    }
}

impl ListQuery {
    pub fn new(max_count: u16, filter: impl Into<String>) -> Self {
        Self {
            max_count,
            filter: filter.into(),
        }
    }

    /// Number of entries actually allowed, clamped to `1..=500`
    pub fn limit(&self) -> usize {
        self.max_count.clamp(1, MAX_LIST_COUNT) as usize
    }

    /// The filter, if one was given
    pub fn filter(&self) -> Option<&str> {
        if self.filter.is_empty() {
            None
        } else {
            Some(&self.filter)
        }
    }

    fn encode(&self) -> Bytes {
        PayloadWriter::new()
            .u16_be(self.max_count)
            .nt_string(&self.filter)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartSong {
    /// Song directory exactly as reported by the song list
    pub song_dir: String,

    /// Difficulty name, e.g. `Difficulty_Easy`
    pub difficulty: String,
}

impl StartSong {
    pub fn new(song_dir: impl Into<String>, difficulty: impl Into<String>) -> Self {
        Self {
            song_dir: song_dir.into(),
            difficulty: difficulty.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetPaused {
    pub paused: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Hello,
    Status,
    ListGroups(ListQuery),
    ListSongs(ListQuery),
    StartSong(StartSong),
    SetPaused(SetPaused),
    Stop,
}

impl Request {
    /// Parses the payload of `command`
    pub fn parse(command: Command, payload: &[u8]) -> Result<Self, PayloadError> {
        let mut reader = PayloadReader::new(payload);

        let request = match command {
            Command::Hello => Request::Hello,
            Command::Status => Request::Status,
            Command::Stop => Request::Stop,

            Command::ListGroups => {
                if reader.is_empty() {
                    Request::ListGroups(ListQuery::default())
                } else {
                    let max_count = reader.read_u16_be()?;
                    let filter = if reader.is_empty() {
                        String::new()
                    } else {
                        reader.read_nt_string()?
                    };
                    Request::ListGroups(ListQuery { max_count, filter })
                }
            }

            Command::ListSongs => {
                let max_count = reader.read_u16_be()?;
                let filter = reader.read_nt_string()?;
                Request::ListSongs(ListQuery { max_count, filter })
            }

            Command::StartSong => {
                let song_dir = reader.read_nt_string()?;
                let difficulty = reader.read_nt_string()?;
                Request::StartSong(StartSong {
                    song_dir,
                    difficulty,
                })
            }

            Command::SetPaused => {
                let paused = reader.read_optional_u8().is_some_and(|b| b != 0);
                Request::SetPaused(SetPaused { paused })
            }
        };

        Ok(request)
    }

    pub fn command(&self) -> Command {
        match self {
            Request::Hello => Command::Hello,
            Request::Status => Command::Status,
            Request::ListGroups(_) => Command::ListGroups,
            Request::ListSongs(_) => Command::ListSongs,
            Request::StartSong(_) => Command::StartSong,
            Request::SetPaused(_) => Command::SetPaused,
            Request::Stop => Command::Stop,
        }
    }

    pub fn encode_payload(&self) -> Bytes {
        match self {
            Request::Hello | Request::Status | Request::Stop => Bytes::new(),
            Request::ListGroups(query) | Request::ListSongs(query) => query.encode(),
            Request::StartSong(start) => PayloadWriter::new()
                .nt_string(&start.song_dir)
                .nt_string(&start.difficulty)
                .finish(),
            Request::SetPaused(SetPaused { paused }) => {
                PayloadWriter::new().u8(u8::from(*paused)).finish()
            }
        }
    }

    pub fn to_packet(&self) -> Result<Packet, FrameError> {
        Packet::new(self.command().id(), self.encode_payload())
    }
}
