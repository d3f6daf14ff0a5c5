//! Command table
//!
//! The set of commands is closed: every command id has exactly one response
//! id, and `0xFF` carries failures that cannot be attributed to a handler's
//! own response.

use std::fmt;

use crate::error::ProtocolError;

/// Raw command and response identifiers
pub mod ids {
    pub const HELLO: u8 = 0x01;
    pub const STATUS: u8 = 0x10;
    pub const LIST_GROUPS: u8 = 0x11;
    pub const LIST_SONGS: u8 = 0x12;
    pub const START_SONG: u8 = 0x20;
    pub const SET_PAUSED: u8 = 0x21;
    pub const STOP: u8 = 0x22;

    pub const HELLO_RESPONSE: u8 = 0x81;
    pub const STATUS_RESPONSE: u8 = 0x90;
    pub const LIST_GROUPS_RESPONSE: u8 = 0x91;
    pub const LIST_SONGS_RESPONSE: u8 = 0x92;
    pub const START_SONG_RESPONSE: u8 = 0xA0;
    pub const SET_PAUSED_RESPONSE: u8 = 0xA1;
    pub const STOP_RESPONSE: u8 = 0xA2;

    /// Generic failure response
    pub const ERROR: u8 = 0xFF;
}

/// Response id used for unknown commands and handler faults
pub const ERROR_RESPONSE_ID: u8 = ids::ERROR;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Hello,
    Status,
    ListGroups,
    ListSongs,
    StartSong,
    SetPaused,
    Stop,
}

impl Command {
    /// Every command, in id order
    pub const ALL: [Command; 7] = [
        Command::Hello,
        Command::Status,
        Command::ListGroups,
        Command::ListSongs,
        Command::StartSong,
        Command::SetPaused,
        Command::Stop,
    ];

    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            ids::HELLO => Some(Command::Hello),
            ids::STATUS => Some(Command::Status),
            ids::LIST_GROUPS => Some(Command::ListGroups),
            ids::LIST_SONGS => Some(Command::ListSongs),
            ids::START_SONG => Some(Command::StartSong),
            ids::SET_PAUSED => Some(Command::SetPaused),
            ids::STOP => Some(Command::Stop),
            _ => None,
        }
    }

    /// Looks up the command whose response carries `id`
    pub fn from_response_id(id: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.response_id() == id)
    }

    pub fn id(self) -> u8 {
        match self {
            Command::Hello => ids::HELLO,
            Command::Status => ids::STATUS,
            Command::ListGroups => ids::LIST_GROUPS,
            Command::ListSongs => ids::LIST_SONGS,
            Command::StartSong => ids::START_SONG,
            Command::SetPaused => ids::SET_PAUSED,
            Command::Stop => ids::STOP,
        }
    }

    pub fn response_id(self) -> u8 {
        match self {
            Command::Hello => ids::HELLO_RESPONSE,
            Command::Status => ids::STATUS_RESPONSE,
            Command::ListGroups => ids::LIST_GROUPS_RESPONSE,
            Command::ListSongs => ids::LIST_SONGS_RESPONSE,
            Command::StartSong => ids::START_SONG_RESPONSE,
            Command::SetPaused => ids::SET_PAUSED_RESPONSE,
            Command::Stop => ids::STOP_RESPONSE,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Command::Hello => "hello",
            Command::Status => "status",
            Command::ListGroups => "list_groups",
            Command::ListSongs => "list_songs",
            Command::StartSong => "start_song",
            Command::SetPaused => "set_paused",
            Command::Stop => "stop",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:#04x})", self.name(), self.id())
    }
}

impl TryFrom<u8> for Command {
    type Error = ProtocolError;

    fn try_from(id: u8) -> Result<Self, Self::Error> {
        Self::from_id(id).ok_or(ProtocolError::UnknownCommand(id))
    }
}

/// Response id a waiter for `command_id` should register under
///
/// Ids outside the command table can only ever be answered on `0xFF`.
pub fn expected_response_id(command_id: u8) -> u8 {
    Command::from_id(command_id)
        .map(Command::response_id)
        .unwrap_or(ERROR_RESPONSE_ID)
}
