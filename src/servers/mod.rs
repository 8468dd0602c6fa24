mod client;

pub use client::{poll, ClientOptions, Crumb, StatusClient};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Endpoint, relative to the console base URL, serving the status document.
pub const STATUS_ENDPOINT: &str = "serverStatuses";
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 30;
pub const DEFAULT_SETTLE_DELAY_MS: u64 = 1000;
pub const ICON_SIZE: u32 = 24;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to build HTTP client: {source}")]
    HttpClientBuild {
        #[source]
        source: reqwest::Error,
    },

    #[error("invalid crumb field name: {name}")]
    InvalidCrumb { name: String },

    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("request to {url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("invalid server status document from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("no server named {name}")]
    UnknownServer { name: String },

    #[error("server {name} is {status}, its connection can't be toggled")]
    NotToggleable { name: String, status: String },
}

/// Connection state as reported by the console.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ConnectionState {
    Up,
    Down,
    Unknown(String),
}

impl From<String> for ConnectionState {
    fn from(value: String) -> Self {
        match value.as_str() {
            "up" => Self::Up,
            "down" => Self::Down,
            _ => Self::Unknown(value),
        }
    }
}

impl From<ConnectionState> for String {
    fn from(value: ConnectionState) -> Self {
        value.as_str().to_string()
    }
}

impl ConnectionState {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
            Self::Unknown(other) => other,
        }
    }
}

impl Default for ConnectionState {
    fn default() -> Self {
        Self::Unknown(String::new())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerStatus {
    pub name: String,
    pub front_end_url: String,
    pub server_url: String,
    pub version: String,
    pub status: ConnectionState,
    pub has_errors: bool,
    pub has_warnings: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerStatusDocument {
    #[serde(default)]
    pub servers: Vec<ServerStatus>,
}

impl ServerStatusDocument {
    pub fn parse(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    pub fn find(&self, name: &str) -> Option<&ServerStatus> {
        self.servers.iter().find(|s| s.name == name)
    }
}

/// Image shown on a row button. System icons come from the host's image
/// root, the others from the console's own images.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Icon {
    pub file: &'static str,
    pub system: bool,
}

impl Icon {
    const fn system(file: &'static str) -> Self {
        Self { file, system: true }
    }

    const fn console(file: &'static str) -> Self {
        Self {
            file,
            system: false,
        }
    }

    pub fn url(&self, images_url: &str, console_url: &str) -> String {
        let rect = format!("{ICON_SIZE}x{ICON_SIZE}");
        if self.system {
            format!("{}/{rect}/{}", images_url.trim_end_matches('/'), self.file)
        } else {
            format!(
                "{}/images/{rect}/{}",
                console_url.trim_end_matches('/'),
                self.file
            )
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionAction {
    Sleep,
    Wakeup,
}

impl ConnectionAction {
    pub fn for_state(state: &ConnectionState) -> Option<Self> {
        match state {
            ConnectionState::Up => Some(Self::Sleep),
            ConnectionState::Down => Some(Self::Wakeup),
            ConnectionState::Unknown(_) => None,
        }
    }

    pub fn path(self) -> &'static str {
        match self {
            Self::Sleep => "sleep",
            Self::Wakeup => "wakeup",
        }
    }

    /// Icon shown while the request is in flight.
    pub fn busy_icon(self) -> Icon {
        match self {
            Self::Sleep => Icon::system("blue_anime.gif"),
            Self::Wakeup => Icon::system("red_anime.gif"),
        }
    }

    pub fn target(self, server_url: &str) -> String {
        format!("{}/{}", server_url.trim_end_matches('/'), self.path())
    }
}

/// What a row of the server table shows.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ServerRow {
    pub name: String,
    pub link: Option<String>,
    pub version: String,
    pub status: String,
    pub control_icon: Icon,
    pub control_enabled: bool,
    pub has_errors: bool,
    pub has_warnings: bool,
    pub edit_icon: Icon,
    pub edit_url: String,
    pub remove_icon: Icon,
    pub remove_url: String,
}

impl ServerRow {
    pub fn from_status(server: &ServerStatus) -> Self {
        let (control_icon, control_enabled) = match server.status {
            ConnectionState::Up => (Icon::system("blue.png"), true),
            ConnectionState::Down => (Icon::system("red.png"), true),
            ConnectionState::Unknown(_) => (Icon::system("grey.png"), false),
        };
        let edit_icon = if server.has_errors {
            Icon::console("gear-error.png")
        } else if server.has_warnings {
            Icon::console("gear-warning.png")
        } else {
            Icon::system("gear.png")
        };
        let link = if server.front_end_url.is_empty() {
            None
        } else {
            Some(server.front_end_url.clone())
        };
        let server_url = server.server_url.trim_end_matches('/');
        Self {
            name: server.name.clone(),
            link,
            version: server.version.clone(),
            status: server.status.as_str().to_string(),
            control_icon,
            control_enabled,
            has_errors: server.has_errors,
            has_warnings: server.has_warnings,
            edit_icon,
            edit_url: server_url.to_string(),
            remove_icon: Icon::system("edit-delete.png"),
            remove_url: format!("{server_url}/remove"),
        }
    }
}

pub fn rows(doc: &ServerStatusDocument) -> Vec<ServerRow> {
    doc.servers.iter().map(ServerRow::from_status).collect()
}
