use matchbox_socket::RtcIceServerConfig;
use serde::{Deserialize, Serialize};

/// STUN/TURN server used to establish WebRTC links
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceServer {
    pub urls: Vec<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub credential: Option<String>,
}

impl IceServer {
    pub fn stun(url: impl Into<String>) -> Self {
        Self {
            urls: vec![url.into()],
            username: None,
            credential: None,
        }
    }

    pub fn turn(
        url: impl Into<String>,
        username: impl Into<String>,
        credential: impl Into<String>,
    ) -> Self {
        Self {
            urls: vec![url.into()],
            username: Some(username.into()),
            credential: Some(credential.into()),
        }
    }

    pub fn is_turn(&self) -> bool {
        self.username.is_some()
    }

    pub fn default_stun_servers() -> Vec<Self> {
        vec![
            Self::stun("stun:stun.l.google.com:19302"),
            Self::stun("stun:stun1.l.google.com:19302"),
        ]
    }

    /// Collapse a server list into matchbox's single ICE configuration
    ///
    /// Credentials come from the first TURN entry; all URLs are kept.
    pub fn to_rtc_config(servers: &[IceServer]) -> RtcIceServerConfig {
        if servers.is_empty() {
            return RtcIceServerConfig::default();
        }

        let urls = servers.iter().flat_map(|s| s.urls.iter().cloned()).collect();
        let auth = servers.iter().find(|s| s.is_turn());

        RtcIceServerConfig {
            urls,
            username: auth.and_then(|s| s.username.clone()),
            credential: auth.and_then(|s| s.credential.clone()),
        }
    }
}
