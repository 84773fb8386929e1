// SPDX-License-Identifier: MIT OR Apache-2.0

//! Security scheme declarations, as advertised by a provider descriptor.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiKeyPlacement {
    Header(String),
    Query(String),
    Body(String),
    Path(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecurityScheme {
    ApiKey {
        id: String,
        placement: ApiKeyPlacement,
    },
    Basic {
        id: String,
    },
    Bearer {
        id: String,
        bearer_format: Option<String>,
    },
    Digest {
        id: String,
        challenge_status: u16,
    },
}

impl SecurityScheme {
    pub fn id(&self) -> &str {
        match self {
            Self::ApiKey { id, .. }
            | Self::Basic { id }
            | Self::Bearer { id, .. }
            | Self::Digest { id, .. } => id,
        }
    }
}
