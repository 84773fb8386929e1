// SPDX-License-Identifier: MIT OR Apache-2.0

//! Credential values supplied by a caller or super-configuration entry,
//! prior to being matched against a declared [`crate::SecurityScheme`].

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecurityValues {
    ApiKey {
        id: String,
        apikey: String,
    },
    Basic {
        id: String,
        username: String,
        password: String,
    },
    Bearer {
        id: String,
        token: String,
    },
    Digest {
        id: String,
        digest: Option<String>,
        username: Option<String>,
        password: Option<String>,
    },
}

impl SecurityValues {
    pub fn id(&self) -> &str {
        match self {
            Self::ApiKey { id, .. }
            | Self::Basic { id, .. }
            | Self::Bearer { id, .. }
            | Self::Digest { id, .. } => id,
        }
    }

    /// Required-key validation per the declared value shape.
    pub fn is_structurally_valid(&self) -> bool {
        match self {
            Self::ApiKey { apikey, .. } => !apikey.is_empty(),
            Self::Basic {
                username, password, ..
            } => !username.is_empty() && !password.is_empty(),
            Self::Bearer { token, .. } => !token.is_empty(),
            Self::Digest {
                digest,
                username,
                password,
                ..
            } => digest.is_some() || (username.is_some() && password.is_some()),
        }
    }
}
