//! Single-vocabulary connection settings
//!
//! Routing state, acceptance policy and invitation mode are closed sets with
//! one label each. The label is the persisted form.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Unrecognized mode label
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} '{label}'")]
pub struct UnknownMode {
    /// Which setting was being parsed
    pub kind: &'static str,
    /// The rejected label
    pub label: String,
}

/// Mediation routing state of a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoutingState {
    /// No routing established
    None,
    /// Routing requested
    Request,
    /// Routing active
    Active,
    /// Routing failed
    Error,
}

impl RoutingState {
    /// Routing state of a new connection
    pub const DEFAULT: Self = Self::None;

    /// Persisted label
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Request => "request",
            Self::Active => "active",
            Self::Error => "error",
        }
    }
}

/// Whether connection requests and responses are accepted automatically
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AcceptMode {
    /// Wait for an explicit accept
    Manual,
    /// Accept as soon as the message arrives
    Auto,
}

impl AcceptMode {
    /// Acceptance policy of a new connection
    pub const DEFAULT: Self = Self::Manual;

    /// Persisted label
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Auto => "auto",
        }
    }
}

/// How many times an invitation may be used
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvitationMode {
    /// Single-use invitation
    Once,
    /// Multi-use invitation; each use spawns a new connection
    Multi,
    /// Static connection configured out of band
    Static,
}

impl InvitationMode {
    /// Invitation mode of a new connection
    pub const DEFAULT: Self = Self::Once;

    /// Persisted label
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Once => "once",
            Self::Multi => "multi",
            Self::Static => "static",
        }
    }
}

macro_rules! impl_mode_traits {
    ($name:ident, $kind:literal, [$($variant:ident),+]) => {
        impl Default for $name {
            fn default() -> Self {
                Self::DEFAULT
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownMode;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                [$(Self::$variant),+]
                    .into_iter()
                    .find(|m| m.as_str() == s)
                    .ok_or_else(|| UnknownMode {
                        kind: $kind,
                        label: s.to_string(),
                    })
            }
        }
    };
}

impl_mode_traits!(RoutingState, "routing state", [None, Request, Active, Error]);
impl_mode_traits!(AcceptMode, "accept mode", [Manual, Auto]);
impl_mode_traits!(InvitationMode, "invitation mode", [Once, Multi, Static]);
