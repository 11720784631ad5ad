//! Dual-vocabulary connection labels
//!
//! The connection protocol (RFC 160) and DID exchange (RFC 23) name the same
//! roles and states differently. Each variant here carries both labels; lookup
//! accepts either and comparison against a string is label membership.
//!
//! # Invariants
//!
//! - Every label belongs to exactly one variant of its enumeration
//! - The RFC 160 label is the canonical persisted form
//! - Unknown labels resolve to `None`, never to a default variant

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Something a label-pair enumeration can be looked up by: a variant (identity)
/// or a string label (membership search).
pub trait LabelQuery<T> {
    /// Resolve to a variant, or `None` when no variant carries the label
    fn resolve(self) -> Option<T>;
}

macro_rules! label_pair_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $(
                $(#[$vmeta:meta])*
                $variant:ident => ($legacy:literal, $current:literal)
            ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $(
                $(#[$vmeta])*
                $variant,
            )+
        }

        impl $name {
            /// Every variant, in declaration order
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// RFC 160 (connection protocol) label; the persisted form
            pub const fn rfc160(self) -> &'static str {
                match self {
                    $($name::$variant => $legacy,)+
                }
            }

            /// RFC 23 (DID exchange) label
            pub const fn rfc23(self) -> &'static str {
                match self {
                    $($name::$variant => $current,)+
                }
            }

            /// Look up the variant carrying `label` under either vocabulary
            pub fn from_label(label: &str) -> Option<Self> {
                Self::ALL
                    .iter()
                    .copied()
                    .find(|v| v.rfc160() == label || v.rfc23() == label)
            }

            /// Resolve a variant or a label to a variant
            pub fn get(query: impl LabelQuery<Self>) -> Option<Self> {
                query.resolve()
            }

            /// Every accepted label across both vocabularies
            pub fn all_labels() -> Vec<&'static str> {
                Self::ALL
                    .iter()
                    .flat_map(|v| [v.rfc160(), v.rfc23()])
                    .collect()
            }
        }

        impl LabelQuery<$name> for $name {
            fn resolve(self) -> Option<$name> {
                Some(self)
            }
        }

        impl LabelQuery<$name> for &str {
            fn resolve(self) -> Option<$name> {
                $name::from_label(self)
            }
        }

        impl LabelQuery<$name> for &String {
            fn resolve(self) -> Option<$name> {
                $name::from_label(self)
            }
        }

        impl LabelQuery<$name> for String {
            fn resolve(self) -> Option<$name> {
                $name::from_label(&self)
            }
        }

        impl PartialEq<str> for $name {
            fn eq(&self, other: &str) -> bool {
                $name::from_label(other) == Some(*self)
            }
        }

        impl PartialEq<&str> for $name {
            fn eq(&self, other: &&str) -> bool {
                self == *other
            }
        }

        impl PartialEq<String> for $name {
            fn eq(&self, other: &String) -> bool {
                self == other.as_str()
            }
        }

        impl PartialEq<$name> for str {
            fn eq(&self, other: &$name) -> bool {
                other == self
            }
        }

        impl PartialEq<$name> for &str {
            fn eq(&self, other: &$name) -> bool {
                other == *self
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.rfc160())
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.rfc160())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let label = String::deserialize(deserializer)?;
                $name::from_label(&label).ok_or_else(|| {
                    serde::de::Error::custom(format!(
                        "unknown {} label '{}', expected one of {:?}",
                        stringify!($name),
                        label,
                        $name::all_labels()
                    ))
                })
            }
        }
    };
}

label_pair_enum! {
    /// Role of the other party.
    ///
    /// RFC 160 (inviter, invitee) = RFC 23 (responder, requester).
    pub enum Role {
        /// Invitee under RFC 160, requester under RFC 23
        Requester => ("invitee", "requester"),
        /// Inviter under RFC 160, responder under RFC 23
        Responder => ("inviter", "responder"),
    }
}

impl Role {
    /// The interlocutor's role
    pub const fn flip(self) -> Self {
        match self {
            Role::Requester => Role::Responder,
            Role::Responder => Role::Requester,
        }
    }
}

label_pair_enum! {
    /// Connection state, collating RFC 160 and RFC 23 names
    #[derive(Default)]
    pub enum State {
        /// Record created, nothing exchanged
        #[default]
        Init => ("init", "start"),
        /// Invitation sent or received
        Invitation => ("invitation", "invitation"),
        /// Request sent or received
        Request => ("request", "request"),
        /// Response sent or received
        Response => ("response", "response"),
        /// Exchange finished
        Completed => ("active", "completed"),
        /// Exchange failed or was given up
        Abandoned => ("error", "abandoned"),
    }
}
