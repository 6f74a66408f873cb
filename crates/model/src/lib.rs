#![cfg_attr(not(test), no_std)]
extern crate alloc;

pub mod policy;

use alloc::string::String;
use core::{
    fmt::{self, Display, Formatter},
    num::{NonZeroI32, ParseIntError},
    str::FromStr,
};
use serde::{Deserialize, Serialize};

pub use chrono::{DateTime, TimeDelta, Utc};

/// Maximum number of characters in a question or a choice label.
pub const MAX_TEXT_LEN: usize = 200;

macro_rules! identifier {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
        #[serde(transparent)]
        pub struct $name(pub NonZeroI32);

        impl $name {
            pub const fn new(id: i32) -> Option<Self> {
                match NonZeroI32::new(id) {
                    Some(id) => Some(Self(id)),
                    None => None,
                }
            }

            pub const fn get(self) -> i32 {
                self.0.get()
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
                Display::fmt(&self.0, f)
            }
        }

        impl FromStr for $name {
            type Err = ParseIntError;
            fn from_str(text: &str) -> Result<Self, Self::Err> {
                text.parse().map(Self)
            }
        }
    };
}

identifier! {
    /// Store-assigned identifier of a [`Poll`].
    PollId
}

identifier! {
    /// Store-assigned identifier of a [`Choice`].
    ChoiceId
}

/// A question that becomes publicly visible at `publish_at`.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct Poll {
    pub id: PollId,
    /// Question to be displayed to voters.
    pub question: String,
    /// Instant from which the poll may be listed and voted on.
    pub publish_at: DateTime<Utc>,
}

impl Poll {
    pub fn is_visible(&self, now: DateTime<Utc>) -> bool {
        policy::is_visible(now, self.publish_at)
    }

    /// Checks whether the poll was published within the day leading up to `now`.
    pub fn was_published_recently(&self, now: DateTime<Utc>) -> bool {
        policy::is_recent(now, self.publish_at)
    }
}

impl Display for Poll {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.question)
    }
}

/// One selectable answer of a [`Poll`].
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct Choice {
    pub id: ChoiceId,
    /// The poll which owns this choice.
    pub poll: PollId,
    pub text: String,
    /// How many votes this choice has received.
    pub votes: u32,
}

impl Display for Choice {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Checks the length constraints shared by questions and choice labels.
pub fn is_acceptable_text(text: &str) -> bool {
    text.chars().count() <= MAX_TEXT_LEN
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifiers_reject_zero() {
        assert!(PollId::new(0).is_none());
        assert!(ChoiceId::new(0).is_none());
        assert!("0".parse::<PollId>().is_err());
        assert!("abc".parse::<ChoiceId>().is_err());
        assert_eq!("42".parse::<PollId>().unwrap(), PollId::new(42).unwrap());
    }

    #[test]
    fn displays_as_text() {
        let poll = Poll {
            id: PollId::new(1).unwrap(),
            question: String::from("What's up?"),
            publish_at: Utc::now(),
        };
        assert_eq!(poll.to_string(), "What's up?");

        let choice = Choice { id: ChoiceId::new(3).unwrap(), poll: poll.id, text: String::from("Not much"), votes: 0 };
        assert_eq!(choice.to_string(), "Not much");
    }

    #[test]
    fn serializes_identifiers_transparently() {
        let choice =
            Choice { id: ChoiceId::new(7).unwrap(), poll: PollId::new(2).unwrap(), text: String::new(), votes: 5 };
        let json = serde_json::to_value(&choice).unwrap();
        assert_eq!(json["id"], 7);
        assert_eq!(json["poll"], 2);
        assert_eq!(json["votes"], 5);
    }

    #[test]
    fn limits_text_by_characters() {
        assert!(is_acceptable_text(""));
        assert!(is_acceptable_text(&"é".repeat(MAX_TEXT_LEN)));
        assert!(!is_acceptable_text(&"a".repeat(MAX_TEXT_LEN + 1)));
    }
}
