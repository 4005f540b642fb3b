//! The rich presence value object and its wire form.
//!
//! [`Presence`] is what callers build: a flat record whose string fields
//! are length-checked on assignment. [`Activity`] is what goes on the wire
//! inside a `SET_ACTIVITY` command, with fields grouped the way the peer
//! expects and empty values left out.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::ValidationError;

/// Limit for free-text fields (state, details, tooltips, ids, secrets).
pub const MAX_TEXT_LEN: usize = 128;

/// Limit for uploaded image asset keys.
pub const MAX_IMAGE_KEY_LEN: usize = 32;

fn check(field: &'static str, value: &str, max: usize) -> Result<(), ValidationError> {
    let len = value.chars().count();
    if len > max {
        return Err(ValidationError { field, max, len });
    }
    Ok(())
}

macro_rules! text_field {
    ($(#[$doc:meta])* $field:ident, $setter:ident, $max:expr) => {
        $(#[$doc])*
        pub fn $field(&self) -> &str {
            &self.$field
        }

        #[doc = concat!("Sets `", stringify!($field), "`. Rejects values longer than the limit and leaves the presence unchanged.")]
        pub fn $setter(&mut self, value: impl Into<String>) -> Result<&mut Self, ValidationError> {
            let value = value.into();
            check(stringify!($field), &value, $max)?;
            self.$field = value;
            Ok(self)
        }
    };
}

/// What the user is currently doing.
///
/// Every string setter validates its length before storing, so a
/// `Presence` that exists is always valid. Hand it to the client by value;
/// the session keeps its own copy until it is sent or superseded.
///
/// ```rust
/// use drpc_protocol::Presence;
///
/// let mut presence = Presence::new();
/// presence.set_state("In a match")?.set_details("Ranked 2v2")?;
/// presence.set_party(3, 4);
/// assert!(presence.set_large_image_key("k".repeat(33)).is_err());
/// # Ok::<(), drpc_protocol::ValidationError>(())
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Presence {
    state: String,
    details: String,
    start_timestamp: Option<i64>,
    end_timestamp: Option<i64>,
    large_image_key: String,
    large_image_text: String,
    small_image_key: String,
    small_image_text: String,
    party_id: String,
    party_size: u32,
    party_max: u32,
    match_secret: String,
    join_secret: String,
    spectate_secret: String,
    instance: u8,
}

impl Presence {
    /// An empty presence.
    pub fn new() -> Self {
        Self::default()
    }

    text_field!(
        /// The user's current party status.
        state, set_state, MAX_TEXT_LEN
    );
    text_field!(
        /// What the user is currently doing.
        details, set_details, MAX_TEXT_LEN
    );
    text_field!(
        /// Name of the uploaded image for the large artwork.
        large_image_key, set_large_image_key, MAX_IMAGE_KEY_LEN
    );
    text_field!(
        /// Tooltip for the large image.
        large_image_text, set_large_image_text, MAX_TEXT_LEN
    );
    text_field!(
        /// Name of the uploaded image for the small artwork.
        small_image_key, set_small_image_key, MAX_IMAGE_KEY_LEN
    );
    text_field!(
        /// Tooltip for the small image.
        small_image_text, set_small_image_text, MAX_TEXT_LEN
    );
    text_field!(
        /// Id of the user's party, lobby, or group.
        party_id, set_party_id, MAX_TEXT_LEN
    );
    text_field!(
        /// Unique secret for the match, used by spectate and join.
        match_secret, set_match_secret, MAX_TEXT_LEN
    );
    text_field!(
        /// Unique secret for chat invitations and ask-to-join.
        join_secret, set_join_secret, MAX_TEXT_LEN
    );
    text_field!(
        /// Unique secret for the spectate button.
        spectate_secret, set_spectate_secret, MAX_TEXT_LEN
    );

    /// Unix timestamp (seconds) when the activity started.
    pub fn start_timestamp(&self) -> Option<i64> {
        self.start_timestamp
    }

    /// Sets the start timestamp in unix seconds.
    pub fn set_start_timestamp(&mut self, secs: Option<i64>) -> &mut Self {
        self.start_timestamp = secs;
        self
    }

    /// Unix timestamp (seconds) when the activity will end.
    pub fn end_timestamp(&self) -> Option<i64> {
        self.end_timestamp
    }

    /// Sets the end timestamp in unix seconds.
    pub fn set_end_timestamp(&mut self, secs: Option<i64>) -> &mut Self {
        self.end_timestamp = secs;
        self
    }

    /// Starts the clock now and ends it `seconds` from now.
    pub fn set_duration(&mut self, seconds: i64) -> &mut Self {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or_default();
        self.start_timestamp = Some(now);
        self.end_timestamp = Some(now.saturating_add(seconds));
        self
    }

    /// Current party size.
    pub fn party_size(&self) -> u32 {
        self.party_size
    }

    /// Maximum party size.
    pub fn party_max(&self) -> u32 {
        self.party_max
    }

    /// Sets the party size and capacity. `size <= max` is expected but not
    /// enforced; the peer decides what to show.
    pub fn set_party(&mut self, size: u32, max: u32) -> &mut Self {
        self.party_size = size;
        self.party_max = max;
        self
    }

    /// Instance flag; non-zero marks the activity as a game instance.
    pub fn instance(&self) -> u8 {
        self.instance
    }

    /// Sets the instance flag.
    pub fn set_instance(&mut self, instance: u8) -> &mut Self {
        self.instance = instance;
        self
    }

    /// The wire form of this presence.
    pub fn to_activity(&self) -> Activity {
        Activity::from(self)
    }
}

// ---------------------------------------------------------------------------
// Wire form
// ---------------------------------------------------------------------------

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_owned())
}

/// The `activity` object of a `SET_ACTIVITY` command.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activity {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamps: Option<Timestamps>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assets: Option<Assets>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub party: Option<Party>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secrets: Option<Secrets>,
    pub instance: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timestamps {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assets {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub large_image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub large_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub small_image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub small_text: Option<String>,
}

/// `size` is `[current, max]`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Party {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<[u32; 2]>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Secrets {
    #[serde(rename = "match", skip_serializing_if = "Option::is_none")]
    pub match_secret: Option<String>,
    #[serde(rename = "join", skip_serializing_if = "Option::is_none")]
    pub join_secret: Option<String>,
    #[serde(rename = "spectate", skip_serializing_if = "Option::is_none")]
    pub spectate_secret: Option<String>,
}

impl From<&Presence> for Activity {
    fn from(p: &Presence) -> Self {
        let start = p.start_timestamp.filter(|&t| t != 0);
        let end = p.end_timestamp.filter(|&t| t != 0);
        let timestamps = (start.is_some() || end.is_some()).then_some(Timestamps { start, end });

        let assets = Assets {
            large_image: non_empty(&p.large_image_key),
            large_text: non_empty(&p.large_image_text),
            small_image: non_empty(&p.small_image_key),
            small_text: non_empty(&p.small_image_text),
        };
        let assets = (assets != Assets::default()).then_some(assets);

        let party = Party {
            id: non_empty(&p.party_id),
            size: (p.party_size > 0 || p.party_max > 0).then_some([p.party_size, p.party_max]),
        };
        let party = (party != Party::default()).then_some(party);

        let secrets = Secrets {
            match_secret: non_empty(&p.match_secret),
            join_secret: non_empty(&p.join_secret),
            spectate_secret: non_empty(&p.spectate_secret),
        };
        let secrets = (secrets != Secrets::default()).then_some(secrets);

        Self {
            state: non_empty(&p.state),
            details: non_empty(&p.details),
            timestamps,
            assets,
            party,
            secrets,
            instance: p.instance != 0,
        }
    }
}
