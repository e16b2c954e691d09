//! Message selection: one random configured message per state.

use crate::config::{Config, Message};
use crate::mood::StateKey;
use rand::seq::SliceRandom;
use rand::Rng;

/// Shown when a state has no configured messages
pub const PLACEHOLDER_TEXT: &str = "...";

/// Pick a message for `state` uniformly at random.
///
/// Never fails: a missing or empty list yields [`PLACEHOLDER_TEXT`] in the
/// default font.
pub fn select<R: Rng + ?Sized>(state: StateKey, config: &Config, rng: &mut R) -> Message {
    config
        .messages
        .get(&state)
        .and_then(|entries| entries.choose(rng))
        .cloned()
        .unwrap_or_else(|| placeholder(config))
}

/// The sentinel message.
pub fn placeholder(config: &Config) -> Message {
    Message {
        text: PLACEHOLDER_TEXT.to_string(),
        font_id: config.default_font_id,
    }
}
