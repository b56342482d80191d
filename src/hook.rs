//! Hook payload decoding.
//!
//! The external dispatcher pipes one JSON object describing the
//! intercepted tool call to this process on stdin. Only `tool_name` is
//! required; everything else degrades to a sentinel rather than failing.

use serde::Deserialize;
use serde_json::Value;

/// Identifier used when no teammate id can be resolved from the payload.
pub const UNKNOWN_TEAMMATE: &str = "unknown";

/// Keys probed in `tool_input`, in priority order, to find the teammate
/// a directed message is addressed to.
const TEAMMATE_ID_KEYS: [&str; 4] = ["teammate_id", "to", "target", "name"];

/// One intercepted tool call, as delivered by the hook dispatcher.
#[derive(Debug, Clone, Deserialize)]
pub struct HookInput {
    /// Name of the tool being invoked.
    pub tool_name: String,

    /// The tool's input object. Defaults to `null` when absent.
    #[serde(default)]
    pub tool_input: Value,
}

/// Classified teammate-communication event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookEvent {
    /// A message directed at a single teammate.
    Message { to: String },
    /// A message addressed to every known teammate.
    Broadcast,
}

impl HookInput {
    /// Decodes a hook payload from a reader (normally stdin).
    pub fn from_reader(reader: impl std::io::Read) -> Result<Self, serde_json::Error> {
        serde_json::from_reader(reader)
    }

    /// Resolves the teammate id from `tool_input` using the fallback
    /// priority chain, defaulting to [`UNKNOWN_TEAMMATE`].
    pub fn teammate_id(&self) -> String {
        for key in TEAMMATE_ID_KEYS {
            if let Some(id) = self.tool_input.get(key).and_then(Value::as_str) {
                if !id.is_empty() {
                    return id.to_string();
                }
            }
        }
        UNKNOWN_TEAMMATE.to_string()
    }

    /// Classifies this call as a broadcast or a directed message.
    ///
    /// The dispatcher decides which tools qualify at all; here a tool
    /// name ending in `broadcast` (case-insensitive) means broadcast and
    /// anything else is a directed message.
    pub fn event(&self) -> HookEvent {
        if self.tool_name.to_ascii_lowercase().ends_with("broadcast") {
            HookEvent::Broadcast
        } else {
            HookEvent::Message {
                to: self.teammate_id(),
            }
        }
    }
}
