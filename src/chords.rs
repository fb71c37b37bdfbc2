//! Chord progression parsing and validation.
//!
//! The `chords` form field is a JSON array of `[symbol, time]` pairs. Parsing
//! has an intentionally asymmetric contract:
//!
//! - absent, empty, unparsable or wrongly shaped input falls back to
//!   [`DEFAULT_CHORDS`] and is only logged,
//! - a well-formed list with an onset past [`GENERATION_HORIZON_S`] is
//!   rejected with [`ChordError::BeyondHorizon`].

use serde::{Deserialize, Serialize, Serializer};

use crate::config::{DEFAULT_CHORDS, GENERATION_HORIZON_S};

/// One chord and the time (seconds) it starts at.
#[derive(Debug, Clone, PartialEq)]
pub struct ChordEvent {
    pub symbol: String,
    pub onset_s: f64,
}

impl ChordEvent {
    pub fn new(symbol: impl Into<String>, onset_s: f64) -> Self {
        Self {
            symbol: symbol.into(),
            onset_s,
        }
    }
}

/// Serialized as a `[symbol, time]` pair, the model service's wire shape.
impl Serialize for ChordEvent {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        (&self.symbol, self.onset_s).serialize(serializer)
    }
}

/// Ordered chord events.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ChordProgression(Vec<ChordEvent>);

impl ChordProgression {
    pub fn new(events: Vec<ChordEvent>) -> Self {
        Self(events)
    }

    /// The fallback progression (Am7 → D7 → G).
    pub fn default_progression() -> Self {
        Self(
            DEFAULT_CHORDS
                .iter()
                .map(|&(symbol, onset_s)| ChordEvent::new(symbol, onset_s))
                .collect(),
        )
    }

    pub fn events(&self) -> &[ChordEvent] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for ChordProgression {
    fn default() -> Self {
        Self::default_progression()
    }
}

/// Chord validation failure.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ChordError {
    /// An onset lies past the generation window.
    #[error("Chord times cannot exceed {horizon:.1} seconds")]
    BeyondHorizon { symbol: String, onset_s: f64, horizon: f64 },
}

/// Raw onset as the client may send it: a number or a numeric string.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawOnset {
    Number(f64),
    Text(String),
}

impl RawOnset {
    fn seconds(&self) -> Option<f64> {
        match self {
            RawOnset::Number(value) => Some(*value),
            RawOnset::Text(text) => text.trim().parse().ok().filter(|s: &f64| s.is_finite()),
        }
    }
}

/// Resolve the `chords` form field into a progression.
pub fn parse_chords(raw: Option<&str>) -> Result<ChordProgression, ChordError> {
    let Some(raw) = raw.filter(|text| !text.is_empty()) else {
        tracing::info!("no chords provided, using default chords");
        return Ok(ChordProgression::default_progression());
    };

    let Some(events) = decode_events(raw) else {
        tracing::warn!(chords = %raw, "invalid chord format provided, using default chords");
        return Ok(ChordProgression::default_progression());
    };

    if let Some(late) = events.iter().find(|e| e.onset_s > GENERATION_HORIZON_S) {
        return Err(ChordError::BeyondHorizon {
            symbol: late.symbol.clone(),
            onset_s: late.onset_s,
            horizon: GENERATION_HORIZON_S,
        });
    }

    Ok(ChordProgression::new(events))
}

/// Decode `[[symbol, time], ...]`; `None` when the text is not of that shape.
fn decode_events(raw: &str) -> Option<Vec<ChordEvent>> {
    let pairs: Vec<(serde_json::Value, RawOnset)> = serde_json::from_str(raw).ok()?;
    pairs
        .into_iter()
        .map(|(symbol, onset)| {
            let symbol = match symbol {
                serde_json::Value::String(text) => text,
                other => other.to_string(),
            };
            onset.seconds().map(|onset_s| ChordEvent::new(symbol, onset_s))
        })
        .collect()
}
