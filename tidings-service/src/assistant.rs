//! Intent dispatch: normalization, classification and preface composition.

pub mod compose;
pub mod gazetteer;
pub mod intent;
pub mod location;

pub use compose::{Composer, Composition};
pub use intent::{Classification, Classifier, Intent, SmallTalkTopic};
pub use location::{correction_location, normalize_location};

use crate::tools::ToolCall;

impl Classification {
    /// The tool this classification needs executed, if any
    pub fn tool_call(&self) -> Option<ToolCall> {
        match self {
            Classification::Weather { location } | Classification::Correction { location } => {
                Some(ToolCall::Weather {
                    location: location.clone(),
                })
            }
            Classification::Motorsport(query) => Some(ToolCall::Motorsport(*query)),
            Classification::Equity { symbol } => Some(ToolCall::Equity {
                symbol: symbol.clone(),
            }),
            Classification::SmallTalk(_) => None,
        }
    }
}
