use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Expected reasons for a strategy to produce no toolpath.
///
/// These are not failures of the program: the operation is reported as
/// cancelled and the rest of the job continues. Unexpected problems travel as
/// `anyhow::Error` instead.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum CancelReason {
    #[error("no machinable source geometry")]
    EmptySource,

    #[error("no tool assigned (tool id {tool_id})")]
    UnresolvedTool { tool_id: i64 },

    #[error("{cutter} cutter cannot be used by the {strategy} strategy")]
    IncompatibleCutter { strategy: String, cutter: String },

    #[error("top bound {top:.5} is below depth end {depth_end:.5}")]
    InfeasibleDepth { top: f64, depth_end: f64 },

    #[error("no valid feature: {}", rejected.join("; "))]
    NoValidFeature { rejected: Vec<String> },

    #[error("computation interrupted")]
    Interrupted,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_messages() {
        assert_eq!(
            CancelReason::UnresolvedTool { tool_id: -1 }.to_string(),
            "no tool assigned (tool id -1)"
        );
        assert_eq!(
            CancelReason::InfeasibleDepth {
                top: -2.0,
                depth_end: -1.0
            }
            .to_string(),
            "top bound -2.00000 is below depth end -1.00000"
        );
        let reason = CancelReason::NoValidFeature {
            rejected: vec!["hole 0: too small".into(), "hole 1: too shallow".into()],
        };
        assert_eq!(
            reason.to_string(),
            "no valid feature: hole 0: too small; hole 1: too shallow"
        );
    }
}
