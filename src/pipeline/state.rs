//! Run state management

/// Liveness run state machine
///
/// A run walks the phases in order. Any phase before `CleaningUp` may bail
/// out to `CleaningUp`; cleanup ends in `Completed` or `Failed`, and a finished
/// coordinator goes back through `Idle` when the next run starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// No run in progress
    Idle,

    /// Obtaining the media source and waiting for its first frame
    AcquiringSource,

    /// Configuring the encoder from the source settings
    InitializingEncoder,

    /// Driving the challenge pattern and encoding captured frames
    Capturing,

    /// Decoding the chunk sequence and replaying it to the sink
    Decoding,

    /// Submitting sampled frames to the classifier
    Validating,

    /// Releasing every resource of the run
    CleaningUp,

    /// Run finished without error
    Completed,

    /// Run finished with an error
    Failed,
}

impl RunState {
    /// Check if this state transition is valid
    pub fn can_transition_to(&self, target: &RunState) -> bool {
        use RunState::*;

        match (self, target) {
            (Idle, AcquiringSource) => true,

            (AcquiringSource, InitializingEncoder) => true,
            (InitializingEncoder, Capturing) => true,
            (Capturing, Decoding) => true,
            (Decoding, Validating) => true,

            // Cleanup is reachable from every phase of a run
            (AcquiringSource | InitializingEncoder | Capturing | Decoding | Validating, CleaningUp) => {
                true
            }

            (CleaningUp, Completed) => true,
            (CleaningUp, Failed) => true,

            // Next run
            (Completed | Failed, Idle) => true,

            // Self-transitions
            (a, b) if a == b => true,

            // All other transitions invalid
            _ => false,
        }
    }

    /// Get a human-readable description of this state
    pub fn description(&self) -> &'static str {
        match self {
            RunState::Idle => "Idle",
            RunState::AcquiringSource => "AcquiringSource",
            RunState::InitializingEncoder => "InitializingEncoder",
            RunState::Capturing => "Capturing",
            RunState::Decoding => "Decoding",
            RunState::Validating => "Validating",
            RunState::CleaningUp => "CleaningUp",
            RunState::Completed => "Completed",
            RunState::Failed => "Failed",
        }
    }

    /// Check if a run is in progress
    pub fn is_active(&self) -> bool {
        !matches!(
            self,
            RunState::Idle | RunState::Completed | RunState::Failed
        )
    }

    /// Check if the run reached a terminal state
    pub fn is_finished(&self) -> bool {
        matches!(self, RunState::Completed | RunState::Failed)
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.description())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use RunState::*;

    #[test]
    fn test_valid_transitions() {
        let happy_path = [
            Idle,
            AcquiringSource,
            InitializingEncoder,
            Capturing,
            Decoding,
            Validating,
            CleaningUp,
            Completed,
            Idle,
        ];
        for pair in happy_path.windows(2) {
            assert!(
                pair[0].can_transition_to(&pair[1]),
                "{} -> {} should be valid",
                pair[0],
                pair[1]
            );
        }

        // Every phase can fall through to cleanup
        for phase in [AcquiringSource, InitializingEncoder, Capturing, Decoding, Validating] {
            assert!(phase.can_transition_to(&CleaningUp));
        }
        assert!(CleaningUp.can_transition_to(&Failed));
        assert!(Failed.can_transition_to(&Idle));
    }

    #[test]
    fn test_invalid_transitions() {
        assert!(!Idle.can_transition_to(&Capturing)); // Must acquire a source first
        assert!(!Capturing.can_transition_to(&Validating)); // Decoding comes first
        assert!(!Idle.can_transition_to(&CleaningUp));
        assert!(!Decoding.can_transition_to(&Completed)); // Cleanup is unconditional
        assert!(!Completed.can_transition_to(&Capturing));
    }

    #[test]
    fn test_state_checks() {
        assert!(Capturing.is_active());
        assert!(CleaningUp.is_active());
        assert!(!Idle.is_active());
        assert!(Completed.is_finished());
        assert!(Failed.is_finished());
        assert!(!Validating.is_finished());
    }
}
