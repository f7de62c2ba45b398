//! Content script: runs inside a meeting tab, detects the meeting, tracks
//! participants and owns the recorder.

pub mod detector;
pub mod extract;
pub mod participants;
pub mod recorder;
pub mod script;

pub use detector::{Detection, MeetingDetector, MeetingUrl};
pub use extract::{Extractor, ObservedParticipant, ParticipantStrategy, TitleStrategy};
pub use participants::ParticipantObserver;
pub use recorder::{Recorder, RecorderEvent};
pub use script::ContentScript;
