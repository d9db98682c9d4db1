//! UI-agnostic editing core for the Cutdesk timeline editor.

pub mod api;
pub mod bridge;
pub mod command;
pub mod config;
pub mod edit;
pub mod error;
pub mod export;
pub mod history;
pub mod persist;
pub mod probe;
pub mod project;
pub mod range;
pub mod store;
pub mod timeline;

pub use api::{
    ClipSummary, Command, Engine, EngineErrorEvent, Event, MediaSummary, ProjectSnapshot,
    TrackSummary,
};
pub use bridge::{
    BridgeError, EngineBridge, EngineCommandSender, EngineEventReceiver, spawn_engine_bridge,
};
pub use command::{EditCommand, parse_command, parse_command_with};
pub use config::EngineConfig;
pub use edit::{DropPayload, DropPlacement};
pub use error::{EngineError, ErrorKind, Result};
pub use export::{ExportPlan, build_export_plan};
pub use history::History;
pub use persist::ImportReport;
pub use probe::{Probe, normalize_pcm_peaks};
pub use project::{
    Clip, ClipId, IntegrityReport, MediaFile, MediaId, NewClip, NewMediaFile, Project, Track,
    TrackId, TrackKind,
};
pub use range::{Range, detect_silences, merge_ranges, tighten_silences};
pub use store::{Change, ClipPatch, ProjectStore, RemovalPolicy, SubscriptionId, TrackPatch};
pub use timeline::{TimelinePatch, TimelineSettings};
