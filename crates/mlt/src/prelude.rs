//! Re-exports of the types most callers need, gathering every sub-crate's
//! public surface into one import.

pub use mlt_anim::{AnimValue, Animation, Keyframe, KeyframeType};
pub use mlt_cache::{ItemHandle, ServiceCache};
pub use mlt_compose::{EntryKind, Multitrack, Playlist, PlaylistEntry, Tractor, TransitionBinding};
pub use mlt_core::{
    ColorSpace, FrameRate, MltError, MltResult, NumericLocale, Profile, TimeFormat,
};
pub use mlt_frame::{AudioFormat, Buffer, Frame, PixelFormat};
pub use mlt_props::{EventBus, EventPayload, PropertyBag, PropertyValue};
pub use mlt_runtime::{Consumer, DispatchDecision, PlaybackClock, RenderSink};
pub use mlt_service::{Cut, Filter, FilterScope, Producer, ProducerCore, ServiceKind, Transition};
pub use mlt_xml::{parse as parse_xml, serialize as serialize_xml, Document, RootNode, TrackNode};

pub use crate::engine::Engine;
