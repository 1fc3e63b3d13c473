//! Pure parser for the `melt` verb table: turns an argument list into a
//! [`GraphSpec`] description with no process execution, windowing, or
//! device I/O — the front-end itself is out of scope, but the core still
//! owns the contract a front-end would build against.

use mlt_core::{MltError, MltResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackScope {
    Default,
    Audio,
    Video,
    Null,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachScope {
    Cut,
    Track,
    Clip,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Silent,
    Progress,
    Verbose,
    Debug,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConsumerSpec {
    pub id: String,
    pub arg: Option<String>,
    pub properties: Vec<(String, String)>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TrackItem {
    Producer {
        arg: String,
        properties: Vec<(String, String)>,
    },
    Blank(i64),
    Filter {
        id: String,
        arg: Option<String>,
        properties: Vec<(String, String)>,
        attach_scope: AttachScope,
    },
    Transition {
        id: String,
        arg: Option<String>,
        properties: Vec<(String, String)>,
    },
    Mix {
        frames: i64,
        mixer: Option<String>,
    },
    Split(i64),
    Join(u32),
    Remove,
    Swap,
    Repeat(u32),
    Group(Vec<(String, String)>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrackSpec {
    pub scope: TrackScope,
    pub items: Vec<TrackItem>,
}

impl TrackSpec {
    fn new(scope: TrackScope) -> Self {
        Self {
            scope,
            items: Vec::new(),
        }
    }
}

/// The parsed, unexecuted intent of a `melt` invocation.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GraphSpec {
    pub profile_name: Option<String>,
    pub consumers: Vec<ConsumerSpec>,
    pub tracks: Vec<TrackSpec>,
    pub serialise: Option<Option<String>>,
    pub query: Option<Option<String>>,
    pub log_level: Option<LogLevel>,
    pub version: bool,
    pub help: bool,
}

fn require_arg(args: &[String], i: &mut usize, flag: &str) -> MltResult<String> {
    let value = args
        .get(*i)
        .ok_or_else(|| MltError::BadArgument(format!("{flag} expects an argument")))?
        .clone();
    *i += 1;
    Ok(value)
}

/// Consumes the next token as an optional value: present only when it
/// exists and isn't itself a flag (`-serialise`/`-query` take an optional
/// trailing argument).
fn peek_optional_value(args: &[String], i: &mut usize) -> Option<String> {
    match args.get(*i) {
        Some(v) if !v.starts_with('-') => {
            *i += 1;
            Some(v.clone())
        }
        _ => None,
    }
}

/// Splits `ID[:ARG]` into its id and optional argument.
fn split_id_arg(token: &str) -> (String, Option<String>) {
    match token.split_once(':') {
        Some((id, arg)) => (id.to_string(), Some(arg.to_string())),
        None => (token.to_string(), None),
    }
}

/// Consumes consecutive `K=V` tokens, stopping at the next flag or an
/// unparseable token.
fn collect_kv(args: &[String], i: &mut usize) -> Vec<(String, String)> {
    let mut props = Vec::new();
    while let Some(tok) = args.get(*i) {
        if tok.starts_with('-') {
            break;
        }
        match tok.split_once('=') {
            Some((k, v)) => {
                props.push((k.to_string(), v.to_string()));
                *i += 1;
            }
            None => break,
        }
    }
    props
}

pub fn parse_args(args: &[String]) -> MltResult<GraphSpec> {
    let mut spec = GraphSpec::default();
    let mut current_track = TrackSpec::new(TrackScope::Default);
    let mut has_open_track = false;
    let mut i = 0;

    macro_rules! open_track {
        ($scope:expr) => {{
            if has_open_track || !current_track.items.is_empty() {
                spec.tracks.push(std::mem::replace(
                    &mut current_track,
                    TrackSpec::new($scope),
                ));
            } else {
                current_track = TrackSpec::new($scope);
            }
            has_open_track = true;
        }};
    }

    while i < args.len() {
        let tok = args[i].clone();
        match tok.as_str() {
            "-profile" => {
                i += 1;
                spec.profile_name = Some(require_arg(&args, &mut i, "-profile")?);
            }
            "-consumer" => {
                i += 1;
                let id_arg = require_arg(&args, &mut i, "-consumer")?;
                let (id, arg) = split_id_arg(&id_arg);
                let properties = collect_kv(&args, &mut i);
                spec.consumers.push(ConsumerSpec { id, arg, properties });
            }
            "-track" => {
                i += 1;
                open_track!(TrackScope::Default);
            }
            "-audio-track" => {
                i += 1;
                open_track!(TrackScope::Audio);
            }
            "-video-track" => {
                i += 1;
                open_track!(TrackScope::Video);
            }
            "-null-track" => {
                i += 1;
                open_track!(TrackScope::Null);
            }
            "-blank" => {
                i += 1;
                let n: i64 = require_arg(&args, &mut i, "-blank")?
                    .parse()
                    .map_err(|_| MltError::BadArgument("-blank expects an integer".into()))?;
                current_track.items.push(TrackItem::Blank(n));
            }
            "-filter" => {
                i += 1;
                let id_arg = require_arg(&args, &mut i, "-filter")?;
                let (id, arg) = split_id_arg(&id_arg);
                let properties = collect_kv(&args, &mut i);
                current_track.items.push(TrackItem::Filter {
                    id,
                    arg,
                    properties,
                    attach_scope: AttachScope::Track,
                });
            }
            "-attach" | "-attach-cut" | "-attach-track" | "-attach-clip" => {
                let attach_scope = match tok.as_str() {
                    "-attach-cut" => AttachScope::Cut,
                    "-attach-clip" => AttachScope::Clip,
                    _ => AttachScope::Track,
                };
                i += 1;
                let id_arg = require_arg(&args, &mut i, &tok)?;
                let (id, arg) = split_id_arg(&id_arg);
                let properties = collect_kv(&args, &mut i);
                current_track.items.push(TrackItem::Filter {
                    id,
                    arg,
                    properties,
                    attach_scope,
                });
            }
            "-transition" => {
                i += 1;
                let id_arg = require_arg(&args, &mut i, "-transition")?;
                let (id, arg) = split_id_arg(&id_arg);
                let properties = collect_kv(&args, &mut i);
                current_track
                    .items
                    .push(TrackItem::Transition { id, arg, properties });
            }
            "-mix" => {
                i += 1;
                let frames: i64 = require_arg(&args, &mut i, "-mix")?
                    .parse()
                    .map_err(|_| MltError::BadArgument("-mix expects an integer".into()))?;
                let mixer = if args.get(i).map(String::as_str) == Some("-mixer") {
                    i += 1;
                    Some(require_arg(&args, &mut i, "-mixer")?)
                } else {
                    None
                };
                current_track.items.push(TrackItem::Mix { frames, mixer });
            }
            "-split" => {
                i += 1;
                let rel: i64 = require_arg(&args, &mut i, "-split")?
                    .parse()
                    .map_err(|_| MltError::BadArgument("-split expects an integer".into()))?;
                current_track.items.push(TrackItem::Split(rel));
            }
            "-join" => {
                i += 1;
                let n: u32 = require_arg(&args, &mut i, "-join")?
                    .parse()
                    .map_err(|_| MltError::BadArgument("-join expects an integer".into()))?;
                current_track.items.push(TrackItem::Join(n));
            }
            "-remove" => {
                i += 1;
                current_track.items.push(TrackItem::Remove);
            }
            "-swap" => {
                i += 1;
                current_track.items.push(TrackItem::Swap);
            }
            "-repeat" => {
                i += 1;
                let n: u32 = require_arg(&args, &mut i, "-repeat")?
                    .parse()
                    .map_err(|_| MltError::BadArgument("-repeat expects an integer".into()))?;
                current_track.items.push(TrackItem::Repeat(n));
            }
            "-group" => {
                i += 1;
                let properties = collect_kv(&args, &mut i);
                current_track.items.push(TrackItem::Group(properties));
            }
            "-serialise" => {
                i += 1;
                spec.serialise = Some(peek_optional_value(&args, &mut i));
            }
            "-query" => {
                i += 1;
                spec.query = Some(peek_optional_value(&args, &mut i));
            }
            "-silent" => {
                i += 1;
                spec.log_level = Some(LogLevel::Silent);
            }
            "-progress" => {
                i += 1;
                spec.log_level = Some(LogLevel::Progress);
            }
            "-verbose" => {
                i += 1;
                spec.log_level = Some(LogLevel::Verbose);
            }
            "-debug" => {
                i += 1;
                spec.log_level = Some(LogLevel::Debug);
            }
            "-version" => {
                i += 1;
                spec.version = true;
            }
            "-help" => {
                i += 1;
                spec.help = true;
            }
            other if other.starts_with('-') => {
                return Err(MltError::BadArgument(format!("unrecognized flag {other}")));
            }
            _ => {
                i += 1;
                let properties = collect_kv(&args, &mut i);
                current_track
                    .items
                    .push(TrackItem::Producer { arg: tok, properties });
            }
        }
    }

    if has_open_track || !current_track.items.is_empty() {
        spec.tracks.push(current_track);
    }
    Ok(spec)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(s: &str) -> Vec<String> {
        s.split_whitespace().map(String::from).collect()
    }

    #[test]
    fn implicit_producer_with_properties_starts_the_default_track() {
        let spec = parse_args(&args("-profile atsc_720p_25 color:red out=49")).unwrap();
        assert_eq!(spec.profile_name.as_deref(), Some("atsc_720p_25"));
        assert_eq!(spec.tracks.len(), 1);
        match &spec.tracks[0].items[0] {
            TrackItem::Producer { arg, properties } => {
                assert_eq!(arg, "color:red");
                assert_eq!(properties, &[("out".to_string(), "49".to_string())]);
            }
            other => panic!("unexpected item: {other:?}"),
        }
    }

    #[test]
    fn blank_and_second_producer_share_one_track_until_dash_track() {
        let spec = parse_args(&args("color:red -blank 5 color:blue -track color:green")).unwrap();
        assert_eq!(spec.tracks.len(), 2);
        assert_eq!(spec.tracks[0].items.len(), 3);
        assert_eq!(spec.tracks[1].items.len(), 1);
    }

    #[test]
    fn consumer_collects_kv_properties() {
        let spec = parse_args(&args("-consumer sdl2:0 progressive=1 real_time=1")).unwrap();
        assert_eq!(spec.consumers.len(), 1);
        assert_eq!(spec.consumers[0].id, "sdl2");
        assert_eq!(spec.consumers[0].arg.as_deref(), Some("0"));
        assert_eq!(spec.consumers[0].properties.len(), 2);
    }

    #[test]
    fn serialise_without_a_file_argument_means_stdout() {
        let spec = parse_args(&args("color:red -serialise")).unwrap();
        assert_eq!(spec.serialise, Some(None));
    }

    #[test]
    fn serialise_with_a_file_argument_captures_it() {
        let spec = parse_args(&args("color:red -serialise out.mlt")).unwrap();
        assert_eq!(spec.serialise, Some(Some("out.mlt".to_string())));
    }

    #[test]
    fn unrecognized_flag_is_a_bad_argument_error() {
        let err = parse_args(&args("-not-a-real-flag")).unwrap_err();
        assert!(matches!(err, MltError::BadArgument(_)));
    }

    #[test]
    fn attach_cut_scope_is_distinguished_from_plain_filter() {
        let spec = parse_args(&args("color:red -attach-cut brightness:50 level=0.5")).unwrap();
        match &spec.tracks[0].items[1] {
            TrackItem::Filter { attach_scope, .. } => assert_eq!(*attach_scope, AttachScope::Cut),
            other => panic!("unexpected item: {other:?}"),
        }
    }
}
