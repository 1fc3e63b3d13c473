//! XML deserialization: reverses the serializer's two-pass scheme. Because
//! every `<producer>`/`<playlist>` a document references by id is emitted
//! before the element that references it, a single forward pass over the
//! event stream is enough to resolve every `id` reference as it's
//! encountered — the "two passes" describe write order, not a requirement
//! on the reader.

use std::collections::HashMap;
use std::sync::Arc;

use mlt_core::time::{parse_position, FrameRate};
use mlt_core::{MltError, MltResult, Profile, TimeFormat};
use mlt_compose::{EntryKind, Multitrack, Playlist, PlaylistEntry, Tractor, TransitionBinding};
use mlt_props::PropertyBag;
use mlt_service::Producer;
use quick_xml::events::attributes::Attribute;
use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::Reader;

use crate::leaf::{GenericFilter, GenericProducer, GenericTransition};
use crate::model::{Document, RootNode, TrackNode};

fn xml_err(e: quick_xml::Error) -> MltError {
    MltError::FormatUnsupported(e.to_string())
}

fn attr_value(attr: &Attribute) -> MltResult<String> {
    attr.unescape_value()
        .map(|v| v.into_owned())
        .map_err(xml_err)
}

fn tag_name(start: &BytesStart) -> String {
    String::from_utf8_lossy(start.name().as_ref()).into_owned()
}

fn end_name(end: &BytesEnd) -> String {
    String::from_utf8_lossy(end.name().as_ref()).into_owned()
}

fn find_attr(start: &BytesStart, key: &str) -> MltResult<Option<String>> {
    for attr in start.attributes() {
        let attr = attr.map_err(xml_err)?;
        if attr.key.as_ref() == key.as_bytes() {
            return Ok(Some(attr_value(&attr)?));
        }
    }
    Ok(None)
}

/// Consumes events up to and including the matching end tag, ignoring
/// everything in between. Used for elements this reader doesn't otherwise
/// understand.
fn skip_to_end(reader: &mut Reader<&[u8]>, end_tag: &str) -> MltResult<()> {
    loop {
        match reader.read_event().map_err(xml_err)? {
            Event::Eof => {
                return Err(MltError::FormatUnsupported(format!(
                    "unexpected eof inside <{end_tag}>"
                )))
            }
            Event::End(end) if end_name(&end) == end_tag => return Ok(()),
            Event::Start(s) => skip_to_end(reader, &tag_name(&s))?,
            _ => {}
        }
    }
}

fn read_text_until(reader: &mut Reader<&[u8]>, end_tag: &str) -> MltResult<String> {
    let mut text = String::new();
    loop {
        match reader.read_event().map_err(xml_err)? {
            Event::Text(t) => text.push_str(&t.unescape().map_err(xml_err)?),
            Event::End(end) if end_name(&end) == end_tag => break,
            Event::Eof => {
                return Err(MltError::FormatUnsupported(format!(
                    "unexpected eof inside <{end_tag}>"
                )))
            }
            _ => {}
        }
    }
    Ok(text.trim().to_string())
}

fn parse_in_out(start: &BytesStart, fps: FrameRate) -> MltResult<(i64, i64)> {
    let in_point = find_attr(start, "in")?
        .map(|v| parse_position(&v, fps))
        .transpose()?
        .unwrap_or(0);
    let out_point = find_attr(start, "out")?
        .map(|v| parse_position(&v, fps))
        .transpose()?
        .unwrap_or(in_point);
    Ok((in_point, out_point))
}

#[derive(Clone)]
enum Resolved {
    Producer(Arc<dyn Producer>),
    Playlist(Arc<Playlist>),
}

/// Parses an `<mlt>` document produced by [`crate::serialize`] (or a
/// structurally equivalent one) back into a [`Document`].
pub fn parse(xml: &str) -> MltResult<Document> {
    let mut reader = Reader::from_str(xml);

    let mut profile = Profile::default();
    let mut fps = profile.fps;
    let mut lc_numeric = "C".to_string();
    let mut root_dir = None;
    let mut title = None;
    let mut nodes: HashMap<String, Resolved> = HashMap::new();
    let mut root: Option<RootNode> = None;

    loop {
        let (start, is_empty) = match reader.read_event().map_err(xml_err)? {
            Event::Eof => break,
            Event::Start(s) => (s, false),
            Event::Empty(s) => (s, true),
            _ => continue,
        };
        let name = tag_name(&start);
        match name.as_str() {
            "mlt" => {
                if let Some(v) = find_attr(&start, "LC_NUMERIC")? {
                    lc_numeric = v;
                }
                if let Some(v) = find_attr(&start, "root")? {
                    root_dir = Some(v.into());
                }
                if let Some(v) = find_attr(&start, "title")? {
                    title = Some(v);
                }
            }
            "profile" => {
                profile = parse_profile(&start)?;
                fps = profile.fps;
                if !is_empty {
                    skip_to_end(&mut reader, "profile")?;
                }
            }
            "producer" => {
                let id = find_attr(&start, "id")?;
                let producer = parse_producer(&mut reader, &start, fps, is_empty)?;
                match id {
                    Some(id) => {
                        nodes.insert(id, Resolved::Producer(producer));
                    }
                    None => root = Some(RootNode::Producer(producer)),
                }
            }
            "playlist" => {
                let id = find_attr(&start, "id")?;
                let playlist = parse_playlist(&mut reader, fps, &nodes, is_empty)?;
                match id {
                    Some(id) => {
                        nodes.insert(id, Resolved::Playlist(playlist));
                    }
                    None => root = Some(RootNode::Playlist(playlist)),
                }
            }
            "tractor" => {
                root = Some(parse_tractor(&mut reader, fps, &nodes, is_empty)?);
            }
            _ => {
                if !is_empty {
                    skip_to_end(&mut reader, &name)?;
                }
            }
        }
    }

    let root = root.ok_or_else(|| MltError::FormatUnsupported("document has no root element".into()))?;
    let mut doc = Document::new(profile, root);
    doc.lc_numeric = lc_numeric;
    doc.root_dir = root_dir;
    doc.title = title;
    doc.time_format = TimeFormat::Frames;
    Ok(doc)
}

fn parse_profile(start: &BytesStart) -> MltResult<Profile> {
    let mut profile = Profile::default();
    if let Some(v) = find_attr(start, "description")? {
        profile.name = v;
    }
    if let Some(v) = find_attr(start, "width")? {
        profile.width = v.parse().unwrap_or(profile.width);
    }
    if let Some(v) = find_attr(start, "height")? {
        profile.height = v.parse().unwrap_or(profile.height);
    }
    let num = find_attr(start, "frame_rate_num")?.and_then(|v| v.parse().ok());
    let den = find_attr(start, "frame_rate_den")?.and_then(|v| v.parse().ok());
    if let (Some(num), Some(den)) = (num, den) {
        profile.fps = FrameRate::new(num, den);
    }
    if let Some(v) = find_attr(start, "sample_aspect_num")? {
        profile.sample_aspect_num = v.parse().unwrap_or(profile.sample_aspect_num);
    }
    if let Some(v) = find_attr(start, "sample_aspect_den")? {
        profile.sample_aspect_den = v.parse().unwrap_or(profile.sample_aspect_den);
    }
    if let Some(v) = find_attr(start, "display_aspect_num")? {
        profile.display_aspect_num = v.parse().unwrap_or(profile.display_aspect_num);
    }
    if let Some(v) = find_attr(start, "display_aspect_den")? {
        profile.display_aspect_den = v.parse().unwrap_or(profile.display_aspect_den);
    }
    if let Some(v) = find_attr(start, "progressive")? {
        profile.progressive = v != "0";
    }
    Ok(profile)
}

/// Collects `<property name="...">text</property>` and `<filter>` children
/// up to the matching `end_tag` close.
fn collect_body(
    reader: &mut Reader<&[u8]>,
    end_tag: &str,
    fps: FrameRate,
) -> MltResult<(PropertyBag, Vec<Arc<GenericFilter>>)> {
    let props = PropertyBag::with_fps(fps);
    let mut filters = Vec::new();

    loop {
        match reader.read_event().map_err(xml_err)? {
            Event::Eof => {
                return Err(MltError::FormatUnsupported(format!(
                    "unexpected eof inside <{end_tag}>"
                )))
            }
            Event::End(end) if end_name(&end) == end_tag => break,
            Event::Start(s) if tag_name(&s) == "property" => {
                let name = find_attr(&s, "name")?.unwrap_or_default();
                let text = read_text_until(reader, "property")?;
                props.set_string(&name, text);
            }
            Event::Empty(s) if tag_name(&s) == "property" => {
                let name = find_attr(&s, "name")?.unwrap_or_default();
                props.set_string(&name, String::new());
            }
            Event::Start(s) if tag_name(&s) == "filter" => {
                let (fin, fout) = parse_in_out(&s, fps)?;
                let (filter_props, _) = collect_body(reader, "filter", fps)?;
                filters.push(GenericFilter::new(Arc::new(filter_props), fin, fout));
            }
            Event::Empty(s) if tag_name(&s) == "filter" => {
                let (fin, fout) = parse_in_out(&s, fps)?;
                filters.push(GenericFilter::new(Arc::new(PropertyBag::with_fps(fps)), fin, fout));
            }
            Event::Start(s) => skip_to_end(reader, &tag_name(&s))?,
            _ => {}
        }
    }
    Ok((props, filters))
}

fn parse_producer(
    reader: &mut Reader<&[u8]>,
    start: &BytesStart,
    fps: FrameRate,
    is_empty: bool,
) -> MltResult<Arc<dyn Producer>> {
    let (in_point, out_point) = parse_in_out(start, fps)?;
    let (props, filters) = if is_empty {
        (PropertyBag::with_fps(fps), Vec::new())
    } else {
        collect_body(reader, "producer", fps)?
    };
    let producer = GenericProducer::new(Arc::new(props), in_point, out_point, fps.fps());
    for filter in filters {
        producer.attach(filter);
    }
    Ok(producer)
}

fn parse_playlist(
    reader: &mut Reader<&[u8]>,
    fps: FrameRate,
    nodes: &HashMap<String, Resolved>,
    is_empty: bool,
) -> MltResult<Arc<Playlist>> {
    let playlist = Arc::new(Playlist::new(fps.fps()));
    if is_empty {
        return Ok(playlist);
    }
    loop {
        match reader.read_event().map_err(xml_err)? {
            Event::Eof => {
                return Err(MltError::FormatUnsupported("unexpected eof inside <playlist>".into()))
            }
            Event::End(end) if end_name(&end) == "playlist" => break,
            Event::Start(s) if tag_name(&s) == "property" => {
                let name = find_attr(&s, "name")?.unwrap_or_default();
                let text = read_text_until(reader, "property")?;
                playlist.props().set_string(&name, text);
            }
            Event::Empty(s) if tag_name(&s) == "property" => {
                let name = find_attr(&s, "name")?.unwrap_or_default();
                playlist.props().set_string(&name, String::new());
            }
            Event::Empty(s) if tag_name(&s) == "blank" => {
                let length = find_attr(&s, "length")?
                    .and_then(|v| v.parse::<i64>().ok())
                    .unwrap_or(0);
                playlist.append_blank(length);
            }
            Event::Empty(s) if tag_name(&s) == "entry" => {
                let producer_id = find_attr(&s, "producer")?.unwrap_or_default();
                let (in_point, out_point) = parse_in_out(&s, fps)?;
                let repeat: u32 = find_attr(&s, "repeat")?
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(1);
                match nodes.get(&producer_id) {
                    Some(Resolved::Producer(p)) => {
                        let index = playlist.clip_count();
                        playlist.insert_at(
                            index,
                            PlaylistEntry {
                                kind: EntryKind::Clip,
                                producer: Some(p.clone()),
                                in_point,
                                out_point,
                                repeat: repeat.max(1),
                                filters: Default::default(),
                            },
                        );
                    }
                    _ => log::warn!("playlist entry references unresolved producer id {producer_id:?}"),
                }
            }
            Event::Start(s) => skip_to_end(reader, &tag_name(&s))?,
            _ => {}
        }
    }
    Ok(playlist)
}

fn parse_tractor(
    reader: &mut Reader<&[u8]>,
    fps: FrameRate,
    nodes: &HashMap<String, Resolved>,
    is_empty: bool,
) -> MltResult<RootNode> {
    let multitrack = Arc::new(Multitrack::new(fps.fps()));
    let tractor_props = PropertyBag::with_fps(fps);
    let mut tracks = Vec::new();
    let mut bindings = Vec::new();

    if !is_empty {
        loop {
            match reader.read_event().map_err(xml_err)? {
                Event::Eof => {
                    return Err(MltError::FormatUnsupported("unexpected eof inside <tractor>".into()))
                }
                Event::End(end) if end_name(&end) == "tractor" => break,
                Event::Start(s) if tag_name(&s) == "property" => {
                    let name = find_attr(&s, "name")?.unwrap_or_default();
                    let text = read_text_until(reader, "property")?;
                    tractor_props.set_string(&name, text);
                }
                Event::Empty(s) if tag_name(&s) == "property" => {
                    let name = find_attr(&s, "name")?.unwrap_or_default();
                    tractor_props.set_string(&name, String::new());
                }
                Event::Start(s) if tag_name(&s) == "multitrack" => {
                    loop {
                        match reader.read_event().map_err(xml_err)? {
                            Event::Eof => {
                                return Err(MltError::FormatUnsupported(
                                    "unexpected eof inside <multitrack>".into(),
                                ))
                            }
                            Event::End(end) if end_name(&end) == "multitrack" => break,
                            Event::Empty(s) if tag_name(&s) == "track" => {
                                let producer_id = find_attr(&s, "producer")?.unwrap_or_default();
                                let track_index = tracks.len();
                                match nodes.get(&producer_id) {
                                    Some(Resolved::Producer(p)) => {
                                        multitrack.connect(track_index, p.clone());
                                        tracks.push(TrackNode::Producer(p.clone()));
                                    }
                                    Some(Resolved::Playlist(pl)) => {
                                        multitrack
                                            .connect(track_index, pl.clone() as Arc<dyn Producer>);
                                        tracks.push(TrackNode::Playlist(pl.clone()));
                                    }
                                    None => log::warn!(
                                        "multitrack track references unresolved producer id {producer_id:?}"
                                    ),
                                }
                            }
                            Event::Start(s) => skip_to_end(reader, &tag_name(&s))?,
                            _ => {}
                        }
                    }
                }
                Event::Start(s) if tag_name(&s) == "transition" => {
                    let service = find_attr(&s, "mlt_service")?.unwrap_or_default();
                    let a_track: usize =
                        find_attr(&s, "a_track")?.and_then(|v| v.parse().ok()).unwrap_or(0);
                    let b_track: usize =
                        find_attr(&s, "b_track")?.and_then(|v| v.parse().ok()).unwrap_or(1);
                    let (in_point, out_point) = parse_in_out(&s, fps)?;
                    let (mut props, _) = collect_body(reader, "transition", fps)?;
                    props.set_string("mlt_service", service);
                    bindings.push(TransitionBinding {
                        transition: GenericTransition::new(
                            Arc::new(props),
                            a_track,
                            b_track,
                            in_point,
                            out_point,
                        ),
                        a_track,
                        b_track,
                        in_point,
                        out_point,
                    });
                }
                Event::Empty(s) if tag_name(&s) == "transition" => {
                    let service = find_attr(&s, "mlt_service")?.unwrap_or_default();
                    let a_track: usize =
                        find_attr(&s, "a_track")?.and_then(|v| v.parse().ok()).unwrap_or(0);
                    let b_track: usize =
                        find_attr(&s, "b_track")?.and_then(|v| v.parse().ok()).unwrap_or(1);
                    let (in_point, out_point) = parse_in_out(&s, fps)?;
                    let props = PropertyBag::with_fps(fps);
                    props.set_string("mlt_service", service);
                    bindings.push(TransitionBinding {
                        transition: GenericTransition::new(
                            Arc::new(props),
                            a_track,
                            b_track,
                            in_point,
                            out_point,
                        ),
                        a_track,
                        b_track,
                        in_point,
                        out_point,
                    });
                }
                Event::Start(s) if tag_name(&s) == "filter" => {
                    skip_to_end(reader, "filter")?;
                }
                Event::Start(s) => skip_to_end(reader, &tag_name(&s))?,
                _ => {}
            }
        }
    }

    let tractor = Arc::new(Tractor::new(multitrack, fps.fps()));
    tractor.props().inherit(&tractor_props);
    for binding in bindings {
        tractor.add_transition(binding);
    }
    Ok(RootNode::Tractor(tractor, tracks))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::write::serialize;

    #[test]
    fn round_trips_a_single_producer_document() {
        let profile = Profile::atsc_720p_25();
        let props = PropertyBag::with_fps(profile.fps);
        props.set_string("mlt_service", "colour");
        props.set_string("resource", "red");
        let producer = GenericProducer::new(Arc::new(props), 0, 4, profile.fps.fps());
        let doc = Document::new(profile, RootNode::Producer(producer));

        let xml = serialize(&doc).unwrap();
        let parsed = parse(&xml).unwrap();
        match parsed.root {
            RootNode::Producer(p) => {
                assert_eq!(p.in_out(), (0, 4));
                assert_eq!(p.props().get_string("resource").as_deref(), Some("red"));
            }
            _ => panic!("expected a producer root"),
        }
    }

    #[test]
    fn round_trips_a_playlist_with_a_blank_gap() {
        let profile = Profile::atsc_720p_25();
        let clip_props = PropertyBag::with_fps(profile.fps);
        clip_props.set_string("mlt_service", "colour");
        let clip = GenericProducer::new(Arc::new(clip_props), 0, 9, profile.fps.fps());
        let playlist = Arc::new(Playlist::new(profile.fps.fps()));
        playlist.append_clip(clip, 0, 9);
        playlist.append_blank(5);
        let doc = Document::new(profile, RootNode::Playlist(playlist));

        let xml = serialize(&doc).unwrap();
        let parsed = parse(&xml).unwrap();
        match parsed.root {
            RootNode::Playlist(pl) => {
                assert_eq!(pl.clip_count(), 2);
                assert_eq!(pl.total_length(), 15);
            }
            _ => panic!("expected a playlist root"),
        }
    }

    #[test]
    fn round_trips_a_tractor_with_two_tracks_and_a_transition() {
        let profile = Profile::atsc_720p_25();
        let track_a = GenericProducer::new(Arc::new(PropertyBag::with_fps(profile.fps)), 0, 49, profile.fps.fps());
        let track_b = GenericProducer::new(Arc::new(PropertyBag::with_fps(profile.fps)), 0, 49, profile.fps.fps());
        let multitrack = Arc::new(Multitrack::new(profile.fps.fps()));
        multitrack.connect(0, track_a.clone());
        multitrack.connect(1, track_b.clone());
        let tractor = Arc::new(Tractor::new(multitrack, profile.fps.fps()));
        let mut transition_props = PropertyBag::with_fps(profile.fps);
        transition_props.set_string("mlt_service", "luma");
        tractor.add_transition(TransitionBinding {
            transition: GenericTransition::new(Arc::new(transition_props), 0, 1, 0, 24),
            a_track: 0,
            b_track: 1,
            in_point: 0,
            out_point: 24,
        });
        let tracks = vec![TrackNode::Producer(track_a), TrackNode::Producer(track_b)];
        let doc = Document::new(profile, RootNode::Tractor(tractor, tracks));

        let xml = serialize(&doc).unwrap();
        let parsed = parse(&xml).unwrap();
        match parsed.root {
            RootNode::Tractor(t, tracks) => {
                assert_eq!(tracks.len(), 2);
                assert_eq!(t.transitions().len(), 1);
                assert_eq!(t.transitions()[0].a_track, 0);
            }
            _ => panic!("expected a tractor root"),
        }
    }
}
