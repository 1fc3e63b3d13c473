//! XML serialization: pass 0 registers every non-root producer/playlist as
//! a top-level element, pass 1 emits the root referencing them by id.

use std::sync::Arc;

use mlt_core::time::serialize_position;
use mlt_core::{MltError, MltResult};
use mlt_compose::{EntryKind, Playlist, Tractor};
use mlt_props::PropertyBag;
use mlt_service::{Filter, Producer};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use crate::model::{Document, RootNode, TrackNode};
use crate::registry::Registry;

type XmlResult<T> = Result<T, quick_xml::Error>;

fn xml_err(e: quick_xml::Error) -> MltError {
    MltError::FormatUnsupported(e.to_string())
}

pub fn serialize(doc: &Document) -> MltResult<String> {
    let registry = Registry::build(&doc.root);
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    write_document(&mut writer, doc, &registry).map_err(xml_err)?;
    String::from_utf8(writer.into_inner()).map_err(|e| MltError::FormatUnsupported(e.to_string()))
}

fn write_document(
    writer: &mut Writer<Vec<u8>>,
    doc: &Document,
    registry: &Registry,
) -> XmlResult<()> {
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;

    let mut mlt_start = BytesStart::new("mlt");
    mlt_start.push_attribute(("LC_NUMERIC", doc.lc_numeric.as_str()));
    mlt_start.push_attribute(("version", "0.1"));
    if let Some(root_dir) = &doc.root_dir {
        mlt_start.push_attribute(("root", root_dir.to_string_lossy().as_ref()));
    }
    if let Some(title) = &doc.title {
        mlt_start.push_attribute(("title", title.as_str()));
    }
    writer.write_event(Event::Start(mlt_start))?;

    write_profile(writer, doc)?;

    for (id, producer) in &registry.producers {
        write_producer(writer, id, producer, doc)?;
    }
    for (id, playlist) in &registry.playlists {
        write_playlist(writer, id, playlist, doc, registry)?;
    }

    match &doc.root {
        RootNode::Producer(producer) => write_producer_body(writer, "producer", None, producer, doc)?,
        RootNode::Playlist(playlist) => {
            write_playlist_body(writer, "playlist", None, playlist, doc, registry)?
        }
        RootNode::Tractor(tractor, tracks) => write_tractor(writer, tractor, tracks, doc, registry)?,
    }

    writer.write_event(Event::End(BytesEnd::new("mlt")))?;
    Ok(())
}

fn write_profile(writer: &mut Writer<Vec<u8>>, doc: &Document) -> XmlResult<()> {
    let profile = &doc.profile;
    let mut elem = BytesStart::new("profile");
    elem.push_attribute(("description", profile.name.as_str()));
    elem.push_attribute(("width", profile.width.to_string().as_str()));
    elem.push_attribute(("height", profile.height.to_string().as_str()));
    elem.push_attribute(("frame_rate_num", profile.fps.num.to_string().as_str()));
    elem.push_attribute(("frame_rate_den", profile.fps.den.to_string().as_str()));
    elem.push_attribute((
        "sample_aspect_num",
        profile.sample_aspect_num.to_string().as_str(),
    ));
    elem.push_attribute((
        "sample_aspect_den",
        profile.sample_aspect_den.to_string().as_str(),
    ));
    elem.push_attribute((
        "display_aspect_num",
        profile.display_aspect_num.to_string().as_str(),
    ));
    elem.push_attribute((
        "display_aspect_den",
        profile.display_aspect_den.to_string().as_str(),
    ));
    elem.push_attribute(("progressive", if profile.progressive { "1" } else { "0" }));
    writer.write_event(Event::Empty(elem))
}

fn write_properties(writer: &mut Writer<Vec<u8>>, props: &PropertyBag, doc: &Document) -> XmlResult<()> {
    for (name, value) in props.exportable_properties(doc.root_dir.as_deref()) {
        let mut elem = BytesStart::new("property");
        elem.push_attribute(("name", name.as_str()));
        writer.write_event(Event::Start(elem))?;
        writer.write_event(Event::Text(BytesText::new(value.as_str())))?;
        writer.write_event(Event::End(BytesEnd::new("property")))?;
    }
    Ok(())
}

fn write_filters(writer: &mut Writer<Vec<u8>>, filters: &[Arc<dyn Filter>], doc: &Document) -> XmlResult<()> {
    for filter in filters {
        let service = filter.props().get_string("mlt_service").unwrap_or_default();
        let mut elem = BytesStart::new("filter");
        let (fin, fout) = filter.in_out();
        elem.push_attribute(("mlt_service", service.as_str()));
        elem.push_attribute(("in", serialize_position(fin, doc.profile.fps, doc.time_format).as_str()));
        elem.push_attribute(("out", serialize_position(fout, doc.profile.fps, doc.time_format).as_str()));
        writer.write_event(Event::Start(elem))?;
        write_properties(writer, filter.props(), doc)?;
        writer.write_event(Event::End(BytesEnd::new("filter")))?;
    }
    Ok(())
}

fn producer_filters(producer: &Arc<dyn Producer>) -> Vec<Arc<dyn Filter>> {
    (0..producer.core().filter_count())
        .filter_map(|i| producer.filter(i))
        .collect()
}

fn write_producer(
    writer: &mut Writer<Vec<u8>>,
    id: &str,
    producer: &Arc<dyn Producer>,
    doc: &Document,
) -> XmlResult<()> {
    write_producer_body(writer, "producer", Some(id), producer, doc)
}

fn write_producer_body(
    writer: &mut Writer<Vec<u8>>,
    tag: &str,
    id: Option<&str>,
    producer: &Arc<dyn Producer>,
    doc: &Document,
) -> XmlResult<()> {
    let (in_point, out_point) = producer.in_out();
    let mut elem = BytesStart::new(tag);
    if let Some(id) = id {
        elem.push_attribute(("id", id));
    }
    elem.push_attribute((
        "in",
        serialize_position(in_point, doc.profile.fps, doc.time_format).as_str(),
    ));
    elem.push_attribute((
        "out",
        serialize_position(out_point, doc.profile.fps, doc.time_format).as_str(),
    ));
    writer.write_event(Event::Start(elem))?;
    write_properties(writer, producer.props(), doc)?;
    write_filters(writer, &producer_filters(producer), doc)?;
    writer.write_event(Event::End(BytesEnd::new(tag)))
}

fn write_playlist(
    writer: &mut Writer<Vec<u8>>,
    id: &str,
    playlist: &Arc<Playlist>,
    doc: &Document,
    registry: &Registry,
) -> XmlResult<()> {
    write_playlist_body(writer, "playlist", Some(id), playlist, doc, registry)
}

fn write_playlist_body(
    writer: &mut Writer<Vec<u8>>,
    tag: &str,
    id: Option<&str>,
    playlist: &Arc<Playlist>,
    doc: &Document,
    registry: &Registry,
) -> XmlResult<()> {
    let mut elem = BytesStart::new(tag);
    if let Some(id) = id {
        elem.push_attribute(("id", id));
    }
    writer.write_event(Event::Start(elem))?;
    write_properties(writer, playlist.props(), doc)?;

    for index in 0..playlist.clip_count() {
        let Some(info) = playlist.clip_info(index) else {
            continue;
        };
        match info.kind {
            EntryKind::Blank => {
                let mut blank = BytesStart::new("blank");
                blank.push_attribute(("length", info.length.to_string().as_str()));
                writer.write_event(Event::Empty(blank))?;
            }
            EntryKind::Clip => {
                let Some(producer) = playlist.entry_producer(index) else {
                    continue;
                };
                let producer_id = registry.producer_id(&producer).unwrap_or("producer0");
                let mut entry = BytesStart::new("entry");
                entry.push_attribute(("producer", producer_id));
                entry.push_attribute((
                    "in",
                    serialize_position(info.in_point, doc.profile.fps, doc.time_format).as_str(),
                ));
                entry.push_attribute((
                    "out",
                    serialize_position(info.out_point, doc.profile.fps, doc.time_format).as_str(),
                ));
                entry.push_attribute(("repeat", info.repeat.to_string().as_str()));
                writer.write_event(Event::Empty(entry))?;
            }
        }
    }
    writer.write_event(Event::End(BytesEnd::new(tag)))
}

fn write_tractor(
    writer: &mut Writer<Vec<u8>>,
    tractor: &Arc<Tractor>,
    tracks: &[TrackNode],
    doc: &Document,
    registry: &Registry,
) -> XmlResult<()> {
    writer.write_event(Event::Start(BytesStart::new("tractor")))?;
    write_properties(writer, tractor.props(), doc)?;

    writer.write_event(Event::Start(BytesStart::new("multitrack")))?;
    for track in tracks {
        let id = match track {
            TrackNode::Producer(p) => registry
                .producer_id(p)
                .map(str::to_string)
                .unwrap_or_default(),
            TrackNode::Playlist(pl) => registry
                .playlist_id(pl)
                .map(str::to_string)
                .unwrap_or_default(),
        };
        let mut elem = BytesStart::new("track");
        elem.push_attribute(("producer", id.as_str()));
        writer.write_event(Event::Empty(elem))?;
    }
    writer.write_event(Event::End(BytesEnd::new("multitrack")))?;

    for binding in tractor.transitions() {
        let service = binding
            .transition
            .props()
            .get_string("mlt_service")
            .unwrap_or_default();
        let mut elem = BytesStart::new("transition");
        elem.push_attribute(("mlt_service", service.as_str()));
        elem.push_attribute(("a_track", binding.a_track.to_string().as_str()));
        elem.push_attribute(("b_track", binding.b_track.to_string().as_str()));
        elem.push_attribute((
            "in",
            serialize_position(binding.in_point, doc.profile.fps, doc.time_format).as_str(),
        ));
        elem.push_attribute((
            "out",
            serialize_position(binding.out_point, doc.profile.fps, doc.time_format).as_str(),
        ));
        writer.write_event(Event::Start(elem))?;
        write_properties(writer, binding.transition.props(), doc)?;
        writer.write_event(Event::End(BytesEnd::new("transition")))?;
    }

    write_filters(writer, &producer_filters(&(tractor.clone() as Arc<dyn Producer>)), doc)?;

    writer.write_event(Event::End(BytesEnd::new("tractor")))
}
