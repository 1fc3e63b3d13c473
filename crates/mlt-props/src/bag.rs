//! Property Bag: the reference-counted, thread-safe named-value map every
//! service node carries.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use indexmap::IndexMap;
use mlt_anim::{Animation, AnimValue, KeyframeType};
use mlt_core::{FrameRate, MltError, MltResult, NumericLocale, TimeFormat};
use parking_lot::RwLock;

use crate::events::{EventBus, EventPayload};
use crate::value::{coerce_string_to_int, PropertyValue};

struct Inner {
    entries: IndexMap<String, PropertyValue>,
    path_typed: indexmap::IndexSet<String>,
    data_dir: Option<PathBuf>,
    locale: NumericLocale,
    fps: FrameRate,
    revision: u64,
    block_depth: u32,
    pending_events: Vec<String>,
}

/// A named, ordered, reference-counted map of properties. Wrap in `Arc` to
/// share a handle the way the framework shares service property bags.
pub struct PropertyBag {
    inner: RwLock<Inner>,
    pub events: EventBus,
}

impl Default for PropertyBag {
    fn default() -> Self {
        Self::new()
    }
}

impl PropertyBag {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                entries: IndexMap::new(),
                path_typed: indexmap::IndexSet::new(),
                data_dir: None,
                locale: NumericLocale::default(),
                fps: FrameRate::default(),
                revision: 0,
                block_depth: 0,
                pending_events: Vec::new(),
            }),
            events: EventBus::new(),
        }
    }

    pub fn with_fps(fps: FrameRate) -> Self {
        let bag = Self::new();
        bag.inner.write().fps = fps;
        bag
    }

    pub fn set_data_dir(&self, dir: impl Into<PathBuf>) {
        self.inner.write().data_dir = Some(dir.into());
    }

    pub fn set_locale(&self, locale: NumericLocale) {
        self.inner.write().locale = locale;
    }

    pub fn revision(&self) -> u64 {
        self.inner.read().revision
    }

    fn note_change(&self, name: &str) {
        let mut inner = self.inner.write();
        inner.revision += 1;
        if inner.block_depth > 0 {
            inner.pending_events.push(name.to_string());
        } else {
            drop(inner);
            self.events
                .fire("property-changed", EventPayload::PropertyChanged(name.to_string()));
        }
    }

    /// Increments the block depth; while non-zero, `property-changed` events
    /// accumulate instead of firing.
    pub fn block(&self) {
        self.inner.write().block_depth += 1;
    }

    /// Decrements the block depth; at depth 0, fires every accumulated
    /// `property-changed` event in mutation order.
    pub fn unblock(&self) {
        let pending = {
            let mut inner = self.inner.write();
            if inner.block_depth > 0 {
                inner.block_depth -= 1;
            }
            if inner.block_depth == 0 {
                std::mem::take(&mut inner.pending_events)
            } else {
                Vec::new()
            }
        };
        for name in pending {
            self.events
                .fire("property-changed", EventPayload::PropertyChanged(name));
        }
    }

    pub fn count(&self) -> usize {
        self.inner.read().entries.len()
    }

    pub fn get_name(&self, index: usize) -> Option<String> {
        self.inner
            .read()
            .entries
            .get_index(index)
            .map(|(k, _)| k.clone())
    }

    pub fn get_value(&self, index: usize) -> Option<String> {
        let inner = self.inner.read();
        inner
            .entries
            .get_index(index)
            .map(|(_, v)| Self::stringify(v, &inner.locale))
    }

    pub fn has(&self, name: &str) -> bool {
        self.inner.read().entries.contains_key(name)
    }

    pub fn clear(&self, name: &str) {
        self.inner.write().entries.shift_remove(name);
        self.note_change(name);
    }

    fn set_raw(&self, name: &str, value: PropertyValue) {
        self.inner
            .write()
            .entries
            .insert(name.to_string(), value);
        self.note_change(name);
    }

    pub fn set_int(&self, name: &str, value: i64) {
        self.set_raw(name, PropertyValue::Int(value));
    }

    pub fn set_double(&self, name: &str, value: f64) {
        self.set_raw(name, PropertyValue::Double(value));
    }

    pub fn set_position(&self, name: &str, value: i64) {
        self.set_raw(name, PropertyValue::Position(value));
    }

    pub fn set_string(&self, name: &str, value: impl Into<String>) {
        self.set_raw(name, PropertyValue::String(value.into()));
    }

    pub fn set_bag(&self, name: &str, value: Arc<PropertyBag>) {
        self.set_raw(name, PropertyValue::Bag(value));
    }

    /// Marks `name` as path-typed and stores its absolute form. Reads return
    /// the absolute form; `serialise_yaml` rebases it relative to the data
    /// directory.
    pub fn set_path(&self, name: &str, value: &str) {
        let absolute = {
            let inner = self.inner.read();
            mlt_core::path::absolutize(value, inner.data_dir.as_deref())
        };
        {
            let mut inner = self.inner.write();
            inner.path_typed.insert(name.to_string());
        }
        self.set_raw(name, PropertyValue::String(absolute.to_string_lossy().into_owned()));
    }

    fn stringify(value: &PropertyValue, locale: &NumericLocale) -> String {
        match value {
            PropertyValue::Int(v) => v.to_string(),
            PropertyValue::Double(v) => locale.format_f64(*v),
            PropertyValue::String(v) => v.clone(),
            PropertyValue::Position(v) => v.to_string(),
            PropertyValue::Binary(v) => format!("<binary:{} bytes>", v.len()),
            PropertyValue::Animation(a) => a.serialize(TimeFormat::Frames),
            PropertyValue::Bag(_) => "<bag>".to_string(),
        }
    }

    pub fn get_string(&self, name: &str) -> Option<String> {
        let inner = self.inner.read();
        inner
            .entries
            .get(name)
            .map(|v| Self::stringify(v, &inner.locale))
    }

    /// string → integer: decimal, then `0x` hex, then a named-color table,
    /// falling back to `0`; coercion failures never throw.
    pub fn get_int(&self, name: &str) -> i64 {
        let inner = self.inner.read();
        match inner.entries.get(name) {
            Some(PropertyValue::Int(v)) => *v,
            Some(PropertyValue::Position(v)) => *v,
            Some(PropertyValue::Double(v)) => *v as i64,
            Some(PropertyValue::String(s)) => coerce_string_to_int(s),
            _ => 0,
        }
    }

    pub fn get_double(&self, name: &str) -> f64 {
        let inner = self.inner.read();
        match inner.entries.get(name) {
            Some(PropertyValue::Double(v)) => *v,
            Some(PropertyValue::Int(v)) => *v as f64,
            Some(PropertyValue::Position(v)) => *v as f64,
            Some(PropertyValue::String(s)) => inner.locale.parse_f64(s).unwrap_or(0.0),
            _ => 0.0,
        }
    }

    /// Accepts a bare frame count, `HH:MM:SS.mmm`, `HH:MM:SS:ff` (SMPTE
    /// NDF), or `HH:MM:SS;ff` (SMPTE DF), using the bag's attached fps.
    pub fn get_position(&self, name: &str) -> i64 {
        let inner = self.inner.read();
        match inner.entries.get(name) {
            Some(PropertyValue::Position(v)) => *v,
            Some(PropertyValue::Int(v)) => *v,
            Some(PropertyValue::Double(v)) => *v as i64,
            Some(PropertyValue::String(s)) => {
                mlt_core::time::parse_position(s, inner.fps).unwrap_or(0)
            }
            _ => 0,
        }
    }

    pub fn get_bag(&self, name: &str) -> Option<Arc<PropertyBag>> {
        match self.inner.read().entries.get(name) {
            Some(PropertyValue::Bag(b)) => Some(b.clone()),
            _ => None,
        }
    }

    /// Promotes a string property matching the animation grammar into an
    /// `Animation` on first access, caching it in place, then samples the
    /// value at `position`. Values which are not keyframe-grammar strings
    /// are treated as a single constant keyframe at position 0.
    fn ensure_animation(&self, name: &str, length: i64) -> MltResult<()> {
        let mut inner = self.inner.write();
        let already = matches!(inner.entries.get(name), Some(PropertyValue::Animation(_)));
        if already {
            return Ok(());
        }
        let raw = match inner.entries.get(name) {
            Some(PropertyValue::String(s)) => s.clone(),
            Some(PropertyValue::Int(v)) => v.to_string(),
            Some(PropertyValue::Double(v)) => inner.locale.format_f64(*v),
            None => String::new(),
            _ => return Err(MltError::BadArgument(name.to_string())),
        };
        let is_string = !looks_numeric(&raw);
        let anim = Animation::parse(&raw, length, inner.fps, inner.locale, is_string)?;
        inner
            .entries
            .insert(name.to_string(), PropertyValue::Animation(Box::new(anim)));
        Ok(())
    }

    pub fn anim_get_double(&self, name: &str, position: i64, length: i64) -> f64 {
        if self.ensure_animation(name, length).is_err() {
            return 0.0;
        }
        let inner = self.inner.read();
        match inner.entries.get(name) {
            Some(PropertyValue::Animation(a)) => {
                a.get_item(position).map(|v| v.as_double()).unwrap_or(0.0)
            }
            _ => 0.0,
        }
    }

    pub fn anim_get_int(&self, name: &str, position: i64, length: i64) -> i64 {
        if self.ensure_animation(name, length).is_err() {
            return 0;
        }
        let inner = self.inner.read();
        match inner.entries.get(name) {
            Some(PropertyValue::Animation(a)) => {
                a.get_item(position).map(|v| v.as_int()).unwrap_or(0)
            }
            _ => 0,
        }
    }

    /// Inserts or replaces the keyframe at `position`; on replace, the
    /// interpolation type is updated to `kind`.
    pub fn anim_set(
        &self,
        name: &str,
        value: AnimValue,
        position: i64,
        length: i64,
        kind: KeyframeType,
    ) -> MltResult<()> {
        self.ensure_animation(name, length)?;
        let mut inner = self.inner.write();
        if let Some(PropertyValue::Animation(a)) = inner.entries.get_mut(name) {
            a.set_item(position, value, kind);
        }
        drop(inner);
        self.note_change(name);
        Ok(())
    }

    /// Copies every property of `src` whose name begins with `prefix`,
    /// stripping the prefix on insertion.
    pub fn pass(&self, src: &PropertyBag, prefix: &str) {
        let items: Vec<(String, PropertyValue)> = {
            let src_inner = src.inner.read();
            src_inner
                .entries
                .iter()
                .filter(|(k, _)| k.starts_with(prefix))
                .map(|(k, v)| (k[prefix.len()..].to_string(), v.clone()))
                .collect()
        };
        for (name, value) in items {
            self.set_raw(&name, value);
        }
    }

    /// Copies any property of `src` absent in `self`.
    pub fn inherit(&self, src: &PropertyBag) {
        let items: Vec<(String, PropertyValue)> = {
            let src_inner = src.inner.read();
            let self_inner = self.inner.read();
            src_inner
                .entries
                .iter()
                .filter(|(k, _)| !self_inner.entries.contains_key(k.as_str()))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect()
        };
        for (name, value) in items {
            self.set_raw(&name, value);
        }
    }

    /// Best-effort filesystem-encoding → UTF-8 conversion. On this platform
    /// the process encoding is always UTF-8, so this validates `src_name`'s
    /// bytes rather than performing a real iconv transcode; invalid UTF-8
    /// leaves `dst_name` unset and returns an error.
    pub fn from_utf8(&self, src_name: &str, dst_name: &str) -> MltResult<()> {
        let raw = self.get_string(src_name).unwrap_or_default();
        match String::from_utf8(raw.into_bytes()) {
            Ok(s) => {
                self.set_string(dst_name, s);
                Ok(())
            }
            Err(_) => Err(MltError::BadArgument(format!(
                "invalid UTF-8 in '{src_name}'"
            ))),
        }
    }

    pub fn to_utf8(&self, src_name: &str, dst_name: &str) -> MltResult<()> {
        self.from_utf8(src_name, dst_name)
    }

    /// Lists files under `path` matching a `*`-glob `pattern`.
    pub fn dir_list(&self, path: &Path, pattern: &str, recursive: bool) -> MltResult<Vec<PathBuf>> {
        let mut out = Vec::new();
        collect_dir(path, pattern, recursive, &mut out)?;
        Ok(out)
    }

    pub fn parse_yaml(&self, path: &Path) -> MltResult<()> {
        let text = std::fs::read_to_string(path)?;
        let value: serde_yml::Value = serde_yml::from_str(&text)
            .map_err(|e| MltError::FormatUnsupported(e.to_string()))?;
        if let serde_yml::Value::Mapping(map) = value {
            for (k, v) in map {
                if let (Some(key), Some(val)) = (k.as_str(), v.as_str()) {
                    self.set_string(key, val);
                }
            }
        }
        Ok(())
    }

    /// `(name, rendered-value)` pairs visible to a serializer: `_`-prefixed
    /// names are skipped and path-typed values are rendered relative to
    /// `root_dir` (falling back to the bag's own data dir when `root_dir`
    /// is `None`). Shares its rebasing rule with `serialise_yaml` so every
    /// codec observes the same path semantics.
    pub fn exportable_properties(&self, root_dir: Option<&Path>) -> Vec<(String, String)> {
        let inner = self.inner.read();
        let base = root_dir.or(inner.data_dir.as_deref());
        inner
            .entries
            .iter()
            .filter(|(k, _)| !k.starts_with('_'))
            .map(|(k, v)| {
                let rendered = if inner.path_typed.contains(k) {
                    if let PropertyValue::String(s) = v {
                        mlt_core::path::relativize(Path::new(s), base)
                    } else {
                        Self::stringify(v, &inner.locale)
                    }
                } else {
                    Self::stringify(v, &inner.locale)
                };
                (k.clone(), rendered)
            })
            .collect()
    }

    pub fn serialise_yaml(&self) -> MltResult<String> {
        let inner = self.inner.read();
        let mut map = serde_yml::Mapping::new();
        for (k, v) in inner.entries.iter() {
            if k.starts_with('_') {
                continue;
            }
            let rendered = if inner.path_typed.contains(k) {
                if let PropertyValue::String(s) = v {
                    mlt_core::path::relativize(Path::new(s), inner.data_dir.as_deref())
                } else {
                    Self::stringify(v, &inner.locale)
                }
            } else {
                Self::stringify(v, &inner.locale)
            };
            map.insert(
                serde_yml::Value::String(k.clone()),
                serde_yml::Value::String(rendered),
            );
        }
        serde_yml::to_string(&serde_yml::Value::Mapping(map))
            .map_err(|e| MltError::FormatUnsupported(e.to_string()))
    }

    pub fn load_file(&self, name: &str, path: &Path) -> MltResult<()> {
        let bytes = std::fs::read(path)?;
        self.set_raw(name, PropertyValue::Binary(Arc::new(bytes)));
        Ok(())
    }
}

fn looks_numeric(raw: &str) -> bool {
    raw.split(';').all(|item| {
        let item = item.trim();
        if item.is_empty() {
            return true;
        }
        match item.split_once('=') {
            Some((_, rhs)) => rhs.trim().parse::<f64>().is_ok() || rhs.trim().parse::<i64>().is_ok(),
            None => item.parse::<f64>().is_ok(),
        }
    })
}

fn collect_dir(path: &Path, pattern: &str, recursive: bool, out: &mut Vec<PathBuf>) -> MltResult<()> {
    let entries = std::fs::read_dir(path)?;
    for entry in entries {
        let entry = entry?;
        let p = entry.path();
        if p.is_dir() {
            if recursive {
                collect_dir(&p, pattern, recursive, out)?;
            }
            continue;
        }
        if glob_match(pattern, &p.file_name().unwrap_or_default().to_string_lossy()) {
            out.push(p);
        }
    }
    Ok(())
}

fn glob_match(pattern: &str, name: &str) -> bool {
    if pattern == "*" || pattern.is_empty() {
        return true;
    }
    match pattern.split_once('*') {
        Some((prefix, suffix)) => name.starts_with(prefix) && name.ends_with(suffix),
        None => pattern == name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_round_trips() {
        let bag = PropertyBag::new();
        bag.set_int("x", 42);
        assert_eq!(bag.get_int("x"), 42);
    }

    #[test]
    fn double_round_trips_within_tolerance() {
        let bag = PropertyBag::new();
        bag.set_double("x", 3.25);
        approx::assert_relative_eq!(bag.get_double("x"), 3.25);
    }

    #[test]
    fn string_to_int_falls_back_to_hex_then_color_then_zero() {
        let bag = PropertyBag::new();
        bag.set_string("a", "0x1F");
        assert_eq!(bag.get_int("a"), 0x1F);
        bag.set_string("b", "red");
        assert_eq!(bag.get_int("b"), 0xff0000ffu32 as i64);
        bag.set_string("c", "not a number");
        assert_eq!(bag.get_int("c"), 0);
    }

    #[test]
    fn single_keyframe_animation_query_returns_constant() {
        let bag = PropertyBag::new();
        bag.set_string("pos", "10=5");
        assert_eq!(bag.anim_get_double("pos", 0, 100), 5.0);
        assert_eq!(bag.anim_get_double("pos", 99, 100), 5.0);
    }

    #[test]
    fn property_changed_fires_on_set_and_accumulates_under_block() {
        let bag = PropertyBag::new();
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let s = seen.clone();
        let owner = bag.events.new_owner();
        bag.events.listen("property-changed", owner, move |p| {
            if let EventPayload::PropertyChanged(name) = p {
                s.lock().push(name.clone());
            }
        });
        bag.set_int("a", 1);
        assert_eq!(*seen.lock(), vec!["a".to_string()]);

        bag.block();
        bag.set_int("b", 2);
        bag.set_int("c", 3);
        assert_eq!(*seen.lock(), vec!["a".to_string()]);
        bag.unblock();
        assert_eq!(
            *seen.lock(),
            vec!["a".to_string(), "b".to_string(), "c".to_string()]
        );
    }

    #[test]
    fn pass_strips_prefix_and_inherit_skips_existing() {
        let src = PropertyBag::new();
        src.set_int("meta.width", 1920);
        src.set_int("other", 7);
        let dst = PropertyBag::new();
        dst.pass(&src, "meta.");
        assert_eq!(dst.get_int("width"), 1920);
        assert!(!dst.has("other"));

        dst.set_int("other", 99);
        dst.inherit(&src);
        assert_eq!(dst.get_int("other"), 99);
    }

    #[test]
    fn path_rebasing_serializes_relative_to_data_dir() {
        let bag = PropertyBag::new();
        bag.set_data_dir("/project/media");
        bag.set_path("resource", "/project/media/clips/a.mov");
        assert_eq!(
            bag.get_string("resource").unwrap(),
            "/project/media/clips/a.mov"
        );
        let yaml = bag.serialise_yaml().unwrap();
        assert!(yaml.contains("clips/a.mov"));
        assert!(!yaml.contains("/project/media/clips"));
    }
}
