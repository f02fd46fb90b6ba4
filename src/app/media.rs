//! Media resources the tests run against, described by the `.media_info`
//! XML sidecars produced by the media-check tool.

use crate::app::error::Error;
use crate::app::scenario::{Scenario, ScenarioRegistry};
use crate::configuration::constants::common::NANOS_PER_SECOND;
use crate::configuration::deserialize::flag;
use crate::configuration::manifest::FakeMediaInfo;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::str::FromStr;
use std::sync::Arc;
use sxd_document::parser;
use sxd_xpath::{evaluate_xpath, Value};
use walkdir::WalkDir;

pub const MEDIA_INFO_EXT: &str = "media_info";
pub const PUSH_MEDIA_INFO_EXT: &str = "media_info.push";
pub const SKIPPED_MEDIA_INFO_EXT: &str = "media_info.skipped";
pub const STREAM_INFO_EXT: &str = "stream_info";

const SIDECAR_EXTENSIONS: [&str; 4] = [
    SKIPPED_MEDIA_INFO_EXT,
    PUSH_MEDIA_INFO_EXT,
    MEDIA_INFO_EXT,
    STREAM_INFO_EXT,
];

/// Extensions of files worth generating media info for.
const MEDIA_EXTENSIONS: &[&str] = &[
    "webm", "mkv", "mka", "mk3d", "mp4", "m4a", "m4v", "mov", "ogg", "ogv", "oga", "opus",
    "avi", "flv", "ts", "m2ts", "mpg", "mpeg", "mp3", "wav", "flac", "aac", "ac3", "3gp",
    "mxf", "asf", "wmv", "wma", "png", "jpg", "jpeg", "gif",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackType {
    Audio,
    Video,
    Subtitle,
    Image,
    Other,
}

impl TrackType {
    /// Track types scenarios may ask a minimum count of.
    pub const CONSTRAINED: [TrackType; 3] = [TrackType::Audio, TrackType::Subtitle, TrackType::Video];
}

impl fmt::Display for TrackType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TrackType::Audio => "audio",
            TrackType::Video => "video",
            TrackType::Subtitle => "subtitle",
            TrackType::Image => "image",
            TrackType::Other => "other",
        })
    }
}

impl From<&str> for TrackType {
    fn from(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "audio" => TrackType::Audio,
            "video" => TrackType::Video,
            "subtitle" | "text" => TrackType::Subtitle,
            "image" => TrackType::Image,
            _ => TrackType::Other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Protocol {
    File,
    PushFile,
    Http,
    Hls,
    Dash,
    Rtsp,
    ImageSequence,
    Other(String),
}

impl Protocol {
    pub fn needs_clock_sync(&self) -> bool {
        matches!(self, Protocol::Hls | Protocol::Dash)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Protocol::File => "file",
            Protocol::PushFile => "pushfile",
            Protocol::Http => "http",
            Protocol::Hls => "hls",
            Protocol::Dash => "dash",
            Protocol::Rtsp => "rtsp",
            Protocol::ImageSequence => "imagesequence",
            Protocol::Other(name) => name,
        }
    }
}

impl FromStr for Protocol {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_ascii_lowercase().as_str() {
            "file" => Protocol::File,
            "pushfile" => Protocol::PushFile,
            "http" | "https" => Protocol::Http,
            "hls" => Protocol::Hls,
            "dash" => Protocol::Dash,
            "rtsp" => Protocol::Rtsp,
            "imagesequence" => Protocol::ImageSequence,
            other => Protocol::Other(other.to_owned()),
        })
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Properties of a media resource deciding which scenarios can run on it.
pub trait MediaDescriptor: fmt::Debug + Send + Sync {
    fn uri(&self) -> &str;

    /// The media info file backing the descriptor, if any.
    fn path(&self) -> Option<&Path>;

    fn protocol(&self) -> Protocol;

    /// Duration in nanoseconds, `0` when unknown.
    fn duration(&self) -> u64;

    fn is_seekable(&self) -> bool;

    fn is_live(&self) -> bool;

    fn is_image(&self) -> bool;

    fn num_tracks(&self, track_type: TrackType) -> u32;

    fn can_play_reverse(&self) -> bool {
        true
    }

    fn prerolls(&self) -> bool {
        true
    }

    /// Name usable as the last classname component.
    fn clean_name(&self) -> String;

    fn is_compatible(&self, scenario: Option<&Scenario>) -> bool {
        let scenario = match scenario {
            Some(scenario) => scenario,
            None => return true,
        };

        if scenario.seeks() && (!self.is_seekable() || self.is_image()) {
            debug!(
                "Do not run {} as {} does not support seeking",
                scenario.name(),
                self.uri()
            );
            return false;
        }
        if self.is_image() && scenario.needs_clock_sync() {
            debug!("Do not run {} as {} is an image", scenario.name(), self.uri());
            return false;
        }
        if !self.can_play_reverse() && scenario.does_reverse_playback() {
            debug!(
                "Do not run {} as {} can not be played backward",
                scenario.name(),
                self.uri()
            );
            return false;
        }
        if !self.is_live() && scenario.needs_live_content() {
            debug!("Do not run {} as {} is not a live content", scenario.name(), self.uri());
            return false;
        }
        if self.is_live() && !scenario.compatible_with_live_content() {
            debug!("Do not run {} as {} is a live content", scenario.name(), self.uri());
            return false;
        }
        if !self.prerolls() && scenario.needs_preroll() {
            debug!("Do not run {} as {} does not preroll", scenario.name(), self.uri());
            return false;
        }

        let duration = self.duration();
        if duration > 0 {
            let seconds = duration as f64 / NANOS_PER_SECOND as f64;
            if seconds < scenario.min_media_duration() {
                debug!(
                    "Do not run {} as {} is too short ({} < min media duration: {})",
                    scenario.name(),
                    self.uri(),
                    seconds,
                    scenario.min_media_duration()
                );
                return false;
            }
        }

        for track_type in TrackType::CONSTRAINED.iter() {
            let needed = scenario.min_tracks(*track_type);
            if self.num_tracks(*track_type) < needed {
                debug!(
                    "{} -- {} | At least {} {} track needed < {}",
                    scenario.name(),
                    self.uri(),
                    needed,
                    track_type,
                    self.num_tracks(*track_type)
                );
                return false;
            }
        }

        true
    }
}

/// Media described by a media info XML file.
#[derive(Debug, Clone)]
pub struct ValidateMediaDescriptor {
    sidecar: PathBuf,
    uri: String,
    protocol: Protocol,
    duration: u64,
    seekable: bool,
    live: bool,
    image: bool,
    frame_detection: bool,
    skip_parsers: bool,
    caps: String,
    tracks: Vec<(TrackType, String)>,
}

impl ValidateMediaDescriptor {
    pub fn load(sidecar: &Path) -> Result<Self, Error> {
        let text = fs::read_to_string(sidecar).map_err(|e| Error::io(sidecar, e))?;
        Self::from_xml(sidecar, &text)
    }

    pub fn from_xml(sidecar: &Path, text: &str) -> Result<Self, Error> {
        let package = parser::parse(text).map_err(|errors| Error::Xml {
            path: sidecar.to_path_buf(),
            reason: format!("{:?}", errors),
        })?;
        let document = package.as_document();
        let xpath = |expression: &str| {
            evaluate_xpath(&document, expression).map_err(|err| Error::Xml {
                path: sidecar.to_path_buf(),
                reason: err.to_string(),
            })
        };
        let missing = |attribute: &str| Error::MediaInfo {
            path: sidecar.to_path_buf(),
            reason: format!("missing '{}' attribute", attribute),
        };
        let attribute = |name: &str| -> Result<Option<String>, Error> {
            match xpath(&format!("/*/@{}", name))? {
                Value::Nodeset(nodes) if nodes.size() == 0 => Ok(None),
                value => Ok(Some(value.string())),
            }
        };

        let uri = attribute("uri")?.ok_or_else(|| missing("uri"))?;
        let duration = attribute("duration")?
            .ok_or_else(|| missing("duration"))?
            .trim()
            .parse::<u64>()
            .map_err(|err| Error::MediaInfo {
                path: sidecar.to_path_buf(),
                reason: format!("invalid duration: {}", err),
            })?;
        let seekable = attribute("seekable")?
            .ok_or_else(|| missing("seekable"))?
            .eq_ignore_ascii_case("true");
        let live = attribute("live")?
            .map(|value| value.eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        let frame_detection = attribute("frame-detection")?
            .and_then(|value| flag::parse(&value))
            .unwrap_or(false);
        let skip_parsers = attribute("skip-parsers")?
            .and_then(|value| flag::parse(&value))
            .unwrap_or(false);
        let caps = xpath("/*/streams/@caps")?.string();

        let mut tracks = Vec::new();
        if let Value::Nodeset(nodes) = xpath("/*/streams/stream")? {
            for node in nodes.document_order() {
                if let Some(element) = node.element() {
                    let track_type = element.attribute_value("type").unwrap_or_default();
                    let track_caps = element.attribute_value("caps").unwrap_or_default();
                    tracks.push((TrackType::from(track_type), track_caps.to_owned()));
                }
            }
        }
        let image = tracks.iter().any(|(track_type, _)| *track_type == TrackType::Image);

        let mut descriptor = Self {
            sidecar: sidecar.to_path_buf(),
            protocol: attribute("protocol")?
                .unwrap_or_else(|| uri_scheme(&uri).to_owned())
                .parse()
                .unwrap_or(Protocol::File),
            uri,
            duration,
            seekable,
            live,
            image,
            frame_detection,
            skip_parsers,
            caps,
            tracks,
        };
        descriptor.relocate();
        if sidecar.to_string_lossy().ends_with(PUSH_MEDIA_INFO_EXT) {
            descriptor.protocol = Protocol::PushFile;
        }
        Ok(descriptor)
    }

    /// Media info files travel with their media, so a stale `file://` uri is
    /// pointed back at the file sitting next to the sidecar.
    fn relocate(&mut self) {
        if uri_scheme(&self.uri) != "file" {
            return;
        }
        let recorded = uri_to_path(&self.uri);
        let local = self.media_filepath();
        if !recorded.exists() && local.exists() {
            self.uri = path_to_uri(&local);
        }
    }

    /// Runs the media-check tool on `uri` and loads what it wrote.
    pub fn generate(
        uri: &str,
        binary: &Path,
        sidecar: &Path,
        include_frames: bool,
    ) -> Result<Self, Error> {
        let mut command = Command::new(binary);
        command.arg(uri).arg("--output-file").arg(sidecar);
        if include_frames {
            command.arg("--full");
        }
        info!("Generating media info for {}", uri);
        let status = command
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|source| Error::Spawn {
                program: binary.display().to_string(),
                source,
            })?;
        if !status.success() {
            return Err(Error::MediaInfo {
                path: sidecar.to_path_buf(),
                reason: format!("media check exited with {}", status),
            });
        }
        Self::load(sidecar)
    }

    /// The media file the sidecar describes.
    pub fn media_filepath(&self) -> PathBuf {
        let name = self.sidecar.to_string_lossy();
        strip_sidecar_extension(&name)
            .map(PathBuf::from)
            .unwrap_or_else(|| self.sidecar.clone())
    }

    pub fn has_frames(&self) -> bool {
        self.frame_detection
    }

    pub fn skip_parsers(&self) -> bool {
        self.skip_parsers
    }

    pub fn caps(&self) -> &str {
        &self.caps
    }

    pub fn tracks_caps(&self) -> &[(TrackType, String)] {
        &self.tracks
    }
}

impl MediaDescriptor for ValidateMediaDescriptor {
    fn uri(&self) -> &str {
        &self.uri
    }

    fn path(&self) -> Option<&Path> {
        Some(&self.sidecar)
    }

    fn protocol(&self) -> Protocol {
        self.protocol.clone()
    }

    fn duration(&self) -> u64 {
        self.duration
    }

    fn is_seekable(&self) -> bool {
        self.seekable
    }

    fn is_live(&self) -> bool {
        self.live
    }

    fn is_image(&self) -> bool {
        self.image
    }

    fn num_tracks(&self, track_type: TrackType) -> u32 {
        self.tracks.iter().filter(|(t, _)| *t == track_type).count() as u32
    }

    fn clean_name(&self) -> String {
        let name = self
            .sidecar
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        strip_sidecar_extension(&name)
            .unwrap_or(&name)
            .replace('.', "_")
    }
}

/// Media description written by hand for launch lines.
#[derive(Debug, Clone)]
pub struct FakeMediaDescriptor {
    info: FakeMediaInfo,
    name: String,
}

impl FakeMediaDescriptor {
    pub fn new(name: &str, info: FakeMediaInfo) -> Self {
        Self {
            info,
            name: name.to_owned(),
        }
    }
}

impl MediaDescriptor for FakeMediaDescriptor {
    fn uri(&self) -> &str {
        &self.info.uri
    }

    fn path(&self) -> Option<&Path> {
        None
    }

    fn protocol(&self) -> Protocol {
        self.info
            .protocol
            .as_deref()
            .unwrap_or_else(|| uri_scheme(&self.info.uri))
            .parse()
            .unwrap_or(Protocol::File)
    }

    fn duration(&self) -> u64 {
        self.info.duration.as_nanos() as u64
    }

    fn is_seekable(&self) -> bool {
        self.info.seekable
    }

    fn is_live(&self) -> bool {
        self.info.live
    }

    fn is_image(&self) -> bool {
        self.info.image
    }

    fn num_tracks(&self, track_type: TrackType) -> u32 {
        self.info
            .tracks
            .iter()
            .filter(|name| TrackType::from(name.as_str()) == track_type)
            .count() as u32
    }

    fn clean_name(&self) -> String {
        self.name.replace('.', "_")
    }
}

/// A media the generators can run tests on.
#[derive(Debug, Clone)]
pub struct MediaResource {
    pub uri: String,
    pub descriptor: Arc<dyn MediaDescriptor>,
    pub special_scenarios: Vec<Arc<Scenario>>,
}

/// Finds media info files under the media directories, generating the
/// missing ones when the media-check tool is available.
#[derive(Debug, Default)]
pub struct MediaCatalog {
    media_check: Option<PathBuf>,
    update: bool,
}

impl MediaCatalog {
    pub fn new(media_check: Option<PathBuf>, update: bool) -> Self {
        Self {
            media_check,
            update,
        }
    }

    pub fn scan(&self, paths: &[PathBuf], registry: &mut ScenarioRegistry) -> Vec<MediaResource> {
        let mut sidecars = Vec::new();
        let mut media_files = Vec::new();
        for root in paths {
            for entry in WalkDir::new(root)
                .follow_links(true)
                .into_iter()
                .filter_map(Result::ok)
                .filter(|entry| entry.file_type().is_file())
            {
                let path = entry.into_path();
                let name = path.to_string_lossy().into_owned();
                if SIDECAR_EXTENSIONS.iter().any(|ext| name.ends_with(ext)) {
                    sidecars.push(path);
                } else if is_media_file(&path) {
                    media_files.push(path);
                }
            }
        }

        if let Some(binary) = &self.media_check {
            for media in &media_files {
                let has_sidecar = SIDECAR_EXTENSIONS
                    .iter()
                    .any(|ext| sidecar_path(media, ext).exists());
                if has_sidecar {
                    continue;
                }
                let sidecar = sidecar_path(media, MEDIA_INFO_EXT);
                match ValidateMediaDescriptor::generate(&path_to_uri(media), binary, &sidecar, false) {
                    Ok(_) => sidecars.push(sidecar),
                    Err(err) => warn!("Could not describe {}: {}", media.display(), err),
                }
            }
        }

        sidecars.sort();
        sidecars.dedup();
        let mut resources = Vec::new();
        for sidecar in sidecars {
            if sidecar.to_string_lossy().ends_with(SKIPPED_MEDIA_INFO_EXT) {
                debug!("Skipping {}", sidecar.display());
                continue;
            }
            let descriptor = match self.load_sidecar(&sidecar) {
                Ok(descriptor) => descriptor,
                Err(err) => {
                    warn!("Ignoring {}: {}", sidecar.display(), err);
                    continue;
                }
            };
            let special_scenarios = registry.find_special_scenarios(&descriptor.media_filepath());
            resources.push(MediaResource {
                uri: descriptor.uri().to_owned(),
                descriptor: Arc::new(descriptor),
                special_scenarios,
            });
        }
        resources.sort_by(|a, b| a.uri.cmp(&b.uri));
        resources
    }

    fn load_sidecar(&self, sidecar: &Path) -> Result<ValidateMediaDescriptor, Error> {
        let current = ValidateMediaDescriptor::load(sidecar)?;
        match (&self.media_check, self.update) {
            (Some(binary), true) if current.protocol() != Protocol::PushFile => {
                let include_frames = current.has_frames();
                ValidateMediaDescriptor::generate(current.uri(), binary, sidecar, include_frames)
            }
            _ => Ok(current),
        }
    }
}

fn is_media_file(path: &Path) -> bool {
    path.extension()
        .map(|ext| {
            let ext = ext.to_string_lossy().to_ascii_lowercase();
            MEDIA_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

fn sidecar_path(media: &Path, ext: &str) -> PathBuf {
    let mut name = media.as_os_str().to_owned();
    name.push(".");
    name.push(ext);
    PathBuf::from(name)
}

fn strip_sidecar_extension(name: &str) -> Option<&str> {
    SIDECAR_EXTENSIONS
        .iter()
        .find_map(|ext| name.strip_suffix(ext).and_then(|rest| rest.strip_suffix('.')))
}

/// Scheme of an uri, empty when there is none.
pub fn uri_scheme(uri: &str) -> &str {
    match uri.find(':') {
        Some(index)
            if index > 0
                && uri[..index]
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '-' || c == '.') =>
        {
            &uri[..index]
        }
        _ => "",
    }
}

pub fn path_to_uri(path: &Path) -> String {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|dir| dir.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };
    let mut uri = String::from("file://");
    let text = absolute.to_string_lossy().replace('\\', "/");
    if !text.starts_with('/') {
        uri.push('/');
    }
    for byte in text.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' | b'/' | b':' => {
                uri.push(byte as char)
            }
            _ => uri.push_str(&format!("%{:02X}", byte)),
        }
    }
    uri
}

pub fn uri_to_path(uri: &str) -> PathBuf {
    let rest = uri.splitn(2, "://").nth(1).unwrap_or(uri);
    let path = match rest.find('/') {
        Some(index) => &rest[index..],
        None => rest,
    };
    let bytes = path.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok();
            if let Some(byte) = hex.and_then(|hex| u8::from_str_radix(hex, 16).ok()) {
                decoded.push(byte);
                i += 3;
                continue;
            }
        }
        decoded.push(bytes[i]);
        i += 1;
    }
    let path = String::from_utf8_lossy(&decoded).into_owned();
    if cfg!(windows) {
        PathBuf::from(path.trim_start_matches('/'))
    } else {
        PathBuf::from(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    const MEDIA_INFO: &str = r#"<file duration="10000000000" frame-detection="0" uri="file:///nowhere/clip.webm" seekable="true">
  <streams caps="video/webm">
    <stream type="audio" caps="audio/x-vorbis"/>
    <stream type="video" caps="video/x-vp8"/>
  </streams>
</file>"#;

    fn scenario(props: &[(&str, &str)]) -> Scenario {
        Scenario::new("test", props.iter().copied(), None)
    }

    fn descriptor() -> ValidateMediaDescriptor {
        ValidateMediaDescriptor::from_xml(Path::new("/media/clip.webm.media_info"), MEDIA_INFO)
            .unwrap()
    }

    #[test]
    fn test_parse_media_info() {
        let media = descriptor();
        assert_eq!(media.uri(), "file:///nowhere/clip.webm");
        assert_eq!(media.protocol(), Protocol::File);
        assert_eq!(media.duration(), 10 * NANOS_PER_SECOND as u64);
        assert!(media.is_seekable());
        assert!(!media.is_live());
        assert!(!media.is_image());
        assert!(!media.has_frames());
        assert_eq!(media.caps(), "video/webm");
        assert_eq!(media.num_tracks(TrackType::Audio), 1);
        assert_eq!(media.num_tracks(TrackType::Video), 1);
        assert_eq!(media.num_tracks(TrackType::Subtitle), 0);
        assert_eq!(media.clean_name(), "clip_webm");
        assert_eq!(media.media_filepath(), PathBuf::from("/media/clip.webm"));
    }

    #[test]
    fn test_push_sidecar_forces_pushfile() {
        let media =
            ValidateMediaDescriptor::from_xml(Path::new("/media/clip.webm.media_info.push"), MEDIA_INFO)
                .unwrap();
        assert_eq!(media.protocol(), Protocol::PushFile);
        assert_eq!(media.clean_name(), "clip_webm");
    }

    #[test]
    fn test_invalid_media_info() {
        let path = Path::new("/media/broken.media_info");
        assert!(matches!(
            ValidateMediaDescriptor::from_xml(path, "<file"),
            Err(Error::Xml { .. })
        ));
        assert!(matches!(
            ValidateMediaDescriptor::from_xml(path, "<file uri=\"file:///a\"/>"),
            Err(Error::MediaInfo { .. })
        ));
    }

    #[test]
    fn test_compatibility() {
        let media = descriptor();
        assert!(media.is_compatible(None));
        assert!(media.is_compatible(Some(&Scenario::none())));
        assert!(media.is_compatible(Some(&scenario(&[("seek", "true")]))));
        assert!(!media.is_compatible(Some(&scenario(&[("min-media-duration", "15")]))));
        assert!(media.is_compatible(Some(&scenario(&[("min-media-duration", "5")]))));
        assert!(!media.is_compatible(Some(&scenario(&[("min-subtitle-track", "1")]))));
        assert!(!media.is_compatible(Some(&scenario(&[("live-content-required", "true")]))));
    }

    #[test]
    fn test_fake_media_compatibility() {
        let info = FakeMediaInfo {
            uri: "videotestsrc://".to_owned(),
            duration: Duration::default(),
            seekable: false,
            live: true,
            tracks: vec!["video".to_owned()],
            ..FakeMediaInfo::default()
        };
        let media = FakeMediaDescriptor::new("video.src", info);
        assert_eq!(media.protocol(), Protocol::Other("videotestsrc".to_owned()));
        assert_eq!(media.clean_name(), "video_src");
        assert!(!media.is_compatible(Some(&scenario(&[("seek", "1")]))));
        assert!(!media.is_compatible(Some(&scenario(&[]))));
        assert!(media.is_compatible(Some(&scenario(&[("live-content-compatible", "1")]))));
        // unknown duration never rejects
        assert!(media.is_compatible(Some(&scenario(&[
            ("live-content-required", "yes"),
            ("min-media-duration", "100"),
        ]))));
    }

    #[test]
    fn test_image_rejects_clock_sync() {
        let info = FakeMediaInfo {
            uri: "file:///tmp/picture.png".to_owned(),
            image: true,
            tracks: vec!["image".to_owned()],
            ..FakeMediaInfo::default()
        };
        let media = FakeMediaDescriptor::new("picture", info);
        assert!(!media.is_compatible(Some(&scenario(&[("need-clock-sync", "true")]))));
        assert!(!media.is_compatible(Some(&scenario(&[("seek", "true")]))));
    }

    #[test]
    fn test_uri_conversions() {
        assert_eq!(uri_scheme("hls://example.com/x.m3u8"), "hls");
        assert_eq!(uri_scheme("/no/scheme"), "");
        let uri = path_to_uri(Path::new("/media/my clip.webm"));
        assert_eq!(uri, "file:///media/my%20clip.webm");
        assert_eq!(uri_to_path(&uri), PathBuf::from("/media/my clip.webm"));
    }

    #[test]
    fn test_scan_media_directory() {
        let dir = tempfile::tempdir().unwrap();
        let media_path = dir.path().join("clip.webm");
        fs::write(&media_path, b"not really webm").unwrap();
        fs::write(dir.path().join("clip.webm.media_info"), MEDIA_INFO).unwrap();
        fs::write(dir.path().join("other.ogg.media_info.skipped"), MEDIA_INFO).unwrap();

        let mut registry = ScenarioRegistry::with_scenarios(Vec::new());
        let resources = MediaCatalog::new(None, false).scan(&[dir.path().to_path_buf()], &mut registry);
        assert_eq!(resources.len(), 1);
        assert_eq!(resources[0].uri, path_to_uri(&media_path));
        assert!(resources[0].special_scenarios.is_empty());
    }
}
