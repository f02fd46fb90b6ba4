//! Scenarios are named bundles of execution parameters owned by the validation
//! tool. The tool dumps their definitions as an INI file which is parsed here
//! into a registry passed to every test generator.

use crate::app::error::Error;
use crate::app::media::TrackType;
use crate::configuration::deserialize::flag;
use ini::Ini;
use regex::Regex;
use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::time::Duration;

pub const FILE_EXTENSION: &str = "scenario";
const NONE: &str = "none";

#[derive(Debug, Clone, PartialEq)]
pub struct Scenario {
    name: String,
    path: Option<PathBuf>,
    props: BTreeMap<String, String>,
}

impl Scenario {
    pub fn new<I, K, V>(name: impl Into<String>, props: I, path: Option<PathBuf>) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let props = props
            .into_iter()
            .map(|(key, value)| (key.as_ref().to_ascii_lowercase().replace('-', "_"), value.into()))
            .collect();
        Self {
            name: name.into(),
            path,
            props,
        }
    }

    /// The pseudo scenario meaning "just run the pipeline".
    pub fn none() -> Self {
        Self::new(NONE, Vec::<(String, String)>::new(), None)
    }

    pub fn is_none(&self) -> bool {
        self.name.eq_ignore_ascii_case(NONE)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// What to hand to the validation tool to select this scenario.
    pub fn execution_name(&self) -> String {
        match &self.path {
            Some(path) => path.display().to_string(),
            None => self.name.clone(),
        }
    }

    pub fn prop(&self, key: &str) -> Option<&str> {
        self.props.get(key).map(String::as_str)
    }

    fn flag(&self, key: &str) -> bool {
        self.prop(key).and_then(flag::parse).unwrap_or(false)
    }

    fn number(&self, key: &str) -> Option<f64> {
        self.prop(key).and_then(|value| value.trim().parse::<f64>().ok())
    }

    pub fn seeks(&self) -> bool {
        self.flag("seek")
    }

    pub fn needs_clock_sync(&self) -> bool {
        self.flag("need_clock_sync")
    }

    pub fn needs_live_content(&self) -> bool {
        self.flag("live_content_required")
    }

    pub fn compatible_with_live_content(&self) -> bool {
        self.needs_live_content() || self.flag("live_content_compatible")
    }

    pub fn needs_preroll(&self) -> bool {
        self.flag("needs_preroll")
    }

    pub fn does_reverse_playback(&self) -> bool {
        self.flag("reverse_playback")
    }

    /// Minimum media duration in seconds.
    pub fn min_media_duration(&self) -> f64 {
        self.number("min_media_duration").unwrap_or(0.0)
    }

    pub fn duration(&self) -> Duration {
        self.number("duration")
            .filter(|secs| secs.is_finite() && *secs > 0.0)
            .map(Duration::from_secs_f64)
            .unwrap_or_default()
    }

    pub fn min_tracks(&self, track_type: TrackType) -> u32 {
        self.number(&format!("min_{}_track", track_type))
            .map(|count| count.max(0.0) as u32)
            .unwrap_or(0)
    }
}

/// Parses a scenario definitions dump into scenarios.
///
/// When `paths` is empty every section is a system scenario named after the
/// file stem of the section. Otherwise only sections matching one of `paths`
/// are kept and, for media specific scenarios (`<media>.<NAME>.scenario`),
/// the name is `NAME`.
pub fn scenarios_from_definitions(
    text: &str,
    paths: &[PathBuf],
    media_file: Option<&Path>,
) -> Result<Vec<Scenario>, Error> {
    let ini = Ini::load_from_str_noescape(text)
        .map_err(|err| Error::ScenarioDiscovery(err.to_string()))?;
    let suffix = format!(".{}", FILE_EXTENSION);
    let mut scenarios = Vec::new();

    for (section, props) in ini.iter() {
        let section = match section {
            Some(section) => section,
            None => continue,
        };
        let props = props.iter().map(|(k, v)| (k.to_owned(), v.to_owned()));
        if paths.is_empty() {
            let name = file_name(section).trim_end_matches(&suffix).to_owned();
            scenarios.push(Scenario::new(name, props, None));
            continue;
        }

        let path = match paths.iter().find(|path| Path::new(section) == path.as_path()) {
            Some(path) => path,
            None => {
                warn!("Ignoring scenario definition '{}' that was not asked for", section);
                continue;
            }
        };
        let mut name = file_name(section).trim_end_matches(&suffix).to_owned();
        if let Some(media) = media_file.and_then(Path::file_name) {
            let prefix = format!("{}.", media.to_string_lossy());
            name = name.trim_start_matches(&prefix).to_owned();
        }
        scenarios.push(Scenario::new(name, props, Some(path.clone())));
    }

    Ok(scenarios)
}

fn file_name(section: &str) -> &str {
    section.rsplit(|c| c == '/' || c == '\\').next().unwrap_or(section)
}

/// All scenarios known to a launcher run.
#[derive(Debug)]
pub struct ScenarioRegistry {
    binary: Option<PathBuf>,
    workdir: PathBuf,
    system: Vec<Arc<Scenario>>,
    special: HashMap<PathBuf, Arc<Scenario>>,
    discovered: bool,
}

impl ScenarioRegistry {
    /// `binary` is the validation tool dumping definitions; `workdir` receives
    /// the dump and the discovery log.
    pub fn new(binary: Option<PathBuf>, workdir: &Path) -> Self {
        Self {
            binary,
            workdir: workdir.to_path_buf(),
            system: Vec::new(),
            special: HashMap::new(),
            discovered: false,
        }
    }

    /// A registry that never shells out, seeded with known scenarios.
    pub fn with_scenarios(scenarios: Vec<Scenario>) -> Self {
        Self {
            binary: None,
            workdir: PathBuf::new(),
            system: scenarios.into_iter().map(Arc::new).collect(),
            special: HashMap::new(),
            discovered: true,
        }
    }

    /// Asks the validation tool for scenario definitions, system ones when
    /// `paths` is empty.
    pub fn discover(
        &mut self,
        paths: &[PathBuf],
        media_file: Option<&Path>,
    ) -> Result<Vec<Arc<Scenario>>, Error> {
        let binary = self
            .binary
            .clone()
            .ok_or_else(|| Error::ScenarioDiscovery("validation tool not found".to_owned()))?;
        fs::create_dir_all(&self.workdir).map_err(|e| Error::io(&self.workdir, e))?;
        let defs = self.workdir.join("scenarios.def");
        let log_path = self.workdir.join("scenarios_discovery.log");
        let log = File::create(&log_path).map_err(|e| Error::io(&log_path, e))?;
        let log_err = log.try_clone().map_err(|e| Error::io(&log_path, e))?;

        debug!("Discovering scenarios {:?} with {}", paths, binary.display());
        let status = Command::new(&binary)
            .arg("--scenarios-defs-output-file")
            .arg(&defs)
            .args(paths)
            .stdin(Stdio::null())
            .stdout(log)
            .stderr(log_err)
            .status()
            .map_err(|source| Error::Spawn {
                program: binary.display().to_string(),
                source,
            })?;
        if !status.success() {
            error!(
                "Scenario discovery exited with {}, see {}",
                status,
                log_path.display()
            );
        }

        let text = fs::read_to_string(&defs).map_err(|e| Error::io(&defs, e))?;
        let scenarios: Vec<Arc<Scenario>> = scenarios_from_definitions(&text, paths, media_file)?
            .into_iter()
            .map(Arc::new)
            .collect();

        if paths.is_empty() {
            self.discovered = true;
            self.system.extend(scenarios.iter().cloned());
        } else {
            for scenario in &scenarios {
                if let Some(path) = scenario.path() {
                    self.special.insert(path.to_path_buf(), Arc::clone(scenario));
                }
            }
        }
        Ok(scenarios)
    }

    fn ensure_discovered(&mut self) {
        if self.discovered {
            return;
        }
        if let Err(err) = self.discover(&[], None) {
            warn!("Could not discover system scenarios: {}", err);
        }
        self.discovered = true;
    }

    /// Finds a scenario by name, discovering on first use. An absolute path
    /// to a `.scenario` file is discovered on its own.
    pub fn lookup(&mut self, name: &str) -> Option<Arc<Scenario>> {
        let path = Path::new(name);
        if path.is_absolute() && name.ends_with(FILE_EXTENSION) {
            if let Some(scenario) = self.special.get(path) {
                return Some(Arc::clone(scenario));
            }
            match self.discover(&[path.to_path_buf()], None) {
                Ok(scenarios) => return scenarios.into_iter().next(),
                Err(err) => {
                    warn!("Could not load scenario {}: {}", name, err);
                    return None;
                }
            }
        }

        self.ensure_discovered();
        let found = self.get(name);
        if found.is_none() {
            warn!("Scenario: {} not found", name);
        }
        found
    }

    /// Lookup among what is already known.
    pub fn get(&self, name: &str) -> Option<Arc<Scenario>> {
        if name.eq_ignore_ascii_case(NONE) {
            return Some(Arc::new(Scenario::none()));
        }
        self.system
            .iter()
            .find(|scenario| scenario.name() == name)
            .cloned()
            .or_else(|| self.special.get(Path::new(name)).cloned())
    }

    pub fn all(&mut self) -> &[Arc<Scenario>] {
        self.ensure_discovered();
        &self.system
    }

    /// Scenarios written for one media file, `<media>.<NAME>.scenario` next to it.
    pub fn find_special_scenarios(&mut self, media_file: &Path) -> Vec<Arc<Scenario>> {
        let (dir, base) = match (media_file.parent(), media_file.file_name()) {
            (Some(dir), Some(base)) => (dir, base.to_string_lossy().into_owned()),
            _ => return Vec::new(),
        };
        let pattern = format!(r"^{}\..*\.{}$", regex::escape(&base), FILE_EXTENSION);
        let regex = match Regex::new(&pattern) {
            Ok(regex) => regex,
            Err(_) => return Vec::new(),
        };
        let mut paths: Vec<PathBuf> = match fs::read_dir(dir) {
            Ok(entries) => entries
                .filter_map(Result::ok)
                .map(|entry| entry.path())
                .filter(|path| {
                    path.file_name()
                        .map(|name| regex.is_match(&name.to_string_lossy()))
                        .unwrap_or(false)
                })
                .collect(),
            Err(_) => return Vec::new(),
        };
        if paths.is_empty() {
            return Vec::new();
        }
        paths.sort();

        match self.discover(&paths, Some(media_file)) {
            Ok(scenarios) => scenarios,
            Err(err) => {
                warn!("Could not load scenarios for {}: {}", media_file.display(), err);
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEFS: &str = r#"
[play_15s]
description=Play for 15 seconds
duration=15.0
need-clock-sync=true
min-media-duration=15

[/usr/share/gstreamer-1.0/validate/scenarios/seek_forward.scenario]
seek=true
min-audio-track=1
reverse-playback=false
"#;

    #[test]
    fn test_parse_system_definitions() {
        let scenarios = scenarios_from_definitions(DEFS, &[], None).unwrap();
        assert_eq!(scenarios.len(), 2);

        let play = &scenarios[0];
        assert_eq!(play.name(), "play_15s");
        assert_eq!(play.execution_name(), "play_15s");
        assert_eq!(play.duration(), Duration::from_secs(15));
        assert!(play.needs_clock_sync());
        assert!(!play.seeks());
        assert_eq!(play.min_media_duration(), 15.0);

        let seek = &scenarios[1];
        assert_eq!(seek.name(), "seek_forward");
        assert!(seek.seeks());
        assert_eq!(seek.min_tracks(TrackType::Audio), 1);
        assert_eq!(seek.min_tracks(TrackType::Video), 0);
        assert!(!seek.does_reverse_playback());
    }

    #[test]
    fn test_parse_media_specific_definitions() {
        let path = PathBuf::from("/media/clip.webm.seek_at_end.scenario");
        let text = "[/media/clip.webm.seek_at_end.scenario]\nseek=1\n\n[/other.scenario]\nseek=0\n";
        let scenarios = scenarios_from_definitions(
            text,
            &[path.clone()],
            Some(Path::new("/media/clip.webm")),
        )
        .unwrap();
        assert_eq!(scenarios.len(), 1);
        assert_eq!(scenarios[0].name(), "seek_at_end");
        assert_eq!(scenarios[0].path(), Some(path.as_path()));
        assert_eq!(scenarios[0].execution_name(), path.display().to_string());
        assert!(scenarios[0].seeks());
    }

    #[test]
    fn test_registry_lookup() {
        let scenarios = scenarios_from_definitions(DEFS, &[], None).unwrap();
        let mut registry = ScenarioRegistry::with_scenarios(scenarios);
        assert_eq!(registry.lookup("play_15s").unwrap().name(), "play_15s");
        assert!(registry.lookup("None").unwrap().is_none());
        assert!(registry.lookup("does_not_exist").is_none());
        assert_eq!(registry.all().len(), 2);
    }

    #[test]
    fn test_discovery_without_tool_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut registry = ScenarioRegistry::new(None, dir.path());
        assert!(matches!(
            registry.discover(&[], None),
            Err(Error::ScenarioDiscovery(_))
        ));
        assert!(registry.lookup("play_15s").is_none());
    }
}
