//! Test generators cross media resources, scenarios and encoding formats into
//! concrete tests.

use crate::app::classify::{EncodedFileClassifier, ExpectedCaps, ValidateLogClassifier};
use crate::app::error::Error;
use crate::app::media::{path_to_uri, FakeMediaDescriptor, MediaDescriptor, MediaResource, Protocol, TrackType};
use crate::app::probe::{FileSizeProbe, PositionProbe};
use crate::app::scenario::{Scenario, ScenarioRegistry};
use crate::app::test::Test;
use crate::configuration::constants::binaries;
use crate::configuration::manifest::{EncodingFormat, PipelineEntry};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Everything generators build tests from.
pub struct GenerationInput<'a> {
    pub resources: &'a [MediaResource],
    /// General scenarios, crossed with every resource.
    pub scenarios: &'a [Arc<Scenario>],
    pub encoding_formats: &'a [EncodingFormat],
    pub pipelines: &'a [PipelineEntry],
    pub registry: &'a ScenarioRegistry,
    pub logsdir: &'a Path,
    pub timeout: Duration,
    pub binaries: &'a BTreeMap<String, PathBuf>,
}

impl<'a> GenerationInput<'a> {
    pub fn binary(&self, name: &str) -> Result<&'a Path, Error> {
        self.binaries
            .get(name)
            .map(PathBuf::as_path)
            .ok_or_else(|| Error::MissingBinary(name.to_owned()))
    }
}

/// Receives generated tests.
pub trait TestSink {
    fn add_test(&mut self, test: Test);
}

impl TestSink for Vec<Test> {
    fn add_test(&mut self, test: Test) {
        self.push(test);
    }
}

pub trait TestsGenerator: fmt::Debug {
    fn name(&self) -> &str;

    fn populate(&self, input: &GenerationInput<'_>, sink: &mut dyn TestSink) -> Result<(), Error>;
}

fn build(builder: crate::app::test::TestBuilder) -> Result<Test, Error> {
    builder.build().map_err(Error::Builder)
}

/// `None` for the pseudo scenario.
fn real_scenario(scenario: &Arc<Scenario>) -> Option<Arc<Scenario>> {
    if scenario.is_none() {
        None
    } else {
        Some(Arc::clone(scenario))
    }
}

/// Plays every media with every compatible scenario.
#[derive(Debug, Default)]
pub struct PlaybackGenerator;

impl TestsGenerator for PlaybackGenerator {
    fn name(&self) -> &str {
        "playback"
    }

    fn populate(&self, input: &GenerationInput<'_>, sink: &mut dyn TestSink) -> Result<(), Error> {
        let binary = input.binary(binaries::VALIDATE)?;
        for resource in input.resources {
            let media = &resource.descriptor;
            let protocol = media.protocol();
            let uri = match protocol {
                Protocol::PushFile => resource.uri.replacen("file://", "pushfile://", 1),
                _ => resource.uri.clone(),
            };
            for scenario in input.scenarios.iter().chain(resource.special_scenarios.iter()) {
                let scenario = real_scenario(scenario);
                if !media.is_compatible(scenario.as_deref()) {
                    continue;
                }
                let scenario_name = scenario
                    .as_ref()
                    .map(|scenario| scenario.name().to_owned())
                    .unwrap_or_else(|| "none".to_owned());
                let duration = match &scenario {
                    Some(scenario) if scenario.duration().as_nanos() > 0 => scenario.duration(),
                    _ => Duration::from_nanos(media.duration()),
                };
                let test = build(
                    Test::builder()
                        .application(binary)
                        .classname(format!(
                            "{}.{}.{}.{}",
                            protocol,
                            self.name(),
                            scenario_name,
                            media.clean_name()
                        ))
                        .args(vec!["playbin3".to_owned(), format!("uri={}", uri)])
                        .scenario(scenario)
                        .media(Some(Arc::clone(media)))
                        .duration(duration)
                        .timeout(input.timeout),
                )?
                .with_probe(PositionProbe::default())
                .with_classifier(ValidateLogClassifier::default());
                sink.add_test(test);
            }
        }
        Ok(())
    }
}

fn format_caps(name: &str) -> &str {
    match name {
        "aac" => "audio/mpeg,mpegversion=4",
        "ac3" => "audio/x-ac3",
        "vorbis" => "audio/x-vorbis",
        "mp3" => "audio/mpeg,mpegversion=1,layer=3",
        "opus" => "audio/x-opus",
        "rawaudio" => "audio/x-raw",
        "h264" => "video/x-h264",
        "h265" => "video/x-h265",
        "vp8" => "video/x-vp8",
        "vp9" => "video/x-vp9",
        "theora" => "video/x-theora",
        "prores" => "video/x-prores",
        "jpeg" => "image/jpeg",
        "webm" => "video/webm",
        "ogg" => "application/ogg",
        "mkv" => "video/x-matroska",
        "mp4" => "video/quicktime,variant=iso",
        "quicktime" => "video/quicktime",
        other => other,
    }
}

/// Caps the output of `format` must carry for a media with the given tracks.
pub fn expected_caps(format: &EncodingFormat, has_video: bool, has_audio: bool) -> ExpectedCaps {
    ExpectedCaps {
        container: format_caps(&format.container).to_owned(),
        video: Some(format_caps(&format.video).to_owned()).filter(|_| has_video),
        audio: Some(format_caps(&format.audio).to_owned()).filter(|_| has_audio),
    }
}

/// Encoding profile of `format` for a media with the given tracks.
pub fn encoding_profile(format: &EncodingFormat, has_video: bool, has_audio: bool) -> String {
    let mut profile = format_caps(&format.container).to_owned();
    profile.push(':');
    if has_video {
        profile.push_str(format_caps(&format.video));
    }
    if has_audio {
        profile.push(':');
        profile.push_str(format_caps(&format.audio));
    }
    profile.replace("::", ":")
}

/// Transcodes every media into every encoding format.
#[derive(Debug, Default)]
pub struct TranscodingGenerator;

impl TestsGenerator for TranscodingGenerator {
    fn name(&self) -> &str {
        "transcode"
    }

    fn populate(&self, input: &GenerationInput<'_>, sink: &mut dyn TestSink) -> Result<(), Error> {
        let binary = input.binary(binaries::TRANSCODING)?;
        let media_check = input.binary(binaries::MEDIA_CHECK)?;
        for resource in input.resources {
            let media = &resource.descriptor;
            if media.is_image() || media.is_live() {
                continue;
            }
            let has_video = media.num_tracks(TrackType::Video) > 0;
            let has_audio = media.num_tracks(TrackType::Audio) > 0;
            for format in input.encoding_formats {
                let classname = format!(
                    "{}.{}.to_{}.{}",
                    media.protocol(),
                    self.name(),
                    format,
                    media.clean_name()
                );
                let mut output = classname
                    .split('.')
                    .fold(input.logsdir.join("transcoded"), |path, part| path.join(part))
                    .into_os_string();
                output.push(".");
                output.push(&format.container);
                let output = PathBuf::from(output);

                let test = build(
                    Test::builder()
                        .application(binary)
                        .classname(classname)
                        .args(vec![
                            "-o".to_owned(),
                            encoding_profile(format, has_video, has_audio),
                            resource.uri.clone(),
                            path_to_uri(&output),
                        ])
                        .media(Some(Arc::clone(media)))
                        .duration(Duration::from_nanos(media.duration()))
                        .timeout(input.timeout)
                        .artifacts(vec![output.clone()]),
                )?
                .with_probe(FileSizeProbe::new(&output))
                .with_classifier(EncodedFileClassifier::new(
                    &output,
                    media_check,
                    expected_caps(format, has_video, has_audio),
                ));
                if let Some(parent) = output.parent() {
                    if let Err(err) = std::fs::create_dir_all(parent) {
                        warn!("Could not create {}: {}", parent.display(), err);
                    }
                }
                sink.add_test(test);
            }
        }
        Ok(())
    }
}

/// Checks the media still matches its recorded media info.
#[derive(Debug, Default)]
pub struct MediaCheckGenerator;

impl TestsGenerator for MediaCheckGenerator {
    fn name(&self) -> &str {
        "media_check"
    }

    fn populate(&self, input: &GenerationInput<'_>, sink: &mut dyn TestSink) -> Result<(), Error> {
        let binary = input.binary(binaries::MEDIA_CHECK)?;
        for resource in input.resources {
            let media = &resource.descriptor;
            let sidecar = match media.path() {
                Some(path) => path,
                None => continue,
            };
            let test = build(
                Test::builder()
                    .application(binary)
                    .classname(format!(
                        "{}.{}.{}",
                        media.protocol(),
                        self.name(),
                        media.clean_name()
                    ))
                    .args(vec![
                        resource.uri.clone(),
                        "--expected-results".to_owned(),
                        sidecar.display().to_string(),
                    ])
                    .media(Some(Arc::clone(media)))
                    .timeout(input.timeout),
            )?;
            sink.add_test(test);
        }
        Ok(())
    }
}

/// Runs the launch lines of the manifest.
#[derive(Debug, Default)]
pub struct PipelineGenerator;

impl TestsGenerator for PipelineGenerator {
    fn name(&self) -> &str {
        "launch_pipeline"
    }

    fn populate(&self, input: &GenerationInput<'_>, sink: &mut dyn TestSink) -> Result<(), Error> {
        let binary = input.binary(binaries::VALIDATE)?;
        for entry in input.pipelines {
            let args = match shell_words::split(&entry.pipeline) {
                Ok(args) => args,
                Err(err) => {
                    warn!("Ignoring pipeline {}: {}", entry.name, err);
                    continue;
                }
            };
            let media: Option<Arc<dyn MediaDescriptor>> = entry
                .media
                .clone()
                .map(|info| Arc::new(FakeMediaDescriptor::new(&entry.name, info)) as Arc<dyn MediaDescriptor>);
            // keys come back lowercased from the manifest loader
            let extra_env: BTreeMap<String, String> = entry
                .env
                .iter()
                .map(|(key, value)| (key.to_ascii_uppercase(), value.clone()))
                .collect();

            let names = if entry.scenarios.is_empty() {
                vec!["none".to_owned()]
            } else {
                entry.scenarios.clone()
            };
            for name in names {
                let scenario = match input.registry.get(&name) {
                    Some(scenario) => real_scenario(&scenario),
                    None => {
                        warn!("Scenario {} of pipeline {} not found", name, entry.name);
                        continue;
                    }
                };
                if let Some(media) = &media {
                    if !media.is_compatible(scenario.as_deref()) {
                        continue;
                    }
                }
                let duration = scenario
                    .as_ref()
                    .map(|scenario| scenario.duration())
                    .unwrap_or_default();
                let test = build(
                    Test::builder()
                        .application(binary)
                        .classname(format!("{}.{}.{}", self.name(), entry.name, name))
                        .args(args.clone())
                        .scenario(scenario)
                        .media(media.clone())
                        .duration(duration)
                        .timeout(entry.timeout.unwrap_or(input.timeout))
                        .extra_env(extra_env.clone()),
                )?
                .with_probe(PositionProbe::default())
                .with_classifier(ValidateLogClassifier::default());
                sink.add_test(test);
            }
        }
        Ok(())
    }
}
