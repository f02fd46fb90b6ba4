pub mod cargo_env {
    pub const CARGO_PKG_NAME: &str = env!("CARGO_PKG_NAME");
    pub const CARGO_PKG_VERSION: &str = env!("CARGO_PKG_VERSION");
}

pub mod common {
    use std::time::Duration;

    /// Stall timeout used when a test does not declare one.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
    pub const HARD_TIMEOUT_FACTOR: u32 = 5;
    /// Cadence of the supervising loop.
    pub const POLL_INTERVAL: Duration = Duration::from_secs(1);
    pub const KILL_BACKOFF_START: Duration = Duration::from_millis(50);
    /// Tests declaring a longer duration are only run when explicitly requested.
    pub const DEFAULT_LONG_LIMIT: Duration = Duration::from_secs(300);
    pub const DEFAULT_LOGS_DIR: &str = "launcher-logs";
    pub const FLAKY_TESTS_DIR: &str = "flaky_tests";
    /// Extra logs bigger than this are referenced instead of inlined in the main log.
    pub const MAX_INLINED_LOG_SIZE: u64 = 500 * 1024;
    pub const NANOS_PER_SECOND: i64 = 1_000_000_000;
    pub const HLS_EOS_TOLERANCE: Duration = Duration::from_secs(30);
    /// Allowed drift between the duration of a transcoded file and its source.
    pub const ENCODED_DURATION_TOLERANCE: Duration = Duration::from_millis(250);
    pub const VALGRIND_ERROR_CODE: i32 = 20;
    /// General scenarios crossed with every media when the manifest names none.
    pub const DEFAULT_SCENARIOS: &[&str] = &[
        "none",
        "play_15s",
        "reverse_playback",
        "fast_forward",
        "seek_forward",
        "seek_backward",
        "seek_with_stop",
        "switch_audio_track",
        "switch_audio_track_while_paused",
        "switch_subtitle_track",
        "switch_subtitle_track_while_paused",
        "disable_subtitle_track_while_paused",
        "change_state_intensive",
        "scrub_forward_seeking",
    ];
}

pub mod env {
    pub const GST_VALIDATE: &str = "GST_VALIDATE";
    pub const GST_VALIDATE_SCENARIOS_PATH: &str = "GST_VALIDATE_SCENARIOS_PATH";
    pub const GST_VALIDATE_SCENARIO: &str = "GST_VALIDATE_SCENARIO";
    pub const GST_VALIDATE_CONFIG: &str = "GST_VALIDATE_CONFIG";
    pub const GST_VALIDATE_OVERRIDE: &str = "GST_VALIDATE_OVERRIDE";
    pub const GST_VALIDATE_FILE: &str = "GST_VALIDATE_FILE";
    pub const GST_VALIDATE_UUID: &str = "GST_VALIDATE_UUID";
    pub const GST_VALIDATE_LOGSDIR: &str = "GST_VALIDATE_LOGSDIR";
    pub const GST_DEBUG: &str = "GST_DEBUG";
    pub const GST_DEBUG_FILE: &str = "GST_DEBUG_FILE";
    pub const GST_DEBUG_NO_COLOR: &str = "GST_DEBUG_NO_COLOR";
    pub const GST_DEBUG_DUMP_DOT_DIR: &str = "GST_DEBUG_DUMP_DOT_DIR";
    pub const GST_GL_XINITTHREADS: &str = "GST_GL_XINITTHREADS";
    pub const GST_XINITTHREADS: &str = "GST_XINITTHREADS";
    pub const TIMEOUT_FACTOR: &str = "TIMEOUT_FACTOR";
    pub const FORCE_COLORS: &str = "GST_VALIDATE_LAUNCHER_FORCE_COLORS";
    /// Variables echoed in the reproduction command line when they are set.
    pub const REPRODUCTION_VARS: &[&str] = &[
        "LD_PRELOAD",
        "DISPLAY",
        GST_VALIDATE,
        GST_VALIDATE_SCENARIOS_PATH,
        GST_VALIDATE_CONFIG,
        GST_VALIDATE_OVERRIDE,
    ];
}

pub mod binaries {
    pub const VALIDATE: &str = "gst-validate-1.0";
    pub const TRANSCODING: &str = "gst-validate-transcoding-1.0";
    pub const MEDIA_CHECK: &str = "gst-validate-media-check-1.0";

    /// Platform specific executable name.
    pub fn executable(name: &str) -> String {
        if cfg!(windows) {
            format!("{}.exe", name)
        } else {
            name.to_owned()
        }
    }
}
