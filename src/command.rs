//! # Child command construction.
//!
//! [`CommandSpec`] is the opaque program + argument list a
//! [`ProcessHandle`](crate::process::ProcessHandle) launches.
//! [`FfmpegCommand`] builds one for an ffmpeg restream: network-tolerant
//! input flags, a CBR x264/aac encode (or passthrough), and an FLV/RTMP
//! output. Building is deterministic and embeds the source and target URIs
//! verbatim.

/// A fully resolved child command line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandSpec {
    /// Executable path or name.
    pub program: String,
    /// Arguments, in order.
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

/// Builder for ffmpeg restream command lines.
#[derive(Clone, Debug)]
pub struct FfmpegCommand {
    /// Path to the ffmpeg binary.
    pub binary: String,
    /// Pass streams through with `-c copy` instead of re-encoding.
    pub copy_codecs: bool,
}

impl FfmpegCommand {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            copy_codecs: false,
        }
    }

    /// Builds the argument list for restreaming `source` to `target`.
    ///
    /// Input flags tolerate HLS/network glitches: generated PTS, ignored
    /// DTS, discarded corrupt packets, bounded blocking reads, and automatic
    /// reconnects. `-loglevel error` keeps stderr down to diagnostic lines
    /// the classifier can work with.
    pub fn build(&self, source: &str, target: &str) -> CommandSpec {
        let mut args: Vec<String> = [
            "-loglevel",
            "error",
            "-re",
            "-fflags",
            "+genpts+igndts+nobuffer+discardcorrupt",
            "-err_detect",
            "ignore_err",
            "-rw_timeout",
            "3000000",
            "-reconnect",
            "1",
            "-reconnect_streamed",
            "1",
            "-reconnect_at_eof",
            "1",
            "-reconnect_delay_max",
            "5",
            "-thread_queue_size",
            "4096",
            "-user_agent",
            "Mozilla/5.0",
            "-i",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        args.push(source.to_string());

        if self.copy_codecs {
            args.extend(["-c", "copy"].iter().map(|s| s.to_string()));
        } else {
            args.extend(
                [
                    "-map",
                    "0:v:0",
                    "-map",
                    "0:a:0?",
                    "-c:v",
                    "libx264",
                    "-preset",
                    "veryfast",
                    "-profile:v",
                    "high",
                    "-level",
                    "4.2",
                    "-pix_fmt",
                    "yuv420p",
                    "-r",
                    "30",
                    "-g",
                    "60",
                    "-keyint_min",
                    "60",
                    "-sc_threshold",
                    "0",
                    "-b:v",
                    "4500k",
                    "-maxrate",
                    "4500k",
                    "-bufsize",
                    "9000k",
                    "-x264opts",
                    "nal-hrd=cbr:force-cfr=1",
                    "-c:a",
                    "aac",
                    "-b:a",
                    "128k",
                    "-ac",
                    "2",
                    "-ar",
                    "48000",
                ]
                .iter()
                .map(|s| s.to_string()),
            );
        }

        args.extend(
            ["-f", "flv", "-rtmp_live", "live", "-flvflags", "no_duration_filesize"]
                .iter()
                .map(|s| s.to_string()),
        );
        args.push(target.to_string());

        CommandSpec::new(self.binary.clone(), args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embeds_source_and_target_verbatim() {
        let cmd = FfmpegCommand::new("/usr/bin/ffmpeg")
            .build("http://example.com/in.m3u8", "rtmps://ingest/live/key");

        let i = cmd.args.iter().position(|a| a == "-i").unwrap();
        assert_eq!(cmd.args[i + 1], "http://example.com/in.m3u8");
        assert_eq!(cmd.args.last().unwrap(), "rtmps://ingest/live/key");
        assert_eq!(cmd.program, "/usr/bin/ffmpeg");
    }

    #[test]
    fn building_is_deterministic() {
        let builder = FfmpegCommand::new("ffmpeg");
        assert_eq!(builder.build("s", "t"), builder.build("s", "t"));
    }

    #[test]
    fn copy_mode_skips_the_encode() {
        let cmd = FfmpegCommand {
            binary: "ffmpeg".into(),
            copy_codecs: true,
        };
        let spec = cmd.build("s", "t");
        assert!(spec.args.iter().any(|a| a == "copy"));
        assert!(!spec.args.iter().any(|a| a == "libx264"));
    }

    #[test]
    fn output_is_flv_with_error_loglevel() {
        let spec = FfmpegCommand::new("ffmpeg").build("s", "t");
        assert!(spec.args.windows(2).any(|w| w == ["-loglevel", "error"]));
        assert!(spec.args.windows(2).any(|w| w == ["-f", "flv"]));
    }
}
