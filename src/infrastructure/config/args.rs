use super::app_config::LogLevel;
use crate::domain::entities::{FormatPreference, OptionOverrides, OutputFormat};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Command line arguments.
#[derive(Debug, Parser)]
#[command(
    name = "pixcache",
    version,
    about = "Resize, recompress and cache camera snapshots",
    long_about = None
)]
pub struct CliArgs {
    /// Configuration file path.
    #[arg(short, long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Cache root directory.
    #[arg(long, value_name = "DIR", env = "PIXCACHE_CACHE_DIR", global = true)]
    pub cache_dir: Option<PathBuf>,

    /// Log verbosity level.
    #[arg(long, value_enum, env = "PIXCACHE_LOG_LEVEL", global = true)]
    pub log_level: Option<LogLevel>,

    /// Compute concurrent misses independently.
    #[arg(long, global = true)]
    pub no_coalesce: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Transform an image, serving it from the cache when fresh.
    Render(RenderArgs),
    /// Print the cache key and entry path for a transform.
    Key(TransformArgs),
}

/// Source and transform parameters shared by subcommands.
#[derive(Debug, Args)]
pub struct TransformArgs {
    /// Source image.
    pub source: PathBuf,

    /// Maximum width, 0 for no constraint.
    #[arg(long)]
    pub width: Option<u32>,

    /// Maximum height, 0 for no constraint.
    #[arg(long)]
    pub height: Option<u32>,

    /// Encoder quality (1-100).
    #[arg(long)]
    pub quality: Option<u8>,

    /// Output format.
    #[arg(long, value_enum, conflicts_with = "accept")]
    pub format: Option<OutputFormat>,

    /// Pick the format from an HTTP Accept header value.
    #[arg(long, value_name = "HEADER")]
    pub accept: Option<String>,
}

impl TransformArgs {
    /// Requested dimensions and quality.
    #[must_use]
    pub const fn overrides(&self) -> OptionOverrides {
        OptionOverrides {
            width: self.width,
            height: self.height,
            quality: self.quality,
            format: None,
        }
    }

    /// How the output format is chosen.
    #[must_use]
    pub fn format_preference(&self) -> FormatPreference {
        match (self.format, &self.accept) {
            (Some(format), _) => FormatPreference::Explicit(format),
            (None, Some(accept)) => FormatPreference::Negotiate(Some(accept.clone())),
            (None, None) => FormatPreference::Default,
        }
    }
}

/// Arguments of `render`.
#[derive(Debug, Args)]
pub struct RenderArgs {
    #[command(flatten)]
    pub transform: TransformArgs,

    /// Stream the output without touching the cache.
    #[arg(long)]
    pub stream: bool,

    /// Output file, stdout when omitted.
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_args() {
        let args = CliArgs::parse_from([
            "pixcache",
            "render",
            "/photos/cam1/snap.jpg",
            "--width",
            "200",
            "--quality",
            "75",
            "--format",
            "webp",
            "-o",
            "out.webp",
        ]);

        let Command::Render(render) = args.command else {
            panic!("expected render command");
        };
        assert_eq!(render.transform.overrides().width, Some(200));
        assert_eq!(render.transform.overrides().height, None);
        assert_eq!(
            render.transform.format_preference(),
            FormatPreference::Explicit(OutputFormat::Webp)
        );
        assert_eq!(render.output, Some(PathBuf::from("out.webp")));
        assert!(!render.stream);
    }

    #[test]
    fn test_accept_negotiates() {
        let args = CliArgs::parse_from(["pixcache", "key", "a.jpg", "--accept", "image/webp"]);
        let Command::Key(key) = args.command else {
            panic!("expected key command");
        };
        assert_eq!(
            key.format_preference(),
            FormatPreference::Negotiate(Some("image/webp".into()))
        );
    }

    #[test]
    fn test_format_conflicts_with_accept() {
        let result = CliArgs::try_parse_from([
            "pixcache",
            "key",
            "a.jpg",
            "--format",
            "png",
            "--accept",
            "image/webp",
        ]);
        assert!(result.is_err());
    }
}
