use clap::Parser;
use std::path::PathBuf;
use tracing::Level;

/// Mirror a motion-sensing cube's posture onto a scene node.
#[derive(Parser, Debug, Clone)]
#[command(name = "posture-bridge", version)]
pub struct Options {
    /// Connect and configure the cube, then disconnect without streaming
    #[arg(long)]
    pub dry_run: bool,

    /// Verbose mode
    #[arg(short, long)]
    pub verbose: bool,

    /// Quiet mode, wins over verbose
    #[arg(short, long)]
    pub quiet: bool,

    /// 3D model
    #[arg(short, long)]
    pub model: Option<PathBuf>,

    /// Model scale
    #[arg(short, long)]
    pub scale: Option<f32>,

    /// Config file, defaults to the user config directory
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Stop after this many frames
    #[arg(long)]
    pub frames: Option<u64>,
}

impl Options {
    pub fn log_level(&self) -> Level {
        if self.quiet {
            Level::WARN
        } else if self.verbose {
            Level::DEBUG
        } else {
            Level::INFO
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_info() {
        let options = Options::parse_from(["posture-bridge"]);
        assert_eq!(options.log_level(), Level::INFO);
        assert!(!options.dry_run);
        assert!(options.model.is_none());
        assert!(options.frames.is_none());
    }

    #[test]
    fn parses_short_flags() {
        let options =
            Options::parse_from(["posture-bridge", "-v", "-m", "cube.fbx", "-s", "2.5"]);
        assert_eq!(options.log_level(), Level::DEBUG);
        assert_eq!(options.model, Some(PathBuf::from("cube.fbx")));
        assert_eq!(options.scale, Some(2.5));
    }

    #[test]
    fn quiet_lowers_level() {
        let options = Options::parse_from(["posture-bridge", "--quiet", "--frames", "10"]);
        assert_eq!(options.log_level(), Level::WARN);
        assert_eq!(options.frames, Some(10));
    }

    #[test]
    fn quiet_wins_over_verbose() {
        let options = Options::try_parse_from(["posture-bridge", "-v", "-q"]).unwrap();
        assert_eq!(options.log_level(), Level::WARN);
    }
}
