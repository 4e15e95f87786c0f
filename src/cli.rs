use clap::Parser;
use std::path::PathBuf;

/// Progressive image-sequence loader
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Frame pattern (shot.####.png, shot.%04d.png, shot.{}.png) or any one frame of the sequence
    #[arg(value_name = "PATTERN")]
    pub pattern: String,

    /// Number of frames (default: scan disk for a contiguous run)
    #[arg(short = 'n', long = "frames", value_name = "N")]
    pub frames: Option<usize>,

    /// On-disk number of the first frame
    #[arg(long = "start", value_name = "N")]
    pub start: Option<usize>,

    /// Frame width in pixels (default: size of the first frame)
    #[arg(long = "width", value_name = "W")]
    pub width: Option<u32>,

    /// Frame height in pixels (default: size of the first frame)
    #[arg(long = "height", value_name = "H")]
    pub height: Option<u32>,

    /// Largest sweep step (overrides config)
    #[arg(short = 's', long = "step", value_name = "N")]
    pub load_step: Option<usize>,

    /// Fetch one frame at a time (overrides config)
    #[arg(long = "serial")]
    pub serial: bool,

    /// Worker threads for parallel fetch (overrides config)
    #[arg(short = 'w', long = "workers", value_name = "N")]
    pub workers: Option<usize>,

    /// Play the sequence through once after loading starts
    #[arg(short = 'p', long = "play")]
    pub play: bool,

    /// Playback rate for --play
    #[arg(long = "fps", value_name = "FPS", default_value = "24")]
    pub fps: f32,

    /// Write every drawn frame as PNG into this directory
    #[arg(short = 'd', long = "dump", value_name = "DIR")]
    pub dump_dir: Option<PathBuf>,

    /// Don't show the progress bar
    #[arg(long = "no-progress")]
    pub no_progress: bool,

    /// Enable debug logging to file (default: flipbook.log)
    #[arg(short = 'l', long = "log", value_name = "LOG_FILE")]
    pub log_file: Option<Option<PathBuf>>,

    /// Increase logging verbosity (default: warn, -v: info, -vv: debug, -vvv+: trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbosity: u8,

    /// Custom configuration directory (overrides default platform paths)
    #[arg(short = 'c', long = "config-dir", value_name = "DIR")]
    pub config_dir: Option<PathBuf>,
}

impl Args {
    /// Merge CLI overrides on top of options loaded from config
    pub fn apply(&self, options: &mut crate::FlipbookOptions) {
        if let Some(step) = self.load_step {
            options.load_step = step;
        }
        if self.serial {
            options.parallel_fetch = false;
        }
        if let Some(w) = self.workers {
            options.workers = Some(w);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FlipbookOptions;

    #[test]
    fn test_overrides() {
        let args = Args::parse_from(["flipbook", "f.####.png", "--serial", "-s", "4", "-w", "2"]);
        let mut options = FlipbookOptions::default();
        args.apply(&mut options);

        assert!(!options.parallel_fetch);
        assert_eq!(options.load_step, 4);
        assert_eq!(options.workers, Some(2));
    }

    #[test]
    fn test_no_overrides_keeps_config() {
        let args = Args::parse_from(["flipbook", "f.####.png", "-vv"]);
        let mut options = FlipbookOptions {
            parallel_fetch: true,
            load_step: 7,
            workers: None,
        };
        args.apply(&mut options);

        assert_eq!(options.load_step, 7);
        assert!(options.parallel_fetch);
        assert_eq!(args.verbosity, 2);
        assert!(args.log_file.is_none());
    }
}
