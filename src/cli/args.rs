//! Command-line argument definitions.

use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use super::OutputFormat;
use crate::error::ConfigError;
use crate::replay::{parse_time, EndBound, ReplayConfig, StartBound};

/// Replay a pcap capture, printing each packet as it is emitted.
#[derive(Parser, Debug)]
#[command(name = "pcapreplay")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Capture file to replay ("-" for stdin)
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Emit packets at their original inter-arrival times
    #[arg(short = 't', long = "timing")]
    pub timing: bool,

    /// Stop once the capture is exhausted
    #[arg(long = "stop")]
    pub stop: bool,

    /// Start inactive
    #[arg(long = "inactive")]
    pub inactive: bool,

    /// Memory-map the capture (true/false; platform default if omitted)
    #[arg(long = "mmap", value_name = "BOOL")]
    pub mmap: Option<bool>,

    /// Probability of keeping each packet
    #[arg(short = 's', long = "sample", value_name = "PROB", default_value = "1")]
    pub sample: f64,

    /// Only emit IPv4 packets; others go to port 1
    #[arg(long = "force-ip")]
    pub force_ip: bool,

    /// Skip packets before this capture time
    #[arg(long = "start", value_name = "TIME", value_parser = parse_time, conflicts_with = "start_after")]
    pub start: Option<Duration>,

    /// Skip packets in the first TIME of the capture
    #[arg(long = "start-after", value_name = "TIME", value_parser = parse_time)]
    pub start_after: Option<Duration>,

    /// End the window at this capture time
    #[arg(long = "end", value_name = "TIME", value_parser = parse_time, conflicts_with_all = ["end_after", "interval"])]
    pub end: Option<Duration>,

    /// End the window TIME after the first packet
    #[arg(long = "end-after", value_name = "TIME", value_parser = parse_time, conflicts_with = "interval")]
    pub end_after: Option<Duration>,

    /// End the window TIME after it starts
    #[arg(long = "interval", value_name = "TIME", value_parser = parse_time)]
    pub interval: Option<Duration>,

    /// Control write to run when the window ends (default "active false")
    #[arg(long = "end-call", value_name = "CALL")]
    pub end_call: Option<String>,

    /// Seed for sampling
    #[arg(long = "seed")]
    pub seed: Option<u64>,

    /// Pull packets instead of stepping a push task
    #[arg(long = "pull")]
    pub pull: bool,

    /// Print only a summary
    #[arg(short = 'q', long = "quiet")]
    pub quiet: bool,

    /// Print control readings when done
    #[arg(long = "status")]
    pub status: bool,

    /// Output format for packet lines
    #[arg(long = "format", value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// Enable verbose output
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Args {
    /// Build the replay configuration these arguments describe.
    pub fn to_config(&self) -> Result<ReplayConfig, ConfigError> {
        let mut config = ReplayConfig::new(&self.file)
            .with_timing(self.timing)
            .with_stop(self.stop)
            .with_active(!self.inactive)
            .with_sample(self.sample)
            .with_force_ip(self.force_ip);

        if let Some(mmap) = self.mmap {
            config = config.with_mmap(mmap);
        }
        config.start = StartBound::from_options(self.start, self.start_after)?;
        config.end = EndBound::from_options(self.end, self.end_after, self.interval)?;
        config.end_call = self.end_call.clone();
        config.seed = self.seed;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal() {
        let args = Args::try_parse_from(["pcapreplay", "trace.pcap"]).unwrap();
        let config = args.to_config().unwrap();
        assert_eq!(config.path, PathBuf::from("trace.pcap"));
        assert!(config.active);
        assert_eq!(config.sample, 1.0);
        assert!(config.start.is_none() && config.end.is_none());
    }

    #[test]
    fn test_time_options() {
        let args = Args::try_parse_from([
            "pcapreplay",
            "-",
            "--start-after",
            "1.5",
            "--interval",
            "10",
        ])
        .unwrap();
        let config = args.to_config().unwrap();
        assert_eq!(config.start, Some(StartBound::AfterFirst(Duration::from_millis(1500))));
        assert_eq!(config.end, Some(EndBound::Interval(Duration::from_secs(10))));
    }

    #[test]
    fn test_conflicting_time_options_rejected() {
        assert!(Args::try_parse_from(["pcapreplay", "f", "--start", "1", "--start-after", "2"]).is_err());
        assert!(Args::try_parse_from(["pcapreplay", "f", "--end", "1", "--interval", "2"]).is_err());
        assert!(Args::try_parse_from(["pcapreplay", "f", "--end-after", "1", "--interval", "2"]).is_err());
    }

    #[test]
    fn test_bad_time_rejected() {
        assert!(Args::try_parse_from(["pcapreplay", "f", "--end", "soon"]).is_err());
    }

    #[test]
    fn test_flags() {
        let args = Args::try_parse_from([
            "pcapreplay",
            "f",
            "--inactive",
            "--mmap",
            "false",
            "--seed",
            "9",
            "-vv",
        ])
        .unwrap();
        assert_eq!(args.verbose, 2);
        let config = args.to_config().unwrap();
        assert!(!config.active);
        assert!(!config.mmap);
        assert_eq!(config.seed, Some(9));
    }
}
