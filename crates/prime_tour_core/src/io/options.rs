use std::{env, fmt::Write as _, path::Path};

use log::LevelFilter;
use prime_tour_derive::{CliOptions, CliValue, KvDisplay};

use crate::{
    Error, Result,
    algo::{
        anneal::{DEFAULT_COOLING, DEFAULT_EPOCHS, DEFAULT_SEED},
        grid::{DEFAULT_GRID_STRIDE, DEFAULT_GRID_TIMEOUT},
        parallel::DEFAULT_WORKERS,
    },
};

const ERR_INVALID_COOLING: &str = "--cooling must be in (0, 1)";
const ERR_INVALID_EPOCHS: &str = "--epochs must be > 0";
const ERR_INVALID_WORKERS: &str = "--workers must be > 0";
const ERR_INVALID_STRIDE: &str = "--grid-stride must be > 0";
const ERR_INVALID_TIMEOUT: &str = "--grid-timeout-secs must be > 0";

/// Runtime options for a solver run.
#[derive(Clone, Debug, CliOptions, KvDisplay)]
pub struct SolverOptions {
    /// City file path. Empty means stdin.
    #[cli(long = "input", help = "cities file with an `id,x,y` header (default: stdin)")]
    #[kv(fmt = "or-dash")]
    pub input: String,
    /// Tour output path. Empty means stdout.
    #[cli(long = "output", help = "tour output file (default: stdout)")]
    #[kv(fmt = "or-dash")]
    pub output: String,
    #[cli(
        long = "strategy",
        parse_with = "StrategyKind::parse",
        value = "<random|greedy|anneal|grid>",
        help = "how the tour is produced"
    )]
    pub strategy: StrategyKind,
    /// Cities grown from the front end of the greedy path before switching to
    /// the back end. 0 grows only from the front.
    #[cli(long = "split", help = "cities added to the front path before the back path")]
    pub split: usize,
    #[cli(long = "cooling", help = "temperature factor applied after each epoch")]
    pub cooling: f64,
    #[cli(long = "epochs", help = "annealing epochs")]
    pub epochs: usize,
    #[cli(long = "moves-per-epoch", help = "swap candidates per epoch (0 = tour length)")]
    pub moves_per_epoch: usize,
    #[cli(long = "workers", help = "worker threads for annealing and grid search")]
    pub workers: usize,
    #[cli(long = "grid-stride", help = "step between split values tried by grid search")]
    pub grid_stride: usize,
    #[cli(long = "grid-timeout-secs", help = "abandon grid search after this many seconds")]
    pub grid_timeout_secs: u64,
    #[cli(long = "seed", help = "base seed for random tours and annealing")]
    pub seed: u64,
    #[cli(
        long = "log-level",
        parse_with = "LogLevel::parse",
        value = "<error|warn|info|debug|trace|off>"
    )]
    pub log_level: LogLevel,
    #[cli(long = "log-format", parse_with = "LogFormat::parse", value = "<compact|pretty>")]
    pub log_format: LogFormat,
    /// Include timestamps in log lines.
    pub log_timestamp: bool,
    /// Optional log file. Empty means stderr.
    #[cli(long = "log-output", help = "log file (default: stderr)")]
    #[kv(fmt = "or-dash")]
    pub log_output: String,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, CliValue)]
#[cli_value(option = "strategy")]
pub enum StrategyKind {
    Random,
    #[cli(alias = "nn")]
    Greedy,
    #[cli(alias = "sa")]
    Anneal,
    Grid,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, CliValue)]
#[cli_value(option = "log-level")]
pub enum LogLevel {
    Error,
    #[cli(alias = "warning")]
    Warn,
    Info,
    Debug,
    Trace,
    Off,
}

impl LogLevel {
    pub fn to_filter(self) -> LevelFilter {
        match self {
            Self::Error => LevelFilter::Error,
            Self::Warn => LevelFilter::Warn,
            Self::Info => LevelFilter::Info,
            Self::Debug => LevelFilter::Debug,
            Self::Trace => LevelFilter::Trace,
            Self::Off => LevelFilter::Off,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, CliValue)]
#[cli_value(option = "log-format")]
pub enum LogFormat {
    Compact,
    Pretty,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            input: String::new(),
            output: String::new(),
            strategy: StrategyKind::Anneal,
            split: 0,
            cooling: DEFAULT_COOLING,
            epochs: DEFAULT_EPOCHS,
            moves_per_epoch: 0,
            workers: DEFAULT_WORKERS,
            grid_stride: DEFAULT_GRID_STRIDE,
            grid_timeout_secs: DEFAULT_GRID_TIMEOUT.as_secs(),
            seed: DEFAULT_SEED,
            log_level: LogLevel::Warn,
            log_format: LogFormat::Compact,
            log_timestamp: true,
            log_output: String::new(),
        }
    }
}

impl SolverOptions {
    pub fn from_args() -> Result<Self> {
        let options = Self::parse_from_iter(env::args().skip(1))?;
        options.validate()?;
        Ok(options)
    }

    fn parse_from_iter<I, S>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut options = Self::default();
        let mut args = args
            .into_iter()
            .map(|arg| arg.as_ref().to_owned())
            .peekable();

        while let Some(arg) = args.next() {
            if arg == "--help" || arg == "-h" {
                return Err(Error::invalid_input(Self::usage()));
            }

            let Some(raw_name) = arg.strip_prefix("--") else {
                return Err(Error::invalid_input(format!(
                    "Unexpected argument: {arg}\n\n{}",
                    Self::usage()
                )));
            };

            if raw_name.is_empty() {
                return Err(Error::invalid_input(format!(
                    "Invalid option name: {arg}\n\n{}",
                    Self::usage()
                )));
            }

            let (name, value) = Self::split_arg(raw_name, &mut args);

            if options.apply_cli_option(&name, value.clone())? {
                continue;
            }

            match name.as_str() {
                "log-timestamp" => {
                    options.log_timestamp = match value {
                        Some(v) => parse_bool(&name, &v)?,
                        None => true,
                    };
                }
                "no-log-timestamp" => {
                    if value.is_some() {
                        return Err(Error::invalid_input(format!(
                            "Flag --{name} does not take a value"
                        )));
                    }
                    options.log_timestamp = false;
                }
                _ => {
                    return Err(Error::invalid_input(format!(
                        "Unknown option: --{name}\n\n{}",
                        Self::usage()
                    )));
                }
            }
        }

        Ok(options)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.cooling > 0.0 && self.cooling < 1.0) {
            return Err(Error::invalid_input(ERR_INVALID_COOLING));
        }
        if self.epochs == 0 {
            return Err(Error::invalid_input(ERR_INVALID_EPOCHS));
        }
        if self.workers == 0 {
            return Err(Error::invalid_input(ERR_INVALID_WORKERS));
        }
        if self.grid_stride == 0 {
            return Err(Error::invalid_input(ERR_INVALID_STRIDE));
        }
        if self.grid_timeout_secs == 0 {
            return Err(Error::invalid_input(ERR_INVALID_TIMEOUT));
        }
        Ok(())
    }

    pub fn usage() -> String {
        let rows = Self::cli_option_help();
        let flags = [
            ("log-timestamp", "[=<bool>]", "prefix log lines with a timestamp"),
            ("no-log-timestamp", "", ""),
            ("help", "", ""),
        ];
        let width = rows
            .iter()
            .chain(flags.iter())
            .map(|(name, hint, _)| name.len() + hint.len() + 1)
            .max()
            .unwrap_or(0);

        let mut out = String::from(concat!(
            "Usage:\n",
            "  prime-tour [options] --input cities.csv\n",
            "  prime-tour [options] < cities.csv\n\n",
            "Options:\n",
        ));
        for (name, hint, help) in rows.iter().chain(flags.iter()) {
            let left = if hint.is_empty() || hint.starts_with('[') {
                format!("{name}{hint}")
            } else {
                format!("{name} {hint}")
            };
            if help.is_empty() {
                let _ = writeln!(out, "  --{left}");
            } else {
                let _ = writeln!(out, "  --{left:<width$}  {help}");
            }
        }
        out.push_str(concat!(
            "\n",
            "Examples:\n",
            "  prime-tour --input cities.csv --output tour.csv\n",
            "  prime-tour --strategy=greedy --split=5000 --input cities.csv\n",
            "  prime-tour --strategy=grid --grid-stride=500 --workers=16 < cities.csv\n",
            "  prime-tour --epochs=200 --cooling=0.95 --log-level=info < cities.csv\n",
        ));
        out
    }

    pub fn log_output_path(&self) -> Option<&Path> {
        optional_path(&self.log_output)
    }

    pub fn output_path(&self) -> Option<&Path> {
        optional_path(&self.output)
    }

    pub fn input_path(&self) -> Option<&Path> {
        optional_path(&self.input)
    }
}

fn optional_path(raw: &str) -> Option<&Path> {
    let raw = raw.trim();
    if raw.is_empty() || raw == "-" {
        None
    } else {
        Some(Path::new(raw))
    }
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(Error::invalid_input(format!(
            "Invalid boolean for --{name}: {value} (expected true/false)"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use log::LevelFilter;

    use super::{LogFormat, LogLevel, SolverOptions, StrategyKind, parse_bool};

    #[test]
    fn parse_bool_accepts_common_values() {
        assert!(parse_bool("x", "true").expect("parse"));
        assert!(parse_bool("x", "YES").expect("parse"));
        assert!(parse_bool("x", "On").expect("parse"));
        assert!(!parse_bool("x", "0").expect("parse"));
        assert!(!parse_bool("x", "FALSE").expect("parse"));
        assert!(!parse_bool("x", "off").expect("parse"));
    }

    #[test]
    fn parse_bool_rejects_unknown_values() {
        let err = parse_bool("log-timestamp", "maybe").expect_err("invalid bool should fail");
        assert!(
            err.to_string()
                .contains("Invalid boolean for --log-timestamp: maybe")
        );
    }

    #[test]
    fn log_level_maps_to_expected_filter() {
        assert_eq!(LogLevel::Error.to_filter(), LevelFilter::Error);
        assert_eq!(LogLevel::Warn.to_filter(), LevelFilter::Warn);
        assert_eq!(LogLevel::Trace.to_filter(), LevelFilter::Trace);
        assert_eq!(LogLevel::Off.to_filter(), LevelFilter::Off);
        assert_eq!(LogLevel::parse("warning").expect("alias"), LogLevel::Warn);
    }

    #[test]
    fn strategy_kind_parses_names_and_aliases() {
        assert_eq!(StrategyKind::parse("GRID").expect("parse"), StrategyKind::Grid);
        assert_eq!(StrategyKind::parse(" nn ").expect("parse"), StrategyKind::Greedy);
        assert_eq!(StrategyKind::Anneal.to_string(), "anneal");

        let err = StrategyKind::parse("two-opt").expect_err("unknown strategy");
        assert!(
            err.to_string()
                .contains("expected random|greedy|anneal|grid")
        );
    }

    #[test]
    fn parse_from_iter_applies_known_cli_options() {
        let options = SolverOptions::parse_from_iter([
            "--input=cities.csv",
            "--output",
            "tour.csv",
            "--strategy=grid",
            "--split=12",
            "--cooling=0.95",
            "--epochs=7",
            "--moves-per-epoch=300",
            "--workers",
            "3",
            "--grid-stride=50",
            "--grid-timeout-secs=60",
            "--seed=99",
            "--log-level=debug",
            "--log-format=pretty",
            "--log-timestamp=false",
            "--log-output=run.log",
        ])
        .expect("parse options");

        assert_eq!(options.input, "cities.csv");
        assert_eq!(options.output, "tour.csv");
        assert_eq!(options.strategy, StrategyKind::Grid);
        assert_eq!(options.split, 12);
        assert_eq!(options.cooling, 0.95);
        assert_eq!(options.epochs, 7);
        assert_eq!(options.moves_per_epoch, 300);
        assert_eq!(options.workers, 3);
        assert_eq!(options.grid_stride, 50);
        assert_eq!(options.grid_timeout_secs, 60);
        assert_eq!(options.seed, 99);
        assert_eq!(options.log_level, LogLevel::Debug);
        assert_eq!(options.log_format, LogFormat::Pretty);
        assert!(!options.log_timestamp);
        assert_eq!(options.log_output, "run.log");
    }

    #[test]
    fn parse_from_iter_accepts_bare_log_timestamp_flags() {
        let options = SolverOptions::parse_from_iter(["--no-log-timestamp", "--log-timestamp"])
            .expect("parse options");
        assert!(options.log_timestamp);

        let options =
            SolverOptions::parse_from_iter(["--no-log-timestamp"]).expect("parse options");
        assert!(!options.log_timestamp);
    }

    #[test]
    fn parse_from_iter_rejects_no_log_timestamp_with_value() {
        let err = SolverOptions::parse_from_iter(["--no-log-timestamp=true"])
            .expect_err("expected flag value rejection");
        assert!(err.to_string().contains("does not take a value"));
    }

    #[test]
    fn parse_from_iter_rejects_unknown_option() {
        let err = SolverOptions::parse_from_iter(["--unknown-opt=1"])
            .expect_err("expected unknown option error");
        assert!(err.to_string().contains("Unknown option: --unknown-opt"));
    }

    #[test]
    fn parse_from_iter_rejects_unexpected_positional_argument() {
        let err =
            SolverOptions::parse_from_iter(["cities.csv"]).expect_err("expected positional error");
        assert!(err.to_string().contains("Unexpected argument: cities.csv"));
    }

    #[test]
    fn parse_from_iter_requires_value_for_value_options() {
        let err = SolverOptions::parse_from_iter(["--split", "--epochs=3"])
            .expect_err("missing value should fail");
        assert!(err.to_string().contains("Missing value for --split"));
    }

    #[test]
    fn parse_from_iter_reports_bad_numbers() {
        let err =
            SolverOptions::parse_from_iter(["--workers=many"]).expect_err("bad number should fail");
        assert!(err.to_string().contains("Invalid value for --workers: many"));
    }

    #[test]
    fn parse_from_iter_help_returns_usage_error() {
        let err =
            SolverOptions::parse_from_iter(["--help"]).expect_err("help should short-circuit");
        assert!(err.to_string().contains("Usage:"));
    }

    #[test]
    fn usage_lists_every_option() {
        let usage = SolverOptions::usage();
        for name in [
            "--input <path>",
            "--strategy <random|greedy|anneal|grid>",
            "--split <usize>",
            "--cooling <f64>",
            "--grid-timeout-secs <u64>",
            "--log-timestamp[=<bool>]",
            "--no-log-timestamp",
            "--help",
        ] {
            assert!(usage.contains(name), "usage is missing {name}:\n{usage}");
        }
    }

    #[test]
    fn defaults_are_valid() {
        let options = SolverOptions::default();
        options.validate().expect("defaults should validate");
        assert_eq!(options.strategy, StrategyKind::Anneal);
        assert_eq!(options.split, 0);
    }

    #[test]
    fn validate_rejects_out_of_range_values() {
        for options in [
            SolverOptions {
                cooling: 1.0,
                ..SolverOptions::default()
            },
            SolverOptions {
                cooling: 0.0,
                ..SolverOptions::default()
            },
            SolverOptions {
                epochs: 0,
                ..SolverOptions::default()
            },
            SolverOptions {
                workers: 0,
                ..SolverOptions::default()
            },
            SolverOptions {
                grid_stride: 0,
                ..SolverOptions::default()
            },
            SolverOptions {
                grid_timeout_secs: 0,
                ..SolverOptions::default()
            },
        ] {
            options.validate().expect_err("out of range value");
        }
    }

    #[test]
    fn display_lists_options_one_per_line() {
        let text = SolverOptions::default().to_string();
        assert!(text.contains("strategy"));
        assert!(text.contains("= anneal"));
        assert!(text.contains("= -"));
    }

    #[test]
    fn paths_treat_empty_and_dash_as_standard_streams() {
        let options = SolverOptions::default();
        assert!(options.input_path().is_none());
        assert!(options.output_path().is_none());
        assert!(options.log_output_path().is_none());

        let options = SolverOptions {
            input: "-".to_string(),
            output: " out/tour.csv ".to_string(),
            log_output: "out/run.log".to_string(),
            ..SolverOptions::default()
        };
        assert!(options.input_path().is_none());
        assert_eq!(
            options.output_path().expect("path should exist"),
            std::path::Path::new("out/tour.csv")
        );
        assert_eq!(
            options.log_output_path().expect("path should exist"),
            std::path::Path::new("out/run.log")
        );
    }
}
