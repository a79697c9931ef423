use clap::{Arg, ArgMatches, Command};

pub const ARG_RATE_LIMIT_AUTH_MAX: &str = "rate-limit-auth-max";
pub const ARG_RATE_LIMIT_API_MAX: &str = "rate-limit-api-max";
pub const ARG_RATE_LIMIT_SENSITIVE_MAX: &str = "rate-limit-sensitive-max";

pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_RATE_LIMIT_AUTH_MAX)
                .long("rate-limit-auth-max")
                .help("Max login attempts per IP per minute")
                .env("GARDISTO_RATE_LIMIT_AUTH_MAX")
                .default_value("10")
                .value_parser(clap::value_parser!(u32)),
        )
        .arg(
            Arg::new(ARG_RATE_LIMIT_API_MAX)
                .long("rate-limit-api-max")
                .help("Max API requests per IP per minute")
                .env("GARDISTO_RATE_LIMIT_API_MAX")
                .default_value("100")
                .value_parser(clap::value_parser!(u32)),
        )
        .arg(
            Arg::new(ARG_RATE_LIMIT_SENSITIVE_MAX)
                .long("rate-limit-sensitive-max")
                .help("Max sensitive-operation attempts per key per 15 minutes")
                .env("GARDISTO_RATE_LIMIT_SENSITIVE_MAX")
                .default_value("5")
                .value_parser(clap::value_parser!(u32)),
        )
}

/// Parsed rate-limit overrides.
#[derive(Debug, Clone, Copy)]
pub struct Options {
    pub auth_max: u32,
    pub api_max: u32,
    pub sensitive_max: u32,
}

impl Options {
    #[must_use]
    pub fn parse(matches: &ArgMatches) -> Self {
        Self {
            auth_max: matches
                .get_one::<u32>(ARG_RATE_LIMIT_AUTH_MAX)
                .copied()
                .unwrap_or(10),
            api_max: matches
                .get_one::<u32>(ARG_RATE_LIMIT_API_MAX)
                .copied()
                .unwrap_or(100),
            sensitive_max: matches
                .get_one::<u32>(ARG_RATE_LIMIT_SENSITIVE_MAX)
                .copied()
                .unwrap_or(5),
        }
    }
}
