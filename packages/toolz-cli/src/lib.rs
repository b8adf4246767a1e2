use std::path::PathBuf;

use clap::{
	Parser,
	builder::{
		Styles,
		styling::{AnsiColor, Effects},
	},
};

pub const VERSION: &str = concat!(
	env!("CARGO_PKG_VERSION"),
	"-",
	env!("VERGEN_GIT_SHA"),
	"-",
	env!("VERGEN_CARGO_TARGET_TRIPLE"),
);

/// Arguments shared by every toolz binary.
#[derive(Debug, Parser)]
pub struct CommonArgs {
	/// TOML configuration file. Built-in defaults are used when omitted.
	#[arg(long, short = 'c', value_name = "FILE")]
	pub config: Option<PathBuf>,
	/// Project directory used to scope records. Defaults to the working directory.
	#[arg(long, short = 'p', value_name = "DIR")]
	pub project: Option<PathBuf>,
}

pub fn styles() -> Styles {
	Styles::styled()
		.header(AnsiColor::Cyan.on_default() | Effects::BOLD)
		.usage(AnsiColor::Cyan.on_default() | Effects::BOLD)
		.literal(AnsiColor::Green.on_default() | Effects::BOLD)
		.placeholder(AnsiColor::Yellow.on_default())
}
