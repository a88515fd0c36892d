use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use clap::builder::Styles;
use clap::builder::styling::AnsiColor;
use putfile::{FtpClient, RegistryConfig};

pub const DEFAULT_PORT: u16 = 10006;

#[derive(Parser, Debug)]
#[command(name = "putfile")]
#[command(about = "HTTP gateway that uploads local files to FTP servers over cached sessions")]
#[command(version)]
#[command(styles = help_styles())]
pub struct Cli {
	/// Increase verbosity (-v debug for putfile, -vv debug for everything)
	#[arg(short, long, action = clap::ArgAction::Count)]
	pub verbose: u8,

	/// IP address to bind to
	#[arg(long, env = "PUTFILE_BIND", default_value = "0.0.0.0")]
	pub bind: IpAddr,

	/// Port to listen on
	#[arg(short, long, env = "PUTFILE_PORT", default_value_t = DEFAULT_PORT)]
	pub port: u16,

	/// Append logs to this file instead of stderr
	#[arg(long, env = "PUTFILE_LOG_FILE", value_name = "FILE")]
	pub log_file: Option<PathBuf>,

	/// Close cached sessions idle for longer than this many seconds
	#[arg(long, env = "PUTFILE_IDLE_TIMEOUT", value_name = "SECS", default_value_t = 600)]
	pub idle_timeout: u64,

	/// Seconds between idle-session sweeps
	#[arg(
		long,
		env = "PUTFILE_SWEEP_INTERVAL",
		value_name = "SECS",
		default_value_t = 60,
		value_parser = clap::value_parser!(u64).range(1..)
	)]
	pub sweep_interval: u64,

	/// FTP connect timeout in seconds (0 waits for the OS default)
	#[arg(long, env = "PUTFILE_CONNECT_TIMEOUT", value_name = "SECS", default_value_t = 30)]
	pub connect_timeout: u64,
}

/// Cargo-like help colors.
fn help_styles() -> Styles {
	Styles::styled()
		.header(AnsiColor::Green.on_default().bold())
		.usage(AnsiColor::Green.on_default().bold())
		.literal(AnsiColor::Cyan.on_default())
		.placeholder(AnsiColor::Cyan.on_default())
		.error(AnsiColor::Red.on_default().bold())
}

impl Cli {
	pub fn listen_addr(&self) -> SocketAddr {
		SocketAddr::new(self.bind, self.port)
	}

	pub fn registry_config(&self) -> RegistryConfig {
		RegistryConfig {
			idle_timeout: Duration::from_secs(self.idle_timeout),
			sweep_interval: Duration::from_secs(self.sweep_interval),
		}
	}

	pub fn ftp_client(&self) -> FtpClient {
		match self.connect_timeout {
			0 => FtpClient::new(),
			secs => FtpClient::new().with_connect_timeout(Duration::from_secs(secs)),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn defaults_match_legacy_gateway() {
		let cli = Cli::try_parse_from(["putfile"]).unwrap();
		assert_eq!(cli.listen_addr(), "0.0.0.0:10006".parse().unwrap());
		assert_eq!(cli.registry_config(), RegistryConfig::default());
		assert!(cli.log_file.is_none());
	}

	#[test]
	fn flags_override_defaults() {
		let cli = Cli::try_parse_from([
			"putfile",
			"-vv",
			"--bind",
			"127.0.0.1",
			"-p",
			"2121",
			"--log-file",
			"/var/log/putfile.log",
			"--idle-timeout",
			"30",
			"--sweep-interval",
			"5",
		])
		.unwrap();
		assert_eq!(cli.verbose, 2);
		assert_eq!(cli.listen_addr(), "127.0.0.1:2121".parse().unwrap());
		assert_eq!(cli.log_file, Some(PathBuf::from("/var/log/putfile.log")));
		assert_eq!(cli.registry_config().idle_timeout, Duration::from_secs(30));
		assert_eq!(cli.registry_config().sweep_interval, Duration::from_secs(5));
	}

	#[test]
	fn zero_sweep_interval_is_rejected() {
		assert!(Cli::try_parse_from(["putfile", "--sweep-interval", "0"]).is_err());
	}

	#[test]
	fn bad_port_is_rejected() {
		assert!(Cli::try_parse_from(["putfile", "--port", "70000"]).is_err());
	}
}
