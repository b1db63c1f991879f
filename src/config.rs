//! Process configuration. A single knob — the UDP port to bind — read
//! from the environment, failing loudly on bad input rather than a
//! TOML schema this crate's external surface doesn't warrant.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use crate::error::{Result, TftpError};

/// Default TFTP port for unprivileged testing; the IANA-assigned port 69
/// requires elevated privileges on most platforms and is left to the
/// deployer to configure.
pub const DEFAULT_PORT: u16 = 1069;

const PORT_ENV_VAR: &str = "TFTP_PORT";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    pub bind_addr: SocketAddr,
}

impl Config {
    /// Load configuration from the environment. `TFTP_PORT` unset falls
    /// back to [`DEFAULT_PORT`]; set but unparsable as a `u16` is a startup
    /// error, not a silent fallback.
    pub fn from_env() -> Result<Self> {
        let port = match std::env::var(PORT_ENV_VAR) {
            Ok(value) => value.parse::<u16>().map_err(|e| {
                TftpError::Other(anyhow::anyhow!(
                    "{PORT_ENV_VAR}={value:?} is not a valid port: {e}"
                ))
            })?,
            Err(std::env::VarError::NotPresent) => DEFAULT_PORT,
            Err(std::env::VarError::NotUnicode(_)) => {
                return Err(TftpError::Other(anyhow::anyhow!(
                    "{PORT_ENV_VAR} is not valid unicode"
                )));
            }
        };

        Ok(Config {
            bind_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // TFTP_PORT is process-global state; serialize tests that touch it so
    // they don't interleave under the default multi-threaded test runner.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn defaults_to_1069_when_unset() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::remove_var(PORT_ENV_VAR);
        let config = Config::from_env().unwrap();
        assert_eq!(config.bind_addr.port(), DEFAULT_PORT);
    }

    #[test]
    fn honors_explicit_port() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::set_var(PORT_ENV_VAR, "6969");
        let config = Config::from_env().unwrap();
        assert_eq!(config.bind_addr.port(), 6969);
        std::env::remove_var(PORT_ENV_VAR);
    }

    #[test]
    fn rejects_invalid_port() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::set_var(PORT_ENV_VAR, "not-a-port");
        match Config::from_env() {
            Ok(_) => panic!("expected invalid TFTP_PORT to be rejected"),
            Err(err) => assert!(format!("{err}").contains("not a valid port")),
        }
        std::env::remove_var(PORT_ENV_VAR);
    }

    #[test]
    fn rejects_out_of_range_port() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::set_var(PORT_ENV_VAR, "70000");
        assert!(Config::from_env().is_err());
        std::env::remove_var(PORT_ENV_VAR);
    }
}
