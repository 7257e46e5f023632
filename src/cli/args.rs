//! Command-line arguments of `asnmp-agent`.

use std::num::NonZeroUsize;

use clap::Parser;

use crate::transport::DEFAULT_BIND_ADDR;
use crate::v3::{AuthProtocol, EngineId, PrivProtocol, UsmUser};

/// Serve the SNMP system group over UDP.
#[derive(Debug, Parser)]
#[command(name = "asnmp-agent", version, about)]
pub struct AgentArgs {
    /// Local address to listen on.
    #[arg(short = 'b', long, default_value = DEFAULT_BIND_ADDR, value_name = "ADDR")]
    pub bind: String,

    /// Community string accepted for v1/v2c requests (repeatable).
    #[arg(short = 'c', long = "community", default_value = "public", value_name = "COMMUNITY")]
    pub communities: Vec<String>,

    /// SNMPv3 user as NAME[:AUTH-PROTO:AUTH-PASS[:PRIV-PROTO:PRIV-PASS]] (repeatable).
    #[arg(short = 'u', long = "user", value_name = "SPEC")]
    pub users: Vec<String>,

    /// Engine id as hex; derived from the host when omitted.
    #[arg(long, value_name = "HEX")]
    pub engine_id: Option<String>,

    /// Value of snmpEngineBoots.
    #[arg(long, default_value_t = crate::agent::DEFAULT_ENGINE_BOOTS)]
    pub engine_boots: u32,

    /// Answer every request from one scope, ignoring community and context.
    #[arg(long)]
    pub no_security: bool,

    /// Worker tasks; defaults to the available parallelism.
    #[arg(short = 'w', long)]
    pub workers: Option<NonZeroUsize>,

    /// Datagrams allowed to wait for a worker.
    #[arg(long, default_value_t = crate::server::DEFAULT_QUEUE_DEPTH)]
    pub queue_depth: usize,

    /// Socket receive buffer size in bytes.
    #[arg(long, value_name = "BYTES")]
    pub recv_buffer: Option<usize>,

    /// sysDescr.0 value.
    #[arg(long, default_value = concat!("asnmp-agent ", env!("CARGO_PKG_VERSION")))]
    pub descr: String,

    /// Initial sysContact.0 value.
    #[arg(long, default_value = "")]
    pub contact: String,

    /// Initial sysName.0 value.
    #[arg(long, default_value = "")]
    pub name: String,

    /// Initial sysLocation.0 value.
    #[arg(long, default_value = "")]
    pub location: String,

    /// Show debug logging (-vv for trace).
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl AgentArgs {
    /// Install the tracing subscriber. `RUST_LOG` takes precedence over `-v`.
    pub fn init_tracing(&self) {
        use tracing_subscriber::EnvFilter;

        let default = match self.verbose {
            0 => "async_snmp_agent=info",
            1 => "async_snmp_agent=debug",
            _ => "async_snmp_agent=trace",
        };
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }

    /// Parse every `--user` flag.
    pub fn usm_users(&self) -> Result<Vec<UsmUser>, String> {
        self.users.iter().map(|spec| parse_user(spec)).collect()
    }

    /// Parse `--engine-id`, if given.
    pub fn engine(&self) -> Result<Option<EngineId>, String> {
        self.engine_id
            .as_deref()
            .map(|hex| parse_hex(hex).map(EngineId::from_raw))
            .transpose()
    }
}

/// Parse `NAME[:AUTH-PROTO:AUTH-PASS[:PRIV-PROTO:PRIV-PASS]]`.
pub fn parse_user(spec: &str) -> Result<UsmUser, String> {
    let parts: Vec<&str> = spec.split(':').collect();
    let invalid = || {
        format!(
            "invalid user '{}'; expected NAME[:AUTH-PROTO:AUTH-PASS[:PRIV-PROTO:PRIV-PASS]]",
            parts[0]
        )
    };
    match parts.as_slice() {
        [""] | [] => Err("user name must not be empty".into()),
        [name] => Ok(UsmUser::new(name.to_string())),
        [name, auth, auth_pass] => {
            let auth: AuthProtocol = auth.parse().map_err(|e| format!("{}", e))?;
            Ok(UsmUser::new(name.to_string()).auth(auth, auth_pass))
        }
        [name, auth, auth_pass, privacy, priv_pass] => {
            let auth: AuthProtocol = auth.parse().map_err(|e| format!("{}", e))?;
            let privacy: PrivProtocol = privacy.parse().map_err(|e| format!("{}", e))?;
            Ok(UsmUser::new(name.to_string())
                .auth(auth, auth_pass)
                .privacy(privacy, priv_pass))
        }
        _ => Err(invalid()),
    }
}

fn parse_hex(text: &str) -> Result<Vec<u8>, String> {
    let digits = text.strip_prefix("0x").unwrap_or(text);
    if !digits.is_ascii() {
        return Err(format!("invalid engine id '{}': not hex", text));
    }
    if digits.is_empty() || digits.len() % 2 != 0 {
        return Err(format!("invalid engine id '{}': expected an even number of hex digits", text));
    }
    (0..digits.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&digits[i..i + 2], 16)
                .map_err(|_| format!("invalid engine id '{}': not hex", text))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::SecurityLevel;

    #[test]
    fn test_defaults() {
        let args = AgentArgs::parse_from(["asnmp-agent"]);
        assert_eq!(args.bind, DEFAULT_BIND_ADDR);
        assert_eq!(args.communities, ["public"]);
        assert!(args.usm_users().unwrap().is_empty());
        assert!(args.engine().unwrap().is_none());
    }

    #[test]
    fn test_parse_user_levels() {
        let user = parse_user("guest").unwrap();
        assert_eq!(user.security_level(), SecurityLevel::NoAuthNoPriv);

        let user = parse_user("monitor:SHA-256:authpass123").unwrap();
        assert_eq!(user.security_level(), SecurityLevel::AuthNoPriv);
        assert_eq!(user.auth_protocol(), Some(AuthProtocol::Sha256));

        let user = parse_user("admin:SHA:authpass123:AES:privpass123").unwrap();
        assert_eq!(user.security_level(), SecurityLevel::AuthPriv);
        assert_eq!(user.priv_protocol(), Some(PrivProtocol::Aes128));
    }

    #[test]
    fn test_parse_user_rejects_bad_specs() {
        assert!(parse_user("").is_err());
        assert!(parse_user("admin:SHA").is_err());
        assert!(parse_user("admin:ROT13:secret").is_err());
        assert!(parse_user("admin:SHA:a:AES").is_err());
    }

    #[test]
    fn test_engine_id_hex() {
        let args = AgentArgs::parse_from(["asnmp-agent", "--engine-id", "0x80001f8803aabbcc"]);
        let engine = args.engine().unwrap().unwrap();
        assert_eq!(engine.to_string(), "80001f8803aabbcc");

        let args = AgentArgs::parse_from(["asnmp-agent", "--engine-id", "abc"]);
        assert!(args.engine().is_err());

        let args = AgentArgs::parse_from(["asnmp-agent", "--engine-id", "aéa"]);
        assert!(args.engine().is_err());
    }
}
