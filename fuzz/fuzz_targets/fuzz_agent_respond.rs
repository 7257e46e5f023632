#![no_main]

use std::net::SocketAddr;
use std::sync::LazyLock;

use bytes::Bytes;
use libfuzzer_sys::fuzz_target;

use async_snmp_agent::agent::{Agent, Scope};
use async_snmp_agent::handler::VariableControl;
use async_snmp_agent::v3::{AuthProtocol, PrivProtocol, UsmUser};
use async_snmp_agent::{Value, ValueType, oid};

static AGENT: LazyLock<Agent> = LazyLock::new(|| {
    let variables = (1..=7u32).map(|arc| {
        VariableControl::builder(oid!(1, 3, 6, 1, 2, 1, 1, arc, 0), ValueType::Integer)
            .constant(Value::Integer(arc as i32))
            .on_write(|_| Ok(()))
            .build()
    });
    Agent::builder()
        .scope(Scope::builder().routing_key("public").routing_key("").variables(variables))
        .user(
            UsmUser::new("fuzz")
                .auth(AuthProtocol::Sha1, "authpassword")
                .privacy(PrivProtocol::Aes128, "privpassword"),
        )
        .time_source(|| 100u32)
        .prepare()
        .expect("fuzz agent configuration is valid")
});

fuzz_target!(|data: &[u8]| {
    let source = SocketAddr::from(([192, 0, 2, 1], 40000));
    // Any reply, or a dropped packet, is fine. A panic is not.
    let _ = AGENT.respond(&Bytes::copy_from_slice(data), source);
});
