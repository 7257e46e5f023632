//! asnmp-agent: serve the SNMP system group.
//!
//! Part of the async-snmp-agent CLI utilities.

use std::process::ExitCode;

use async_snmp_agent::cli::args::AgentArgs;
use async_snmp_agent::cli::system::{SystemInfo, system_group};
use async_snmp_agent::server::Server;
use async_snmp_agent::transport::{AgentTransport, UdpTransport};
use async_snmp_agent::{Agent, Scope};
use clap::Parser;

#[tokio::main]
async fn main() -> ExitCode {
    let args = AgentArgs::parse();
    args.init_tracing();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: AgentArgs) -> Result<(), Box<dyn std::error::Error>> {
    let users = args.usm_users()?;
    let engine_id = args.engine()?;

    let variables = system_group(SystemInfo {
        descr: args.descr.clone(),
        object_id: None,
        contact: args.contact.clone(),
        name: args.name.clone(),
        location: args.location.clone(),
    });

    // The empty key serves v3 requests without a context name.
    let mut scope = Scope::builder().variables(variables);
    if !args.no_security {
        for community in &args.communities {
            scope = scope.routing_key(community.clone());
        }
        scope = scope.routing_key("");
    }

    let mut builder = Agent::builder()
        .scope(scope)
        .engine_boots(args.engine_boots)
        .no_security(args.no_security);
    if let Some(engine_id) = engine_id {
        builder = builder.engine_id(engine_id);
    }
    for user in users {
        builder = builder.user(user);
    }
    let agent = builder.prepare()?;

    let mut transport = UdpTransport::builder().bind(args.bind.as_str());
    if let Some(size) = args.recv_buffer {
        transport = transport.recv_buffer_size(size);
    }
    let transport = transport.build().await?;

    let mut server = Server::builder().queue_depth(args.queue_depth);
    if let Some(workers) = args.workers {
        server = server.workers(workers.get());
    }
    let server = server.build(agent, transport.clone())?;

    let shutdown = transport.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received, shutting down");
            shutdown.close();
        }
    });

    eprintln!("asnmp-agent listening on {}", transport.local_addr());
    server.serve().await?;
    Ok(())
}
